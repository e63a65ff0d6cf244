//! Integration tests for the environments API client against a local server.

use std::sync::{Arc, Mutex};

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use devenv::api::{ApiClient, ApiError, EnvironmentsApi, SESSION_HEADER};
use devenv::buildlog::LogKind;
use devenv::commands;
use devenv::render::{Console, StageRenderer};
use futures_util::StreamExt;
use serde_json::json;
use tokio::net::TcpListener;
use url::Url;

const TOKEN: &str = "tok-valid";

const BUILD_LOG: &str = concat!(
    r#"{"type":"start","msg":"","time":"2024-05-01T10:00:00Z"}"#,
    "\n",
    r#"{"type":"stage","msg":"building image","time":"2024-05-01T10:00:01Z"}"#,
    "\n",
    r#"{"type":"done","msg":"","time":"2024-05-01T10:00:02Z"}"#,
    "\n",
);

#[derive(Clone, Default)]
struct Remote {
    rebuilt: Arc<Mutex<Vec<String>>>,
    follow_queries: Arc<Mutex<Vec<Option<String>>>>,
}

fn authorized(headers: &HeaderMap) -> bool {
    headers
        .get(SESSION_HEADER)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == TOKEN)
}

async fn list_envs(Path(user): Path<String>, headers: HeaderMap) -> impl IntoResponse {
    if !authorized(&headers) {
        return (StatusCode::UNAUTHORIZED, "bad session").into_response();
    }
    Json(json!([
        {"id": "env-1", "name": "front-end", "latest_stat": {"container_status": "ON"}},
        {"id": "env-2", "name": format!("{user}-scratch"), "latest_stat": {"container_status": "OFF"}},
    ]))
    .into_response()
}

async fn rebuild(
    State(remote): State<Remote>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> StatusCode {
    if !authorized(&headers) {
        return StatusCode::UNAUTHORIZED;
    }
    remote.rebuilt.lock().unwrap().push(id);
    StatusCode::OK
}

async fn buildlog(
    State(remote): State<Remote>,
    Path(_id): Path<String>,
    Query(params): Query<std::collections::HashMap<String, String>>,
    headers: HeaderMap,
) -> impl IntoResponse {
    if !authorized(&headers) {
        return (StatusCode::UNAUTHORIZED, "bad session").into_response();
    }
    remote
        .follow_queries
        .lock()
        .unwrap()
        .push(params.get("follow").cloned());
    BUILD_LOG.into_response()
}

async fn spawn_remote() -> (Url, Remote) {
    let remote = Remote::default();
    let app = Router::new()
        .route("/api/users/:user/environments", get(list_envs))
        .route("/api/environments/:id/rebuild", post(rebuild))
        .route("/api/environments/:id/buildlog", get(buildlog))
        .with_state(remote.clone());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let base = Url::parse(&format!("http://{addr}")).unwrap();
    (base, remote)
}

#[tokio::test]
async fn lists_environments_with_session_header() {
    let (base, _remote) = spawn_remote().await;
    let client = ApiClient::new(base, TOKEN).unwrap();

    let envs = client.environments("me").await.unwrap();

    assert_eq!(envs.len(), 2);
    assert!(envs[0].is_on());
    assert_eq!(envs[1].name, "me-scratch");
}

#[tokio::test]
async fn find_environment_by_name() {
    let (base, _remote) = spawn_remote().await;
    let client = ApiClient::new(base, TOKEN).unwrap();

    let env = client.find_environment("me", "front-end").await.unwrap();
    assert_eq!(env.id, "env-1");

    let err = client.find_environment("me", "nope").await.unwrap_err();
    assert!(matches!(err, ApiError::EnvironmentNotFound { .. }));
}

#[tokio::test]
async fn rebuild_posts_to_environment() {
    let (base, remote) = spawn_remote().await;
    let client = ApiClient::new(base, TOKEN).unwrap();

    client.rebuild_environment("env-1").await.unwrap();

    assert_eq!(*remote.rebuilt.lock().unwrap(), vec!["env-1"]);
}

#[tokio::test]
async fn build_log_streams_events_until_done() {
    let (base, remote) = spawn_remote().await;
    let client = ApiClient::new(base, TOKEN).unwrap();

    let events: Vec<_> = client
        .follow_build_log("env-1")
        .await
        .unwrap()
        .collect()
        .await;

    let kinds: Vec<_> = events.into_iter().map(|e| e.unwrap().kind).collect();
    assert_eq!(kinds, vec![LogKind::Start, LogKind::Stage, LogKind::Done]);
    assert_eq!(
        *remote.follow_queries.lock().unwrap(),
        vec![Some("true".to_string())]
    );
}

#[derive(Clone, Default)]
struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl std::io::Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

#[tokio::test]
async fn watch_build_renders_remote_log() {
    let (base, _remote) = spawn_remote().await;
    let client = ApiClient::new(base, TOKEN).unwrap();
    let buffer = SharedBuffer::default();
    let mut renderer = StageRenderer::new(Console::new(buffer.clone()), false);

    let summary = commands::watch_build(&client, "me", "front-end", &mut renderer)
        .await
        .unwrap();
    drop(renderer);

    assert_eq!(summary.stages, 1);
    let output = String::from_utf8(buffer.0.lock().unwrap().clone()).unwrap();
    assert_eq!(output, "2024-05-01T10:00:01Z building image\n");
}

#[tokio::test]
async fn rejected_session_maps_to_status_error() {
    let (base, _remote) = spawn_remote().await;
    let client = ApiClient::new(base, "tok-stale").unwrap();

    let err = client.environments("me").await.unwrap_err();
    assert!(matches!(
        &err,
        ApiError::Status { status: 401, body } if body == "bad session"
    ));

    let err = client.follow_build_log("env-1").await.unwrap_err();
    assert!(matches!(err, ApiError::Status { status: 401, .. }));
}

#[tokio::test]
async fn unreachable_remote_is_request_failure() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = ApiClient::new(Url::parse(&format!("http://{addr}")).unwrap(), TOKEN).unwrap();
    let err = client.environments("me").await.unwrap_err();

    assert!(matches!(err, ApiError::RequestFailed(_)));
}
