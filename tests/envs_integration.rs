//! Integration tests for `envs rebuild` / `envs watch-build` and build log rendering.

use std::io::{self, Write};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use devenv::api::{ApiError, ContainerStatus, Environment, EnvironmentStat, EnvironmentsApi};
use devenv::buildlog::BuildLogStream;
use devenv::commands::{self, CommandError, Confirm, RebuildOptions, RebuildOutcome};
use devenv::render::{Console, RenderError, RenderSink, StageRenderer};

/// Build a newline-delimited feed from `(type, msg, second)` triples.
fn feed(events: &[(&str, &str, u32)]) -> String {
    events
        .iter()
        .map(|(kind, msg, sec)| {
            serde_json::json!({
                "type": kind,
                "msg": msg,
                "time": format!("2024-05-01T10:00:{sec:02}Z"),
            })
            .to_string()
                + "\n"
        })
        .collect()
}

fn label(msg: &str, sec: u32) -> String {
    format!("2024-05-01T10:00:{sec:02}Z {msg}")
}

#[derive(Default)]
struct FakeApi {
    envs: Vec<Environment>,
    feed: String,
    rebuilt: Mutex<Vec<String>>,
    followed: Mutex<Vec<String>>,
}

impl FakeApi {
    fn with_env(name: &str, status: ContainerStatus, feed: String) -> Self {
        Self {
            envs: vec![Environment {
                id: format!("id-{name}"),
                name: name.to_string(),
                latest_stat: EnvironmentStat {
                    container_status: status,
                },
            }],
            feed,
            ..Self::default()
        }
    }
}

#[async_trait]
impl EnvironmentsApi for FakeApi {
    async fn environments(&self, _user: &str) -> Result<Vec<Environment>, ApiError> {
        Ok(self.envs.clone())
    }

    async fn rebuild_environment(&self, env_id: &str) -> Result<(), ApiError> {
        self.rebuilt.lock().unwrap().push(env_id.to_string());
        Ok(())
    }

    async fn follow_build_log(&self, env_id: &str) -> Result<BuildLogStream, ApiError> {
        self.followed.lock().unwrap().push(env_id.to_string());
        let body = io::Cursor::new(self.feed.clone().into_bytes());
        Ok(BuildLogStream::from_reader(body))
    }
}

struct Answer(bool);

#[async_trait]
impl Confirm for Answer {
    async fn confirm(&self, _prompt: &str) -> io::Result<bool> {
        Ok(self.0)
    }
}

struct PanicsIfAsked;

#[async_trait]
impl Confirm for PanicsIfAsked {
    async fn confirm(&self, prompt: &str) -> io::Result<bool> {
        panic!("unexpected prompt: {prompt}");
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Op {
    Begin(Option<String>),
    Finish(Option<String>),
    Line(String),
}

#[derive(Debug, Default)]
struct Recorder {
    ops: Vec<Op>,
}

impl Recorder {
    fn finishes(&self) -> usize {
        self.ops
            .iter()
            .filter(|op| matches!(op, Op::Finish(_)))
            .count()
    }
}

impl RenderSink for Recorder {
    fn begin_stage(&mut self, label: Option<&str>) {
        self.ops.push(Op::Begin(label.map(String::from)));
    }

    fn finish_stage(&mut self, final_line: Option<&str>) {
        self.ops.push(Op::Finish(final_line.map(String::from)));
    }

    fn line(&mut self, text: &str) {
        self.ops.push(Op::Line(text.to_string()));
    }
}

#[derive(Clone, Default)]
struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl SharedBuffer {
    fn bytes(&self) -> Vec<u8> {
        self.0.lock().unwrap().clone()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn options(name: &str, follow: bool, force: bool) -> RebuildOptions {
    RebuildOptions {
        name: name.to_string(),
        user: "me".to_string(),
        follow,
        force,
    }
}

#[tokio::test]
async fn rebuild_of_running_env_needs_confirmation() {
    let api = FakeApi::with_env("front-end", ContainerStatus::On, String::new());
    let mut renderer = StageRenderer::new(Recorder::default(), false);

    let err = commands::rebuild(
        &api,
        &options("front-end", false, false),
        &Answer(false),
        &mut renderer,
    )
    .await
    .unwrap_err();

    assert!(matches!(err, CommandError::NotConfirmed));
    assert!(err.hint().unwrap().contains("--force"));
    assert!(api.rebuilt.lock().unwrap().is_empty());
}

#[tokio::test]
async fn confirmed_rebuild_starts_without_following() {
    let api = FakeApi::with_env("front-end", ContainerStatus::On, String::new());
    let mut renderer = StageRenderer::new(Recorder::default(), false);

    let outcome = commands::rebuild(
        &api,
        &options("front-end", false, false),
        &Answer(true),
        &mut renderer,
    )
    .await
    .unwrap();

    assert_eq!(outcome, RebuildOutcome::Started);
    assert_eq!(*api.rebuilt.lock().unwrap(), vec!["id-front-end"]);
    assert!(api.followed.lock().unwrap().is_empty());
}

#[tokio::test]
async fn force_and_stopped_envs_skip_prompt() {
    let running = FakeApi::with_env("api", ContainerStatus::On, String::new());
    let stopped = FakeApi::with_env("api", ContainerStatus::Off, String::new());
    let mut renderer = StageRenderer::new(Recorder::default(), false);

    commands::rebuild(&running, &options("api", false, true), &PanicsIfAsked, &mut renderer)
        .await
        .unwrap();
    commands::rebuild(&stopped, &options("api", false, false), &PanicsIfAsked, &mut renderer)
        .await
        .unwrap();

    assert_eq!(running.rebuilt.lock().unwrap().len(), 1);
    assert_eq!(stopped.rebuilt.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn unknown_environment_is_reported() {
    let api = FakeApi::with_env("api", ContainerStatus::Off, String::new());
    let mut renderer = StageRenderer::new(Recorder::default(), false);

    let err = commands::watch_build(&api, "me", "missing", &mut renderer)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        CommandError::Api(ApiError::EnvironmentNotFound { .. })
    ));
}

#[tokio::test]
async fn followed_rebuild_renders_stages_in_order() {
    let body = feed(&[
        ("start", "", 0),
        ("stage", "building image", 1),
        ("stage", "pushing image", 2),
        ("done", "", 3),
    ]);
    let api = FakeApi::with_env("front-end", ContainerStatus::Off, body);
    let mut renderer = StageRenderer::new(Recorder::default(), true);

    let outcome = commands::rebuild(
        &api,
        &options("front-end", true, false),
        &PanicsIfAsked,
        &mut renderer,
    )
    .await
    .unwrap();

    assert!(matches!(outcome, RebuildOutcome::Followed(s) if s.stages == 2));
    assert_eq!(*api.followed.lock().unwrap(), vec!["id-front-end"]);
    assert_eq!(
        renderer.sink().ops,
        vec![
            Op::Begin(Some(label("building image", 1))),
            Op::Finish(Some(format!("✅ -- {}", label("building image", 1)))),
            Op::Begin(Some(label("pushing image", 2))),
            Op::Finish(Some(format!("✅ -- {}", label("pushing image", 2)))),
        ]
    );
}

#[tokio::test]
async fn plain_rendering_prints_lines_without_glyphs() {
    let body = feed(&[
        ("start", "", 0),
        ("stage", "building image", 1),
        ("stage", "pushing image", 2),
        ("done", "", 3),
    ]);
    let api = FakeApi::with_env("front-end", ContainerStatus::Off, body);
    let mut renderer = StageRenderer::new(Recorder::default(), false);

    commands::watch_build(&api, "me", "front-end", &mut renderer)
        .await
        .unwrap();

    assert_eq!(
        renderer.sink().ops,
        vec![
            Op::Line(label("building image", 1)),
            Op::Line(label("pushing image", 2)),
        ]
    );
}

#[tokio::test]
async fn soft_error_fails_stage_then_recovers() {
    let body = feed(&[
        ("start", "", 0),
        ("stage", "building", 1),
        ("error", "out of disk", 2),
        ("done", "", 3),
    ]);
    let api = FakeApi::with_env("front-end", ContainerStatus::Off, body);
    let mut renderer = StageRenderer::new(Recorder::default(), true);

    let summary = commands::watch_build(&api, "me", "front-end", &mut renderer)
        .await
        .unwrap();

    assert_eq!(summary.errors, 1);
    let ops = &renderer.sink().ops;
    assert_eq!(
        ops[1],
        Op::Finish(Some(format!("❌ -- {}", label("building", 1))))
    );
    assert!(matches!(&ops[2], Op::Line(text) if text.contains("\tout of disk")));
    assert_eq!(ops[3], Op::Begin(None));
    assert_eq!(ops[4], Op::Finish(None));
    assert_eq!(ops.len(), 5);
}

#[tokio::test]
async fn every_opened_stage_is_finalized_once() {
    let sequences: Vec<Vec<(&str, &str, u32)>> = vec![
        vec![("done", "", 0)],
        vec![("stage", "a", 1), ("done", "", 2)],
        vec![
            ("start", "", 0),
            ("stage", "a", 1),
            ("substage", "a.1", 2),
            ("error", "boom", 3),
            ("error", "boom again", 4),
            ("stage", "b", 5),
            ("stage", "c", 6),
            ("done", "", 7),
        ],
        vec![("error", "early", 1), ("stage", "a", 2), ("done", "", 3)],
    ];

    for events in sequences {
        let openers = events
            .iter()
            .filter(|(kind, _, _)| matches!(*kind, "stage" | "error"))
            .count();
        let api = FakeApi::with_env("env", ContainerStatus::Off, feed(&events));
        let mut renderer = StageRenderer::new(Recorder::default(), true);

        commands::watch_build(&api, "me", "env", &mut renderer)
            .await
            .unwrap();

        assert_eq!(
            renderer.sink().finishes(),
            openers,
            "finalize count mismatch for {events:?}"
        );
        assert!(!renderer.state().has_open_stage());
    }
}

#[tokio::test]
async fn unknown_kind_halts_rendering() {
    let body = feed(&[
        ("stage", "building", 1),
        ("progress", "50%", 2),
        ("stage", "never shown", 3),
        ("done", "", 4),
    ]);
    let api = FakeApi::with_env("env", ContainerStatus::Off, body);
    let mut renderer = StageRenderer::new(Recorder::default(), true);

    let err = commands::watch_build(&api, "me", "env", &mut renderer)
        .await
        .unwrap_err();

    assert!(matches!(
        &err,
        CommandError::Render(RenderError::UnknownKind(kind)) if kind == "progress"
    ));
    assert_eq!(
        renderer.sink().ops,
        vec![
            Op::Begin(Some(label("building", 1))),
            Op::Finish(Some(format!("❌ -- {}", label("building", 1)))),
        ]
    );
}

#[tokio::test]
async fn truncated_feed_is_an_error() {
    let body = feed(&[("stage", "building", 1)]);
    let api = FakeApi::with_env("env", ContainerStatus::Off, body);
    let mut renderer = StageRenderer::new(Recorder::default(), true);

    let err = commands::watch_build(&api, "me", "env", &mut renderer)
        .await
        .unwrap_err();

    assert!(matches!(err, CommandError::Render(RenderError::Stream(_))));
    assert!(!renderer.state().has_open_stage());
}

#[tokio::test]
async fn plain_console_output_is_deterministic() {
    let body = feed(&[
        ("start", "", 0),
        ("stage", "building", 1),
        ("error", "out of disk", 2),
        ("stage", "retrying", 3),
        ("done", "", 4),
    ]);

    let mut outputs = Vec::new();
    for _ in 0..3 {
        let api = FakeApi::with_env("env", ContainerStatus::Off, body.clone());
        let buffer = SharedBuffer::default();
        let mut renderer = StageRenderer::new(Console::new(buffer.clone()), false);

        commands::watch_build(&api, "me", "env", &mut renderer)
            .await
            .unwrap();
        drop(renderer);
        outputs.push(buffer.bytes());
    }

    let expected = format!(
        "{}\n\tout of disk\n{}\n",
        label("building", 1),
        label("retrying", 3)
    );
    assert_eq!(String::from_utf8(outputs[0].clone()).unwrap(), expected);
    assert!(outputs.iter().all(|o| *o == outputs[0]));
}
