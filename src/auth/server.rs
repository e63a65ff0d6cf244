//! Ephemeral callback listener for the browser login redirect.
//!
//! The listener binds an OS-assigned loopback port and accepts `GET /`
//! requests carrying a `session_token` query parameter. The first request
//! with a token wins the hand-off; later ones are acknowledged and dropped.

use std::net::{Ipv4Addr, SocketAddr};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use axum::body::Body;
use axum::extract::{Query, State};
use axum::http::{Request, StatusCode};
use axum::routing::get;
use axum::Router;
use serde::Deserialize;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::Span;

use super::AuthError;

/// Query parameter carrying the session token.
pub const TOKEN_PARAM: &str = "session_token";

/// How long `close` waits for in-flight requests before aborting the listener.
const CLOSE_GRACE: Duration = Duration::from_secs(2);

const ACCEPTED_BODY: &str = "You may close this window now.\n";
const DUPLICATE_BODY: &str = "Login already completed. You may close this window.\n";
const MISSING_TOKEN_BODY: &str = "No session_token found\n";

/// Session handed from the listener to the login flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthSession {
    /// Session token delivered by the redirect.
    pub token: String,
}

/// Outcome of offering a token to a [`TokenSlot`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// This token won the hand-off.
    Accepted,
    /// A token was already delivered; this one was dropped.
    AlreadyDelivered,
}

/// Exactly-once hand-off between request handlers and the waiting flow.
///
/// The sender is taken under the lock, so only one caller can ever observe
/// it and send.
#[derive(Debug)]
pub struct TokenSlot {
    sender: Mutex<Option<oneshot::Sender<AuthSession>>>,
}

impl TokenSlot {
    /// Create a slot and the receiver its single delivery resolves.
    #[must_use]
    pub fn new() -> (Arc<Self>, oneshot::Receiver<AuthSession>) {
        let (tx, rx) = oneshot::channel();
        let slot = Arc::new(Self {
            sender: Mutex::new(Some(tx)),
        });
        (slot, rx)
    }

    /// Offer a token. Only the first call returns [`Delivery::Accepted`].
    pub fn deliver(&self, token: String) -> Delivery {
        let sender = self
            .sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        match sender {
            Some(tx) => {
                if tx.send(AuthSession { token }).is_err() {
                    tracing::debug!("Login flow stopped waiting before the token arrived");
                }
                Delivery::Accepted
            }
            None => Delivery::AlreadyDelivered,
        }
    }

    /// Whether a token has been accepted.
    #[must_use]
    pub fn is_delivered(&self) -> bool {
        self.sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }
}

#[derive(Debug, Deserialize)]
struct CallbackQuery {
    session_token: Option<String>,
}

/// GET / - Receive the redirect from the authorization page.
async fn handle_callback(
    State(slot): State<Arc<TokenSlot>>,
    Query(query): Query<CallbackQuery>,
) -> (StatusCode, &'static str) {
    let Some(token) = query.session_token.filter(|t| !t.trim().is_empty()) else {
        tracing::warn!(param = TOKEN_PARAM, "Rejected login callback without a token");
        return (StatusCode::BAD_REQUEST, MISSING_TOKEN_BODY);
    };

    match slot.deliver(token) {
        Delivery::Accepted => {
            tracing::info!("Received session token from login callback");
            (StatusCode::OK, ACCEPTED_BODY)
        }
        Delivery::AlreadyDelivered => {
            tracing::debug!("Ignoring duplicate login callback");
            (StatusCode::OK, DUPLICATE_BODY)
        }
    }
}

/// Request span without the query string, which carries the token.
fn callback_span(request: &Request<Body>) -> Span {
    tracing::debug_span!(
        "callback",
        method = %request.method(),
        path = %request.uri().path(),
    )
}

/// Build the callback router around a hand-off slot.
pub fn build_router(slot: Arc<TokenSlot>) -> Router {
    Router::new()
        .route("/", get(handle_callback))
        .with_state(slot)
        .layer(TraceLayer::new_for_http().make_span_with(callback_span))
}

/// Running callback listener.
///
/// Dropping the server stops the listener; [`CallbackServer::close`] also
/// waits for it to finish.
#[derive(Debug)]
pub struct CallbackServer {
    addr: SocketAddr,
    token_rx: Option<oneshot::Receiver<AuthSession>>,
    shutdown: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl CallbackServer {
    /// Start listening on an OS-assigned loopback port.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::BindError` if the listener cannot be created.
    pub async fn start() -> Result<Self, AuthError> {
        Self::bind(SocketAddr::from((Ipv4Addr::LOCALHOST, 0))).await
    }

    /// Start listening on a specific address.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::BindError` if the listener cannot be created.
    pub async fn bind(addr: SocketAddr) -> Result<Self, AuthError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(AuthError::BindError)?;
        let addr = listener.local_addr().map_err(AuthError::BindError)?;

        let (slot, token_rx) = TokenSlot::new();
        let app = build_router(slot);
        let shutdown = CancellationToken::new();
        let cancel = shutdown.clone();

        let task = tokio::spawn(async move {
            let result = axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    cancel.cancelled().await;
                })
                .await;
            if let Err(e) = result {
                tracing::warn!(error = %e, "Login callback server error");
            }
        });

        tracing::info!(address = %addr, "Login callback server listening");

        Ok(Self {
            addr,
            token_rx: Some(token_rx),
            shutdown,
            task: Some(task),
        })
    }

    /// Address the listener is bound to.
    #[must_use]
    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// URL the authorization page should redirect to.
    #[must_use]
    pub fn callback_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Wait for the hand-off.
    ///
    /// Resolves with the first accepted token, or fails when `timeout`
    /// elapses or `cancel` fires. Once a token has been returned, further
    /// calls fail with `AuthError::ServerClosed`.
    ///
    /// # Errors
    ///
    /// Returns `Timeout`, `Cancelled`, or `ServerClosed`.
    pub async fn await_token(
        &mut self,
        timeout: Option<Duration>,
        cancel: &CancellationToken,
    ) -> Result<AuthSession, AuthError> {
        let rx = self.token_rx.as_mut().ok_or(AuthError::ServerClosed)?;
        let wait = async { rx.await.map_err(|_| AuthError::ServerClosed) };

        let result = tokio::select! {
            biased;

            () = cancel.cancelled() => Err(AuthError::Cancelled),
            result = with_deadline(wait, timeout) => result,
        };

        if result.is_ok() {
            self.token_rx = None;
        }
        result
    }

    /// Stop the listener and wait for it to shut down.
    pub async fn close(mut self) {
        self.shutdown.cancel();

        if let Some(mut task) = self.task.take() {
            match tokio::time::timeout(CLOSE_GRACE, &mut task).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => tracing::warn!(error = %e, "Login callback server task failed"),
                Err(_) => {
                    tracing::debug!("Aborting login callback server with open connections");
                    task.abort();
                }
            }
        }

        tracing::debug!(address = %self.addr, "Login callback server closed");
    }
}

impl Drop for CallbackServer {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

async fn with_deadline<F>(wait: F, timeout: Option<Duration>) -> Result<AuthSession, AuthError>
where
    F: std::future::Future<Output = Result<AuthSession, AuthError>>,
{
    match timeout {
        Some(limit) => tokio::time::timeout(limit, wait)
            .await
            .unwrap_or(Err(AuthError::Timeout(limit))),
        None => wait.await,
    }
}
