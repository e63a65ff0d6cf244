//! Browser-redirect login flow.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use url::Url;

use super::{AuthError, AuthSession, CallbackServer};
use crate::config::ConfigStore;
use crate::display;

/// Path of the remote authorization page.
pub const AUTH_PATH: &str = "/internal-auth/";

/// Query parameter telling the authorization page where to redirect.
pub const LOCAL_SERVICE_PARAM: &str = "local_service";

/// Opens a URL for the user. Runs on the blocking thread pool.
pub trait BrowserOpener: Send + Sync {
    /// Open `url` in a browser.
    ///
    /// # Errors
    ///
    /// Returns an error if no browser could be launched.
    fn open(&self, url: &str) -> std::io::Result<()>;
}

/// The platform's default browser.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemBrowser;

impl BrowserOpener for SystemBrowser {
    fn open(&self, url: &str) -> std::io::Result<()> {
        webbrowser::open(url)
    }
}

/// Reduce a user-supplied remote URL to `scheme://host[:port]`.
///
/// # Errors
///
/// Returns `AuthError::InvalidUrl` unless the input is an absolute http(s)
/// URL with a host.
pub fn canonical_base_url(raw: &str) -> Result<String, AuthError> {
    let invalid = |reason: String| AuthError::InvalidUrl {
        input: raw.to_string(),
        reason,
    };

    let url = Url::parse(raw.trim()).map_err(|e| invalid(e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid(format!("unsupported scheme {:?}", url.scheme())));
    }
    if url.host_str().map_or(true, str::is_empty) {
        return Err(invalid("missing host".to_string()));
    }

    Ok(url.origin().ascii_serialization())
}

/// Build `<base>/internal-auth/?local_service=<callback>`.
///
/// The callback URL goes into the query verbatim.
///
/// # Errors
///
/// Returns `AuthError::InvalidUrl` if `base` does not parse.
pub fn authorization_url(base: &str, callback: &str) -> Result<Url, AuthError> {
    let mut url = Url::parse(base).map_err(|e| AuthError::InvalidUrl {
        input: base.to_string(),
        reason: e.to_string(),
    })?;
    url.set_path(AUTH_PATH);
    url.set_query(Some(&format!("{LOCAL_SERVICE_PARAM}={callback}")));
    Ok(url)
}

/// Drives a login from URL validation to the stored session token.
pub struct LoginFlow {
    store: Arc<dyn ConfigStore>,
    browser: Option<Arc<dyn BrowserOpener>>,
    timeout: Option<Duration>,
    cancel: CancellationToken,
}

impl LoginFlow {
    /// Create a flow that opens the system browser and waits without a deadline.
    #[must_use]
    pub fn new(store: Arc<dyn ConfigStore>) -> Self {
        Self {
            store,
            browser: Some(Arc::new(SystemBrowser)),
            timeout: None,
            cancel: CancellationToken::new(),
        }
    }

    /// Use a different browser opener.
    #[must_use]
    pub fn with_browser(mut self, browser: Box<dyn BrowserOpener>) -> Self {
        self.browser = Some(Arc::from(browser));
        self
    }

    /// Never try a browser; always print the URL.
    #[must_use]
    pub fn without_browser(mut self) -> Self {
        self.browser = None;
        self
    }

    /// Give up waiting for the redirect after `timeout`.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Abort the wait when `cancel` fires.
    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Run the login against `raw_url`.
    ///
    /// The canonical base URL is persisted before the browser is opened.
    /// The token is persisted once received. The callback listener is
    /// closed on every exit path.
    ///
    /// # Errors
    ///
    /// Returns an error for a malformed URL, a listener that cannot bind,
    /// a wait that times out or is cancelled, or a failed write.
    pub async fn login(&self, raw_url: &str) -> Result<AuthSession, AuthError> {
        let base = canonical_base_url(raw_url)?;
        let mut server = CallbackServer::start().await?;

        self.store.write_url(&base)?;

        let auth_url = authorization_url(&base, &server.callback_url())?;
        self.present(&auth_url).await;

        tracing::info!(
            remote = %base,
            timeout_secs = self.timeout.map(|t| t.as_secs()),
            "Waiting for browser login"
        );
        let result = server.await_token(self.timeout, &self.cancel).await;
        server.close().await;
        let session = result?;

        self.store.write_session(&session.token)?;
        tracing::info!(remote = %base, "Stored session token");

        Ok(session)
    }

    async fn present(&self, auth_url: &Url) {
        let opened = match &self.browser {
            Some(browser) => {
                let browser = Arc::clone(browser);
                let url = auth_url.to_string();
                match tokio::task::spawn_blocking(move || browser.open(&url)).await {
                    Ok(Ok(())) => true,
                    Ok(Err(e)) => {
                        tracing::debug!(error = %e, "Failed to open browser");
                        false
                    }
                    Err(e) => {
                        tracing::debug!(error = %e, "Browser task failed");
                        false
                    }
                }
            }
            None => false,
        };

        if !opened {
            display::print_info(&format!("visit {auth_url} to login"));
        }
    }
}
