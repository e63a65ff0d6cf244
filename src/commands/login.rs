//! `login` command.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use url::Url;

use super::CommandError;
use crate::api::ApiClient;
use crate::auth::LoginFlow;
use crate::config::ConfigStore;
use crate::display;

/// Options for `login`.
#[derive(Debug, Clone)]
pub struct LoginOptions {
    /// Remote base URL as typed by the user.
    pub url: String,
    /// Deadline for the browser hand-off, `None` to wait forever.
    pub timeout: Option<Duration>,
    /// Try to open the system browser.
    pub open_browser: bool,
}

/// Authenticate this client against a remote.
///
/// # Errors
///
/// Returns an error if the login flow fails.
pub async fn login(
    store: Arc<dyn ConfigStore>,
    options: &LoginOptions,
    cancel: CancellationToken,
) -> Result<(), CommandError> {
    let mut flow = LoginFlow::new(store)
        .with_timeout(options.timeout)
        .with_cancellation(cancel);
    if !options.open_browser {
        flow = flow.without_browser();
    }

    flow.login(&options.url).await?;
    display::print_success("logged in");
    Ok(())
}

/// Build an API client from the stored login.
///
/// # Errors
///
/// Returns an error if no login is stored or the stored URL is unusable.
pub fn require_auth(store: &dyn ConfigStore) -> Result<ApiClient, CommandError> {
    let token = store
        .read_session()
        .map_err(|source| CommandError::ReadCredentials {
            what: "session",
            source,
        })?;
    let raw_url = store
        .read_url()
        .map_err(|source| CommandError::ReadCredentials { what: "url", source })?;

    let url = Url::parse(&raw_url).map_err(|e| CommandError::BadStoredUrl {
        url: raw_url.clone(),
        reason: e.to_string(),
    })?;

    Ok(ApiClient::new(url, token)?)
}
