//! Command-level errors.

use crate::api::ApiError;
use crate::auth::AuthError;
use crate::config::{ConfigError, SettingsError};
use crate::render::RenderError;

const LOGIN_HINT: &str = "did you run \"devenv login <url>\"?";

/// Errors surfaced to the user by a command.
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    /// A stored credential could not be read.
    #[error("read {what}: {source}")]
    ReadCredentials {
        what: &'static str,
        #[source]
        source: ConfigError,
    },

    /// The stored URL does not parse.
    #[error("url misformatted: {url:?}: {reason}")]
    BadStoredUrl { url: String, reason: String },

    /// The user declined or could not answer the confirmation prompt.
    #[error("failed to confirm prompt")]
    NotConfirmed,

    /// Reading the confirmation answer failed.
    #[error("failed to read confirmation: {0}")]
    Prompt(#[source] std::io::Error),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Render(#[from] RenderError),

    #[error(transparent)]
    Settings(#[from] SettingsError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl CommandError {
    /// Recovery tip shown below the error, if there is one.
    #[must_use]
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::ReadCredentials { .. } | Self::BadStoredUrl { .. } => Some(LOGIN_HINT),
            Self::NotConfirmed | Self::Prompt(_) => {
                Some("use \"--force\" to rebuild without a confirmation prompt")
            }
            Self::Api(ApiError::Status { status: 401, .. }) => {
                Some("your session may have expired; run \"devenv login <url>\" again")
            }
            Self::Auth(AuthError::InvalidUrl { .. }) => {
                Some("pass the full remote URL, e.g. https://dev.example.com")
            }
            Self::Auth(AuthError::Timeout(_)) => {
                Some("use \"--timeout 0\" to wait for the browser without a deadline")
            }
            _ => None,
        }
    }
}
