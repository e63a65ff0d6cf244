//! Login error types.

use std::time::Duration;

use crate::config::ConfigError;

/// Errors that can occur during the browser login flow.
#[derive(thiserror::Error, Debug)]
pub enum AuthError {
    /// Remote URL could not be parsed or is not http(s).
    #[error("Invalid remote URL {input:?}: {reason}")]
    InvalidUrl { input: String, reason: String },

    /// Failed to bind the callback listener.
    #[error("Failed to create login server: {0}")]
    BindError(#[source] std::io::Error),

    /// No token arrived before the deadline.
    #[error("Timed out after {}s waiting for the browser login", .0.as_secs())]
    Timeout(Duration),

    /// The wait was interrupted.
    #[error("Login cancelled")]
    Cancelled,

    /// The listener stopped before a token was delivered.
    #[error("Login server closed before a token was received")]
    ServerClosed,

    /// Writing the URL or the token failed.
    #[error("Failed to persist login: {0}")]
    Persist(#[from] ConfigError),
}
