//! Build log event types.
//!
//! Events arrive as one JSON object per line:
//! `{"type": "stage", "msg": "building image", "time": "2024-05-01T10:00:00Z"}`.

use std::fmt;

use chrono::{DateTime, FixedOffset, SecondsFormat};
use serde::{Deserialize, Serialize};

/// Kind of a build log event.
///
/// Kinds this client does not know are kept verbatim in `Unknown` so the
/// renderer can report them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum LogKind {
    /// Build started; the trail is reset.
    Start,
    /// A new build stage began.
    Stage,
    /// Detail within the current stage.
    Substage,
    /// A stage failed.
    Error,
    /// Build finished.
    Done,
    /// Unrecognized kind.
    Unknown(String),
}

impl LogKind {
    /// Wire name of this kind.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Start => "start",
            Self::Stage => "stage",
            Self::Substage => "substage",
            Self::Error => "error",
            Self::Done => "done",
            Self::Unknown(kind) => kind,
        }
    }

    /// Returns true if no events follow this one.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done)
    }
}

impl From<String> for LogKind {
    fn from(kind: String) -> Self {
        match kind.as_str() {
            "start" => Self::Start,
            "stage" => Self::Stage,
            "substage" => Self::Substage,
            "error" => Self::Error,
            "done" => Self::Done,
            _ => Self::Unknown(kind),
        }
    }
}

impl From<LogKind> for String {
    fn from(kind: LogKind) -> Self {
        match kind {
            LogKind::Unknown(kind) => kind,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for LogKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One event of the build log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEvent {
    /// Event kind.
    #[serde(rename = "type")]
    pub kind: LogKind,
    /// Human-readable message.
    #[serde(rename = "msg", default)]
    pub message: String,
    /// When the event was produced.
    #[serde(rename = "time", default)]
    pub timestamp: DateTime<FixedOffset>,
}

impl LogEvent {
    /// Create a new event.
    #[must_use]
    pub fn new(kind: LogKind, message: impl Into<String>, timestamp: DateTime<FixedOffset>) -> Self {
        Self {
            kind,
            message: message.into(),
            timestamp,
        }
    }

    /// `<RFC 3339 timestamp> <message>`, the label a stage is shown with.
    #[must_use]
    pub fn stage_label(&self) -> String {
        format!(
            "{} {}",
            self.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true),
            self.message
        )
    }
}
