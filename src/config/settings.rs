//! Settings file loader.

use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::store::APP_DIR;

/// Default deadline for the browser login hand-off.
pub const DEFAULT_LOGIN_TIMEOUT_SECS: u64 = 300;

/// Settings loaded from TOML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Login flow settings.
    pub login: LoginSettings,
    /// Build log rendering settings.
    pub render: RenderSettings,
}

/// Login flow settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoginSettings {
    /// Seconds to wait for the browser redirect. Zero waits forever.
    pub timeout_secs: u64,
    /// Try to open the system browser.
    pub open_browser: bool,
}

impl Default for LoginSettings {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_LOGIN_TIMEOUT_SECS,
            open_browser: true,
        }
    }
}

impl LoginSettings {
    /// Wait deadline, `None` when unbounded.
    #[must_use]
    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_secs > 0).then(|| Duration::from_secs(self.timeout_secs))
    }
}

/// Build log rendering settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderSettings {
    /// Always use flat line output.
    pub plain: bool,
}

/// Settings files in priority order: `./.devenv.toml`, then the user config dir.
#[must_use]
pub fn settings_paths() -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from(".devenv.toml")];
    if let Some(config_dir) = dirs::config_dir() {
        paths.push(config_dir.join(APP_DIR).join("config.toml"));
    }
    paths
}

impl Settings {
    /// Load from the default settings files.
    ///
    /// # Errors
    ///
    /// Returns an error if a settings file exists but cannot be read or parsed.
    pub fn load() -> Result<Self, SettingsError> {
        Self::load_first(&settings_paths())
    }

    /// Load the first of `candidates` that is a file, or defaults if none is.
    ///
    /// # Errors
    ///
    /// Returns an error if the chosen file cannot be read or parsed.
    pub fn load_first(candidates: &[PathBuf]) -> Result<Self, SettingsError> {
        let Some(path) = candidates.iter().find(|p| p.is_file()) else {
            tracing::debug!("No settings file found, using defaults");
            return Ok(Self::default());
        };

        let content = fs::read_to_string(path).map_err(|source| SettingsError::ReadError {
            path: path.clone(),
            source,
        })?;
        let settings = toml::from_str(&content).map_err(|source| SettingsError::ParseError {
            path: path.clone(),
            source,
        })?;

        tracing::debug!(path = %path.display(), "Loaded settings");
        Ok(settings)
    }
}

/// Errors that can occur during settings loading.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("Failed to read settings file {path}: {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse settings file {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },
}
