//! Credential store for the session token and the remote base URL.

use std::fs;
use std::path::{Path, PathBuf};

/// Application directory name under the user config dir.
pub const APP_DIR: &str = "devenv";

const SESSION_FILE: &str = "session";
const URL_FILE: &str = "url";

/// Persistence for the values `login` produces and every other command reads.
pub trait ConfigStore: Send + Sync {
    /// Read the stored session token.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::NotFound` if no session has been stored.
    fn read_session(&self) -> Result<String, ConfigError>;

    /// Store a session token, replacing any previous one.
    ///
    /// # Errors
    ///
    /// Returns an error if the token cannot be written.
    fn write_session(&self, token: &str) -> Result<(), ConfigError>;

    /// Read the stored remote base URL.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::NotFound` if no URL has been stored.
    fn read_url(&self) -> Result<String, ConfigError>;

    /// Store the remote base URL.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL cannot be written.
    fn write_url(&self, url: &str) -> Result<(), ConfigError>;
}

/// Errors from the credential store.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{name} not found in {dir}")]
    NotFound { name: &'static str, dir: PathBuf },

    #[error("Failed to read {path}: {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to write {path}: {source}")]
    WriteError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("No user config directory available")]
    NoConfigDir,
}

/// File-backed store: one plain file per value.
#[derive(Debug, Clone)]
pub struct FileConfigStore {
    dir: PathBuf,
}

impl FileConfigStore {
    /// Store rooted at `<user config dir>/devenv`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::NoConfigDir` if the platform has no config dir.
    pub fn new() -> Result<Self, ConfigError> {
        let base = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;
        Ok(Self::with_dir(base.join(APP_DIR)))
    }

    /// Store rooted at a specific directory.
    #[must_use]
    pub fn with_dir(dir: PathBuf) -> Self {
        Self { dir }
    }

    /// Directory holding the credential files.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn read(&self, name: &'static str) -> Result<String, ConfigError> {
        let path = self.dir.join(name);
        match fs::read_to_string(&path) {
            Ok(content) => Ok(content.trim().to_string()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(ConfigError::NotFound {
                name,
                dir: self.dir.clone(),
            }),
            Err(source) => Err(ConfigError::ReadError { path, source }),
        }
    }

    fn write(&self, name: &str, value: &str, private: bool) -> Result<(), ConfigError> {
        let path = self.dir.join(name);
        let write_err = |source| ConfigError::WriteError {
            path: path.clone(),
            source,
        };

        fs::create_dir_all(&self.dir).map_err(write_err)?;

        // Write to temp file first, then rename over the target.
        let temp_path = path.with_extension("tmp");
        fs::write(&temp_path, value).map_err(write_err)?;
        if private {
            restrict_permissions(&temp_path).map_err(write_err)?;
        }
        fs::rename(&temp_path, &path).map_err(write_err)?;

        tracing::debug!(path = %path.display(), "Wrote config value");
        Ok(())
    }
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o600))
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> std::io::Result<()> {
    Ok(())
}

impl ConfigStore for FileConfigStore {
    fn read_session(&self) -> Result<String, ConfigError> {
        self.read(SESSION_FILE)
    }

    fn write_session(&self, token: &str) -> Result<(), ConfigError> {
        self.write(SESSION_FILE, token, true)
    }

    fn read_url(&self) -> Result<String, ConfigError> {
        self.read(URL_FILE)
    }

    fn write_url(&self, url: &str) -> Result<(), ConfigError> {
        self.write(URL_FILE, url, false)
    }
}
