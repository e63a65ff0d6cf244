//! Remote API types.

use serde::{Deserialize, Serialize};

/// Container state of an environment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ContainerStatus {
    On,
    Off,
    Creating,
    Erased,
    #[default]
    #[serde(other)]
    Unknown,
}

/// Latest status snapshot of an environment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentStat {
    #[serde(default)]
    pub container_status: ContainerStatus,
}

/// A remote development environment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Environment {
    /// Environment identifier.
    pub id: String,
    /// User-chosen name, unique per user.
    pub name: String,
    #[serde(default)]
    pub latest_stat: EnvironmentStat,
}

impl Environment {
    /// Returns true if the container is running.
    #[must_use]
    pub fn is_on(&self) -> bool {
        self.latest_stat.container_status == ContainerStatus::On
    }
}
