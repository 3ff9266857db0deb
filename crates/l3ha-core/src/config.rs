//! l3ha.toml configuration parser.
//!
//! Every field is optional; command-line flags and environment variables
//! override whatever the file says.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::ConfigError;
use crate::types::L3_AGENT_TYPE;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ToolConfig {
    #[serde(default)]
    pub control_plane: ControlPlaneConfig,
    #[serde(default)]
    pub migration: MigrationConfig,
    #[serde(default)]
    pub picker: PickerSection,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ControlPlaneConfig {
    /// Networking API endpoint, e.g. `https://network.example:9696/`.
    pub endpoint: Option<String>,
    pub token: Option<String>,
    /// Skip TLS certificate verification.
    pub insecure: Option<bool>,
    /// PEM bundle to trust in addition to the system roots.
    pub ca_cert: Option<PathBuf>,
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MigrationConfig {
    pub agent_type: Option<String>,
    pub drain_max_attempts: Option<u32>,
    pub drain_interval_ms: Option<u64>,
    pub drain_max_interval_ms: Option<u64>,
    /// How long `migrate` watches dead agents before moving routers.
    pub takeover_delay_secs: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PickerSection {
    pub cache_max_age_secs: Option<u64>,
}

impl ToolConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Agent type whose routers are managed.
    pub fn agent_type(&self) -> &str {
        self.migration.agent_type.as_deref().unwrap_or(L3_AGENT_TYPE)
    }
}
