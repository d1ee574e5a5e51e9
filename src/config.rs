//! Runtime configuration, read from a YAML file
//!
//! ```yaml
//! dispatcher:
//!   persistent: true
//!   empty_queue_sleep_ms: 2000
//! queue:
//!   spool_dir: /var/spool/intelgraph
//! document_service:
//!   host: localhost
//!   port: 8118
//!   timeout_ms: 30000
//! graph:
//!   db_path: /var/lib/intelgraph/graph.db
//! ```
//!
//! Every section and key is optional.

use crate::ingest::DispatcherSettings;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Errors loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub dispatcher: DispatcherConfig,
    pub queue: QueueConfig,
    pub document_service: DocumentServiceConfig,
    pub graph: GraphConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatcherConfig {
    pub persistent: bool,
    pub empty_queue_sleep_ms: u64,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            persistent: true,
            empty_queue_sleep_ms: 2000,
        }
    }
}

impl DispatcherConfig {
    pub fn settings(&self) -> DispatcherSettings {
        DispatcherSettings {
            persistent: self.persistent,
            empty_queue_sleep: Duration::from_millis(self.empty_queue_sleep_ms),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    pub spool_dir: PathBuf,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            spool_dir: data_dir().join("spool"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DocumentServiceConfig {
    pub host: String,
    pub port: u16,
    pub timeout_ms: u64,
}

impl Default for DocumentServiceConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 8118,
            timeout_ms: 30_000,
        }
    }
}

impl DocumentServiceConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphConfig {
    pub db_path: PathBuf,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            db_path: data_dir().join("graph.db"),
        }
    }
}

impl Config {
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        // An empty file parses as null
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(yaml)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_yaml(&yaml)
    }

    /// `config.yaml` in the user config dir, if it exists
    pub fn default_path() -> Option<PathBuf> {
        let path = dirs::config_dir()?.join("intelgraph").join("config.yaml");
        path.exists().then_some(path)
    }
}

/// ~/.local/share/intelgraph (or the platform equivalent)
pub fn data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| dirs::home_dir().unwrap_or_default().join(".local/share"))
        .join("intelgraph")
}
