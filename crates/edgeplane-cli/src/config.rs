//! Controller configuration (`edgeplane.toml`).
//!
//! ```toml
//! [store]
//! path = "/var/lib/edgeplane/edgeplane.redb"
//!
//! [airflow]
//! url = "http://arc-airflow-webserver:8080"
//! dags_dir = "/dags"
//! prune_after_hours = 168
//! ```

use std::path::{Path, PathBuf};

use edgeplane_airflow::AirflowConfig;
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ControllerConfig {
    pub store: StoreConfig,
    pub airflow: AirflowConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StoreConfig {
    /// redb database file.
    pub path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("/var/lib/edgeplane/edgeplane.redb"),
        }
    }
}

impl ControllerConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: ControllerConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Read `path` if it exists, otherwise fall back to defaults.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            Self::from_file(path)
        } else {
            debug!(path = %path.display(), "no config file; using defaults");
            Ok(Self::default())
        }
    }

    /// Keep the database under `dir` instead of the configured path.
    pub fn with_data_dir(mut self, dir: &Path) -> Self {
        self.store.path = dir.join("edgeplane.redb");
        self
    }

    pub fn to_toml_string(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }
}
