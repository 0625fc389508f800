//! Airflow dispatch configuration.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Where the runner lives and where its shared directories are mounted.
///
/// Every field has a default, so an empty `[airflow]` table is valid.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AirflowConfig {
    /// Base URL of the Airflow webserver.
    pub url: String,
    /// Directory holding one workspace per workflow run.
    pub workspace_root: PathBuf,
    /// Directory the Airflow scheduler watches for DAG files.
    pub dags_dir: PathBuf,
    /// Directory Airflow writes task logs into.
    pub logs_dir: PathBuf,
    /// Base URL generated DAGs post POD events back to.
    pub callback_url: String,
    /// Timeout for every outbound HTTP request.
    pub timeout_secs: u64,
    /// Age after which a DAG and its workspace are pruned.
    pub prune_after_hours: u64,
    pub prune_interval_secs: u64,
}

impl Default for AirflowConfig {
    fn default() -> Self {
        Self {
            url: "http://arc-airflow-webserver:8080".to_string(),
            workspace_root: PathBuf::from("/workflow"),
            dags_dir: PathBuf::from("/dags"),
            logs_dir: PathBuf::from("/var/log/airflow"),
            callback_url: "http://arc-api:8080".to_string(),
            timeout_secs: 30,
            prune_after_hours: 168,
            prune_interval_secs: 3600,
        }
    }
}

impl AirflowConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn retention(&self) -> Duration {
        Duration::from_secs(self.prune_after_hours.saturating_mul(3600))
    }

    /// Time between prune sweeps, never shorter than one second.
    pub fn prune_interval(&self) -> Duration {
        Duration::from_secs(self.prune_interval_secs.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_table_keeps_defaults() {
        let config: AirflowConfig = toml::from_str("url = \"http://airflow:9090\"\n").unwrap();
        assert_eq!(config.url, "http://airflow:9090");
        assert_eq!(config.dags_dir, PathBuf::from("/dags"));
        assert_eq!(config.retention(), Duration::from_secs(168 * 3600));
    }

    #[test]
    fn extreme_prune_settings_are_bounded() {
        let config = AirflowConfig {
            prune_after_hours: u64::MAX,
            prune_interval_secs: 0,
            ..Default::default()
        };
        assert_eq!(config.retention(), Duration::from_secs(u64::MAX));
        assert_eq!(config.prune_interval(), Duration::from_secs(1));
    }
}
