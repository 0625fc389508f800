//! Periodic removal of old DAG files and their workspaces.

use std::path::Path;
use std::sync::Arc;
use std::time::SystemTime;

use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::config::AirflowConfig;
use crate::runner::WorkflowRunner;

/// Outcome of one sweep.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PruneReport {
    /// DAG names whose files were removed.
    pub removed: Vec<String>,
    /// Steps that failed; the sweep carried on past each one.
    pub failures: usize,
}

pub struct Pruner {
    config: Arc<AirflowConfig>,
    runner: Arc<dyn WorkflowRunner>,
}

impl Pruner {
    pub fn new(config: AirflowConfig, runner: Arc<dyn WorkflowRunner>) -> Self {
        Self {
            config: Arc::new(config),
            runner,
        }
    }

    /// Prune everything older than the configured retention.
    pub async fn sweep(&self) -> PruneReport {
        let cutoff = SystemTime::now()
            .checked_sub(self.config.retention())
            .unwrap_or(SystemTime::UNIX_EPOCH);
        self.sweep_older_than(cutoff).await
    }

    /// Remove every DAG file last modified before `cutoff`, its workspace,
    /// and the runner's record of it.
    pub async fn sweep_older_than(&self, cutoff: SystemTime) -> PruneReport {
        let mut report = PruneReport::default();
        let dags = match stale_dags(&self.config.dags_dir, cutoff).await {
            Ok(dags) => dags,
            Err(e) => {
                warn!(dir = %self.config.dags_dir.display(), error = %e, "could not scan DAG directory");
                report.failures += 1;
                return report;
            }
        };

        for dag in dags {
            let file = self.config.dags_dir.join(format!("{dag}.py"));
            if let Err(e) = tokio::fs::remove_file(&file).await {
                warn!(%dag, error = %e, "could not remove DAG file");
                report.failures += 1;
                continue;
            }

            let workspace = self.config.workspace_root.join(&dag);
            match tokio::fs::remove_dir_all(&workspace).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    warn!(%dag, error = %e, "could not remove workflow directory");
                    report.failures += 1;
                }
            }

            if let Err(e) = self.runner.forget(&dag).await {
                warn!(%dag, error = %e, "runner could not forget DAG");
                report.failures += 1;
            }

            debug!(%dag, "DAG pruned");
            report.removed.push(dag);
        }

        info!(
            removed = report.removed.len(),
            failures = report.failures,
            "prune sweep finished"
        );
        report
    }

    /// Sweep every interval until `shutdown` changes.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!(
            interval_secs = self.config.prune_interval_secs,
            retention_hours = self.config.prune_after_hours,
            "workflow pruner started"
        );

        loop {
            tokio::select! {
                _ = tokio::time::sleep(self.config.prune_interval()) => {
                    self.sweep().await;
                }
                _ = shutdown.changed() => {
                    info!("workflow pruner shutting down");
                    break;
                }
            }
        }
    }
}

/// Names of `*.py` files in `dir` modified before `cutoff`, sorted.
async fn stale_dags(dir: &Path, cutoff: SystemTime) -> std::io::Result<Vec<String>> {
    let mut stale = Vec::new();
    let mut entries = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.extension().is_none_or(|ext| ext != "py") {
            continue;
        }
        let meta = entry.metadata().await?;
        if !meta.is_file() || meta.modified()? >= cutoff {
            continue;
        }
        if let Some(stem) = path.file_stem() {
            stale.push(stem.to_string_lossy().into_owned());
        }
    }
    stale.sort();
    Ok(stale)
}
