//! Catalog-free commands. The pruner needs only the runner and the
//! workflow directories, so these never open the store and leave it free
//! for the `pod event` callbacks the DAGs send.

use std::sync::Arc;

use edgeplane_airflow::{AirflowClient, AirflowConfig, Pruner};
use tokio::sync::watch;
use tracing::{info, warn};

fn pruner(config: &AirflowConfig) -> anyhow::Result<Pruner> {
    let runner = AirflowClient::new(&config.url, config.timeout())?;
    Ok(Pruner::new(config.clone(), Arc::new(runner)))
}

/// One prune sweep.
pub async fn prune(config: &AirflowConfig) -> anyhow::Result<()> {
    let pruner = pruner(config)?;
    let report = pruner.sweep().await;
    for dag in &report.removed {
        println!("✓ Pruned {dag}");
    }
    if report.failures > 0 {
        anyhow::bail!("{} prune step(s) failed; see the log", report.failures);
    }
    Ok(())
}

/// Run the pruner on its interval until Ctrl-C.
pub async fn serve(config: &AirflowConfig) -> anyhow::Result<()> {
    info!(
        airflow = %config.url,
        dags = %config.dags_dir.display(),
        interval_secs = config.prune_interval_secs,
        "edgeplane controller starting"
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let pruner = pruner(config)?;
    let pruner_handle = tokio::spawn(async move {
        pruner.run(shutdown_rx).await;
    });

    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "could not listen for Ctrl-C; stopping");
    }
    info!("shutdown signal received");
    if shutdown_tx.send(true).is_err() {
        warn!("pruner already stopped before shutdown");
    }
    if let Err(e) = pruner_handle.await {
        warn!(error = %e, "pruner task failed");
    }

    info!("edgeplane controller stopped");
    Ok(())
}
