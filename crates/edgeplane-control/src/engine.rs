//! The contract between the control plane and a workflow runner.
//!
//! An engine instance handles one dispatch: `initialize` stages everything
//! the runner needs, `start` hands it over. The control plane never
//! retries; a failed step is reported and the POD is left for the
//! operator.

use async_trait::async_trait;
use edgeplane_catalog::{CatalogError, Pod, PodWorkflow};
use edgeplane_rules::RulesError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("workflow stanza {0} is not defined")]
    MissingWorkflow(String),

    #[error("staging failed: {0}")]
    Staging(String),

    #[error("asset fetch failed: {0}")]
    Fetch(String),

    #[error("runner request failed: {0}")]
    Runner(String),

    #[error("engine used before a successful initialize")]
    NotInitialized,

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    Rules(#[from] RulesError),
}

#[async_trait]
pub trait WorkflowEngine: Send + Sync {
    /// Stage the run described by `workflow`. Fail-stop: the first
    /// failed step aborts and leaves any partial workspace in place.
    async fn initialize(&mut self, pod: &Pod, workflow: &PodWorkflow) -> Result<(), EngineError>;

    /// Hand the staged run to the runner.
    async fn start(&mut self) -> Result<(), EngineError>;

    /// Bind to a run staged by an earlier engine, possibly in another
    /// process, so it can be cancelled. Returns false when unsupported.
    fn attach(&mut self, _pod: &Pod, _workflow: &PodWorkflow) -> bool {
        false
    }

    /// Best-effort request to stop the run. Never changes POD state.
    async fn cancel(&mut self);

    /// Whether the run this engine staged is still open.
    fn is_running(&self) -> bool;

    /// Concatenated runner logs for a past or current run.
    async fn logs(&self, pod: &Pod, workflow: &PodWorkflow) -> Result<Vec<u8>, EngineError>;
}

/// Creates one engine per dispatch.
pub trait EngineFactory: Send + Sync {
    fn engine(&self) -> Box<dyn WorkflowEngine>;
}
