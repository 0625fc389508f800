//! edgeplane-airflow — workflow dispatch through Apache Airflow.
//!
//! [`AirflowEngineFactory`] plugs into the control plane's
//! `EngineFactory` seam. Each dispatch stages a workspace (entry script,
//! components, `POD.py`, `POD.sh`, `INPUT.yaml`), drops a generated DAG
//! into the scheduler's watched directory, then unpauses and triggers it.
//! The DAG reports completion back as a `STATUS` POD event.
//!
//! # Architecture
//!
//! ```text
//!   PodManager ──► AirflowEngine ──► AssetFetcher ──► <workspace_root>/<run>/
//!                       │
//!                       ├──► template ──► <dags_dir>/<run>.py
//!                       └──► WorkflowRunner (AirflowClient) ──► Airflow webserver
//!
//!   Pruner ──► <dags_dir>, <workspace_root>, WorkflowRunner::forget
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod fetch;
pub mod pruner;
pub mod runner;
pub mod template;

pub use config::AirflowConfig;
pub use engine::{AirflowEngine, AirflowEngineFactory};
pub use error::{FetchError, RunnerError};
pub use fetch::AssetFetcher;
pub use pruner::{PruneReport, Pruner};
pub use runner::{AirflowClient, WorkflowRunner};
pub use template::ScriptKind;
