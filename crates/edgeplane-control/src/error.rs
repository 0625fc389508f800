//! Control-plane error types.

use edgeplane_catalog::CatalogError;
use edgeplane_rules::RulesError;
use thiserror::Error;
use uuid::Uuid;

use crate::engine::EngineError;

pub type ControlResult<T> = Result<T, ControlError>;

/// Broad class of a failure, for callers that map errors onto a protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The request itself is wrong.
    Malformed,
    /// The request is well formed but current state forbids it.
    Policy,
    /// A referenced record does not exist.
    Missing,
    /// An external collaborator (asset host, runner) failed.
    External,
    Internal,
}

#[derive(Debug, Error)]
pub enum ControlError {
    #[error("invalid request: {}", .0.join("; "))]
    Invalid(Vec<String>),

    #[error("{kind} not found: {uuid}")]
    NotFound { kind: &'static str, uuid: Uuid },

    #[error("edgesite {edgesite} is in use by pod {pod}")]
    EdgesiteInUse { edgesite: Uuid, pod: Uuid },

    #[error("the edgesite {edgesite} is not hardware compatible with the blueprint {blueprint}: {}", .violations.join("; "))]
    Incompatible {
        edgesite: Uuid,
        blueprint: Uuid,
        violations: Vec<String>,
    },

    #[error("pod {0} is not alive")]
    NotAlive(Uuid),

    #[error("pod {0} already has a workflow running")]
    WorkflowRunning(Uuid),

    #[error("blueprint {blueprint} does not define workflow {workflow}")]
    NoSuchWorkflow { blueprint: Uuid, workflow: String },

    #[error("blueprint {target} is not a descendant of blueprint {current}")]
    NotDescendant { current: Uuid, target: Uuid },

    #[error("{kind} {uuid} is still referenced by {by}")]
    InUse {
        kind: &'static str,
        uuid: Uuid,
        by: String,
    },

    #[error("workflow {workflow} for pod {pod} failed: {source}")]
    Dispatch {
        pod: Uuid,
        workflow: String,
        #[source]
        source: EngineError,
    },

    #[error("catalog error: {0}")]
    Catalog(#[from] CatalogError),

    #[error("rules error: {0}")]
    Rules(#[from] RulesError),
}

impl ControlError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ControlError::Invalid(_) => ErrorKind::Malformed,
            ControlError::NotFound { .. } => ErrorKind::Missing,
            ControlError::EdgesiteInUse { .. }
            | ControlError::Incompatible { .. }
            | ControlError::NotAlive(_)
            | ControlError::WorkflowRunning(_)
            | ControlError::NoSuchWorkflow { .. }
            | ControlError::NotDescendant { .. }
            | ControlError::InUse { .. } => ErrorKind::Policy,
            ControlError::Dispatch { .. } => ErrorKind::External,
            ControlError::Catalog(CatalogError::AlreadyExists { .. }) => ErrorKind::Policy,
            ControlError::Rules(RulesError::Cycle { .. } | RulesError::BadParent { .. }) => {
                ErrorKind::Policy
            }
            ControlError::Catalog(_) | ControlError::Rules(_) => ErrorKind::Internal,
        }
    }
}
