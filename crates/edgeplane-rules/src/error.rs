use edgeplane_catalog::CatalogError;
use thiserror::Error;
use uuid::Uuid;

pub type RulesResult<T> = Result<T, RulesError>;

/// Failures that prevent a check from running at all.
///
/// Rule and schema problems inside a document are not errors: they are
/// reported as violations alongside the payload's own problems.
#[derive(Debug, Error)]
pub enum RulesError {
    #[error("blueprint parent chain of {start} loops back to {repeated}")]
    Cycle { start: Uuid, repeated: Uuid },

    #[error("blueprint {blueprint} has an invalid parent reference: {parent}")]
    BadParent { blueprint: Uuid, parent: String },

    #[error(transparent)]
    Catalog(#[from] CatalogError),
}
