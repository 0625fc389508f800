//! edgeplane-rules — compatibility and validation for deployments.
//!
//! Answers two questions before anything is deployed:
//!
//! - does an Edgesite's hardware satisfy a Blueprint's `hardware_profile`
//!   rule tree ([`hardware`]), and
//! - does a workflow payload satisfy the workflow's `input_schema`
//!   ([`schema`]).
//!
//! Both checks return every violation they find as a message; an empty list
//! means the check passed. Stanzas are resolved through the Blueprint's
//! parent chain by [`BlueprintView`].

pub mod error;
pub mod hardware;
pub mod inherit;
pub mod net;
pub mod schema;

pub use error::{RulesError, RulesResult};
pub use hardware::{HardwareRule, check_hardware};
pub use inherit::{BlueprintSource, BlueprintView, parent_of};
pub use schema::{Schema, SchemaNode, validate_input};
