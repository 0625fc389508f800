//! redb table definitions for the catalog store.
//!
//! Every table maps `&str` keys to JSON-serialized records. Catalog entities
//! are keyed by their UUID; POD children use `{pod_uuid}:...` composite keys
//! so a prefix scan returns one POD's history.

use redb::TableDefinition;

/// JSON records keyed by string.
pub type JsonTable = TableDefinition<'static, &'static str, &'static [u8]>;

/// Blueprints keyed by `{uuid}`.
pub const BLUEPRINTS: JsonTable = TableDefinition::new("blueprints");

/// Edgesites keyed by `{uuid}`.
pub const EDGESITES: JsonTable = TableDefinition::new("edgesites");

/// Hardware profiles keyed by `{uuid}`.
pub const HARDWARE: JsonTable = TableDefinition::new("hardware");

/// Nodes keyed by `{uuid}`.
pub const NODES: JsonTable = TableDefinition::new("nodes");

/// Regions keyed by `{uuid}`.
pub const REGIONS: JsonTable = TableDefinition::new("regions");

/// PODs keyed by `{uuid}`.
pub const PODS: JsonTable = TableDefinition::new("pods");

/// Workflow runs keyed by `{pod_uuid}:{name}:{index:010}`.
pub const POD_WORKFLOWS: JsonTable = TableDefinition::new("pod_workflows");

/// Events keyed by `{pod_uuid}:{seq:020}`.
pub const POD_EVENTS: JsonTable = TableDefinition::new("pod_events");
