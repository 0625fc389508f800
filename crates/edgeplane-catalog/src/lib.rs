//! edgeplane-catalog — the edge catalog and its embedded store.
//!
//! Backed by [redb](https://docs.rs/redb), holds blueprints, hardware
//! profiles, nodes, regions, edgesites, and the PODs deployed onto them
//! together with their workflow runs and event logs.
//!
//! # Architecture
//!
//! ```text
//!   Blueprint ──┐
//!               ├── Pod ──┬── PodWorkflow  {pod}:{name}:{index}
//!   Edgesite ───┘         └── PodEvent     {pod}:{seq}
//!     ├── Node ── Hardware
//!     └── Region ── Region (parent)
//! ```
//!
//! The `CatalogStore` is `Clone` + `Send` + `Sync` (backed by `Arc<Database>`)
//! and is handed explicitly to every component that needs it.

pub mod error;
pub mod store;
pub mod tables;
pub mod types;

pub use error::{CatalogError, CatalogResult};
pub use store::CatalogStore;
pub use types::*;
