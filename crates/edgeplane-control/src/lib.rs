//! edgeplane-control — the deployment control plane.
//!
//! Owns the POD lifecycle: admission of new deployments against Edgesite
//! availability, hardware compatibility and workflow input; dispatch of
//! workflows through a [`WorkflowEngine`]; and the state machine driven by
//! runner status events.
//!
//! # Architecture
//!
//! ```text
//!   Inventory ──────────┐
//!                       ▼
//!   PodManager ──► CatalogStore (redb)
//!       │   ▲
//!       │   └── record_event(STATUS: <state>)  ◄── runner callbacks
//!       ▼
//!   EngineFactory ──► WorkflowEngine (one per dispatch)
//! ```

pub mod engine;
pub mod error;
pub mod inventory;
pub mod locks;
pub mod pods;
pub mod transitions;

pub use engine::{EngineError, EngineFactory, WorkflowEngine};
pub use error::{ControlError, ControlResult, ErrorKind};
pub use inventory::{EdgesiteUpdate, Inventory, NewBlueprint, NewEdgesite, NewHardware, NewNode, NewRegion};
pub use locks::LockRegistry;
pub use pods::{CreateOutcome, DeleteOutcome, NewPod, PodDetails, PodManager, parse_event_time};
