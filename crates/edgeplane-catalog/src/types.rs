//! Catalog records persisted by the store.
//!
//! Document-bearing records (`Blueprint`, `Hardware`, `Node`, `Pod`,
//! `PodWorkflow`) keep their YAML content as a parsed `serde_json::Value`
//! tree so the rules engine can walk it without re-parsing.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Region every other region descends from.
pub const UNIVERSAL_REGION: Uuid = Uuid::nil();

/// Edgesite reference held by a POD once it has been retired to ZOMBIE.
pub const NO_EDGESITE: Uuid = Uuid::nil();

/// Current Unix time in seconds.
pub fn epoch_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

// ── Blueprint ──────────────────────────────────────────────────────

/// A deployable software stack definition.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Blueprint {
    pub uuid: Uuid,
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Semantic version of the stack.
    pub version: String,
    /// The submitted document: `parent`, `hardware_profile`, `workflow`, ...
    pub yaml: Value,
    pub created_at: u64,
    pub updated_at: u64,
}

// ── Inventory ──────────────────────────────────────────────────────

/// A named hardware profile that nodes reference.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Hardware {
    pub uuid: Uuid,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub yaml: Value,
    pub created_at: u64,
}

/// A physical machine. Edgesite membership is derived, not stored here.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Node {
    pub uuid: Uuid,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub hardware: Uuid,
    #[serde(default)]
    pub yaml: Value,
    pub created_at: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Region {
    pub uuid: Uuid,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub parent: Uuid,
    pub created_at: u64,
}

/// A deployment target: a group of nodes tagged with regions.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Edgesite {
    pub uuid: Uuid,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub nodes: BTreeSet<Uuid>,
    pub regions: BTreeSet<Uuid>,
    pub created_at: u64,
    pub updated_at: u64,
}

// ── POD ────────────────────────────────────────────────────────────

/// Lifecycle state of a POD.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum PodState {
    New,
    Workflow,
    Active,
    Failed,
    Dead,
    Zombie,
}

impl PodState {
    pub const ALL: [PodState; 6] = [
        PodState::New,
        PodState::Workflow,
        PodState::Active,
        PodState::Failed,
        PodState::Dead,
        PodState::Zombie,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            PodState::New => "NEW",
            PodState::Workflow => "WORKFLOW",
            PodState::Active => "ACTIVE",
            PodState::Failed => "FAILED",
            PodState::Dead => "DEAD",
            PodState::Zombie => "ZOMBIE",
        }
    }
}

impl fmt::Display for PodState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a state name is not one of the six POD states.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownState(pub String);

impl fmt::Display for UnknownState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown POD state: {}", self.0)
    }
}

impl std::error::Error for UnknownState {}

impl FromStr for PodState {
    type Err = UnknownState;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PodState::ALL
            .into_iter()
            .find(|state| state.as_str() == s)
            .ok_or_else(|| UnknownState(s.to_string()))
    }
}

/// A deployment of one Blueprint onto one Edgesite.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Pod {
    pub uuid: Uuid,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub blueprint: Uuid,
    pub edgesite: Uuid,
    pub state: PodState,
    /// Latest workflow input.
    #[serde(default)]
    pub yaml: Value,
    pub created_at: u64,
    pub updated_at: u64,
}

impl Pod {
    /// A POD is alive until it reaches DEAD or ZOMBIE.
    pub fn is_alive(&self) -> bool {
        !matches!(self.state, PodState::Dead | PodState::Zombie)
    }

    pub fn is_workflow_running(&self) -> bool {
        self.state == PodState::Workflow
    }
}

/// One execution of a named workflow against a POD.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PodWorkflow {
    pub pod: Uuid,
    pub name: String,
    /// Per-(POD, name) sequence number, starting at 0.
    pub index: u32,
    #[serde(default)]
    pub yaml: Value,
    pub started_at: u64,
    pub ended_at: Option<u64>,
}

impl PodWorkflow {
    pub fn is_running(&self) -> bool {
        self.ended_at.is_none()
    }

    /// Name shared by the run's workspace directory and its DAG.
    pub fn run_name(&self) -> String {
        format!("{}-{}-{}", self.name, self.index, self.pod)
    }

    pub(crate) fn table_key(&self) -> String {
        format!("{}:{}:{:010}", self.pod, self.name, self.index)
    }
}

/// Severity of a POD event. `Status` events double as state change commands.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum EventLevel {
    Debug,
    Info,
    Warn,
    Error,
    Status,
}

impl fmt::Display for EventLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            EventLevel::Debug => "DEBUG",
            EventLevel::Info => "INFO",
            EventLevel::Warn => "WARN",
            EventLevel::Error => "ERROR",
            EventLevel::Status => "STATUS",
        })
    }
}

impl FromStr for EventLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "DEBUG" => Ok(EventLevel::Debug),
            "INFO" => Ok(EventLevel::Info),
            "WARN" | "WARNING" => Ok(EventLevel::Warn),
            "ERROR" => Ok(EventLevel::Error),
            "STATUS" => Ok(EventLevel::Status),
            other => Err(format!("unknown event level: {other}")),
        }
    }
}

/// Append-only audit record attached to a POD.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PodEvent {
    pub pod: Uuid,
    /// Unix timestamp (seconds).
    pub time: u64,
    pub level: EventLevel,
    pub message: String,
}

impl PodEvent {
    pub fn now(pod: Uuid, level: EventLevel, message: impl Into<String>) -> Self {
        Self {
            pod,
            time: epoch_secs(),
            level,
            message: message.into(),
        }
    }
}
