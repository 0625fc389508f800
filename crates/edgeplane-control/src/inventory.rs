//! Catalog administration: Blueprints, hardware, nodes, regions, Edgesites.
//!
//! Submissions are validated in full and every problem is reported
//! together. Changes that could break a live POD's view of the world
//! (Edgesite membership, deleting referenced records) are refused.

use std::collections::BTreeSet;

use edgeplane_catalog::*;
use edgeplane_rules::{BlueprintView, parent_of};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::info;
use uuid::Uuid;

use crate::error::{ControlError, ControlResult};
use crate::locks::LockRegistry;

/// Blueprint document schema versions this controller understands.
pub const SUPPORTED_BLUEPRINT_SCHEMAS: &[&str] = &["1.0.0"];

/// A Blueprint as submitted by an operator.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewBlueprint {
    /// Document schema version, e.g. `1.0.0`.
    #[serde(default)]
    pub blueprint: String,
    #[serde(default)]
    pub uuid: Option<Uuid>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub yaml: Value,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewHardware {
    #[serde(default)]
    pub uuid: Option<Uuid>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub yaml: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewNode {
    #[serde(default)]
    pub uuid: Option<Uuid>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub hardware: Uuid,
    #[serde(default)]
    pub yaml: Value,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewRegion {
    #[serde(default)]
    pub uuid: Option<Uuid>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub parent: Option<Uuid>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewEdgesite {
    #[serde(default)]
    pub uuid: Option<Uuid>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub nodes: BTreeSet<Uuid>,
    #[serde(default)]
    pub regions: BTreeSet<Uuid>,
}

/// Fields of an Edgesite that may change; `None` keeps the current value.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EdgesiteUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub nodes: Option<BTreeSet<Uuid>>,
    pub regions: Option<BTreeSet<Uuid>>,
}

pub struct Inventory {
    store: CatalogStore,
    edgesite_locks: LockRegistry,
    /// Serializes node membership checks across Edgesites.
    membership: Mutex<()>,
}

fn reject_if_any(violations: Vec<String>) -> ControlResult<()> {
    if violations.is_empty() {
        Ok(())
    } else {
        Err(ControlError::Invalid(violations))
    }
}

impl Inventory {
    /// `edgesite_locks` must be the registry the `PodManager` uses.
    pub fn new(store: CatalogStore, edgesite_locks: LockRegistry) -> Self {
        Self {
            store,
            edgesite_locks,
            membership: Mutex::new(()),
        }
    }

    // ── Blueprints ─────────────────────────────────────────────────

    pub async fn add_blueprint(&self, request: NewBlueprint) -> ControlResult<Blueprint> {
        let mut violations = Vec::new();
        if request.blueprint.is_empty() {
            violations.push("Missing schema version".to_string());
        } else if !SUPPORTED_BLUEPRINT_SCHEMAS.contains(&request.blueprint.as_str()) {
            violations.push(format!(
                "The schema version {} is not recognized by this software.",
                request.blueprint
            ));
        }
        if request.name.trim().is_empty() {
            violations.push("Missing name".to_string());
        }
        if request.version.is_empty() {
            violations.push("Missing version".to_string());
        } else if semver::Version::parse(&request.version).is_err() {
            violations.push(format!("Version {} is not a semantic version", request.version));
        }
        let yaml = match request.yaml {
            Value::Null => Value::Object(Default::default()),
            Value::Object(map) => Value::Object(map),
            _ => {
                violations.push("The yaml stanza must be a mapping".to_string());
                Value::Null
            }
        };
        reject_if_any(violations)?;

        let now = epoch_secs();
        let blueprint = Blueprint {
            uuid: request.uuid.unwrap_or_else(Uuid::new_v4),
            name: request.name,
            description: request.description,
            version: request.version,
            yaml,
            created_at: now,
            updated_at: now,
        };

        // The parent must exist, and the new chain must terminate.
        if let Some(parent) = parent_of(&blueprint)? {
            if self.store.get_blueprint(&parent)?.is_none() {
                return Err(ControlError::Invalid(vec![format!(
                    "Parent blueprint {parent} does not exist"
                )]));
            }
            BlueprintView::new(blueprint.clone(), &self.store).lineage()?;
        }

        self.store.insert_blueprint(&blueprint)?;
        info!(blueprint = %blueprint.uuid, name = %blueprint.name, version = %blueprint.version, "blueprint added");
        Ok(blueprint)
    }

    /// Only the description of a Blueprint may change after submission.
    pub fn update_blueprint_description(&self, uuid: Uuid, description: &str) -> ControlResult<Blueprint> {
        let mut blueprint = self
            .store
            .get_blueprint(&uuid)?
            .ok_or(ControlError::NotFound { kind: "blueprint", uuid })?;
        blueprint.description = description.to_string();
        blueprint.updated_at = epoch_secs();
        self.store.update_blueprint(&blueprint)?;
        Ok(blueprint)
    }

    pub fn delete_blueprint(&self, uuid: Uuid) -> ControlResult<()> {
        if let Some(pod) = self.store.pods_for_blueprint(&uuid)?.first() {
            return Err(ControlError::InUse {
                kind: "blueprint",
                uuid,
                by: format!("pod {}", pod.uuid),
            });
        }
        let children: Vec<_> = self
            .store
            .list_blueprints()?
            .into_iter()
            .filter(|bp| matches!(parent_of(bp), Ok(Some(parent)) if parent == uuid))
            .collect();
        if let Some(child) = children.first() {
            return Err(ControlError::InUse {
                kind: "blueprint",
                uuid,
                by: format!("child blueprint {}", child.uuid),
            });
        }
        if !self.store.delete_blueprint(&uuid)? {
            return Err(ControlError::NotFound { kind: "blueprint", uuid });
        }
        info!(blueprint = %uuid, "blueprint deleted");
        Ok(())
    }

    // ── Hardware, nodes, regions ───────────────────────────────────

    pub fn add_hardware(&self, request: NewHardware) -> ControlResult<Hardware> {
        if request.name.trim().is_empty() {
            return Err(ControlError::Invalid(vec!["Missing name".to_string()]));
        }
        let hardware = Hardware {
            uuid: request.uuid.unwrap_or_else(Uuid::new_v4),
            name: request.name,
            description: request.description,
            yaml: request.yaml,
            created_at: epoch_secs(),
        };
        self.store.insert_hardware(&hardware)?;
        info!(hardware = %hardware.uuid, name = %hardware.name, "hardware added");
        Ok(hardware)
    }

    pub fn delete_hardware(&self, uuid: Uuid) -> ControlResult<()> {
        if let Some(node) = self.store.list_nodes()?.into_iter().find(|n| n.hardware == uuid) {
            return Err(ControlError::InUse {
                kind: "hardware",
                uuid,
                by: format!("node {}", node.uuid),
            });
        }
        if !self.store.delete_hardware(&uuid)? {
            return Err(ControlError::NotFound { kind: "hardware", uuid });
        }
        Ok(())
    }

    pub fn add_node(&self, request: NewNode) -> ControlResult<Node> {
        let mut violations = Vec::new();
        if request.name.trim().is_empty() {
            violations.push("Missing name".to_string());
        }
        if self.store.get_hardware(&request.hardware)?.is_none() {
            violations.push(format!("Hardware {} does not exist", request.hardware));
        }
        reject_if_any(violations)?;

        let node = Node {
            uuid: request.uuid.unwrap_or_else(Uuid::new_v4),
            name: request.name,
            description: request.description,
            hardware: request.hardware,
            yaml: request.yaml,
            created_at: epoch_secs(),
        };
        self.store.insert_node(&node)?;
        info!(node = %node.uuid, hardware = %node.hardware, "node added");
        Ok(node)
    }

    pub async fn delete_node(&self, uuid: Uuid) -> ControlResult<()> {
        let _membership = self.membership.lock().await;
        if let Some(site) = self.store.edgesite_for_node(&uuid)? {
            return Err(ControlError::InUse {
                kind: "node",
                uuid,
                by: format!("edgesite {}", site.uuid),
            });
        }
        if !self.store.delete_node(&uuid)? {
            return Err(ControlError::NotFound { kind: "node", uuid });
        }
        Ok(())
    }

    pub fn add_region(&self, request: NewRegion) -> ControlResult<Region> {
        let mut violations = Vec::new();
        if request.name.trim().is_empty() {
            violations.push("Missing name".to_string());
        }
        let parent = request.parent.unwrap_or(UNIVERSAL_REGION);
        if parent != UNIVERSAL_REGION && self.store.get_region(&parent)?.is_none() {
            violations.push(format!("Parent region {parent} does not exist"));
        }
        reject_if_any(violations)?;

        let region = Region {
            uuid: request.uuid.unwrap_or_else(Uuid::new_v4),
            name: request.name,
            description: request.description,
            parent,
            created_at: epoch_secs(),
        };
        self.store.insert_region(&region)?;
        info!(region = %region.uuid, %parent, "region added");
        Ok(region)
    }

    pub fn delete_region(&self, uuid: Uuid) -> ControlResult<()> {
        if let Some(child) = self.store.list_regions()?.into_iter().find(|r| r.parent == uuid) {
            return Err(ControlError::InUse {
                kind: "region",
                uuid,
                by: format!("region {}", child.uuid),
            });
        }
        if let Some(site) = self
            .store
            .list_edgesites()?
            .into_iter()
            .find(|s| s.regions.contains(&uuid))
        {
            return Err(ControlError::InUse {
                kind: "region",
                uuid,
                by: format!("edgesite {}", site.uuid),
            });
        }
        if !self.store.delete_region(&uuid)? {
            return Err(ControlError::NotFound { kind: "region", uuid });
        }
        Ok(())
    }

    // ── Edgesites ──────────────────────────────────────────────────

    /// Problems with a proposed node/region membership for `site`.
    fn membership_violations(
        &self,
        site: Uuid,
        nodes: &BTreeSet<Uuid>,
        regions: &BTreeSet<Uuid>,
    ) -> ControlResult<Vec<String>> {
        let mut violations = Vec::new();
        if nodes.is_empty() {
            violations.push("An edgesite requires at least one node".to_string());
        }
        for node in nodes {
            if self.store.get_node(node)?.is_none() {
                violations.push(format!("Node {node} does not exist"));
            } else if let Some(owner) = self.store.edgesite_for_node(node)? {
                if owner.uuid != site {
                    violations.push(format!("Node {node} already belongs to edgesite {}", owner.uuid));
                }
            }
        }
        if regions.is_empty() {
            violations.push("An edgesite requires at least one region".to_string());
        }
        for region in regions {
            if *region != UNIVERSAL_REGION && self.store.get_region(region)?.is_none() {
                violations.push(format!("Region {region} does not exist"));
            }
        }
        Ok(violations)
    }

    fn live_pod_on(&self, site: Uuid) -> ControlResult<Option<Pod>> {
        Ok(self
            .store
            .pods_for_edgesite(&site)?
            .into_iter()
            .find(Pod::is_alive))
    }

    pub async fn add_edgesite(&self, request: NewEdgesite) -> ControlResult<Edgesite> {
        let uuid = request.uuid.unwrap_or_else(Uuid::new_v4);
        let _membership = self.membership.lock().await;

        let mut violations = Vec::new();
        if request.name.trim().is_empty() {
            violations.push("Missing name".to_string());
        }
        violations.extend(self.membership_violations(uuid, &request.nodes, &request.regions)?);
        reject_if_any(violations)?;

        let now = epoch_secs();
        let site = Edgesite {
            uuid,
            name: request.name,
            description: request.description,
            nodes: request.nodes,
            regions: request.regions,
            created_at: now,
            updated_at: now,
        };
        self.store.insert_edgesite(&site)?;
        info!(edgesite = %site.uuid, nodes = site.nodes.len(), "edgesite added");
        Ok(site)
    }

    /// Change an Edgesite that no live POD holds.
    pub async fn update_edgesite(&self, uuid: Uuid, update: EdgesiteUpdate) -> ControlResult<Edgesite> {
        let _site = self.edgesite_locks.lock(uuid).await;
        let _membership = self.membership.lock().await;

        let mut site = self
            .store
            .get_edgesite(&uuid)?
            .ok_or(ControlError::NotFound { kind: "edgesite", uuid })?;
        if let Some(pod) = self.live_pod_on(uuid)? {
            return Err(ControlError::EdgesiteInUse { edgesite: uuid, pod: pod.uuid });
        }

        if let Some(name) = update.name {
            site.name = name;
        }
        if let Some(description) = update.description {
            site.description = description;
        }
        if let Some(nodes) = update.nodes {
            site.nodes = nodes;
        }
        if let Some(regions) = update.regions {
            site.regions = regions;
        }

        let mut violations = Vec::new();
        if site.name.trim().is_empty() {
            violations.push("Missing name".to_string());
        }
        violations.extend(self.membership_violations(uuid, &site.nodes, &site.regions)?);
        reject_if_any(violations)?;

        site.updated_at = epoch_secs();
        self.store.update_edgesite(&site)?;
        info!(edgesite = %uuid, "edgesite updated");
        Ok(site)
    }

    pub async fn delete_edgesite(&self, uuid: Uuid) -> ControlResult<()> {
        let _site = self.edgesite_locks.lock(uuid).await;
        if let Some(pod) = self.live_pod_on(uuid)? {
            return Err(ControlError::EdgesiteInUse { edgesite: uuid, pod: pod.uuid });
        }
        if !self.store.delete_edgesite(&uuid)? {
            return Err(ControlError::NotFound { kind: "edgesite", uuid });
        }
        info!(edgesite = %uuid, "edgesite deleted");
        Ok(())
    }
}
