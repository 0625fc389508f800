//! Blueprint inheritance.
//!
//! A Blueprint may name a `parent` Blueprint in its document. Lookups walk
//! the chain child-first, so a child's stanza shadows the parent's stanza
//! at the same path. Every walk tracks the UUIDs it has visited and fails
//! with [`RulesError::Cycle`] rather than looping.

use std::collections::{BTreeSet, HashMap, HashSet};

use edgeplane_catalog::{Blueprint, CatalogStore, Hardware};
use serde_json::Value;
use tracing::warn;
use uuid::Uuid;

use crate::error::{RulesError, RulesResult};
use crate::{hardware, schema};

/// Where parent Blueprints are looked up.
pub trait BlueprintSource {
    fn blueprint(&self, uuid: &Uuid) -> RulesResult<Option<Blueprint>>;
}

impl BlueprintSource for CatalogStore {
    fn blueprint(&self, uuid: &Uuid) -> RulesResult<Option<Blueprint>> {
        Ok(self.get_blueprint(uuid)?)
    }
}

impl BlueprintSource for HashMap<Uuid, Blueprint> {
    fn blueprint(&self, uuid: &Uuid) -> RulesResult<Option<Blueprint>> {
        Ok(self.get(uuid).cloned())
    }
}

/// The `parent` pointer of a Blueprint document, if any.
pub fn parent_of(blueprint: &Blueprint) -> RulesResult<Option<Uuid>> {
    match blueprint.yaml.get("parent") {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Uuid::parse_str(s.trim())
            .map(Some)
            .map_err(|_| RulesError::BadParent {
                blueprint: blueprint.uuid,
                parent: s.clone(),
            }),
        Some(other) => Err(RulesError::BadParent {
            blueprint: blueprint.uuid,
            parent: other.to_string(),
        }),
    }
}

/// Follow a `/`-separated path through nested mappings.
fn lookup<'v>(doc: &'v Value, path: &str) -> Option<&'v Value> {
    path.split('/')
        .filter(|segment| !segment.is_empty())
        .try_fold(doc, |node, segment| node.get(segment))
}

/// A Blueprint together with the source its ancestors come from.
pub struct BlueprintView<'s, S: ?Sized> {
    blueprint: Blueprint,
    source: &'s S,
}

impl<'s, S: BlueprintSource + ?Sized> BlueprintView<'s, S> {
    pub fn new(blueprint: Blueprint, source: &'s S) -> Self {
        Self { blueprint, source }
    }

    pub fn blueprint(&self) -> &Blueprint {
        &self.blueprint
    }

    /// The Blueprint followed by each ancestor, nearest first.
    ///
    /// A parent that no longer exists ends the chain.
    pub fn lineage(&self) -> RulesResult<Vec<Blueprint>> {
        let start = self.blueprint.uuid;
        let mut visited = HashSet::from([start]);
        let mut chain = vec![self.blueprint.clone()];

        while let Some(parent) = parent_of(&chain[chain.len() - 1])? {
            if !visited.insert(parent) {
                return Err(RulesError::Cycle {
                    start,
                    repeated: parent,
                });
            }
            match self.source.blueprint(&parent)? {
                Some(bp) => chain.push(bp),
                None => {
                    warn!(blueprint = %start, %parent, "parent blueprint not found");
                    break;
                }
            }
        }
        Ok(chain)
    }

    /// The nearest value at `path` satisfying `accept`.
    fn resolve(&self, path: &str, accept: fn(&Value) -> bool) -> RulesResult<Option<Value>> {
        Ok(self
            .lineage()?
            .iter()
            .find_map(|bp| lookup(&bp.yaml, path).filter(|v| accept(v)).cloned()))
    }

    /// The nearest mapping at `path`, e.g. `workflow/create`.
    pub fn object_stanza(&self, path: &str) -> RulesResult<Option<Value>> {
        self.resolve(path, Value::is_object)
    }

    /// The nearest list at `path`, e.g. `workflow/create/components`.
    pub fn array_stanza(&self, path: &str) -> RulesResult<Option<Vec<Value>>> {
        Ok(self.resolve(path, Value::is_array)?.and_then(|v| match v {
            Value::Array(items) => Some(items),
            _ => None,
        }))
    }

    /// Workflow names declared by the Blueprint or any ancestor.
    pub fn workflow_names(&self) -> RulesResult<BTreeSet<String>> {
        let mut names = BTreeSet::new();
        for bp in self.lineage()? {
            if let Some(Value::Object(workflows)) = bp.yaml.get("workflow") {
                names.extend(workflows.keys().cloned());
            }
        }
        Ok(names)
    }

    pub fn has_workflow(&self, name: &str) -> RulesResult<bool> {
        Ok(self.object_stanza(&format!("workflow/{name}"))?.is_some())
    }

    /// True when `ancestor` is this Blueprint or appears in its parent chain.
    pub fn is_child_of(&self, ancestor: &Uuid) -> RulesResult<bool> {
        Ok(self.lineage()?.iter().any(|bp| bp.uuid == *ancestor))
    }

    /// Evaluate the effective `hardware_profile` against an Edgesite's node hardware.
    pub fn check_hardware(&self, hardware: &[Hardware]) -> RulesResult<Vec<String>> {
        let rule = self.object_stanza("hardware_profile")?;
        Ok(hardware::check_hardware(rule.as_ref(), hardware))
    }

    /// Validate a payload against `workflow/<name>/input_schema`.
    pub fn validate_input(&self, workflow: &str, payload: &Value) -> RulesResult<Vec<String>> {
        let stanza = self.object_stanza(&format!("workflow/{workflow}/input_schema"))?;
        Ok(schema::validate_input(stanza.as_ref(), payload))
    }
}
