//! CatalogStore — redb-backed persistence for the edge catalog.
//!
//! Provides typed CRUD over blueprints, inventory, PODs, workflow runs and
//! events. All values are JSON-serialized into redb's `&[u8]` value columns.
//! Operations that must be atomic (workflow index assignment, closing open
//! runs, event sequencing) happen inside a single write transaction; redb
//! serializes writers, so read-modify-write inside one is race free.

use std::path::Path;
use std::sync::Arc;

use redb::{Database, ReadableDatabase, ReadableTable};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

use crate::error::{CatalogError, CatalogResult};
use crate::tables::*;
use crate::types::*;

/// Convert any `Display` error into a `CatalogError` variant via a closure factory.
macro_rules! map_err {
    ($variant:ident) => {
        |e| CatalogError::$variant(e.to_string())
    };
}

/// Thread-safe catalog store backed by redb.
#[derive(Clone)]
pub struct CatalogStore {
    db: Arc<Database>,
}

impl CatalogStore {
    /// Open (or create) a persistent catalog at the given path.
    pub fn open(path: &Path) -> CatalogResult<Self> {
        let db = Database::create(path).map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!(?path, "catalog store opened");
        Ok(store)
    }

    /// Create an ephemeral in-memory catalog (for testing).
    pub fn open_in_memory() -> CatalogResult<Self> {
        let backend = redb::backends::InMemoryBackend::new();
        let db = Database::builder()
            .create_with_backend(backend)
            .map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!("in-memory catalog store opened");
        Ok(store)
    }

    fn ensure_tables(&self) -> CatalogResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        for table in [
            BLUEPRINTS,
            EDGESITES,
            HARDWARE,
            NODES,
            REGIONS,
            PODS,
            POD_WORKFLOWS,
            POD_EVENTS,
        ] {
            txn.open_table(table).map_err(map_err!(Table))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    // ── Generic record access ──────────────────────────────────────

    fn insert_new<T: Serialize>(
        &self,
        table: JsonTable,
        kind: &'static str,
        key: &str,
        record: &T,
    ) -> CatalogResult<()> {
        let value = serde_json::to_vec(record).map_err(map_err!(Serialize))?;
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut t = txn.open_table(table).map_err(map_err!(Table))?;
            if t.get(key).map_err(map_err!(Read))?.is_some() {
                return Err(CatalogError::AlreadyExists {
                    kind,
                    key: key.to_string(),
                });
            }
            t.insert(key, value.as_slice()).map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(kind, %key, "record created");
        Ok(())
    }

    fn replace<T: Serialize>(
        &self,
        table: JsonTable,
        kind: &'static str,
        key: &str,
        record: &T,
    ) -> CatalogResult<()> {
        let value = serde_json::to_vec(record).map_err(map_err!(Serialize))?;
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut t = txn.open_table(table).map_err(map_err!(Table))?;
            if t.get(key).map_err(map_err!(Read))?.is_none() {
                return Err(CatalogError::NotFound {
                    kind,
                    key: key.to_string(),
                });
            }
            t.insert(key, value.as_slice()).map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(kind, %key, "record updated");
        Ok(())
    }

    fn fetch<T: DeserializeOwned>(&self, table: JsonTable, key: &str) -> CatalogResult<Option<T>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let t = txn.open_table(table).map_err(map_err!(Table))?;
        match t.get(key).map_err(map_err!(Read))? {
            Some(guard) => {
                let record = serde_json::from_slice(guard.value()).map_err(map_err!(Deserialize))?;
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }

    /// Scan a table, keeping entries whose key starts with `prefix`.
    fn scan<T: DeserializeOwned>(&self, table: JsonTable, prefix: &str) -> CatalogResult<Vec<T>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let t = txn.open_table(table).map_err(map_err!(Table))?;
        let mut results = Vec::new();
        for entry in t.iter().map_err(map_err!(Read))? {
            let (key, value) = entry.map_err(map_err!(Read))?;
            if key.value().starts_with(prefix) {
                let record = serde_json::from_slice(value.value()).map_err(map_err!(Deserialize))?;
                results.push(record);
            }
        }
        Ok(results)
    }

    fn remove(&self, table: JsonTable, kind: &'static str, key: &str) -> CatalogResult<bool> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let existed;
        {
            let mut t = txn.open_table(table).map_err(map_err!(Table))?;
            existed = t.remove(key).map_err(map_err!(Write))?.is_some();
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(kind, %key, existed, "record deleted");
        Ok(existed)
    }

    // ── Blueprints ─────────────────────────────────────────────────

    /// Insert a new blueprint. Fails if the UUID is taken.
    pub fn insert_blueprint(&self, blueprint: &Blueprint) -> CatalogResult<()> {
        self.insert_new(BLUEPRINTS, "blueprint", &blueprint.uuid.to_string(), blueprint)
    }

    pub fn update_blueprint(&self, blueprint: &Blueprint) -> CatalogResult<()> {
        self.replace(BLUEPRINTS, "blueprint", &blueprint.uuid.to_string(), blueprint)
    }

    pub fn get_blueprint(&self, uuid: &Uuid) -> CatalogResult<Option<Blueprint>> {
        self.fetch(BLUEPRINTS, &uuid.to_string())
    }

    pub fn list_blueprints(&self) -> CatalogResult<Vec<Blueprint>> {
        self.scan(BLUEPRINTS, "")
    }

    pub fn delete_blueprint(&self, uuid: &Uuid) -> CatalogResult<bool> {
        self.remove(BLUEPRINTS, "blueprint", &uuid.to_string())
    }

    // ── Hardware ───────────────────────────────────────────────────

    pub fn insert_hardware(&self, hardware: &Hardware) -> CatalogResult<()> {
        self.insert_new(HARDWARE, "hardware", &hardware.uuid.to_string(), hardware)
    }

    pub fn get_hardware(&self, uuid: &Uuid) -> CatalogResult<Option<Hardware>> {
        self.fetch(HARDWARE, &uuid.to_string())
    }

    pub fn list_hardware(&self) -> CatalogResult<Vec<Hardware>> {
        self.scan(HARDWARE, "")
    }

    pub fn delete_hardware(&self, uuid: &Uuid) -> CatalogResult<bool> {
        self.remove(HARDWARE, "hardware", &uuid.to_string())
    }

    // ── Nodes ──────────────────────────────────────────────────────

    pub fn insert_node(&self, node: &Node) -> CatalogResult<()> {
        self.insert_new(NODES, "node", &node.uuid.to_string(), node)
    }

    pub fn get_node(&self, uuid: &Uuid) -> CatalogResult<Option<Node>> {
        self.fetch(NODES, &uuid.to_string())
    }

    pub fn list_nodes(&self) -> CatalogResult<Vec<Node>> {
        self.scan(NODES, "")
    }

    pub fn delete_node(&self, uuid: &Uuid) -> CatalogResult<bool> {
        self.remove(NODES, "node", &uuid.to_string())
    }

    // ── Regions ────────────────────────────────────────────────────

    pub fn insert_region(&self, region: &Region) -> CatalogResult<()> {
        self.insert_new(REGIONS, "region", &region.uuid.to_string(), region)
    }

    pub fn get_region(&self, uuid: &Uuid) -> CatalogResult<Option<Region>> {
        self.fetch(REGIONS, &uuid.to_string())
    }

    pub fn list_regions(&self) -> CatalogResult<Vec<Region>> {
        self.scan(REGIONS, "")
    }

    pub fn delete_region(&self, uuid: &Uuid) -> CatalogResult<bool> {
        self.remove(REGIONS, "region", &uuid.to_string())
    }

    // ── Edgesites ──────────────────────────────────────────────────

    pub fn insert_edgesite(&self, edgesite: &Edgesite) -> CatalogResult<()> {
        self.insert_new(EDGESITES, "edgesite", &edgesite.uuid.to_string(), edgesite)
    }

    pub fn update_edgesite(&self, edgesite: &Edgesite) -> CatalogResult<()> {
        self.replace(EDGESITES, "edgesite", &edgesite.uuid.to_string(), edgesite)
    }

    pub fn get_edgesite(&self, uuid: &Uuid) -> CatalogResult<Option<Edgesite>> {
        self.fetch(EDGESITES, &uuid.to_string())
    }

    pub fn list_edgesites(&self) -> CatalogResult<Vec<Edgesite>> {
        self.scan(EDGESITES, "")
    }

    pub fn delete_edgesite(&self, uuid: &Uuid) -> CatalogResult<bool> {
        self.remove(EDGESITES, "edgesite", &uuid.to_string())
    }

    /// The edgesite a node belongs to, if any.
    pub fn edgesite_for_node(&self, node: &Uuid) -> CatalogResult<Option<Edgesite>> {
        Ok(self
            .list_edgesites()?
            .into_iter()
            .find(|site| site.nodes.contains(node)))
    }

    // ── PODs ───────────────────────────────────────────────────────

    pub fn insert_pod(&self, pod: &Pod) -> CatalogResult<()> {
        self.insert_new(PODS, "pod", &pod.uuid.to_string(), pod)
    }

    pub fn update_pod(&self, pod: &Pod) -> CatalogResult<()> {
        self.replace(PODS, "pod", &pod.uuid.to_string(), pod)
    }

    pub fn get_pod(&self, uuid: &Uuid) -> CatalogResult<Option<Pod>> {
        self.fetch(PODS, &uuid.to_string())
    }

    pub fn list_pods(&self) -> CatalogResult<Vec<Pod>> {
        self.scan(PODS, "")
    }

    /// PODs that reference the given edgesite, in any state.
    pub fn pods_for_edgesite(&self, edgesite: &Uuid) -> CatalogResult<Vec<Pod>> {
        Ok(self
            .list_pods()?
            .into_iter()
            .filter(|pod| pod.edgesite == *edgesite)
            .collect())
    }

    /// PODs that reference the given blueprint, in any state.
    pub fn pods_for_blueprint(&self, blueprint: &Uuid) -> CatalogResult<Vec<Pod>> {
        Ok(self
            .list_pods()?
            .into_iter()
            .filter(|pod| pod.blueprint == *blueprint)
            .collect())
    }

    // ── POD workflows ──────────────────────────────────────────────

    /// Record a new run of `name` for `pod`, assigning the next index.
    ///
    /// The index is one past the highest existing index for this
    /// (pod, name) pair, or 0 for the first run. Scan and insert share a
    /// write transaction, so concurrent callers never receive the same index.
    pub fn create_pod_workflow(
        &self,
        pod: &Uuid,
        name: &str,
        yaml: Value,
    ) -> CatalogResult<PodWorkflow> {
        let prefix = format!("{pod}:");
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let workflow;
        {
            let mut t = txn.open_table(POD_WORKFLOWS).map_err(map_err!(Table))?;
            let mut next = 0u32;
            for entry in t.iter().map_err(map_err!(Read))? {
                let (key, value) = entry.map_err(map_err!(Read))?;
                if !key.value().starts_with(&prefix) {
                    continue;
                }
                let existing: PodWorkflow =
                    serde_json::from_slice(value.value()).map_err(map_err!(Deserialize))?;
                if existing.name == name {
                    next = next.max(existing.index + 1);
                }
            }
            workflow = PodWorkflow {
                pod: *pod,
                name: name.to_string(),
                index: next,
                yaml,
                started_at: epoch_secs(),
                ended_at: None,
            };
            let value = serde_json::to_vec(&workflow).map_err(map_err!(Serialize))?;
            t.insert(workflow.table_key().as_str(), value.as_slice())
                .map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(%pod, workflow = %name, index = workflow.index, "workflow run recorded");
        Ok(workflow)
    }

    /// Set `ended_at` on every open run of `pod`. Returns how many were closed.
    pub fn close_open_workflows(&self, pod: &Uuid, ended_at: u64) -> CatalogResult<u32> {
        let prefix = format!("{pod}:");
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let mut closed = Vec::new();
        {
            let mut t = txn.open_table(POD_WORKFLOWS).map_err(map_err!(Table))?;
            for entry in t.iter().map_err(map_err!(Read))? {
                let (key, value) = entry.map_err(map_err!(Read))?;
                if !key.value().starts_with(&prefix) {
                    continue;
                }
                let mut workflow: PodWorkflow =
                    serde_json::from_slice(value.value()).map_err(map_err!(Deserialize))?;
                if workflow.is_running() {
                    workflow.ended_at = Some(ended_at);
                    closed.push(workflow);
                }
            }
            for workflow in &closed {
                let value = serde_json::to_vec(workflow).map_err(map_err!(Serialize))?;
                t.insert(workflow.table_key().as_str(), value.as_slice())
                    .map_err(map_err!(Write))?;
            }
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(%pod, closed = closed.len(), "open workflow runs closed");
        Ok(closed.len() as u32)
    }

    pub fn get_pod_workflow(
        &self,
        pod: &Uuid,
        name: &str,
        index: u32,
    ) -> CatalogResult<Option<PodWorkflow>> {
        self.fetch(POD_WORKFLOWS, &format!("{pod}:{name}:{index:010}"))
    }

    /// All runs for a POD, ordered by name then index.
    pub fn list_pod_workflows(&self, pod: &Uuid) -> CatalogResult<Vec<PodWorkflow>> {
        self.scan(POD_WORKFLOWS, &format!("{pod}:"))
    }

    /// The POD's open run, if one exists.
    pub fn open_pod_workflow(&self, pod: &Uuid) -> CatalogResult<Option<PodWorkflow>> {
        Ok(self
            .list_pod_workflows(pod)?
            .into_iter()
            .find(PodWorkflow::is_running))
    }

    // ── POD events ─────────────────────────────────────────────────

    /// Append an event to the POD's log. Returns its sequence number.
    pub fn append_pod_event(&self, event: &PodEvent) -> CatalogResult<u64> {
        let prefix = format!("{}:", event.pod);
        let value = serde_json::to_vec(event).map_err(map_err!(Serialize))?;
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let seq;
        {
            let mut t = txn.open_table(POD_EVENTS).map_err(map_err!(Table))?;
            let mut count = 0u64;
            for entry in t.iter().map_err(map_err!(Read))? {
                let (key, _) = entry.map_err(map_err!(Read))?;
                if key.value().starts_with(&prefix) {
                    count += 1;
                }
            }
            seq = count;
            let key = format!("{prefix}{seq:020}");
            t.insert(key.as_str(), value.as_slice())
                .map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(pod = %event.pod, level = %event.level, seq, "pod event appended");
        Ok(seq)
    }

    /// Events for a POD in append order.
    pub fn list_pod_events(&self, pod: &Uuid) -> CatalogResult<Vec<PodEvent>> {
        self.scan(POD_EVENTS, &format!("{pod}:"))
    }
}
