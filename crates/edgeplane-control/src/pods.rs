//! PodManager — deploys Blueprints onto Edgesites and drives POD lifecycles.
//!
//! Every operation that reads a POD, decides, and writes it back does so
//! while holding that POD's identity lock. POD creation additionally holds
//! the Edgesite's lock so two creations cannot both claim one Edgesite.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::NaiveDateTime;
use edgeplane_catalog::*;
use edgeplane_rules::BlueprintView;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::engine::{EngineFactory, WorkflowEngine};
use crate::error::{ControlError, ControlResult};
use crate::locks::LockRegistry;
use crate::transitions;

pub const WF_CREATE: &str = "create";
pub const WF_UPDATE: &str = "update";
pub const WF_DELETE: &str = "delete";

/// Format of runner-supplied event timestamps (UTC).
pub const EVENT_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// A request to deploy a Blueprint onto an Edgesite.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewPod {
    #[serde(default)]
    pub uuid: Option<Uuid>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub blueprint: Uuid,
    pub edgesite: Uuid,
    /// Input for the `create` workflow.
    #[serde(default)]
    pub yaml: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CreateOutcome {
    /// Dry run: every check passed, nothing was written.
    Validated,
    Created { pod: Pod, workflow: PodWorkflow },
}

#[derive(Debug, Clone, PartialEq)]
pub enum DeleteOutcome {
    /// No `delete` workflow: the POD went straight to DEAD.
    Dead,
    /// The `delete` workflow was started; the runner reports the outcome.
    WorkflowStarted(PodWorkflow),
}

/// Everything known about one POD.
#[derive(Debug, Clone, Serialize)]
pub struct PodDetails {
    pub pod: Pod,
    pub events: Vec<PodEvent>,
    pub workflows: Vec<PodWorkflow>,
    pub workflow_names: Vec<String>,
}

/// Parse a runner event timestamp (`YYYY-MM-DD HH:MM:SS`, UTC) into Unix seconds.
pub fn parse_event_time(text: &str) -> ControlResult<u64> {
    let parsed = NaiveDateTime::parse_from_str(text.trim(), EVENT_TIME_FORMAT).map_err(|_| {
        ControlError::Invalid(vec![format!(
            "Invalid event time {text}; expected YYYY-MM-DD HH:MM:SS"
        )])
    })?;
    u64::try_from(parsed.and_utc().timestamp())
        .map_err(|_| ControlError::Invalid(vec![format!("Event time {text} is before 1970")]))
}

pub struct PodManager {
    store: CatalogStore,
    engines: Arc<dyn EngineFactory>,
    pod_locks: LockRegistry,
    edgesite_locks: LockRegistry,
    /// Engines whose run is in flight, by POD.
    active: Mutex<HashMap<Uuid, Box<dyn WorkflowEngine>>>,
}

impl PodManager {
    pub fn new(store: CatalogStore, engines: Arc<dyn EngineFactory>) -> Self {
        Self {
            store,
            engines,
            pod_locks: LockRegistry::new(),
            edgesite_locks: LockRegistry::new(),
            active: Mutex::new(HashMap::new()),
        }
    }

    pub fn store(&self) -> &CatalogStore {
        &self.store
    }

    /// Lock registry for Edgesites, shared with catalog administration.
    pub fn edgesite_locks(&self) -> LockRegistry {
        self.edgesite_locks.clone()
    }

    // ── Lookups ────────────────────────────────────────────────────

    fn require_pod(&self, uuid: Uuid) -> ControlResult<Pod> {
        self.store
            .get_pod(&uuid)?
            .ok_or(ControlError::NotFound { kind: "pod", uuid })
    }

    fn require_blueprint(&self, uuid: Uuid) -> ControlResult<Blueprint> {
        self.store
            .get_blueprint(&uuid)?
            .ok_or(ControlError::NotFound { kind: "blueprint", uuid })
    }

    fn require_edgesite(&self, uuid: Uuid) -> ControlResult<Edgesite> {
        self.store
            .get_edgesite(&uuid)?
            .ok_or(ControlError::NotFound { kind: "edgesite", uuid })
    }

    /// The hardware profile of every node in the Edgesite, one entry per node.
    fn edgesite_hardware(&self, site: &Edgesite) -> ControlResult<Vec<Hardware>> {
        let mut hardware = Vec::with_capacity(site.nodes.len());
        for node_id in &site.nodes {
            let node = self
                .store
                .get_node(node_id)?
                .ok_or(ControlError::NotFound { kind: "node", uuid: *node_id })?;
            let profile = self.store.get_hardware(&node.hardware)?.ok_or(
                ControlError::NotFound {
                    kind: "hardware",
                    uuid: node.hardware,
                },
            )?;
            hardware.push(profile);
        }
        Ok(hardware)
    }

    fn check_compatible(&self, view: &BlueprintView<'_, CatalogStore>, site: &Edgesite) -> ControlResult<()> {
        let violations = view.check_hardware(&self.edgesite_hardware(site)?)?;
        if violations.is_empty() {
            return Ok(());
        }
        Err(ControlError::Incompatible {
            edgesite: site.uuid,
            blueprint: view.blueprint().uuid,
            violations,
        })
    }

    fn record(&self, pod: Uuid, level: EventLevel, message: impl Into<String>) -> ControlResult<()> {
        self.store.append_pod_event(&PodEvent::now(pod, level, message))?;
        Ok(())
    }

    pub fn list_pods(&self) -> ControlResult<Vec<Pod>> {
        Ok(self.store.list_pods()?)
    }

    pub fn pod_details(&self, uuid: Uuid) -> ControlResult<PodDetails> {
        let pod = self.require_pod(uuid)?;
        let view = BlueprintView::new(self.require_blueprint(pod.blueprint)?, &self.store);
        Ok(PodDetails {
            workflow_names: view.workflow_names()?.into_iter().collect(),
            events: self.store.list_pod_events(&uuid)?,
            workflows: self.store.list_pod_workflows(&uuid)?,
            pod,
        })
    }

    // ── Creation ───────────────────────────────────────────────────

    /// Validate a deployment and, unless `dry_run`, create the POD and
    /// start its `create` workflow.
    ///
    /// Checks run in order and the first failing check rejects the
    /// request: Edgesite availability, hardware compatibility, `create`
    /// input, presence of a `create` workflow. A rejected request writes
    /// nothing.
    pub async fn create_pod(&self, request: NewPod, dry_run: bool) -> ControlResult<CreateOutcome> {
        if request.name.trim().is_empty() {
            return Err(ControlError::Invalid(vec!["Missing name".to_string()]));
        }
        let blueprint = self.require_blueprint(request.blueprint)?;
        let site = self.require_edgesite(request.edgesite)?;

        if let Some(uuid) = request.uuid {
            if self.store.get_pod(&uuid)?.is_some() {
                return Err(CatalogError::AlreadyExists {
                    kind: "pod",
                    key: uuid.to_string(),
                }
                .into());
            }
        }

        let _site_guard = self.edgesite_locks.lock(site.uuid).await;

        let bound = self.store.pods_for_edgesite(&site.uuid)?;
        if let Some(live) = bound.iter().find(|pod| pod.is_alive()) {
            return Err(ControlError::EdgesiteInUse {
                edgesite: site.uuid,
                pod: live.uuid,
            });
        }

        let view = BlueprintView::new(blueprint, &self.store);
        self.check_compatible(&view, &site)?;

        let violations = view.validate_input(WF_CREATE, &request.yaml)?;
        if !violations.is_empty() {
            return Err(ControlError::Invalid(violations));
        }
        if !view.has_workflow(WF_CREATE)? {
            return Err(ControlError::NoSuchWorkflow {
                blueprint: view.blueprint().uuid,
                workflow: WF_CREATE.to_string(),
            });
        }

        if dry_run {
            debug!(edgesite = %site.uuid, blueprint = %request.blueprint, "pod creation validated (dry run)");
            return Ok(CreateOutcome::Validated);
        }

        // The Edgesite passes to the new POD; retire anything still pointing at it.
        for dead in bound {
            let _guard = self.pod_locks.lock(dead.uuid).await;
            let mut dead = self.require_pod(dead.uuid)?;
            if dead.state == PodState::Dead {
                self.apply_transition(&mut dead, PodState::Zombie).await?;
            }
        }

        let now = epoch_secs();
        let pod = Pod {
            uuid: request.uuid.unwrap_or_else(Uuid::new_v4),
            name: request.name,
            description: request.description,
            blueprint: request.blueprint,
            edgesite: site.uuid,
            state: PodState::New,
            yaml: request.yaml.clone(),
            created_at: now,
            updated_at: now,
        };
        self.store.insert_pod(&pod)?;
        self.record(pod.uuid, EventLevel::Info, "Pod created.")?;
        info!(pod = %pod.uuid, edgesite = %site.uuid, blueprint = %pod.blueprint, "pod created");

        let _pod_guard = self.pod_locks.lock(pod.uuid).await;
        let workflow = self.dispatch(pod, WF_CREATE, request.yaml).await?;
        let pod = self.require_pod(workflow.pod)?;
        Ok(CreateOutcome::Created { pod, workflow })
    }

    // ── Workflows ──────────────────────────────────────────────────

    /// Start the named workflow on a POD.
    pub async fn start_workflow(
        &self,
        pod: Uuid,
        workflow: &str,
        payload: Value,
    ) -> ControlResult<PodWorkflow> {
        let _guard = self.pod_locks.lock(pod).await;
        let pod = self.require_pod(pod)?;
        self.dispatch(pod, workflow, payload).await
    }

    /// Admission, record creation, staging, and hand-off for one run.
    /// Callers hold the POD's lock.
    async fn dispatch(&self, mut pod: Pod, name: &str, payload: Value) -> ControlResult<PodWorkflow> {
        if !pod.is_alive() {
            return Err(ControlError::NotAlive(pod.uuid));
        }
        if pod.is_workflow_running() {
            return Err(ControlError::WorkflowRunning(pod.uuid));
        }

        let view = BlueprintView::new(self.require_blueprint(pod.blueprint)?, &self.store);
        if !view.has_workflow(name)? {
            return Err(ControlError::NoSuchWorkflow {
                blueprint: pod.blueprint,
                workflow: name.to_string(),
            });
        }
        let violations = view.validate_input(name, &payload)?;
        if !violations.is_empty() {
            return Err(ControlError::Invalid(violations));
        }

        let workflow = self.store.create_pod_workflow(&pod.uuid, name, payload.clone())?;
        let mut engine = self.engines.engine();

        if let Err(source) = engine.initialize(&pod, &workflow).await {
            self.store.close_open_workflows(&pod.uuid, epoch_secs())?;
            self.record(
                pod.uuid,
                EventLevel::Warn,
                format!("Could not initialize workflow {name}: {source}"),
            )?;
            warn!(pod = %pod.uuid, workflow = %name, error = %source, "workflow initialization failed");
            return Err(ControlError::Dispatch {
                pod: pod.uuid,
                workflow: name.to_string(),
                source,
            });
        }

        pod.yaml = payload;
        pod.state = PodState::Workflow;
        pod.updated_at = epoch_secs();
        self.store.update_pod(&pod)?;
        info!(pod = %pod.uuid, workflow = %name, index = workflow.index, "workflow dispatched");

        if let Err(source) = engine.start().await {
            self.record(
                pod.uuid,
                EventLevel::Warn,
                format!("Could not start workflow {name}: {source}"),
            )?;
            warn!(pod = %pod.uuid, workflow = %name, error = %source, "workflow start failed");
            self.apply_transition(&mut pod, PodState::Failed).await?;
            return Err(ControlError::Dispatch {
                pod: pod.uuid,
                workflow: name.to_string(),
                source,
            });
        }

        self.active.lock().await.insert(pod.uuid, engine);
        Ok(workflow)
    }

    /// Ask the runner to stop the POD's current run. Returns false when
    /// nothing is running. State changes only when the runner reports back.
    pub async fn cancel_workflow(&self, pod: Uuid) -> ControlResult<bool> {
        let _guard = self.pod_locks.lock(pod).await;
        let record = self.require_pod(pod)?;
        // The registry is not held across the runner call; the POD lock
        // keeps this entry ours until it is put back.
        let taken = self.active.lock().await.remove(&pod);
        let mut engine = match taken {
            Some(engine) => engine,
            None => {
                // Dispatched elsewhere; re-bind to the open run if the engine can.
                let Some(open) = self.store.open_pod_workflow(&pod)? else {
                    return Ok(false);
                };
                let mut engine = self.engines.engine();
                if !engine.attach(&record, &open) {
                    return Ok(false);
                }
                engine
            }
        };
        if !engine.is_running() {
            self.active.lock().await.insert(pod, engine);
            return Ok(false);
        }
        engine.cancel().await;
        self.active.lock().await.insert(pod, engine);
        self.record(pod, EventLevel::Info, "Workflow cancel requested.")?;
        Ok(true)
    }

    pub async fn workflow_logs(&self, pod: Uuid, name: &str, index: u32) -> ControlResult<Vec<u8>> {
        let record = self.require_pod(pod)?;
        let workflow = self.store.get_pod_workflow(&pod, name, index)?.ok_or_else(|| {
            ControlError::Invalid(vec![format!("No run {index} of workflow {name} for pod {pod}")])
        })?;
        self.engines
            .engine()
            .logs(&record, &workflow)
            .await
            .map_err(|source| ControlError::Dispatch {
                pod,
                workflow: name.to_string(),
                source,
            })
    }

    // ── State ──────────────────────────────────────────────────────

    /// Request a state change. Illegal requests are logged and ignored;
    /// the returned state is the POD's state afterwards.
    pub async fn set_state(&self, pod: Uuid, to: PodState) -> ControlResult<PodState> {
        let _guard = self.pod_locks.lock(pod).await;
        let mut pod = self.require_pod(pod)?;
        if to == PodState::Workflow && pod.state != PodState::Workflow {
            warn!(pod = %pod.uuid, from = %pod.state, "WORKFLOW is entered only by starting a workflow; ignored");
            return Ok(pod.state);
        }
        self.apply_transition(&mut pod, to).await?;
        Ok(pod.state)
    }

    /// Apply one transition to a POD whose lock the caller holds.
    /// Returns whether the state changed.
    async fn apply_transition(&self, pod: &mut Pod, to: PodState) -> ControlResult<bool> {
        let from = pod.state;
        if from == to {
            return Ok(false);
        }
        if !transitions::allowed(from, to) {
            warn!(pod = %pod.uuid, %from, %to, "Bad POD state transition requested");
            return Ok(false);
        }

        let now = epoch_secs();
        if from == PodState::Workflow {
            let closed = self.store.close_open_workflows(&pod.uuid, now)?;
            self.active.lock().await.remove(&pod.uuid);
            debug!(pod = %pod.uuid, closed, "workflow runs closed");
        }
        pod.state = to;
        if to == PodState::Zombie {
            pod.edgesite = NO_EDGESITE;
        }
        pod.updated_at = now;
        self.store.update_pod(pod)?;
        info!(pod = %pod.uuid, %from, %to, "pod state changed");
        Ok(true)
    }

    /// Append an event. A `STATUS` event whose message names a state
    /// (`"anything: ACTIVE"`) is also applied as a state change.
    pub async fn record_event(
        &self,
        pod: Uuid,
        level: EventLevel,
        message: &str,
        time: Option<u64>,
    ) -> ControlResult<PodEvent> {
        self.require_pod(pod)?;
        let event = PodEvent {
            pod,
            time: time.unwrap_or_else(epoch_secs),
            level,
            message: message.to_string(),
        };
        self.store.append_pod_event(&event)?;

        if level == EventLevel::Status {
            let name = message.split_once(':').map_or(message, |(_, rest)| rest).trim();
            match name.parse::<PodState>() {
                Ok(state) => {
                    self.set_state(pod, state).await?;
                }
                Err(e) => warn!(%pod, %message, error = %e, "status event names no state; ignored"),
            }
        }
        Ok(event)
    }

    // ── Teardown and upgrade ───────────────────────────────────────

    /// Tear down a POD: run its `delete` workflow if the Blueprint has one,
    /// otherwise mark it DEAD at once. `payload` defaults to the POD's
    /// latest workflow input.
    pub async fn delete_pod(&self, pod: Uuid, payload: Option<Value>) -> ControlResult<DeleteOutcome> {
        let _guard = self.pod_locks.lock(pod).await;
        let mut pod = self.require_pod(pod)?;
        if !pod.is_alive() {
            return Err(ControlError::NotAlive(pod.uuid));
        }
        if pod.is_workflow_running() {
            return Err(ControlError::WorkflowRunning(pod.uuid));
        }

        let view = BlueprintView::new(self.require_blueprint(pod.blueprint)?, &self.store);
        if view.has_workflow(WF_DELETE)? {
            let payload = payload.unwrap_or_else(|| pod.yaml.clone());
            let workflow = self.dispatch(pod, WF_DELETE, payload).await?;
            return Ok(DeleteOutcome::WorkflowStarted(workflow));
        }

        self.apply_transition(&mut pod, PodState::Dead).await?;
        self.record(pod.uuid, EventLevel::Info, "Pod deleted.")?;
        Ok(DeleteOutcome::Dead)
    }

    /// Move a POD to a descendant Blueprint, running the new Blueprint's
    /// `update` workflow when it has one.
    pub async fn upgrade_pod(
        &self,
        pod: Uuid,
        blueprint: Uuid,
        payload: Value,
    ) -> ControlResult<Option<PodWorkflow>> {
        let _guard = self.pod_locks.lock(pod).await;
        let mut pod = self.require_pod(pod)?;
        if !pod.is_alive() {
            return Err(ControlError::NotAlive(pod.uuid));
        }
        if pod.is_workflow_running() {
            return Err(ControlError::WorkflowRunning(pod.uuid));
        }

        let view = BlueprintView::new(self.require_blueprint(blueprint)?, &self.store);
        if !view.is_child_of(&pod.blueprint)? {
            return Err(ControlError::NotDescendant {
                current: pod.blueprint,
                target: blueprint,
            });
        }
        let site = self.require_edgesite(pod.edgesite)?;
        self.check_compatible(&view, &site)?;
        let has_update = view.has_workflow(WF_UPDATE)?;
        if has_update {
            let violations = view.validate_input(WF_UPDATE, &payload)?;
            if !violations.is_empty() {
                return Err(ControlError::Invalid(violations));
            }
        }

        // The new Blueprint is committed with the run's WORKFLOW state, only
        // once staging succeeded.
        let previous = pod.blueprint;
        pod.blueprint = blueprint;
        let outcome = if has_update {
            self.dispatch(pod.clone(), WF_UPDATE, payload).await.map(Some)
        } else {
            pod.updated_at = epoch_secs();
            self.store.update_pod(&pod)?;
            Ok(None)
        };

        if self.require_pod(pod.uuid)?.blueprint == blueprint {
            self.record(
                pod.uuid,
                EventLevel::Info,
                format!("Blueprint upgraded from {previous} to {blueprint}."),
            )?;
            info!(pod = %pod.uuid, %previous, %blueprint, "pod blueprint upgraded");
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_time_parses_as_utc() {
        assert_eq!(parse_event_time("1970-01-01 00:01:40").unwrap(), 100);
        assert_eq!(parse_event_time(" 2020-02-29 12:00:00 ").unwrap(), 1_582_977_600);
    }

    #[test]
    fn event_time_rejects_other_formats() {
        assert!(matches!(
            parse_event_time("2020-02-29T12:00:00Z"),
            Err(ControlError::Invalid(_))
        ));
        assert!(parse_event_time("yesterday").is_err());
    }
}
