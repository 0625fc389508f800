//! Shared fixtures: a recording engine and a small catalog.

#![allow(dead_code)]

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use edgeplane_catalog::*;
use edgeplane_control::*;
use serde_json::{Value, json};
use uuid::Uuid;

#[derive(Default)]
pub struct Recorder {
    pub initialized: Vec<(Uuid, String, u32)>,
    pub started: u32,
    pub cancelled: u32,
    pub fail_initialize: bool,
    pub fail_start: bool,
    /// When set, `cancel` waits for this before returning.
    pub cancel_gate: Option<Arc<tokio::sync::Notify>>,
}

pub struct FakeFactory {
    pub store: CatalogStore,
    pub log: Arc<Mutex<Recorder>>,
}

struct FakeEngine {
    store: CatalogStore,
    log: Arc<Mutex<Recorder>>,
    workflow: Option<PodWorkflow>,
}

impl EngineFactory for FakeFactory {
    fn engine(&self) -> Box<dyn WorkflowEngine> {
        Box::new(FakeEngine {
            store: self.store.clone(),
            log: self.log.clone(),
            workflow: None,
        })
    }
}

#[async_trait]
impl WorkflowEngine for FakeEngine {
    async fn initialize(&mut self, pod: &Pod, workflow: &PodWorkflow) -> Result<(), EngineError> {
        tokio::task::yield_now().await;
        let mut log = self.log.lock().unwrap();
        if log.fail_initialize {
            return Err(EngineError::Fetch("asset host unreachable".into()));
        }
        log.initialized
            .push((pod.uuid, workflow.name.clone(), workflow.index));
        self.workflow = Some(workflow.clone());
        Ok(())
    }

    async fn start(&mut self) -> Result<(), EngineError> {
        let mut log = self.log.lock().unwrap();
        if log.fail_start {
            return Err(EngineError::Runner("runner returned 503".into()));
        }
        log.started += 1;
        Ok(())
    }

    async fn cancel(&mut self) {
        let gate = {
            let mut log = self.log.lock().unwrap();
            log.cancelled += 1;
            log.cancel_gate.clone()
        };
        if let Some(gate) = gate {
            gate.notified().await;
        }
    }

    fn is_running(&self) -> bool {
        self.workflow.as_ref().is_some_and(|wf| {
            self.store
                .get_pod_workflow(&wf.pod, &wf.name, wf.index)
                .ok()
                .flatten()
                .is_some_and(|wf| wf.is_running())
        })
    }

    async fn logs(&self, _pod: &Pod, workflow: &PodWorkflow) -> Result<Vec<u8>, EngineError> {
        Ok(format!("log of {}", workflow.run_name()).into_bytes())
    }
}

pub struct World {
    pub store: CatalogStore,
    pub manager: PodManager,
    pub inventory: Inventory,
    pub log: Arc<Mutex<Recorder>>,
    pub dell: Hardware,
    pub blueprint: Blueprint,
    pub site: Edgesite,
}

pub fn base_blueprint_yaml() -> Value {
    json!({
        "hardware_profile": { "name": "Dell.*", "min": 2 },
        "workflow": {
            "create": {
                "url": "http://assets/create.py",
                "input_schema": { "name": { "type": "string" } }
            },
            "delete": { "url": "http://assets/delete.sh" }
        }
    })
}

impl World {
    /// A store holding two Dell nodes in one Edgesite and a Blueprint that
    /// needs at least two Dell nodes.
    pub async fn new() -> Self {
        let store = CatalogStore::open_in_memory().unwrap();
        let log = Arc::new(Mutex::new(Recorder::default()));
        let manager = PodManager::new(
            store.clone(),
            Arc::new(FakeFactory {
                store: store.clone(),
                log: log.clone(),
            }),
        );
        let inventory = Inventory::new(store.clone(), manager.edgesite_locks());

        let dell = inventory
            .add_hardware(NewHardware {
                name: "Dell R740".into(),
                ..Default::default()
            })
            .unwrap();
        let nodes = (0..2).map(|_| add_node(&inventory, &dell)).collect();
        let site = inventory
            .add_edgesite(NewEdgesite {
                name: "site-a".into(),
                nodes,
                regions: BTreeSet::from([UNIVERSAL_REGION]),
                ..Default::default()
            })
            .await
            .unwrap();
        let blueprint = add_blueprint(&inventory, None, base_blueprint_yaml()).await;

        Self {
            store,
            manager,
            inventory,
            log,
            dell,
            blueprint,
            site,
        }
    }

    pub fn new_pod(&self) -> NewPod {
        NewPod {
            uuid: None,
            name: "pod-a".into(),
            description: String::new(),
            blueprint: self.blueprint.uuid,
            edgesite: self.site.uuid,
            yaml: json!({ "name": "edge-a" }),
        }
    }

    /// Create a POD and return it (in WORKFLOW, running `create`).
    pub async fn create_pod(&self) -> Pod {
        match self.manager.create_pod(self.new_pod(), false).await.unwrap() {
            CreateOutcome::Created { pod, .. } => pod,
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    /// Create a POD and report its `create` workflow as finished.
    pub async fn active_pod(&self) -> Pod {
        let pod = self.create_pod().await;
        self.manager
            .record_event(pod.uuid, EventLevel::Status, "State changed to: ACTIVE", None)
            .await
            .unwrap();
        self.pod(pod.uuid)
    }

    /// A second Edgesite with two fresh Dell nodes.
    pub async fn another_site(&self) -> Edgesite {
        let nodes = (0..2).map(|_| add_node(&self.inventory, &self.dell)).collect();
        self.inventory
            .add_edgesite(NewEdgesite {
                name: "site-b".into(),
                nodes,
                regions: BTreeSet::from([UNIVERSAL_REGION]),
                ..Default::default()
            })
            .await
            .unwrap()
    }

    pub fn pod(&self, uuid: Uuid) -> Pod {
        self.store.get_pod(&uuid).unwrap().unwrap()
    }
}

pub fn add_node(inventory: &Inventory, hardware: &Hardware) -> Uuid {
    inventory
        .add_node(NewNode {
            uuid: None,
            name: format!("node-{}", Uuid::new_v4()),
            description: String::new(),
            hardware: hardware.uuid,
            yaml: Value::Null,
        })
        .unwrap()
        .uuid
}

pub async fn add_blueprint(inventory: &Inventory, parent: Option<Uuid>, mut yaml: Value) -> Blueprint {
    if let Some(parent) = parent {
        yaml["parent"] = json!(parent.to_string());
    }
    inventory
        .add_blueprint(NewBlueprint {
            blueprint: "1.0.0".into(),
            name: "stack".into(),
            version: "1.0.0".into(),
            yaml,
            ..Default::default()
        })
        .await
        .unwrap()
}
