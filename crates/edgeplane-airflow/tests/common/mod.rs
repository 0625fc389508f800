//! Shared fixtures: tempdir layout, file:// assets, and a recording runner.

#![allow(dead_code)]

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use edgeplane_airflow::*;
use edgeplane_catalog::*;
use edgeplane_control::*;
use reqwest::Url;
use serde_json::{Value, json};
use tempfile::TempDir;
use uuid::Uuid;

#[derive(Default)]
pub struct FakeRunner {
    pub calls: Mutex<Vec<String>>,
    pub fail_trigger: bool,
    pub fail_forget: bool,
}

impl FakeRunner {
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl WorkflowRunner for FakeRunner {
    async fn unpause(&self, dag: &str) -> Result<(), RunnerError> {
        self.calls.lock().unwrap().push(format!("unpause {dag}"));
        Ok(())
    }

    async fn pause(&self, dag: &str) -> Result<(), RunnerError> {
        self.calls.lock().unwrap().push(format!("pause {dag}"));
        Ok(())
    }

    async fn trigger(&self, dag: &str, run_id: &str, _conf: &Value) -> Result<(), RunnerError> {
        self.calls.lock().unwrap().push(format!("trigger {dag} {run_id}"));
        if self.fail_trigger {
            return Err(RunnerError::Status {
                url: format!("http://airflow/api/experimental/dags/{dag}/dag_runs"),
                status: 503,
            });
        }
        Ok(())
    }

    async fn forget(&self, dag: &str) -> Result<(), RunnerError> {
        self.calls.lock().unwrap().push(format!("forget {dag}"));
        if self.fail_forget {
            return Err(RunnerError::NoSession);
        }
        Ok(())
    }
}

/// A catalog with one Edgesite, an Airflow factory rooted in a tempdir,
/// and an asset directory served over `file://`.
pub struct Fixture {
    pub dir: TempDir,
    pub config: AirflowConfig,
    pub store: CatalogStore,
    pub runner: Arc<FakeRunner>,
    pub manager: PodManager,
    pub inventory: Inventory,
    pub site: Edgesite,
}

impl Fixture {
    pub async fn new() -> Self {
        Self::with_runner(FakeRunner::default()).await
    }

    pub async fn with_runner(runner: FakeRunner) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let assets = dir.path().join("assets");
        std::fs::create_dir_all(&assets).unwrap();
        std::fs::write(assets.join("deploy.py"), "def start(ds, **kwargs):\n    return 'Done.'\n").unwrap();
        std::fs::write(assets.join("teardown.sh"), "echo bye\n").unwrap();
        std::fs::write(assets.join("helm-values.yaml"), "replicas: 2\n").unwrap();

        let config = AirflowConfig {
            url: "http://airflow.invalid".into(),
            workspace_root: dir.path().join("workflow"),
            dags_dir: dir.path().join("dags"),
            logs_dir: dir.path().join("logs"),
            callback_url: "http://api.invalid:8080".into(),
            ..Default::default()
        };

        let store = CatalogStore::open_in_memory().unwrap();
        let runner = Arc::new(runner);
        let factory =
            AirflowEngineFactory::with_runner(config.clone(), store.clone(), runner.clone()).unwrap();
        let manager = PodManager::new(store.clone(), Arc::new(factory));
        let inventory = Inventory::new(store.clone(), manager.edgesite_locks());

        let hardware = inventory
            .add_hardware(NewHardware {
                name: "Dell R740".into(),
                ..Default::default()
            })
            .unwrap();
        let node = inventory
            .add_node(NewNode {
                uuid: None,
                name: "node-1".into(),
                description: String::new(),
                hardware: hardware.uuid,
                yaml: Value::Null,
            })
            .unwrap();
        let site = inventory
            .add_edgesite(NewEdgesite {
                name: "site-a".into(),
                nodes: BTreeSet::from([node.uuid]),
                regions: BTreeSet::from([UNIVERSAL_REGION]),
                ..Default::default()
            })
            .await
            .unwrap();

        Self {
            dir,
            config,
            store,
            runner,
            manager,
            inventory,
            site,
        }
    }

    pub fn asset(&self, name: &str) -> String {
        Url::from_file_path(self.dir.path().join("assets").join(name))
            .unwrap()
            .to_string()
    }

    pub async fn blueprint(&self, workflows: Value) -> Blueprint {
        self.inventory
            .add_blueprint(NewBlueprint {
                blueprint: "1.0.0".into(),
                name: "stack".into(),
                version: "1.0.0".into(),
                yaml: json!({ "workflow": workflows }),
                ..Default::default()
            })
            .await
            .unwrap()
    }

    pub fn new_pod(&self, blueprint: &Blueprint) -> NewPod {
        NewPod {
            uuid: None,
            name: "pod-a".into(),
            description: String::new(),
            blueprint: blueprint.uuid,
            edgesite: self.site.uuid,
            yaml: json!({ "name": "edge-a" }),
        }
    }

    pub fn messages(&self, pod: Uuid) -> Vec<(EventLevel, String)> {
        self.store
            .list_pod_events(&pod)
            .unwrap()
            .into_iter()
            .map(|e| (e.level, e.message))
            .collect()
    }

    pub fn workspace(&self, run: &str) -> PathBuf {
        self.config.workspace_root.join(run)
    }

    pub fn dag_file(&self, run: &str) -> PathBuf {
        self.config.dags_dir.join(format!("{run}.py"))
    }
}

pub fn read(path: &Path) -> String {
    std::fs::read_to_string(path).unwrap_or_else(|e| panic!("{}: {e}", path.display()))
}
