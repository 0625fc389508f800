//! `WorkflowEngine` adapter that stages runs for Airflow.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use edgeplane_catalog::{CatalogStore, EventLevel, Pod, PodEvent, PodWorkflow};
use edgeplane_control::{EngineError, EngineFactory, WorkflowEngine};
use edgeplane_rules::BlueprintView;
use serde_json::{Value, json};
use tracing::{debug, info, warn};
use uuid::Uuid;
use walkdir::WalkDir;

use crate::config::AirflowConfig;
use crate::fetch::AssetFetcher;
use crate::runner::{AirflowClient, WorkflowRunner};
use crate::template::{self, DagParams, PodContext, ScriptKind};

const BANNER_RULE: &str = "************************************************************************************************************************";

/// Builds one [`AirflowEngine`] per dispatch, sharing the HTTP clients.
#[derive(Clone)]
pub struct AirflowEngineFactory {
    config: Arc<AirflowConfig>,
    store: CatalogStore,
    fetcher: AssetFetcher,
    runner: Arc<dyn WorkflowRunner>,
}

impl AirflowEngineFactory {
    /// Factory talking to the Airflow webserver named in `config`.
    pub fn new(config: AirflowConfig, store: CatalogStore) -> Result<Self, EngineError> {
        let runner = AirflowClient::new(&config.url, config.timeout())?;
        Self::with_runner(config, store, Arc::new(runner))
    }

    pub fn with_runner(
        config: AirflowConfig,
        store: CatalogStore,
        runner: Arc<dyn WorkflowRunner>,
    ) -> Result<Self, EngineError> {
        let fetcher = AssetFetcher::new(config.timeout())?;
        Ok(Self {
            config: Arc::new(config),
            store,
            fetcher,
            runner,
        })
    }
}

impl EngineFactory for AirflowEngineFactory {
    fn engine(&self) -> Box<dyn WorkflowEngine> {
        Box::new(AirflowEngine {
            factory: self.clone(),
            staged: None,
        })
    }
}

/// A run that passed `initialize`.
struct Staged {
    dag: String,
    workflow: PodWorkflow,
}

pub struct AirflowEngine {
    factory: AirflowEngineFactory,
    staged: Option<Staged>,
}

impl AirflowEngine {
    fn event(&self, pod: Uuid, level: EventLevel, message: impl Into<String>) -> Result<(), EngineError> {
        self.factory
            .store
            .append_pod_event(&PodEvent::now(pod, level, message))?;
        Ok(())
    }

    /// Record a WARN event for a failed step and hand back the error.
    fn fail(&self, pod: Uuid, message: String, err: EngineError) -> EngineError {
        warn!(%pod, error = %err, "{message}");
        if let Err(e) = self.event(pod, EventLevel::Warn, message) {
            warn!(%pod, error = %e, "could not record workflow failure event");
        }
        err
    }

    /// Fetch one asset; a failure is recorded as a WARN event naming `what`.
    async fn fetch(&self, pod: Uuid, what: &str, url: &str, dir: &Path) -> Result<PathBuf, EngineError> {
        self.factory.fetcher.fetch_into(url, dir).await.map_err(|e| {
            debug!(%pod, %url, transient = e.is_transient(), "asset fetch failed");
            let message = format!("{what} could NOT be fetched: {url} ({})", e.reason());
            self.fail(pod, message, e.into())
        })
    }

    async fn write(&self, pod: Uuid, path: &Path, contents: String) -> Result<(), EngineError> {
        tokio::fs::write(path, contents).await.map_err(|e| {
            self.fail(
                pod,
                format!("Could not write {}", path.display()),
                EngineError::Io(e),
            )
        })
    }
}

#[async_trait]
impl WorkflowEngine for AirflowEngine {
    async fn initialize(&mut self, pod: &Pod, workflow: &PodWorkflow) -> Result<(), EngineError> {
        let store = &self.factory.store;
        let config = &self.factory.config;
        let phase = workflow.name.as_str();
        let run_name = workflow.run_name();

        // 1. Resolve the workflow stanza through the Blueprint chain.
        let Some(blueprint) = store.get_blueprint(&pod.blueprint)? else {
            return Err(self.fail(
                pod.uuid,
                format!("Blueprint {} no longer exists", pod.blueprint),
                EngineError::Staging(format!("blueprint {} is gone", pod.blueprint)),
            ));
        };
        let Some(stanza) = BlueprintView::new(blueprint.clone(), store)
            .object_stanza(&format!("workflow/{phase}"))?
        else {
            return Err(self.fail(
                pod.uuid,
                format!("Blueprint has no workflow stanza for {phase}"),
                EngineError::MissingWorkflow(phase.to_string()),
            ));
        };
        self.event(pod.uuid, EventLevel::Info, format!("Starting workflow: {phase}"))?;

        // 2. Workspace.
        let workspace = config.workspace_root.join(&run_name);
        if let Err(e) = tokio::fs::create_dir_all(&workspace).await {
            return Err(self.fail(
                pod.uuid,
                format!("Could not create workflow directory {}", workspace.display()),
                EngineError::Io(e),
            ));
        }
        self.event(
            pod.uuid,
            EventLevel::Info,
            format!("Workflow directory created: {}", workspace.display()),
        )?;

        // 3. Entry script.
        let url = stanza.get("url").and_then(Value::as_str).unwrap_or_default();
        let Some(kind) = ScriptKind::from_url(url) else {
            return Err(self.fail(
                pod.uuid,
                format!("Workflow URL must name a .py or .sh script: {url:?}"),
                EngineError::Staging(format!("bad entry script url {url:?}")),
            ));
        };
        let script = self.fetch(pod.uuid, "Workflow", url, &workspace).await?;
        self.event(pod.uuid, EventLevel::Info, format!("Workflow fetched: {url}"))?;

        // 4. Components; every one is attempted before giving up.
        let components: Vec<&str> = stanza
            .get("components")
            .and_then(Value::as_array)
            .map(|list| list.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default();
        let mut missing = Vec::new();
        for component in components {
            match self
                .fetch(pod.uuid, "Workflow component", component, &workspace)
                .await
            {
                Ok(_) => self.event(
                    pod.uuid,
                    EventLevel::Info,
                    format!("Workflow component fetched: {component}"),
                )?,
                Err(_) => missing.push(component.to_string()),
            }
        }
        if !missing.is_empty() {
            return Err(EngineError::Fetch(format!(
                "{} component(s) could not be fetched: {}",
                missing.len(),
                missing.join(", ")
            )));
        }

        // 5. Context files and the DAG.
        let Some(edgesite) = store.get_edgesite(&pod.edgesite)? else {
            return Err(self.fail(
                pod.uuid,
                format!("Edgesite {} no longer exists", pod.edgesite),
                EngineError::Staging(format!("edgesite {} is gone", pod.edgesite)),
            ));
        };
        let context = PodContext {
            pod: pod.uuid,
            blueprint: &blueprint,
            edgesite: &edgesite,
            workflow,
        };
        self.write(pod.uuid, &workspace.join("POD.py"), template::render_pod_py(&context)?)
            .await?;
        self.write(pod.uuid, &workspace.join("POD.sh"), template::render_pod_sh(&context)?)
            .await?;
        self.write(pod.uuid, &workspace.join("INPUT.yaml"), template::render_input(workflow)?)
            .await?;

        let script_name = script
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let dag = template::render_dag(
            kind,
            &DagParams {
                pod: pod.uuid,
                workflow,
                script: &script_name,
                workspace: &workspace,
                callback_url: &config.callback_url,
            },
        );
        if let Err(e) = tokio::fs::create_dir_all(&config.dags_dir).await {
            return Err(self.fail(
                pod.uuid,
                format!("Could not create DAG directory {}", config.dags_dir.display()),
                EngineError::Io(e),
            ));
        }
        self.write(pod.uuid, &config.dags_dir.join(format!("{run_name}.py")), dag)
            .await?;
        self.event(pod.uuid, EventLevel::Info, "Workflow template created.")?;

        info!(pod = %pod.uuid, workflow = %phase, index = workflow.index, "workflow staged");
        self.staged = Some(Staged {
            dag: run_name,
            workflow: workflow.clone(),
        });
        Ok(())
    }

    async fn start(&mut self) -> Result<(), EngineError> {
        let staged = self.staged.as_ref().ok_or(EngineError::NotInitialized)?;
        let runner = &self.factory.runner;
        let run_id = format!("rc-{}", Uuid::new_v4());
        let conf = json!({
            "pod": staged.workflow.pod,
            "workflow": staged.workflow.name,
            "index": staged.workflow.index,
        });

        runner.unpause(&staged.dag).await?;
        runner.trigger(&staged.dag, &run_id, &conf).await?;
        info!(dag = %staged.dag, %run_id, "workflow triggered");
        Ok(())
    }

    fn attach(&mut self, _pod: &Pod, workflow: &PodWorkflow) -> bool {
        self.staged = Some(Staged {
            dag: workflow.run_name(),
            workflow: workflow.clone(),
        });
        true
    }

    async fn cancel(&mut self) {
        if !self.is_running() {
            return;
        }
        let Some(staged) = self.staged.as_ref() else {
            return;
        };
        match self.factory.runner.pause(&staged.dag).await {
            Ok(()) => info!(dag = %staged.dag, "workflow paused"),
            Err(e) => warn!(dag = %staged.dag, error = %e, "could not pause workflow"),
        }
    }

    fn is_running(&self) -> bool {
        self.staged.as_ref().is_some_and(|staged| {
            let wf = &staged.workflow;
            self.factory
                .store
                .get_pod_workflow(&wf.pod, &wf.name, wf.index)
                .ok()
                .flatten()
                .is_some_and(|wf| wf.is_running())
        })
    }

    async fn logs(&self, _pod: &Pod, workflow: &PodWorkflow) -> Result<Vec<u8>, EngineError> {
        let root = self.factory.config.logs_dir.clone();
        let dir = root.join(workflow.run_name());
        tokio::task::spawn_blocking(move || collect_logs(&root, &dir))
            .await
            .map_err(|e| EngineError::Io(std::io::Error::other(e)))?
    }
}

/// Every file under `dir`, in name order, each preceded by a banner naming
/// it relative to `root`. A missing directory yields nothing.
fn collect_logs(root: &Path, dir: &Path) -> Result<Vec<u8>, EngineError> {
    let mut out = Vec::new();
    if !dir.is_dir() {
        debug!(dir = %dir.display(), "no runner logs yet");
        return Ok(out);
    }
    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = entry.map_err(|e| EngineError::Io(e.into()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let rel = entry.path().strip_prefix(root).unwrap_or(entry.path());
        out.extend_from_slice(
            format!("{BANNER_RULE}\n  Airflow Logfile: {}\n{BANNER_RULE}\n", rel.display()).as_bytes(),
        );
        out.extend(std::fs::read(entry.path())?);
    }
    Ok(out)
}
