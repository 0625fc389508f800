//! DAG and context-file rendering.
//!
//! Every workspace gets three context files the entry script can read.
//! `POD.py` and `POD.sh` carry the POD UUID plus the Blueprint, Edgesite
//! and workflow input as YAML text; `INPUT.yaml` holds the input alone.
//! The DAG file is one of two templates with `##KEY##` placeholders
//! substituted.

use std::path::Path;

use edgeplane_catalog::{Blueprint, Edgesite, PodWorkflow};
use edgeplane_control::EngineError;
use serde::Serialize;
use uuid::Uuid;

const DAG_SHELL: &str = include_str!("../templates/dag_shell.py");
const DAG_PYTHON: &str = include_str!("../templates/dag_python.py");

/// How the entry script is run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptKind {
    Python,
    Shell,
}

impl ScriptKind {
    /// Classify an entry script URL by its extension.
    pub fn from_url(url: &str) -> Option<Self> {
        let path = url.split(['?', '#']).next().unwrap_or(url);
        if path.ends_with(".py") {
            Some(ScriptKind::Python)
        } else if path.ends_with(".sh") {
            Some(ScriptKind::Shell)
        } else {
            None
        }
    }

    fn template(self) -> &'static str {
        match self {
            ScriptKind::Python => DAG_PYTHON,
            ScriptKind::Shell => DAG_SHELL,
        }
    }
}

/// Values substituted into a DAG template.
pub struct DagParams<'a> {
    pub pod: Uuid,
    pub workflow: &'a PodWorkflow,
    /// File name of the fetched entry script.
    pub script: &'a str,
    pub workspace: &'a Path,
    pub callback_url: &'a str,
}

pub fn render_dag(kind: ScriptKind, params: &DagParams<'_>) -> String {
    // Python entry scripts are imported, so the placeholder is the module name.
    let script = match kind {
        ScriptKind::Python => params.script.strip_suffix(".py").unwrap_or(params.script),
        ScriptKind::Shell => params.script,
    };
    kind.template()
        .replace("##UUID##", &params.pod.to_string())
        .replace("##PHASE##", &params.workflow.name)
        .replace("##WFINDEX##", &params.workflow.index.to_string())
        .replace("##WFNAME##", script)
        .replace("##WORKSPACE##", &params.workspace.display().to_string())
        .replace("##CALLBACK##", params.callback_url.trim_end_matches('/'))
}

fn to_yaml<T: Serialize>(value: &T) -> Result<String, EngineError> {
    serde_yaml::to_string(value).map_err(|e| EngineError::Staging(format!("yaml rendering: {e}")))
}

/// What the `POD.py` and `POD.sh` preludes describe.
pub struct PodContext<'a> {
    pub pod: Uuid,
    pub blueprint: &'a Blueprint,
    pub edgesite: &'a Edgesite,
    pub workflow: &'a PodWorkflow,
}

/// `POD.py`: module-level strings.
pub fn render_pod_py(ctx: &PodContext<'_>) -> Result<String, EngineError> {
    Ok(format!(
        "POD = '{}'\n\nBLUEPRINT = \"\"\"\n{}\"\"\"\n\nEDGESITE = \"\"\"\n{}\"\"\"\n\nINPUT = \"\"\"\n{}\"\"\"\n",
        ctx.pod,
        python_triple_quoted(&to_yaml(ctx.blueprint)?),
        python_triple_quoted(&to_yaml(ctx.edgesite)?),
        python_triple_quoted(&render_input(ctx.workflow)?),
    ))
}

/// `POD.sh`: exported variables, meant to be sourced.
pub fn render_pod_sh(ctx: &PodContext<'_>) -> Result<String, EngineError> {
    Ok(format!(
        "export POD='{}'\n\nexport BLUEPRINT='\n{}'\n\nexport EDGESITE='\n{}'\n\nexport INPUT='\n{}'\n",
        ctx.pod,
        shell_single_quoted(&to_yaml(ctx.blueprint)?),
        shell_single_quoted(&to_yaml(ctx.edgesite)?),
        shell_single_quoted(&render_input(ctx.workflow)?),
    ))
}

pub fn render_input(workflow: &PodWorkflow) -> Result<String, EngineError> {
    if workflow.yaml.is_null() {
        return Ok(String::new());
    }
    to_yaml(&workflow.yaml)
}

fn python_triple_quoted(text: &str) -> String {
    text.replace('\\', "\\\\").replace("\"\"\"", "\\\"\\\"\\\"")
}

fn shell_single_quoted(text: &str) -> String {
    text.replace('\'', "'\\''")
}
