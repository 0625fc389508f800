//! POD lifecycle commands.

use std::path::Path;

use anyhow::Context;
use edgeplane_catalog::EventLevel;
use edgeplane_control::{ControlError, CreateOutcome, DeleteOutcome, NewPod, parse_event_time};
use uuid::Uuid;

use super::{App, print_json, read_document};

pub struct CreateArgs<'a> {
    pub name: &'a str,
    pub description: &'a str,
    pub blueprint: Uuid,
    pub edgesite: Uuid,
    pub input: Option<&'a Path>,
    pub dry_run: bool,
}

pub async fn create(app: &App, args: CreateArgs<'_>) -> anyhow::Result<()> {
    let request = NewPod {
        uuid: None,
        name: args.name.to_string(),
        description: args.description.to_string(),
        blueprint: args.blueprint,
        edgesite: args.edgesite,
        yaml: read_document(args.input)?,
    };
    match app.manager.create_pod(request, args.dry_run).await.map_err(explain)? {
        CreateOutcome::Validated => println!("✓ POD request is valid (dry run, nothing created)"),
        CreateOutcome::Created { pod, workflow } => {
            println!("✓ POD {} created, workflow {} started", pod.uuid, workflow.run_name());
        }
    }
    Ok(())
}

pub fn list(app: &App) -> anyhow::Result<()> {
    for pod in app.manager.list_pods()? {
        println!("{}  {:<8}  {}", pod.uuid, pod.state, pod.name);
    }
    Ok(())
}

pub fn show(app: &App, uuid: Uuid) -> anyhow::Result<()> {
    print_json(&app.manager.pod_details(uuid)?)
}

pub async fn run(app: &App, uuid: Uuid, workflow: &str, input: Option<&Path>) -> anyhow::Result<()> {
    let run = app
        .manager
        .start_workflow(uuid, workflow, read_document(input)?)
        .await
        .map_err(explain)?;
    println!("✓ Workflow {} started", run.run_name());
    Ok(())
}

pub async fn upgrade(app: &App, uuid: Uuid, blueprint: Uuid, input: Option<&Path>) -> anyhow::Result<()> {
    let started = app
        .manager
        .upgrade_pod(uuid, blueprint, read_document(input)?)
        .await
        .map_err(explain)?;
    match started {
        Some(run) => println!("✓ POD {uuid} moved to blueprint {blueprint}, workflow {} started", run.run_name()),
        None => println!("✓ POD {uuid} moved to blueprint {blueprint}"),
    }
    Ok(())
}

pub async fn delete(app: &App, uuid: Uuid, input: Option<&Path>) -> anyhow::Result<()> {
    let payload = input.map(|path| read_document(Some(path))).transpose()?;
    match app.manager.delete_pod(uuid, payload).await.map_err(explain)? {
        DeleteOutcome::Dead => println!("✓ POD {uuid} is DEAD"),
        DeleteOutcome::WorkflowStarted(run) => {
            println!("✓ Workflow {} started; the POD dies when it completes", run.run_name());
        }
    }
    Ok(())
}

pub async fn event(
    app: &App,
    uuid: Uuid,
    level: EventLevel,
    message: &str,
    time: Option<&str>,
) -> anyhow::Result<()> {
    let time = time.map(parse_event_time).transpose()?;
    let event = app.manager.record_event(uuid, level, message, time).await?;
    let state = app.manager.store().get_pod(&uuid)?.map(|pod| pod.state);
    println!(
        "✓ {} event recorded at {}{}",
        event.level,
        event.time,
        state.map(|s| format!("; POD is {s}")).unwrap_or_default()
    );
    Ok(())
}

pub async fn logs(app: &App, uuid: Uuid, workflow: &str, index: Option<u32>) -> anyhow::Result<()> {
    let index = match index {
        Some(index) => index,
        None => app
            .store
            .list_pod_workflows(&uuid)?
            .iter()
            .filter(|run| run.name == workflow)
            .map(|run| run.index)
            .max()
            .with_context(|| format!("POD {uuid} never ran workflow {workflow}"))?,
    };
    let bytes = app.manager.workflow_logs(uuid, workflow, index).await?;
    print!("{}", String::from_utf8_lossy(&bytes));
    Ok(())
}

pub async fn cancel(app: &App, uuid: Uuid) -> anyhow::Result<()> {
    if app.manager.cancel_workflow(uuid).await? {
        println!("✓ Cancel requested; the runner reports the outcome");
    } else {
        println!("No workflow is running on POD {uuid}");
    }
    Ok(())
}

/// Spell out every violation instead of the one-line summary.
fn explain(err: ControlError) -> anyhow::Error {
    match err {
        ControlError::Invalid(violations) | ControlError::Incompatible { violations, .. } => {
            anyhow::anyhow!("request rejected:\n  - {}", violations.join("\n  - "))
        }
        other => other.into(),
    }
}
