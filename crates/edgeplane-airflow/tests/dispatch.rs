//! End-to-end dispatch through `AirflowEngine` with a recording runner.

mod common;

use common::*;
use edgeplane_airflow::*;
use edgeplane_catalog::*;
use edgeplane_control::*;
use serde_json::json;

async fn created(fx: &Fixture, blueprint: &Blueprint) -> (Pod, PodWorkflow) {
    match fx.manager.create_pod(fx.new_pod(blueprint), false).await.unwrap() {
        CreateOutcome::Created { pod, workflow } => (pod, workflow),
        other => panic!("unexpected outcome {other:?}"),
    }
}

#[tokio::test]
async fn create_stages_workspace_and_triggers_dag() {
    let fx = Fixture::new().await;
    let blueprint = fx
        .blueprint(json!({
            "create": {
                "url": fx.asset("deploy.py"),
                "components": [fx.asset("helm-values.yaml")],
            }
        }))
        .await;

    let (pod, workflow) = created(&fx, &blueprint).await;
    assert_eq!(pod.state, PodState::Workflow);
    let run = workflow.run_name();
    assert_eq!(run, format!("create-0-{}", pod.uuid));

    let workspace = fx.workspace(&run);
    for file in ["deploy.py", "helm-values.yaml", "POD.py", "POD.sh", "INPUT.yaml"] {
        assert!(workspace.join(file).is_file(), "{file} missing from workspace");
    }
    assert!(read(&workspace.join("POD.py")).starts_with(&format!("POD = '{}'", pod.uuid)));
    assert!(read(&workspace.join("POD.sh")).contains("export EDGESITE='"));
    assert!(read(&workspace.join("POD.py")).contains("INPUT = \"\"\"\nname: edge-a\n\"\"\""));
    assert!(read(&workspace.join("POD.sh")).contains("export INPUT='\nname: edge-a\n'"));
    assert_eq!(read(&workspace.join("INPUT.yaml")), "name: edge-a\n");

    let dag = read(&fx.dag_file(&run));
    assert!(dag.contains(&format!("DAG_NAME = '{run}'")));
    assert!(dag.contains("import deploy as workflow"));
    assert!(dag.contains("CALLBACK = 'http://api.invalid:8080'"));

    let calls = fx.runner.calls();
    assert_eq!(calls[0], format!("unpause {run}"));
    assert!(calls[1].starts_with(&format!("trigger {run} rc-")));

    let messages: Vec<String> = fx.messages(pod.uuid).into_iter().map(|(_, m)| m).collect();
    assert_eq!(
        messages,
        vec![
            "Pod created.".to_string(),
            "Starting workflow: create".to_string(),
            format!("Workflow directory created: {}", workspace.display()),
            format!("Workflow fetched: {}", fx.asset("deploy.py")),
            format!("Workflow component fetched: {}", fx.asset("helm-values.yaml")),
            "Workflow template created.".to_string(),
        ]
    );
}

#[tokio::test]
async fn shell_scripts_use_the_shell_template() {
    let fx = Fixture::new().await;
    let blueprint = fx
        .blueprint(json!({ "create": { "url": fx.asset("teardown.sh") } }))
        .await;

    let (_, workflow) = created(&fx, &blueprint).await;
    let dag = read(&fx.dag_file(&workflow.run_name()));
    assert!(dag.contains("BashOperator"));
    assert!(dag.contains("/bin/bash ./teardown.sh "));
}

#[tokio::test]
async fn missing_component_aborts_before_the_dag_is_written() {
    let fx = Fixture::new().await;
    let blueprint = fx
        .blueprint(json!({
            "create": {
                "url": fx.asset("deploy.py"),
                "components": [fx.asset("absent.tgz"), fx.asset("helm-values.yaml")],
            }
        }))
        .await;

    let err = fx
        .manager
        .create_pod(fx.new_pod(&blueprint), false)
        .await
        .unwrap_err();
    let ControlError::Dispatch { pod, source, .. } = err else {
        panic!("expected a dispatch failure, got {err:?}");
    };
    assert!(matches!(source, EngineError::Fetch(_)));

    let events = fx.messages(pod);
    let warning = format!("Workflow component could NOT be fetched: {} (i/o error", fx.asset("absent.tgz"));
    assert!(
        events
            .iter()
            .any(|(level, m)| *level == EventLevel::Warn && m.starts_with(&warning)),
        "{events:?}"
    );
    // The remaining component is still attempted.
    assert!(events.contains(&(
        EventLevel::Info,
        format!("Workflow component fetched: {}", fx.asset("helm-values.yaml"))
    )));

    let run = format!("create-0-{pod}");
    assert!(!fx.dag_file(&run).exists());
    assert!(fx.workspace(&run).join("deploy.py").exists(), "partial workspace is kept");
    assert!(fx.runner.calls().is_empty());

    let record = fx.store.get_pod(&pod).unwrap().unwrap();
    assert_eq!(record.state, PodState::New);
    assert!(fx.store.open_pod_workflow(&pod).unwrap().is_none());
}

#[tokio::test]
async fn entry_script_must_be_python_or_shell() {
    let fx = Fixture::new().await;
    let blueprint = fx
        .blueprint(json!({ "create": { "url": fx.asset("helm-values.yaml") } }))
        .await;

    let err = fx
        .manager
        .create_pod(fx.new_pod(&blueprint), false)
        .await
        .unwrap_err();
    let ControlError::Dispatch { pod, source, .. } = err else {
        panic!("expected a dispatch failure, got {err:?}");
    };
    assert!(matches!(source, EngineError::Staging(_)));
    assert!(
        fx.messages(pod)
            .iter()
            .any(|(level, m)| *level == EventLevel::Warn && m.contains(".py or .sh"))
    );
}

#[tokio::test]
async fn trigger_failure_fails_the_pod() {
    let fx = Fixture::with_runner(FakeRunner {
        fail_trigger: true,
        ..Default::default()
    })
    .await;
    let blueprint = fx
        .blueprint(json!({ "create": { "url": fx.asset("deploy.py") } }))
        .await;

    let err = fx
        .manager
        .create_pod(fx.new_pod(&blueprint), false)
        .await
        .unwrap_err();
    let ControlError::Dispatch { pod, source, .. } = err else {
        panic!("expected a dispatch failure, got {err:?}");
    };
    assert!(matches!(source, EngineError::Runner(_)));
    assert_eq!(fx.store.get_pod(&pod).unwrap().unwrap().state, PodState::Failed);
}

#[tokio::test]
async fn cancel_pauses_the_running_dag() {
    let fx = Fixture::new().await;
    let blueprint = fx
        .blueprint(json!({ "create": { "url": fx.asset("deploy.py") } }))
        .await;
    let (pod, workflow) = created(&fx, &blueprint).await;

    assert!(fx.manager.cancel_workflow(pod.uuid).await.unwrap());
    assert!(
        fx.runner
            .calls()
            .contains(&format!("pause {}", workflow.run_name()))
    );

    // Once the runner reports completion there is nothing left to cancel.
    fx.manager
        .record_event(pod.uuid, EventLevel::Status, "State changed to: ACTIVE", None)
        .await
        .unwrap();
    assert!(!fx.manager.cancel_workflow(pod.uuid).await.unwrap());
}

#[tokio::test]
async fn logs_are_concatenated_with_banners() {
    let fx = Fixture::new().await;
    let blueprint = fx
        .blueprint(json!({ "create": { "url": fx.asset("deploy.py") } }))
        .await;
    let (pod, workflow) = created(&fx, &blueprint).await;

    let run = workflow.run_name();
    let task_dir = fx.config.logs_dir.join(&run).join("maintask");
    std::fs::create_dir_all(&task_dir).unwrap();
    std::fs::write(task_dir.join("1.log"), "first\n").unwrap();
    std::fs::write(task_dir.join("2.log"), "second\n").unwrap();

    let logs = fx.manager.workflow_logs(pod.uuid, "create", 0).await.unwrap();
    let text = String::from_utf8(logs).unwrap();
    let first = text.find(&format!("Airflow Logfile: {run}/maintask/1.log")).unwrap();
    let second = text.find(&format!("Airflow Logfile: {run}/maintask/2.log")).unwrap();
    assert!(first < second);
    assert!(text.contains("first\n"));
    assert!(text.ends_with("second\n"));
}

#[tokio::test]
async fn logs_of_a_run_without_output_are_empty() {
    let fx = Fixture::new().await;
    let blueprint = fx
        .blueprint(json!({ "create": { "url": fx.asset("deploy.py") } }))
        .await;
    let (pod, _) = created(&fx, &blueprint).await;

    let logs = fx.manager.workflow_logs(pod.uuid, "create", 0).await.unwrap();
    assert!(logs.is_empty());
}

#[tokio::test]
async fn start_before_initialize_is_refused() {
    let fx = Fixture::new().await;
    let factory = AirflowEngineFactory::with_runner(fx.config.clone(), fx.store.clone(), fx.runner.clone())
        .unwrap();
    let mut engine = factory.engine();
    assert!(matches!(engine.start().await, Err(EngineError::NotInitialized)));
    assert!(!engine.is_running());
}

#[tokio::test]
async fn another_controller_can_cancel_an_open_run() {
    let fx = Fixture::new().await;
    let blueprint = fx
        .blueprint(json!({ "create": { "url": fx.asset("deploy.py") } }))
        .await;
    let (pod, workflow) = created(&fx, &blueprint).await;

    // A second manager over the same store knows nothing of the dispatch.
    let factory = AirflowEngineFactory::with_runner(fx.config.clone(), fx.store.clone(), fx.runner.clone())
        .unwrap();
    let other = PodManager::new(fx.store.clone(), std::sync::Arc::new(factory));

    assert!(other.cancel_workflow(pod.uuid).await.unwrap());
    assert_eq!(
        fx.runner.calls().last().unwrap(),
        &format!("pause {}", workflow.run_name())
    );
}

#[tokio::test]
async fn vanished_records_are_reported_as_warnings() {
    let fx = Fixture::new().await;
    let blueprint = fx
        .blueprint(json!({ "create": { "url": fx.asset("deploy.py") } }))
        .await;
    let (pod, workflow) = created(&fx, &blueprint).await;
    let factory = AirflowEngineFactory::with_runner(fx.config.clone(), fx.store.clone(), fx.runner.clone())
        .unwrap();

    let orphan = Pod {
        blueprint: uuid::Uuid::new_v4(),
        ..pod.clone()
    };
    let err = factory.engine().initialize(&orphan, &workflow).await.unwrap_err();
    assert!(matches!(err, EngineError::Staging(_)));
    assert!(fx.messages(pod.uuid).contains(&(
        EventLevel::Warn,
        format!("Blueprint {} no longer exists", orphan.blueprint)
    )));

    let homeless = Pod {
        edgesite: uuid::Uuid::new_v4(),
        ..pod.clone()
    };
    let err = factory.engine().initialize(&homeless, &workflow).await.unwrap_err();
    assert!(matches!(err, EngineError::Staging(_)));
    assert!(fx.messages(pod.uuid).contains(&(
        EventLevel::Warn,
        format!("Edgesite {} no longer exists", homeless.edgesite)
    )));
}
