//! SQLite store round trips and step atomicity

mod common;

use common::*;
use flowgraph::models::{
    Context, Edge, ExecutionStatus, Node, NodeExecution, NodeType, Workflow, WorkflowExecution,
};
use flowgraph::store::{ExecutionStore, Finish};
use flowgraph::EngineError;
use serde_json::json;

fn sample_workflow() -> Workflow {
    Workflow::new("sample")
        .with_description("two nodes")
        .with_variable("greeting", "hi")
        .with_node(Node::new("start", NodeType::Start).with_name("Begin"))
        .with_node(Node::new("tool", NodeType::McpTool).with_config("args", json!({"q": "{{greeting}}"})))
        .with_edge(Edge::when("start", "tool", "greeting != ''"))
}

#[tokio::test]
async fn test_workflow_round_trip() {
    let (_dir, store) = sqlite_store().await;
    let wf = sample_workflow();

    store.save_workflow(&wf).await.unwrap();
    let loaded = store.load_workflow(&wf.id).await.unwrap();
    assert_eq!(loaded, wf);

    // saving again replaces the definition
    let renamed = Workflow {
        name: "renamed".into(),
        ..wf.clone()
    };
    store.save_workflow(&renamed).await.unwrap();
    assert_eq!(store.load_workflow(&wf.id).await.unwrap().name, "renamed");
    assert_eq!(store.workflows().list().await.unwrap().len(), 1);

    assert!(store.load_workflow("missing").await.unwrap_err().is_not_found());
}

#[tokio::test]
async fn test_execution_round_trip_and_update() {
    let (_dir, store) = sqlite_store().await;
    let wf = sample_workflow();
    store.save_workflow(&wf).await.unwrap();

    let mut execution = WorkflowExecution::new(&wf, ctx(json!({"user": {"id": 7}})))
        .with_started_by(Some("alice".into()))
        .with_chat_id(Some("chat-9".into()));
    store.create_execution(&execution).await.unwrap();

    let loaded = store.load_execution(&execution.id).await.unwrap();
    assert_eq!(loaded, execution);

    execution.current_node_id = Some("tool".into());
    execution.error_message = Some("note".into());
    execution.merge_output(&ctx(json!({"status": "started"})));
    store.save_execution(&execution).await.unwrap();

    let loaded = store.load_execution(&execution.id).await.unwrap();
    assert_eq!(loaded.current_node_id.as_deref(), Some("tool"));
    assert_eq!(loaded.variable("status"), Some(&json!("started")));
    assert_eq!(loaded.variable("greeting"), Some(&json!("hi")));
    assert_eq!(loaded.error_message.as_deref(), Some("note"));

    let listed = store.list_executions(&wf.id).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, execution.id);
}

#[tokio::test]
async fn test_execution_requires_workflow() {
    let (_dir, store) = sqlite_store().await;
    let execution = WorkflowExecution::new(&sample_workflow(), Context::new());
    let err = store.create_execution(&execution).await.unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_node_executions_listed_in_run_order() {
    let (_dir, store) = sqlite_store().await;
    let wf = sample_workflow();
    store.save_workflow(&wf).await.unwrap();
    let execution = WorkflowExecution::new(&wf, Context::new());
    store.create_execution(&execution).await.unwrap();

    for node in [&wf.nodes[0], &wf.nodes[1], &wf.nodes[0]] {
        let record = NodeExecution::start(&execution.id, node, &execution.execution_context)
            .complete(ctx(json!({"seen": node.id})));
        store.append_node_execution(&record).await.unwrap();
    }
    let failed = NodeExecution::start(&execution.id, &wf.nodes[1], &Context::new())
        .fail(&EngineError::Tool("timed out".into()));
    store.append_node_execution(&failed).await.unwrap();

    let records = store.list_node_executions(&execution.id).await.unwrap();
    let ids: Vec<&str> = records.iter().map(|r| r.node_id.as_str()).collect();
    assert_eq!(ids, vec!["start", "tool", "start", "tool"]);

    assert_eq!(records[0].node_name, "Begin");
    assert_eq!(records[1].node_type, NodeType::McpTool);
    assert_eq!(records[1].output_data, Some(ctx(json!({"seen": "tool"}))));
    assert!(records[3].is_failed());
    assert_eq!(records[3].error_message.as_deref(), Some("tool_error: timed out"));
    assert!(records[3].output_data.is_none());

    assert!(store.list_node_executions("other").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_record_step_is_atomic() {
    let (_dir, store) = sqlite_store().await;
    let wf = sample_workflow();
    store.save_workflow(&wf).await.unwrap();
    let execution = WorkflowExecution::new(&wf, Context::new());
    store.create_execution(&execution).await.unwrap();

    let record = NodeExecution::start(&execution.id, &wf.nodes[0], &Context::new()).complete(Context::new());

    // the record is valid but the execution update cannot apply
    let phantom = WorkflowExecution::new(&wf, Context::new());
    let err = store.record_step(&phantom, Some(&record), None).await.unwrap_err();
    assert!(err.is_not_found());
    assert!(store.list_node_executions(&execution.id).await.unwrap().is_empty());

    let mut progressed = execution.clone();
    progressed.current_node_id = Some("tool".into());
    progressed.merge_output(&ctx(json!({"status": "started"})));
    assert!(store.record_step(&progressed, Some(&record), None).await.unwrap());

    let loaded = store.load_execution(&execution.id).await.unwrap();
    assert_eq!(loaded.current_node_id.as_deref(), Some("tool"));
    assert_eq!(loaded.variable("status"), Some(&json!("started")));
    assert_eq!(loaded.status, ExecutionStatus::Active);
    assert_eq!(store.list_node_executions(&execution.id).await.unwrap().len(), 1);

    // the last step and the final status land together
    let last = NodeExecution::start(&execution.id, &wf.nodes[1], &loaded.execution_context)
        .complete(ctx(json!({"result": 1})));
    progressed.current_node_id = None;
    assert!(store
        .record_step(&progressed, Some(&last), Some(&Finish::completed()))
        .await
        .unwrap());

    let loaded = store.load_execution(&execution.id).await.unwrap();
    assert_eq!(loaded.status, ExecutionStatus::Completed);
    assert!(loaded.current_node_id.is_none());
    assert!(loaded.completed_at.is_some());
    assert_eq!(store.list_node_executions(&execution.id).await.unwrap().len(), 2);

    // nothing is appended once the run is terminal
    assert!(!store.record_step(&progressed, Some(&last), None).await.unwrap());
    assert_eq!(store.list_node_executions(&execution.id).await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_failed_step_records_error_and_node_together() {
    let (_dir, store) = sqlite_store().await;
    let wf = sample_workflow();
    store.save_workflow(&wf).await.unwrap();
    let mut execution = WorkflowExecution::new(&wf, Context::new());
    store.create_execution(&execution).await.unwrap();

    let err = EngineError::Tool("connection refused".into());
    let failed = NodeExecution::start(&execution.id, &wf.nodes[1], &Context::new()).fail(&err);
    execution.current_node_id = Some("tool".into());
    assert!(store
        .record_step(&execution, Some(&failed), Some(&Finish::failed(err.to_record_message())))
        .await
        .unwrap());

    let loaded = store.load_execution(&execution.id).await.unwrap();
    assert_eq!(loaded.status, ExecutionStatus::Failed);
    assert_eq!(loaded.current_node_id.as_deref(), Some("tool"));
    assert_eq!(loaded.error_message.as_deref(), Some("tool_error: connection refused"));
    assert!(loaded.completed_at.is_some());
    let records = store.list_node_executions(&execution.id).await.unwrap();
    assert_eq!(records.len(), 1);
    assert!(records[0].is_failed());
}

#[tokio::test]
async fn test_stale_generation_cannot_record() {
    let (_dir, store) = sqlite_store().await;
    let wf = sample_workflow();
    store.save_workflow(&wf).await.unwrap();
    let stale = WorkflowExecution::new(&wf, Context::new());
    store.create_execution(&stale).await.unwrap();

    store
        .transition(&stale.id, &[ExecutionStatus::Active], ExecutionStatus::Paused, None)
        .await
        .unwrap();
    assert!(store
        .transition(&stale.id, &[ExecutionStatus::Paused], ExecutionStatus::Active, None)
        .await
        .unwrap());
    let current = store.load_execution(&stale.id).await.unwrap();
    assert_eq!(current.generation, stale.generation + 1);

    let record = NodeExecution::start(&stale.id, &wf.nodes[0], &Context::new()).complete(Context::new());
    assert!(!store
        .record_step(&stale, Some(&record), Some(&Finish::completed()))
        .await
        .unwrap());

    let loaded = store.load_execution(&stale.id).await.unwrap();
    assert_eq!(loaded.status, ExecutionStatus::Active);
    assert!(loaded.completed_at.is_none());
    assert!(store.list_node_executions(&stale.id).await.unwrap().is_empty());

    assert!(store.record_step(&current, Some(&record), None).await.unwrap());
    assert_eq!(store.list_node_executions(&stale.id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_record_step_does_not_overwrite_pause() {
    let (_dir, store) = sqlite_store().await;
    let wf = sample_workflow();
    store.save_workflow(&wf).await.unwrap();
    let mut execution = WorkflowExecution::new(&wf, Context::new());
    store.create_execution(&execution).await.unwrap();

    assert!(store
        .transition(&execution.id, &[ExecutionStatus::Active], ExecutionStatus::Paused, None)
        .await
        .unwrap());

    execution.current_node_id = Some("tool".into());
    let record = NodeExecution::start(&execution.id, &wf.nodes[0], &Context::new()).complete(Context::new());
    assert!(store.record_step(&execution, Some(&record), None).await.unwrap());

    assert_eq!(store.load_execution(&execution.id).await.unwrap().status, ExecutionStatus::Paused);
}

#[tokio::test]
async fn test_transition_compare_and_set() {
    let (_dir, store) = sqlite_store().await;
    let wf = sample_workflow();
    store.save_workflow(&wf).await.unwrap();
    let execution = WorkflowExecution::new(&wf, Context::new());
    store.create_execution(&execution).await.unwrap();

    assert!(!store
        .transition(&execution.id, &[ExecutionStatus::Paused], ExecutionStatus::Active, None)
        .await
        .unwrap());
    assert!(!store.transition(&execution.id, &[], ExecutionStatus::Failed, None).await.unwrap());

    assert!(store
        .transition(
            &execution.id,
            &[ExecutionStatus::Active, ExecutionStatus::Paused],
            ExecutionStatus::Failed,
            Some("provider_error: quota"),
        )
        .await
        .unwrap());

    let loaded = store.load_execution(&execution.id).await.unwrap();
    assert_eq!(loaded.status, ExecutionStatus::Failed);
    assert_eq!(loaded.error_message.as_deref(), Some("provider_error: quota"));
    assert!(loaded.completed_at.is_some());

    // terminal: nothing moves it any more
    assert!(!store
        .transition(&execution.id, &[ExecutionStatus::Active, ExecutionStatus::Paused], ExecutionStatus::Completed, None)
        .await
        .unwrap());
    let err = store
        .transition("missing", &[ExecutionStatus::Active], ExecutionStatus::Paused, None)
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}
