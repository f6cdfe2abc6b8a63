//! Pause and resume on the SQLite store

mod common;

use common::*;
use flowgraph::db::Database;
use flowgraph::models::ExecutionStatus;
use flowgraph::services::NoTools;
use flowgraph::store::SqliteStore;
use serde_json::json;
use std::sync::Arc;
use tempfile::TempDir;

#[tokio::test]
async fn test_pause_after_second_node_then_resume() {
    let (_dir, store) = sqlite_store().await;
    let gate = Arc::new(GatedTools::default());
    let engine = engine_on(store.clone(), gate.clone());
    let wf = four_node_chain();
    engine.register_workflow(&wf).await.unwrap();

    let (id, handle) = engine
        .spawn_workflow(&wf.id, ctx(json!({"n": 21})), Some("ops".into()), None)
        .await
        .unwrap();

    // node 2 is in flight; the pause lands at the next boundary
    gate.entered.notified().await;
    assert!(engine.pause_execution(&id).await.unwrap());
    gate.release.notify_one();

    let paused = handle.await.unwrap().unwrap();
    assert_eq!(paused.status, ExecutionStatus::Paused);
    assert_eq!(paused.current_node_id.as_deref(), Some("double"));
    assert!(paused.completed_at.is_none());

    let report = engine.get_execution_status(&id).await.unwrap();
    assert_eq!(report.path(), vec!["start", "fetch"]);
    assert_eq!(report.execution.variable("tool_name"), Some(&json!("lookup")));

    assert!(!engine.pause_execution(&id).await.unwrap());
    assert!(engine.resume_execution(&id).await.unwrap());

    let resumed = engine.get_execution_status(&id).await.unwrap();
    assert_eq!(resumed.execution.status, ExecutionStatus::Completed);
    assert_eq!(resumed.path(), vec!["start", "fetch", "double", "report"]);
    assert_eq!(resumed.execution.started_by.as_deref(), Some("ops"));

    // same final context as a run that was never paused
    let reference = engine_on(store.clone(), Arc::new(EchoTools));
    let reference_id = reference
        .start_workflow(&wf.id, ctx(json!({"n": 21})), None, None)
        .await
        .unwrap();
    let uninterrupted = reference.get_execution_status(&reference_id).await.unwrap();
    assert_eq!(
        stable_context(resumed.execution.execution_context),
        stable_context(uninterrupted.execution.execution_context)
    );

    assert!(!engine.resume_execution(&id).await.unwrap());
}

#[tokio::test]
async fn test_resume_during_in_flight_node_keeps_a_single_walker() {
    let (_dir, store) = sqlite_store().await;
    let gate = Arc::new(GatedTools::default());
    let engine = engine_on(store.clone(), gate.clone());
    let wf = four_node_chain();
    engine.register_workflow(&wf).await.unwrap();

    let (id, first) = engine
        .spawn_workflow(&wf.id, ctx(json!({"n": 21})), None, None)
        .await
        .unwrap();
    gate.entered.notified().await;
    assert!(engine.pause_execution(&id).await.unwrap());

    // resumed before the paused walker has left `fetch`
    let resumer = {
        let engine = engine.clone();
        let id = id.clone();
        tokio::spawn(async move { engine.resume_execution(&id).await })
    };
    gate.entered.notified().await;
    gate.release.notify_one();
    gate.release.notify_one();

    assert!(resumer.await.unwrap().unwrap());
    first.await.unwrap().unwrap();

    let report = engine.get_execution_status(&id).await.unwrap();
    assert_eq!(report.execution.status, ExecutionStatus::Completed);
    assert_eq!(report.path(), vec!["start", "fetch", "double", "report"]);
    assert_eq!(report.execution.generation, 1);
    assert_eq!(
        report.execution.variable("function_output"),
        Some(&json!({"final": 43, "n": 21}))
    );
}

#[tokio::test]
async fn test_paused_run_survives_reopening_database() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("engine.db");
    let wf = four_node_chain();

    let id = {
        let db = Arc::new(Database::initialize(&path, 2).await.unwrap());
        let gate = Arc::new(GatedTools::default());
        let engine = engine_on(Arc::new(SqliteStore::new(db.clone())), gate.clone());
        engine.register_workflow(&wf).await.unwrap();

        let (id, handle) = engine
            .spawn_workflow(&wf.id, ctx(json!({"n": 5})), None, None)
            .await
            .unwrap();
        gate.entered.notified().await;
        engine.pause_execution(&id).await.unwrap();
        gate.release.notify_one();
        handle.await.unwrap().unwrap();
        db.close().await;
        id
    };

    let db = Arc::new(Database::initialize(&path, 2).await.unwrap());
    let engine = engine_on(Arc::new(SqliteStore::new(db)), Arc::new(EchoTools));

    assert!(engine.resume_execution(&id).await.unwrap());
    let report = engine.get_execution_status(&id).await.unwrap();
    assert_eq!(report.execution.status, ExecutionStatus::Completed);
    assert_eq!(report.path(), vec!["start", "fetch", "double", "report"]);
    assert_eq!(
        report.execution.variable("function_output"),
        Some(&json!({"final": 11, "n": 5}))
    );
}

#[tokio::test]
async fn test_failed_run_cannot_be_resumed() {
    let (_dir, store) = sqlite_store().await;
    let engine = engine_on(store, Arc::new(NoTools));
    let wf = four_node_chain();
    engine.register_workflow(&wf).await.unwrap();

    let id = engine.start_workflow(&wf.id, ctx(json!({"n": 1})), None, None).await.unwrap();
    let report = engine.get_execution_status(&id).await.unwrap();
    assert_eq!(report.execution.status, ExecutionStatus::Failed);
    assert!(report.execution.completed_at.is_some());

    assert!(!engine.resume_execution(&id).await.unwrap());
    assert!(!engine.pause_execution(&id).await.unwrap());
    assert_eq!(engine.get_execution_status(&id).await.unwrap().node_executions.len(), 2);
}
