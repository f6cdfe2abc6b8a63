//! In-process store

use super::{ExecutionStore, Finish};
use crate::error::{EngineError, Result};
use crate::models::{ExecutionStatus, NodeExecution, Workflow, WorkflowExecution};
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use std::collections::HashMap;

#[derive(Debug, Default)]
struct State {
    workflows: HashMap<String, Workflow>,
    executions: HashMap<String, WorkflowExecution>,
    node_executions: HashMap<String, Vec<NodeExecution>>,
}

/// [`ExecutionStore`] kept in memory behind a single lock
///
/// One lock over all three maps keeps `record_step` atomic.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn execution_not_found(id: &str) -> EngineError {
    EngineError::not_found(format!("Execution not found: {}", id))
}

#[async_trait]
impl ExecutionStore for MemoryStore {
    async fn save_workflow(&self, workflow: &Workflow) -> Result<()> {
        self.state
            .write()
            .workflows
            .insert(workflow.id.clone(), workflow.clone());
        Ok(())
    }

    async fn load_workflow(&self, id: &str) -> Result<Workflow> {
        self.state
            .read()
            .workflows
            .get(id)
            .cloned()
            .ok_or_else(|| EngineError::not_found(format!("Workflow not found: {}", id)))
    }

    async fn create_execution(&self, execution: &WorkflowExecution) -> Result<()> {
        let mut state = self.state.write();
        if !state.workflows.contains_key(&execution.workflow_id) {
            return Err(EngineError::not_found(format!(
                "Workflow not found: {}",
                execution.workflow_id
            )));
        }
        if state.executions.contains_key(&execution.id) {
            return Err(EngineError::Database(format!(
                "Execution already exists: {}",
                execution.id
            )));
        }
        state.executions.insert(execution.id.clone(), execution.clone());
        Ok(())
    }

    async fn save_execution(&self, execution: &WorkflowExecution) -> Result<()> {
        let mut state = self.state.write();
        let stored = state
            .executions
            .get_mut(&execution.id)
            .ok_or_else(|| execution_not_found(&execution.id))?;
        *stored = execution.clone();
        Ok(())
    }

    async fn load_execution(&self, id: &str) -> Result<WorkflowExecution> {
        self.state
            .read()
            .executions
            .get(id)
            .cloned()
            .ok_or_else(|| execution_not_found(id))
    }

    async fn append_node_execution(&self, record: &NodeExecution) -> Result<()> {
        let mut state = self.state.write();
        if !state.executions.contains_key(&record.workflow_execution_id) {
            return Err(execution_not_found(&record.workflow_execution_id));
        }
        state
            .node_executions
            .entry(record.workflow_execution_id.clone())
            .or_default()
            .push(record.clone());
        Ok(())
    }

    async fn list_node_executions(&self, execution_id: &str) -> Result<Vec<NodeExecution>> {
        Ok(self
            .state
            .read()
            .node_executions
            .get(execution_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn record_step(
        &self,
        execution: &WorkflowExecution,
        record: Option<&NodeExecution>,
        finish: Option<&Finish>,
    ) -> Result<bool> {
        let mut state = self.state.write();
        let stored = state
            .executions
            .get_mut(&execution.id)
            .ok_or_else(|| execution_not_found(&execution.id))?;
        if stored.generation != execution.generation || stored.status.is_terminal() {
            return Ok(false);
        }

        stored.execution_context = execution.execution_context.clone();
        stored.current_node_id = execution.current_node_id.clone();
        if let Some(finish) = finish {
            stored.status = finish.status;
            if let Some(message) = &finish.error_message {
                stored.error_message = Some(message.clone());
            }
            stored.completed_at = Some(Utc::now());
        }

        if let Some(record) = record {
            state
                .node_executions
                .entry(execution.id.clone())
                .or_default()
                .push(record.clone());
        }
        Ok(true)
    }

    async fn transition(
        &self,
        execution_id: &str,
        from: &[ExecutionStatus],
        to: ExecutionStatus,
        error_message: Option<&str>,
    ) -> Result<bool> {
        let mut state = self.state.write();
        let stored = state
            .executions
            .get_mut(execution_id)
            .ok_or_else(|| execution_not_found(execution_id))?;

        if !from.contains(&stored.status) {
            return Ok(false);
        }
        stored.status = to;
        if to == ExecutionStatus::Active {
            stored.generation = stored.generation.wrapping_add(1);
        }
        if let Some(message) = error_message {
            stored.error_message = Some(message.to_string());
        }
        if to.is_terminal() {
            stored.completed_at = Some(Utc::now());
        }
        Ok(true)
    }

    async fn list_executions(&self, workflow_id: &str) -> Result<Vec<WorkflowExecution>> {
        let mut executions: Vec<WorkflowExecution> = self
            .state
            .read()
            .executions
            .values()
            .filter(|e| e.workflow_id == workflow_id)
            .cloned()
            .collect();
        executions.sort_by(|a, b| a.started_at.cmp(&b.started_at).then_with(|| a.id.cmp(&b.id)));
        Ok(executions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Context, Node, NodeType};

    fn workflow() -> Workflow {
        Workflow::new("wf").with_node(Node::new("start", NodeType::Start))
    }

    #[tokio::test]
    async fn test_execution_requires_saved_workflow() {
        let store = MemoryStore::new();
        let wf = workflow();
        let execution = WorkflowExecution::new(&wf, Context::new());

        let err = store.create_execution(&execution).await.unwrap_err();
        assert!(err.is_not_found());

        store.save_workflow(&wf).await.unwrap();
        store.create_execution(&execution).await.unwrap();
        assert_eq!(store.load_execution(&execution.id).await.unwrap(), execution);
    }

    #[tokio::test]
    async fn test_transition_is_compare_and_set() {
        let store = MemoryStore::new();
        let wf = workflow();
        store.save_workflow(&wf).await.unwrap();
        let execution = WorkflowExecution::new(&wf, Context::new());
        store.create_execution(&execution).await.unwrap();

        assert!(store
            .transition(&execution.id, &[ExecutionStatus::Active], ExecutionStatus::Paused, None)
            .await
            .unwrap());
        assert!(!store
            .transition(&execution.id, &[ExecutionStatus::Active], ExecutionStatus::Completed, None)
            .await
            .unwrap());

        assert!(store
            .transition(
                &execution.id,
                &[ExecutionStatus::Active, ExecutionStatus::Paused],
                ExecutionStatus::Failed,
                Some("tool_error: boom"),
            )
            .await
            .unwrap());

        let stored = store.load_execution(&execution.id).await.unwrap();
        assert_eq!(stored.status, ExecutionStatus::Failed);
        assert_eq!(stored.error_message.as_deref(), Some("tool_error: boom"));
        assert!(stored.completed_at.is_some());
    }

    #[tokio::test]
    async fn test_record_step_keeps_status() {
        let store = MemoryStore::new();
        let wf = workflow();
        store.save_workflow(&wf).await.unwrap();
        let mut execution = WorkflowExecution::new(&wf, Context::new());
        store.create_execution(&execution).await.unwrap();
        store
            .transition(&execution.id, &[ExecutionStatus::Active], ExecutionStatus::Paused, None)
            .await
            .unwrap();

        // the walker's copy still says active
        execution.current_node_id = Some("next".into());
        execution.execution_context.insert("k".into(), serde_json::json!(1));
        let record = NodeExecution::start(&execution.id, &wf.nodes[0], &Context::new()).complete(Context::new());
        assert!(store.record_step(&execution, Some(&record), None).await.unwrap());

        let stored = store.load_execution(&execution.id).await.unwrap();
        assert_eq!(stored.status, ExecutionStatus::Paused);
        assert_eq!(stored.current_node_id.as_deref(), Some("next"));
        assert_eq!(stored.variable("k"), Some(&serde_json::json!(1)));
        assert_eq!(store.list_node_executions(&execution.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_resume_retires_previous_generation() {
        let store = MemoryStore::new();
        let wf = workflow();
        store.save_workflow(&wf).await.unwrap();
        let mut stale = WorkflowExecution::new(&wf, Context::new());
        store.create_execution(&stale).await.unwrap();

        store
            .transition(&stale.id, &[ExecutionStatus::Active], ExecutionStatus::Paused, None)
            .await
            .unwrap();
        store
            .transition(&stale.id, &[ExecutionStatus::Paused], ExecutionStatus::Active, None)
            .await
            .unwrap();
        let current = store.load_execution(&stale.id).await.unwrap();
        assert_eq!(current.generation, 1);

        stale.current_node_id = Some("elsewhere".into());
        let record = NodeExecution::start(&stale.id, &wf.nodes[0], &Context::new()).complete(Context::new());
        assert!(!store
            .record_step(&stale, Some(&record), Some(&Finish::completed()))
            .await
            .unwrap());

        let stored = store.load_execution(&stale.id).await.unwrap();
        assert_eq!(stored.status, ExecutionStatus::Active);
        assert!(stored.current_node_id.is_none());
        assert!(store.list_node_executions(&stale.id).await.unwrap().is_empty());

        assert!(store
            .record_step(&current, Some(&record), Some(&Finish::completed()))
            .await
            .unwrap());
        let stored = store.load_execution(&stale.id).await.unwrap();
        assert_eq!(stored.status, ExecutionStatus::Completed);
        assert!(stored.completed_at.is_some());
    }

    #[tokio::test]
    async fn test_record_step_with_failure_finish() {
        let store = MemoryStore::new();
        let wf = workflow();
        store.save_workflow(&wf).await.unwrap();
        let execution = WorkflowExecution::new(&wf, Context::new());
        store.create_execution(&execution).await.unwrap();

        assert!(store
            .record_step(&execution, None, Some(&Finish::failed("graph_error: missing node")))
            .await
            .unwrap());
        let stored = store.load_execution(&execution.id).await.unwrap();
        assert_eq!(stored.status, ExecutionStatus::Failed);
        assert_eq!(stored.error_message.as_deref(), Some("graph_error: missing node"));

        // terminal runs accept no further steps
        assert!(!store.record_step(&execution, None, None).await.unwrap());
    }
}
