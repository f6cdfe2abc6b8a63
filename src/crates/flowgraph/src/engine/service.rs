//! Engine API for callers
//!
//! Wraps the walker with workflow lookup, a bound on concurrently
//! progressing runs, and boolean pause/resume results.

use super::walker::GraphWalker;
use crate::config::ExecutionConfig;
use crate::error::{EngineError, Result};
use crate::executor::NodeExecutor;
use crate::models::{Context, NodeExecution, Workflow, WorkflowExecution};
use crate::store::ExecutionStore;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinHandle;
use tracing::debug;

/// An execution together with its node history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionReport {
    pub execution: WorkflowExecution,
    pub node_executions: Vec<NodeExecution>,
}

impl ExecutionReport {
    /// IDs of the nodes run so far, in order
    pub fn path(&self) -> Vec<&str> {
        self.node_executions.iter().map(|n| n.node_id.as_str()).collect()
    }
}

/// Workflow engine
///
/// Cheap to clone; clones share the store, the walker and the run limit.
#[derive(Clone)]
pub struct WorkflowEngine {
    store: Arc<dyn ExecutionStore>,
    walker: GraphWalker,
    permits: Arc<Semaphore>,
}

impl std::fmt::Debug for WorkflowEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkflowEngine")
            .field("walker", &self.walker)
            .field("available_permits", &self.permits.available_permits())
            .finish_non_exhaustive()
    }
}

impl WorkflowEngine {
    pub fn new(store: Arc<dyn ExecutionStore>, executor: NodeExecutor, config: &ExecutionConfig) -> Self {
        Self {
            walker: GraphWalker::new(store.clone(), executor),
            store,
            permits: Arc::new(Semaphore::new(config.max_concurrent_runs.max(1))),
        }
    }

    pub fn store(&self) -> &Arc<dyn ExecutionStore> {
        &self.store
    }

    pub fn walker(&self) -> &GraphWalker {
        &self.walker
    }

    /// Validate and save a workflow definition
    pub async fn register_workflow(&self, workflow: &Workflow) -> Result<()> {
        workflow.validate()?;
        self.store.save_workflow(workflow).await
    }

    /// Start a run and drive it until it stops; returns the execution ID
    ///
    /// Graph errors are returned before any execution is created. Node
    /// failures do not make this an `Err`: the run is stored as failed.
    pub async fn start_workflow(
        &self,
        workflow_id: &str,
        input: Context,
        started_by: Option<String>,
        chat_id: Option<String>,
    ) -> Result<String> {
        let workflow = self.store.load_workflow(workflow_id).await?;
        let _permit = self.acquire().await?;
        let execution = self.walker.start(&workflow, input, started_by, chat_id).await?;
        Ok(execution.id)
    }

    /// Create a run and drive it on a background task
    ///
    /// The execution exists in the store when this returns.
    pub async fn spawn_workflow(
        &self,
        workflow_id: &str,
        input: Context,
        started_by: Option<String>,
        chat_id: Option<String>,
    ) -> Result<(String, JoinHandle<Result<WorkflowExecution>>)> {
        let workflow = self.store.load_workflow(workflow_id).await?;
        let execution = self.walker.create(&workflow, input, started_by, chat_id).await?;
        let id = execution.id.clone();

        let engine = self.clone();
        let handle = tokio::spawn(async move {
            let _permit = engine.acquire().await?;
            engine.walker.run(execution, &workflow).await
        });

        Ok((id, handle))
    }

    /// Current state of a run and every node it has executed
    pub async fn get_execution_status(&self, execution_id: &str) -> Result<ExecutionReport> {
        let execution = self.store.load_execution(execution_id).await?;
        let node_executions = self.store.list_node_executions(execution_id).await?;
        Ok(ExecutionReport {
            execution,
            node_executions,
        })
    }

    /// Pause an active run; `false` if it is not active
    pub async fn pause_execution(&self, execution_id: &str) -> Result<bool> {
        match self.walker.pause(execution_id).await {
            Ok(_) => Ok(true),
            Err(EngineError::InvalidStateTransition { from, .. }) => {
                debug!(execution_id = %execution_id, status = %from, "Pause ignored");
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    /// Resume a paused run and drive it until it stops; `false` if it is
    /// not paused
    pub async fn resume_execution(&self, execution_id: &str) -> Result<bool> {
        let _permit = self.acquire().await?;
        match self.walker.resume(execution_id).await {
            Ok(_) => Ok(true),
            Err(EngineError::InvalidStateTransition { from, .. }) => {
                debug!(execution_id = %execution_id, status = %from, "Resume ignored");
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    /// Executions of a workflow, oldest first
    pub async fn list_executions(&self, workflow_id: &str) -> Result<Vec<WorkflowExecution>> {
        self.store.list_executions(workflow_id).await
    }

    async fn acquire(&self) -> Result<OwnedSemaphorePermit> {
        self.permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|e| EngineError::config(format!("Run limiter closed: {}", e)))
    }
}
