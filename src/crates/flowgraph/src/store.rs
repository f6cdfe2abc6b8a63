//! Execution store
//!
//! Persistence boundary for workflows, executions and node executions.
//! Pause and resume go through [`ExecutionStore::transition`], a
//! compare-and-set, so a `pause` issued while a walker is mid-step is never
//! overwritten by that walker's next write. Walkers persist through
//! [`ExecutionStore::record_step`], which only applies while the walker
//! still holds the execution's generation.

mod memory;
mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use crate::error::Result;
use crate::models::{ExecutionStatus, NodeExecution, Workflow, WorkflowExecution};
use async_trait::async_trait;

/// Terminal status written in the same transaction as a step
#[derive(Debug, Clone, PartialEq)]
pub struct Finish {
    pub status: ExecutionStatus,
    pub error_message: Option<String>,
}

impl Finish {
    pub fn completed() -> Self {
        Self {
            status: ExecutionStatus::Completed,
            error_message: None,
        }
    }

    pub fn failed(error_message: impl Into<String>) -> Self {
        Self {
            status: ExecutionStatus::Failed,
            error_message: Some(error_message.into()),
        }
    }
}

/// Storage for workflow definitions and run state
#[async_trait]
pub trait ExecutionStore: Send + Sync {
    /// Insert or replace a workflow definition
    async fn save_workflow(&self, workflow: &Workflow) -> Result<()>;

    /// Load a workflow; `NotFound` if absent
    async fn load_workflow(&self, id: &str) -> Result<Workflow>;

    /// Persist a new execution; its workflow must already be saved
    async fn create_execution(&self, execution: &WorkflowExecution) -> Result<()>;

    /// Overwrite every mutable field of an existing execution
    async fn save_execution(&self, execution: &WorkflowExecution) -> Result<()>;

    /// Load an execution; `NotFound` if absent
    async fn load_execution(&self, id: &str) -> Result<WorkflowExecution>;

    /// Append one node execution record
    async fn append_node_execution(&self, record: &NodeExecution) -> Result<()>;

    /// Node executions of a run in the order they ran
    async fn list_node_executions(&self, execution_id: &str) -> Result<Vec<NodeExecution>>;

    /// Atomically append `record`, store the execution's context and
    /// `current_node_id`, and apply `finish` if given
    ///
    /// Applies only while the stored execution is active or paused and its
    /// generation equals `execution.generation`. Otherwise nothing is
    /// written and `false` is returned. Status is only written through
    /// `finish`, which also stamps `completed_at`.
    async fn record_step(
        &self,
        execution: &WorkflowExecution,
        record: Option<&NodeExecution>,
        finish: Option<&Finish>,
    ) -> Result<bool>;

    /// Set status to `to` if it is currently one of `from`
    ///
    /// Returns `false` when the execution was in some other state. Terminal
    /// targets stamp `completed_at`; `error_message` is kept when `None`.
    /// Moving to `Active` bumps the generation, which retires any walker
    /// still running against the old one.
    async fn transition(
        &self,
        execution_id: &str,
        from: &[ExecutionStatus],
        to: ExecutionStatus,
        error_message: Option<&str>,
    ) -> Result<bool>;

    /// Executions of a workflow, oldest first
    async fn list_executions(&self, workflow_id: &str) -> Result<Vec<WorkflowExecution>>;
}
