//! SQLite-backed store

use super::{ExecutionStore, Finish};
use crate::db::Database;
use crate::error::{EngineError, Result};
use crate::models::{ExecutionStatus, NodeExecution, Workflow, WorkflowExecution};
use crate::repositories::{ExecutionRepository, NodeExecutionRepository, WorkflowRepository};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

/// [`ExecutionStore`] over the repositories
#[derive(Clone, Debug)]
pub struct SqliteStore {
    db: Arc<Database>,
    workflows: WorkflowRepository,
    executions: ExecutionRepository,
    node_executions: NodeExecutionRepository,
}

impl SqliteStore {
    /// Wrap an already migrated database
    pub fn new(db: Arc<Database>) -> Self {
        Self {
            workflows: WorkflowRepository::new(db.clone()),
            executions: ExecutionRepository::new(db.clone()),
            node_executions: NodeExecutionRepository::new(db.clone()),
            db,
        }
    }

    pub fn database(&self) -> &Arc<Database> {
        &self.db
    }

    /// Workflow repository, for listing definitions
    pub fn workflows(&self) -> &WorkflowRepository {
        &self.workflows
    }
}

#[async_trait]
impl ExecutionStore for SqliteStore {
    async fn save_workflow(&self, workflow: &Workflow) -> Result<()> {
        self.workflows.save(workflow).await
    }

    async fn load_workflow(&self, id: &str) -> Result<Workflow> {
        self.workflows.find_by_id(id).await
    }

    async fn create_execution(&self, execution: &WorkflowExecution) -> Result<()> {
        // surface a readable NotFound instead of a foreign key violation
        self.workflows.find_by_id(&execution.workflow_id).await?;
        self.executions.create(execution).await
    }

    async fn save_execution(&self, execution: &WorkflowExecution) -> Result<()> {
        self.executions.update(execution).await
    }

    async fn load_execution(&self, id: &str) -> Result<WorkflowExecution> {
        self.executions.find_by_id(id).await
    }

    async fn append_node_execution(&self, record: &NodeExecution) -> Result<()> {
        self.node_executions.append(record).await
    }

    async fn list_node_executions(&self, execution_id: &str) -> Result<Vec<NodeExecution>> {
        self.node_executions.list_by_execution(execution_id).await
    }

    async fn record_step(
        &self,
        execution: &WorkflowExecution,
        record: Option<&NodeExecution>,
        finish: Option<&Finish>,
    ) -> Result<bool> {
        let mut tx = self
            .db
            .pool()
            .begin()
            .await
            .map_err(|e| EngineError::Database(format!("Failed to begin transaction: {}", e)))?;

        if !ExecutionRepository::apply_step(&mut tx, execution, finish).await? {
            tx.rollback()
                .await
                .map_err(|e| EngineError::Database(format!("Failed to roll back step: {}", e)))?;
            // distinguish "no longer ours" from "no such execution"
            self.executions.find_by_id(&execution.id).await?;
            debug!(
                execution_id = %execution.id,
                generation = execution.generation,
                "Step discarded, execution moved on"
            );
            return Ok(false);
        }
        if let Some(record) = record {
            NodeExecutionRepository::insert(&mut tx, record).await?;
        }

        tx.commit()
            .await
            .map_err(|e| EngineError::Database(format!("Failed to commit step: {}", e)))?;

        debug!(
            execution_id = %execution.id,
            node_id = ?record.map(|r| r.node_id.as_str()),
            finished = ?finish.map(|f| f.status),
            "Step persisted"
        );
        Ok(true)
    }

    async fn transition(
        &self,
        execution_id: &str,
        from: &[ExecutionStatus],
        to: ExecutionStatus,
        error_message: Option<&str>,
    ) -> Result<bool> {
        let changed = self
            .executions
            .transition(execution_id, from, to, error_message)
            .await?;
        if !changed {
            // distinguish "wrong state" from "no such execution"
            self.executions.find_by_id(execution_id).await?;
        }
        Ok(changed)
    }

    async fn list_executions(&self, workflow_id: &str) -> Result<Vec<WorkflowExecution>> {
        self.executions.list_by_workflow(workflow_id).await
    }
}
