//! Workflow execution repository

use super::{format_timestamp, from_json, parse_timestamp, to_json};
use crate::db::Database;
use crate::error::{EngineError, Result};
use crate::models::{ExecutionStatus, WorkflowExecution};
use crate::store::Finish;
use chrono::Utc;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};
use std::sync::Arc;

const COLUMNS: &str = "id, workflow_id, status, input_data, execution_context, current_node_id,
    generation, started_by, chat_id, error_message, started_at, completed_at";

/// Repository for workflow execution records
#[derive(Clone, Debug)]
pub struct ExecutionRepository {
    db: Arc<Database>,
}

impl ExecutionRepository {
    /// Create a new execution repository
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Insert a new execution
    pub async fn create(&self, execution: &WorkflowExecution) -> Result<()> {
        sqlx::query(&format!(
            "INSERT INTO workflow_executions ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            COLUMNS
        ))
        .bind(&execution.id)
        .bind(&execution.workflow_id)
        .bind(execution.status.as_str())
        .bind(to_json(&execution.input_data)?)
        .bind(to_json(&execution.execution_context)?)
        .bind(&execution.current_node_id)
        .bind(i64::from(execution.generation))
        .bind(&execution.started_by)
        .bind(&execution.chat_id)
        .bind(&execution.error_message)
        .bind(format_timestamp(&execution.started_at))
        .bind(execution.completed_at.as_ref().map(format_timestamp))
        .execute(self.db.pool())
        .await
        .map_err(|e| EngineError::Database(format!("Failed to create execution: {}", e)))?;

        Ok(())
    }

    /// Overwrite every mutable field of an execution
    pub async fn update(&self, execution: &WorkflowExecution) -> Result<()> {
        let result = sqlx::query(
            "UPDATE workflow_executions
             SET status = ?, execution_context = ?, current_node_id = ?, generation = ?,
                 error_message = ?, completed_at = ?
             WHERE id = ?",
        )
        .bind(execution.status.as_str())
        .bind(to_json(&execution.execution_context)?)
        .bind(&execution.current_node_id)
        .bind(i64::from(execution.generation))
        .bind(&execution.error_message)
        .bind(execution.completed_at.as_ref().map(format_timestamp))
        .bind(&execution.id)
        .execute(self.db.pool())
        .await
        .map_err(|e| EngineError::Database(format!("Failed to update execution: {}", e)))?;

        if result.rows_affected() == 0 {
            return Err(EngineError::not_found(format!("Execution not found: {}", execution.id)));
        }
        Ok(())
    }

    /// Persist the progress of one step, plus its terminal status if any
    ///
    /// Only applies while the row is active or paused and still at
    /// `execution.generation`. Returns whether a row changed.
    pub(crate) async fn apply_step(
        conn: &mut SqliteConnection,
        execution: &WorkflowExecution,
        finish: Option<&Finish>,
    ) -> Result<bool> {
        let status = finish.map(|f| f.status.as_str());
        let error_message = finish.and_then(|f| f.error_message.as_deref());
        let completed_at = finish.map(|_| format_timestamp(&Utc::now()));

        let result = sqlx::query(
            "UPDATE workflow_executions
             SET execution_context = ?, current_node_id = ?,
                 status = COALESCE(?, status),
                 error_message = COALESCE(?, error_message),
                 completed_at = COALESCE(?, completed_at)
             WHERE id = ? AND generation = ? AND status IN ('active', 'paused')",
        )
        .bind(to_json(&execution.execution_context)?)
        .bind(&execution.current_node_id)
        .bind(status)
        .bind(error_message)
        .bind(completed_at)
        .bind(&execution.id)
        .bind(i64::from(execution.generation))
        .execute(&mut *conn)
        .await
        .map_err(|e| EngineError::Database(format!("Failed to record step: {}", e)))?;

        Ok(result.rows_affected() > 0)
    }

    /// Change status only if the current status is one of `from`
    ///
    /// Returns whether a row changed. Terminal targets stamp `completed_at`;
    /// moving to active bumps `generation`.
    pub async fn transition(
        &self,
        id: &str,
        from: &[ExecutionStatus],
        to: ExecutionStatus,
        error_message: Option<&str>,
    ) -> Result<bool> {
        if from.is_empty() {
            return Ok(false);
        }

        let placeholders = vec!["?"; from.len()].join(", ");
        let sql = format!(
            "UPDATE workflow_executions
             SET status = ?, error_message = COALESCE(?, error_message), completed_at = ?,
                 generation = generation + ?
             WHERE id = ? AND status IN ({})",
            placeholders
        );
        let completed_at = to.is_terminal().then(|| format_timestamp(&Utc::now()));
        let bump = i64::from(to == ExecutionStatus::Active);

        let mut query = sqlx::query(&sql)
            .bind(to.as_str())
            .bind(error_message)
            .bind(completed_at)
            .bind(bump)
            .bind(id);
        for status in from {
            query = query.bind(status.as_str());
        }

        let result = query
            .execute(self.db.pool())
            .await
            .map_err(|e| EngineError::Database(format!("Failed to update execution status: {}", e)))?;

        Ok(result.rows_affected() > 0)
    }

    /// Load an execution by ID
    pub async fn find_by_id(&self, id: &str) -> Result<WorkflowExecution> {
        let row = sqlx::query(&format!("SELECT {} FROM workflow_executions WHERE id = ?", COLUMNS))
            .bind(id)
            .fetch_optional(self.db.pool())
            .await
            .map_err(|e| EngineError::Database(format!("Failed to load execution: {}", e)))?
            .ok_or_else(|| EngineError::not_found(format!("Execution not found: {}", id)))?;

        Self::from_row(&row)
    }

    /// Executions of one workflow, oldest first
    pub async fn list_by_workflow(&self, workflow_id: &str) -> Result<Vec<WorkflowExecution>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM workflow_executions WHERE workflow_id = ? ORDER BY started_at, rowid",
            COLUMNS
        ))
        .bind(workflow_id)
        .fetch_all(self.db.pool())
        .await
        .map_err(|e| EngineError::Database(format!("Failed to list executions: {}", e)))?;

        rows.iter().map(Self::from_row).collect()
    }

    fn from_row(row: &SqliteRow) -> Result<WorkflowExecution> {
        let status: String = row.get("status");
        let input_data: String = row.get("input_data");
        let context: String = row.get("execution_context");
        let started_at: String = row.get("started_at");
        let completed_at: Option<String> = row.get("completed_at");
        let generation: i64 = row.get("generation");

        Ok(WorkflowExecution {
            id: row.get("id"),
            workflow_id: row.get("workflow_id"),
            status: status.parse()?,
            input_data: from_json(&input_data)?,
            execution_context: from_json(&context)?,
            current_node_id: row.get("current_node_id"),
            generation: u32::try_from(generation)
                .map_err(|_| EngineError::Database(format!("Invalid execution generation: {}", generation)))?,
            started_by: row.get("started_by"),
            chat_id: row.get("chat_id"),
            error_message: row.get("error_message"),
            started_at: parse_timestamp(&started_at)?,
            completed_at: completed_at.as_deref().map(parse_timestamp).transpose()?,
        })
    }
}
