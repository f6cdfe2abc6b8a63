//! Node execution repository
//!
//! Node executions are append-only: there is no update path.

use super::{format_timestamp, from_json, parse_timestamp, to_json};
use crate::db::Database;
use crate::error::{EngineError, Result};
use crate::models::NodeExecution;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};
use std::sync::Arc;

/// Repository for node execution records
#[derive(Clone, Debug)]
pub struct NodeExecutionRepository {
    db: Arc<Database>,
}

impl NodeExecutionRepository {
    /// Create a new node execution repository
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Append a record
    pub async fn append(&self, record: &NodeExecution) -> Result<()> {
        let mut conn = self
            .db
            .pool()
            .acquire()
            .await
            .map_err(|e| EngineError::Database(format!("Failed to acquire connection: {}", e)))?;
        Self::insert(&mut conn, record).await
    }

    pub(crate) async fn insert(conn: &mut SqliteConnection, record: &NodeExecution) -> Result<()> {
        let output = record.output_data.as_ref().map(to_json).transpose()?;
        let elapsed = i64::try_from(record.execution_time_ms).unwrap_or(i64::MAX);

        sqlx::query(
            "INSERT INTO node_executions (id, workflow_execution_id, node_id, node_type, node_name,
                input_data, output_data, status, error_message, execution_time_ms, started_at, completed_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&record.id)
        .bind(&record.workflow_execution_id)
        .bind(&record.node_id)
        .bind(record.node_type.as_str())
        .bind(&record.node_name)
        .bind(to_json(&record.input_data)?)
        .bind(output)
        .bind(record.status.as_str())
        .bind(&record.error_message)
        .bind(elapsed)
        .bind(format_timestamp(&record.started_at))
        .bind(format_timestamp(&record.completed_at))
        .execute(&mut *conn)
        .await
        .map_err(|e| EngineError::Database(format!("Failed to append node execution: {}", e)))?;

        Ok(())
    }

    /// Records of one execution in the order they ran
    pub async fn list_by_execution(&self, execution_id: &str) -> Result<Vec<NodeExecution>> {
        let rows = sqlx::query(
            "SELECT id, workflow_execution_id, node_id, node_type, node_name, input_data,
                    output_data, status, error_message, execution_time_ms, started_at, completed_at
             FROM node_executions
             WHERE workflow_execution_id = ?
             ORDER BY started_at, rowid",
        )
        .bind(execution_id)
        .fetch_all(self.db.pool())
        .await
        .map_err(|e| EngineError::Database(format!("Failed to list node executions: {}", e)))?;

        rows.iter().map(Self::from_row).collect()
    }

    fn from_row(row: &SqliteRow) -> Result<NodeExecution> {
        let node_type: String = row.get("node_type");
        let status: String = row.get("status");
        let input_data: String = row.get("input_data");
        let output_data: Option<String> = row.get("output_data");
        let elapsed: i64 = row.get("execution_time_ms");
        let started_at: String = row.get("started_at");
        let completed_at: String = row.get("completed_at");

        Ok(NodeExecution {
            id: row.get("id"),
            workflow_execution_id: row.get("workflow_execution_id"),
            node_id: row.get("node_id"),
            node_type: node_type.parse()?,
            node_name: row.get("node_name"),
            input_data: from_json(&input_data)?,
            output_data: output_data.as_deref().map(from_json).transpose()?,
            status: status.parse()?,
            error_message: row.get("error_message"),
            execution_time_ms: u64::try_from(elapsed).unwrap_or_default(),
            started_at: parse_timestamp(&started_at)?,
            completed_at: parse_timestamp(&completed_at)?,
        })
    }
}
