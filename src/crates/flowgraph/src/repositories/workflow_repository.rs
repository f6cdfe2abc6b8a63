//! Workflow repository for database operations

use super::{format_timestamp, from_json, to_json};
use crate::db::Database;
use crate::error::{EngineError, Result};
use crate::models::Workflow;
use chrono::Utc;
use sqlx::Row;
use std::sync::Arc;

/// Repository for workflow definitions
///
/// The whole definition is stored as one JSON document; `name` and
/// `description` are duplicated into columns for listing.
#[derive(Clone, Debug)]
pub struct WorkflowRepository {
    db: Arc<Database>,
}

impl WorkflowRepository {
    /// Create a new workflow repository
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Insert or replace a workflow definition
    pub async fn save(&self, workflow: &Workflow) -> Result<()> {
        sqlx::query(
            "INSERT INTO workflows (id, name, description, definition, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                description = excluded.description,
                definition = excluded.definition,
                updated_at = excluded.updated_at",
        )
        .bind(&workflow.id)
        .bind(&workflow.name)
        .bind(&workflow.description)
        .bind(to_json(workflow)?)
        .bind(format_timestamp(&workflow.created_at))
        .bind(format_timestamp(&Utc::now()))
        .execute(self.db.pool())
        .await
        .map_err(|e| EngineError::Database(format!("Failed to save workflow: {}", e)))?;

        Ok(())
    }

    /// Load a workflow by ID
    pub async fn find_by_id(&self, id: &str) -> Result<Workflow> {
        let row = sqlx::query("SELECT definition FROM workflows WHERE id = ?")
            .bind(id)
            .fetch_optional(self.db.pool())
            .await
            .map_err(|e| EngineError::Database(format!("Failed to load workflow: {}", e)))?
            .ok_or_else(|| EngineError::not_found(format!("Workflow not found: {}", id)))?;

        from_json(row.get::<String, _>("definition").as_str())
    }

    /// List `(id, name)` of all workflows, newest first
    pub async fn list(&self) -> Result<Vec<(String, String)>> {
        let rows = sqlx::query("SELECT id, name FROM workflows ORDER BY created_at DESC")
            .fetch_all(self.db.pool())
            .await
            .map_err(|e| EngineError::Database(format!("Failed to list workflows: {}", e)))?;

        Ok(rows
            .into_iter()
            .map(|row| (row.get("id"), row.get("name")))
            .collect())
    }
}
