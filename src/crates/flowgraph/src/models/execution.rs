//! Workflow execution record

use crate::error::{EngineError, Result};
use crate::models::workflow::{Context, Workflow};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Execution status
///
/// `Active` and `Paused` may move between each other. `Completed` and
/// `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStatus {
    Active,
    Paused,
    Completed,
    Failed,
}

impl ExecutionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Paused => "paused",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    /// True for `Completed` and `Failed`
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl std::fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for ExecutionStatus {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "active" => Ok(Self::Active),
            "paused" => Ok(Self::Paused),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            other => Err(EngineError::Database(format!(
                "Unknown execution status: {}",
                other
            ))),
        }
    }
}

/// One run of a workflow
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowExecution {
    /// Unique execution identifier
    pub id: String,

    /// Workflow being executed
    pub workflow_id: String,

    /// Current status
    pub status: ExecutionStatus,

    /// Input supplied by the caller
    pub input_data: Context,

    /// Accumulated variable state
    pub execution_context: Context,

    /// Node to run next; `None` before the first step means the start node
    pub current_node_id: Option<String>,

    /// Bumped on every resume. Only the walker holding the current
    /// generation may persist steps.
    #[serde(default)]
    pub generation: u32,

    /// Who started the run
    pub started_by: Option<String>,

    /// Optional chat session correlation
    pub chat_id: Option<String>,

    /// Error summary when failed
    pub error_message: Option<String>,

    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl WorkflowExecution {
    /// Create an active execution for a workflow
    ///
    /// The context starts as the workflow variables, then input keys
    /// override them.
    pub fn new(workflow: &Workflow, input: Context) -> Self {
        let mut context = workflow.variables.clone();
        for (key, value) in &input {
            context.insert(key.clone(), value.clone());
        }

        Self {
            id: Uuid::new_v4().to_string(),
            workflow_id: workflow.id.clone(),
            status: ExecutionStatus::Active,
            input_data: input,
            execution_context: context,
            current_node_id: None,
            generation: 0,
            started_by: None,
            chat_id: None,
            error_message: None,
            started_at: Utc::now(),
            completed_at: None,
        }
    }

    /// Builder method to set the initiating user
    pub fn with_started_by(mut self, started_by: Option<String>) -> Self {
        self.started_by = started_by;
        self
    }

    /// Builder method to set the chat correlation ID
    pub fn with_chat_id(mut self, chat_id: Option<String>) -> Self {
        self.chat_id = chat_id;
        self
    }

    /// Shallow-merge a node's output into the context
    pub fn merge_output(&mut self, output: &Context) {
        for (key, value) in output {
            self.execution_context.insert(key.clone(), value.clone());
        }
    }

    /// Look up a context variable
    pub fn variable(&self, key: &str) -> Option<&Value> {
        self.execution_context.get(key)
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}
