//! Per-node audit record

use crate::error::{EngineError, Result};
use crate::models::workflow::{Context, Node, NodeType};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use uuid::Uuid;

/// Outcome of a single node run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeExecutionStatus {
    Completed,
    Failed,
}

impl NodeExecutionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl std::fmt::Display for NodeExecutionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for NodeExecutionStatus {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            other => Err(EngineError::Database(format!(
                "Unknown node execution status: {}",
                other
            ))),
        }
    }
}

/// Record of one node run inside a workflow execution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeExecution {
    pub id: String,
    pub workflow_execution_id: String,
    pub node_id: String,
    pub node_type: NodeType,
    pub node_name: String,

    /// Snapshot of the context at node start
    pub input_data: Context,

    /// Node output, absent on failure
    pub output_data: Option<Context>,

    pub status: NodeExecutionStatus,
    pub error_message: Option<String>,
    pub execution_time_ms: u64,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}

impl NodeExecution {
    /// Begin timing a node run
    pub fn start(execution_id: &str, node: &Node, input: &Context) -> NodeRun {
        NodeRun {
            id: Uuid::new_v4().to_string(),
            workflow_execution_id: execution_id.to_string(),
            node_id: node.id.clone(),
            node_type: node.node_type,
            node_name: node.name.clone(),
            input_data: input.clone(),
            started_at: Utc::now(),
            timer: Instant::now(),
        }
    }

    pub fn is_failed(&self) -> bool {
        self.status == NodeExecutionStatus::Failed
    }
}

/// In-flight node run; finalized into a [`NodeExecution`]
#[derive(Debug)]
pub struct NodeRun {
    id: String,
    workflow_execution_id: String,
    node_id: String,
    node_type: NodeType,
    node_name: String,
    input_data: Context,
    started_at: DateTime<Utc>,
    timer: Instant,
}

impl NodeRun {
    /// Finish successfully with the node's output
    pub fn complete(self, output: Context) -> NodeExecution {
        self.finish(NodeExecutionStatus::Completed, Some(output), None)
    }

    /// Finish with an error
    pub fn fail(self, error: &EngineError) -> NodeExecution {
        self.finish(
            NodeExecutionStatus::Failed,
            None,
            Some(error.to_record_message()),
        )
    }

    fn finish(
        self,
        status: NodeExecutionStatus,
        output_data: Option<Context>,
        error_message: Option<String>,
    ) -> NodeExecution {
        let elapsed = self.timer.elapsed().as_millis();
        NodeExecution {
            id: self.id,
            workflow_execution_id: self.workflow_execution_id,
            node_id: self.node_id,
            node_type: self.node_type,
            node_name: self.node_name,
            input_data: self.input_data,
            output_data,
            status,
            error_message,
            execution_time_ms: u64::try_from(elapsed).unwrap_or(u64::MAX),
            started_at: self.started_at,
            completed_at: Utc::now(),
        }
    }
}
