//! Node executors
//!
//! One handler per node type. Each takes the node's config and the current
//! execution context and returns an output mapping that the walker merges
//! into the context. Errors returned here are fatal to the run, except for
//! `condition` and `function` nodes, which report failures in their output.

mod chat;
mod logic;
mod retrieval;
mod tool;

use crate::error::{EngineError, Result};
use crate::models::{Context, Node, NodeType};
use crate::services::{CompletionProvider, Retriever, ToolInvoker};
use chrono::Utc;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::debug;

/// Dispatches nodes to their type-specific handler
#[derive(Clone)]
pub struct NodeExecutor {
    completion: Arc<dyn CompletionProvider>,
    retriever: Arc<dyn Retriever>,
    tools: Arc<dyn ToolInvoker>,
}

impl std::fmt::Debug for NodeExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeExecutor").finish_non_exhaustive()
    }
}

impl NodeExecutor {
    /// Create an executor over the given collaborators
    pub fn new(
        completion: Arc<dyn CompletionProvider>,
        retriever: Arc<dyn Retriever>,
        tools: Arc<dyn ToolInvoker>,
    ) -> Self {
        Self {
            completion,
            retriever,
            tools,
        }
    }

    /// Run one node against a context snapshot
    pub async fn execute(&self, node: &Node, context: &Context) -> Result<Context> {
        debug!(node_id = %node.id, node_type = %node.node_type, "Executing node");

        match node.node_type {
            NodeType::Start => Ok(marker("started")),
            NodeType::End => Ok(marker("completed")),
            NodeType::AiChat => chat::execute(self.completion.as_ref(), &node.config, context).await,
            NodeType::KnowledgeRetrieval => {
                retrieval::execute(self.retriever.as_ref(), &node.config, context).await
            }
            NodeType::Condition => Ok(logic::condition(&node.config, context)),
            NodeType::McpTool => tool::execute(self.tools.as_ref(), &node.config, context).await,
            NodeType::Function => Ok(logic::function(&node.config, context)),
            NodeType::Unsupported => Err(EngineError::config(format!(
                "Node '{}' has an unsupported type",
                node.id
            ))),
        }
    }
}

/// Status/timestamp marker returned by start and end nodes
fn marker(status: &str) -> Context {
    let mut output = Map::new();
    output.insert("status".into(), Value::String(status.to_string()));
    output.insert("timestamp".into(), Value::String(Utc::now().to_rfc3339()));
    output
}

/// String-valued config entry
fn config_str<'a>(config: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    config.get(key).and_then(Value::as_str)
}
