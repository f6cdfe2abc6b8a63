//! External collaborators consumed by node executors
//!
//! The engine never talks to a network or model directly. Completion,
//! retrieval and tool invocation sit behind these traits so the walker can
//! run against real clients or in-process fakes.

use crate::error::{EngineError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Model selection passed to a completion provider
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Model name; `None` lets the provider pick its default
    pub name: Option<String>,

    /// Provider-specific parameters (temperature, max_tokens, ...)
    #[serde(default)]
    pub parameters: Map<String, Value>,
}

impl ModelConfig {
    /// Build from a node's `model` config entry
    ///
    /// Accepts either a bare model name or an object with a `name` field
    /// plus arbitrary parameters.
    pub fn from_value(value: Option<&Value>) -> Self {
        match value {
            Some(Value::String(name)) => Self {
                name: Some(name.clone()),
                parameters: Map::new(),
            },
            Some(Value::Object(map)) => {
                let mut parameters = map.clone();
                let name = match parameters.remove("name") {
                    Some(Value::String(name)) => Some(name),
                    _ => None,
                };
                Self { name, parameters }
            }
            _ => Self::default(),
        }
    }

    /// Name reported in node output
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("default")
    }
}

/// Result of a completion call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Completion {
    pub text: String,
    pub tokens_used: u64,
    pub cost: f64,
}

/// One retrieved knowledge chunk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedChunk {
    pub content: String,
    pub score: f64,
    pub source_id: String,
    pub source_name: String,
}

/// LLM completion provider
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Complete a rendered prompt
    ///
    /// # Arguments
    /// * `prompt` - Prompt with all template placeholders resolved
    /// * `model` - Model selection from the node config
    async fn complete(&self, prompt: &str, model: &ModelConfig) -> Result<Completion>;
}

/// Knowledge-base retrieval backend
#[async_trait]
pub trait Retriever: Send + Sync {
    /// Fetch chunks relevant to `query` within one application's knowledge
    ///
    /// # Arguments
    /// * `application_id` - Owning application of the knowledge base
    /// * `query` - Rendered query text
    /// * `limit` - Maximum number of chunks
    /// * `similarity_threshold` - Minimum score a chunk must reach
    async fn retrieve(
        &self,
        application_id: &str,
        query: &str,
        limit: usize,
        similarity_threshold: f64,
    ) -> Result<Vec<RetrievedChunk>>;
}

/// Tool invocation service
#[async_trait]
pub trait ToolInvoker: Send + Sync {
    /// Call `tool_name` on `server_name` with already-rendered arguments
    ///
    /// Transport failures and timeouts surface as `EngineError::Tool`.
    async fn call_tool(&self, server_name: &str, tool_name: &str, arguments: &Value)
        -> Result<Value>;
}

/// Retriever used when no knowledge backend is configured
#[derive(Debug, Clone, Copy, Default)]
pub struct UnavailableRetriever;

#[async_trait]
impl Retriever for UnavailableRetriever {
    async fn retrieve(
        &self,
        application_id: &str,
        _query: &str,
        _limit: usize,
        _similarity_threshold: f64,
    ) -> Result<Vec<RetrievedChunk>> {
        Err(EngineError::Provider(format!(
            "No retrieval backend configured (application {})",
            application_id
        )))
    }
}

/// Tool invoker used when no tool servers are configured
#[derive(Debug, Clone, Copy, Default)]
pub struct NoTools;

#[async_trait]
impl ToolInvoker for NoTools {
    async fn call_tool(&self, server_name: &str, tool_name: &str, _arguments: &Value) -> Result<Value> {
        Err(EngineError::Tool(format!(
            "Tool server '{}' is not configured (tool {})",
            server_name, tool_name
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_model_config_from_string() {
        let model = ModelConfig::from_value(Some(&json!("gpt-4o")));
        assert_eq!(model.name.as_deref(), Some("gpt-4o"));
        assert!(model.parameters.is_empty());
    }

    #[test]
    fn test_model_config_from_object() {
        let model = ModelConfig::from_value(Some(&json!({"name": "claude", "temperature": 0.2})));
        assert_eq!(model.display_name(), "claude");
        assert_eq!(model.parameters.get("temperature"), Some(&json!(0.2)));
        assert!(!model.parameters.contains_key("name"));
    }

    #[test]
    fn test_model_config_default_name() {
        assert_eq!(ModelConfig::from_value(None).display_name(), "default");
        assert_eq!(ModelConfig::from_value(Some(&json!({"temperature": 1}))).display_name(), "default");
    }

    #[tokio::test]
    async fn test_unavailable_retriever_is_provider_error() {
        let err = UnavailableRetriever
            .retrieve("app", "q", 5, 0.7)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "provider_error");
    }

    #[tokio::test]
    async fn test_no_tools_is_tool_error() {
        let err = NoTools.call_tool("files", "read", &json!({})).await.unwrap_err();
        assert_eq!(err.kind(), "tool_error");
    }
}
