//! Workflow graph definition
//!
//! Nodes and edges are stored in plain vectors and referenced by string id,
//! so cyclic graphs need no shared ownership.

use crate::error::{EngineError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::path::Path;
use uuid::Uuid;

/// Execution context: variable name to JSON value
pub type Context = Map<String, Value>;

/// Node type enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeType {
    /// Entry point of the graph
    Start,
    /// Terminal marker
    End,
    /// LLM completion
    AiChat,
    /// Knowledge-base retrieval
    KnowledgeRetrieval,
    /// Boolean expression evaluation
    Condition,
    /// External tool invocation
    McpTool,
    /// Sandboxed user code
    Function,
    /// Any type this engine does not know how to run
    #[serde(other)]
    Unsupported,
}

impl NodeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::End => "end",
            Self::AiChat => "ai_chat",
            Self::KnowledgeRetrieval => "knowledge_retrieval",
            Self::Condition => "condition",
            Self::McpTool => "mcp_tool",
            Self::Function => "function",
            Self::Unsupported => "unsupported",
        }
    }
}

impl std::fmt::Display for NodeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for NodeType {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "start" => Ok(Self::Start),
            "end" => Ok(Self::End),
            "ai_chat" => Ok(Self::AiChat),
            "knowledge_retrieval" => Ok(Self::KnowledgeRetrieval),
            "condition" => Ok(Self::Condition),
            "mcp_tool" => Ok(Self::McpTool),
            "function" => Ok(Self::Function),
            "unsupported" => Ok(Self::Unsupported),
            other => Err(EngineError::Database(format!("Unknown node type: {}", other))),
        }
    }
}

/// A typed unit of work in a workflow
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// Node identifier, unique within the workflow
    pub id: String,

    /// Node type
    #[serde(rename = "type")]
    pub node_type: NodeType,

    /// Display name
    #[serde(default)]
    pub name: String,

    /// Type-specific configuration
    #[serde(default)]
    pub config: Map<String, Value>,
}

impl Node {
    /// Create a node with an empty config
    pub fn new(id: impl Into<String>, node_type: NodeType) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            node_type,
            config: Map::new(),
        }
    }

    /// Builder method to set the display name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Builder method to set one config entry
    pub fn with_config(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.config.insert(key.into(), value.into());
        self
    }
}

/// Directed link between two nodes, optionally guarded by a condition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    /// Source node ID
    pub source: String,

    /// Target node ID
    pub target: String,

    /// Optional guard expression
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
}

impl Edge {
    /// Unconditional edge
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            condition: None,
        }
    }

    /// Edge guarded by a condition expression
    pub fn when(
        source: impl Into<String>,
        target: impl Into<String>,
        condition: impl Into<String>,
    ) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            condition: Some(condition.into()),
        }
    }
}

fn new_id() -> String {
    Uuid::new_v4().to_string()
}

/// Immutable workflow definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workflow {
    /// Unique workflow identifier (UUID string when not supplied)
    #[serde(default = "new_id")]
    pub id: String,

    /// Workflow name
    #[serde(default)]
    pub name: String,

    /// Optional workflow description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Nodes, in declaration order
    #[serde(default)]
    pub nodes: Vec<Node>,

    /// Edges, in declaration order (order decides edge selection)
    #[serde(default)]
    pub edges: Vec<Edge>,

    /// Initial context values
    #[serde(default)]
    pub variables: Context,

    /// Creation timestamp
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,

    /// Last update timestamp
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

impl Workflow {
    /// Create an empty workflow with a generated ID
    pub fn new(name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: new_id(),
            name: name.into(),
            description: None,
            nodes: Vec::new(),
            edges: Vec::new(),
            variables: Context::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Builder method to set the workflow ID
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Builder method to set the description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Builder method to append a node
    pub fn with_node(mut self, node: Node) -> Self {
        self.nodes.push(node);
        self
    }

    /// Builder method to append an edge
    pub fn with_edge(mut self, edge: Edge) -> Self {
        self.edges.push(edge);
        self
    }

    /// Builder method to set an initial variable
    pub fn with_variable(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.variables.insert(key.into(), value.into());
        self
    }

    /// Parse a definition from JSON
    pub fn from_json_str(definition: &str) -> Result<Self> {
        Ok(serde_json::from_str(definition)?)
    }

    /// Parse a definition from YAML
    pub fn from_yaml_str(definition: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(definition)?)
    }

    /// Load a definition file, choosing the format by extension
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await?;
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("yaml") | Some("yml") => Self::from_yaml_str(&content),
            _ => Self::from_json_str(&content),
        }
    }

    /// Look up a node by ID
    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == id)
    }

    /// The single start node
    pub fn start_node(&self) -> Result<&Node> {
        let mut starts = self.nodes.iter().filter(|n| n.node_type == NodeType::Start);
        let first = starts
            .next()
            .ok_or_else(|| EngineError::graph("No start node found in workflow"))?;
        if starts.next().is_some() {
            return Err(EngineError::graph("Workflow has more than one start node"));
        }
        Ok(first)
    }

    /// Outgoing edges of a node, in declaration order
    pub fn outgoing<'a>(&'a self, node_id: &'a str) -> impl Iterator<Item = &'a Edge> + 'a {
        self.edges.iter().filter(move |e| e.source == node_id)
    }

    /// Check structural invariants
    ///
    /// Exactly one start node, unique node IDs, and every edge endpoint
    /// must name an existing node. Cycles are allowed.
    pub fn validate(&self) -> Result<()> {
        self.start_node()?;

        let mut ids = HashSet::with_capacity(self.nodes.len());
        for node in &self.nodes {
            if node.id.is_empty() {
                return Err(EngineError::graph("Node with empty id"));
            }
            if !ids.insert(node.id.as_str()) {
                return Err(EngineError::graph(format!("Duplicate node id: {}", node.id)));
            }
        }

        for edge in &self.edges {
            if !ids.contains(edge.source.as_str()) {
                return Err(EngineError::graph(format!(
                    "Edge source does not exist: {}",
                    edge.source
                )));
            }
            if !ids.contains(edge.target.as_str()) {
                return Err(EngineError::graph(format!(
                    "Edge target does not exist: {} (from {})",
                    edge.target, edge.source
                )));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn linear() -> Workflow {
        Workflow::new("linear")
            .with_node(Node::new("start", NodeType::Start))
            .with_node(Node::new("finish", NodeType::End))
            .with_edge(Edge::new("start", "finish"))
    }

    #[test]
    fn test_parse_definition_json() {
        let definition = r#"{
            "name": "demo",
            "nodes": [
                {"id": "s", "type": "start"},
                {"id": "check", "type": "condition", "config": {"condition": "x > 1"}}
            ],
            "edges": [{"source": "s", "target": "check", "condition": "x > 0"}],
            "variables": {"x": 2}
        }"#;

        let workflow = Workflow::from_json_str(definition).unwrap();
        assert_eq!(workflow.nodes.len(), 2);
        assert_eq!(workflow.nodes[1].node_type, NodeType::Condition);
        assert_eq!(workflow.edges[0].condition.as_deref(), Some("x > 0"));
        assert_eq!(workflow.variables.get("x"), Some(&json!(2)));
        assert!(!workflow.id.is_empty());
    }

    #[test]
    fn test_parse_definition_yaml() {
        let definition = r#"
id: wf-yaml
name: yaml demo
nodes:
  - id: s
    type: start
  - id: e
    type: end
edges:
  - source: s
    target: e
"#;
        let workflow = Workflow::from_yaml_str(definition).unwrap();
        assert_eq!(workflow.id, "wf-yaml");
        assert!(workflow.validate().is_ok());
    }

    #[test]
    fn test_unknown_node_type_parses_as_unsupported() {
        let definition = r#"{"nodes": [{"id": "x", "type": "teleport"}]}"#;
        let workflow = Workflow::from_json_str(definition).unwrap();
        assert_eq!(workflow.nodes[0].node_type, NodeType::Unsupported);
    }

    #[test]
    fn test_validate_linear() {
        assert!(linear().validate().is_ok());
    }

    #[test]
    fn test_validate_missing_start() {
        let workflow = Workflow::new("no-start").with_node(Node::new("e", NodeType::End));
        assert!(matches!(workflow.validate(), Err(EngineError::Graph(_))));
    }

    #[test]
    fn test_validate_two_starts() {
        let workflow = linear().with_node(Node::new("start2", NodeType::Start));
        assert!(matches!(workflow.validate(), Err(EngineError::Graph(_))));
    }

    #[test]
    fn test_validate_dangling_target() {
        let workflow = linear().with_edge(Edge::new("finish", "nowhere"));
        let err = workflow.validate().unwrap_err();
        assert!(err.to_string().contains("nowhere"));
    }

    #[test]
    fn test_validate_duplicate_ids() {
        let workflow = linear().with_node(Node::new("finish", NodeType::Function));
        assert!(matches!(workflow.validate(), Err(EngineError::Graph(_))));
    }

    #[test]
    fn test_cycles_are_valid() {
        let workflow = linear().with_edge(Edge::when("finish", "start", "again"));
        assert!(workflow.validate().is_ok());
    }

    #[test]
    fn test_outgoing_preserves_declaration_order() {
        let workflow = linear()
            .with_node(Node::new("b", NodeType::End))
            .with_edge(Edge::when("start", "b", "x > 5"));
        let targets: Vec<_> = workflow.outgoing("start").map(|e| e.target.as_str()).collect();
        assert_eq!(targets, vec!["finish", "b"]);
    }

    #[test]
    fn test_node_type_round_trip_str() {
        for t in [NodeType::AiChat, NodeType::KnowledgeRetrieval, NodeType::McpTool] {
            assert_eq!(t.as_str().parse::<NodeType>().unwrap(), t);
        }
    }
}
