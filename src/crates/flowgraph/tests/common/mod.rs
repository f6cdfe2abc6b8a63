//! Common test utilities and setup

#![allow(dead_code)]

use async_trait::async_trait;
use flowgraph::client::EchoCompletion;
use flowgraph::config::ExecutionConfig;
use flowgraph::db::Database;
use flowgraph::executor::NodeExecutor;
use flowgraph::models::{Context, Edge, Node, NodeType, Workflow};
use flowgraph::services::{RetrievedChunk, Retriever, ToolInvoker};
use flowgraph::store::{ExecutionStore, MemoryStore, SqliteStore};
use flowgraph::{Result, WorkflowEngine};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::TempDir;
use tokio::sync::Notify;

static TEST_DB_COUNTER: AtomicUsize = AtomicUsize::new(0);

/// Create a migrated test database with a unique name
pub async fn setup_test_db() -> (TempDir, Arc<Database>) {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let counter = TEST_DB_COUNTER.fetch_add(1, Ordering::SeqCst);
    let db_path = temp_dir.path().join(format!("test_{}.db", counter));

    let db = Database::initialize(&db_path, 4)
        .await
        .expect("Failed to create test database");

    (temp_dir, Arc::new(db))
}

pub async fn sqlite_store() -> (TempDir, Arc<SqliteStore>) {
    let (dir, db) = setup_test_db().await;
    (dir, Arc::new(SqliteStore::new(db)))
}

pub fn ctx(value: Value) -> Context {
    match value {
        Value::Object(map) => map,
        other => panic!("expected a JSON object, got {}", other),
    }
}

/// Retriever returning one chunk that echoes the query
#[derive(Debug, Default)]
pub struct FixedRetriever;

#[async_trait]
impl Retriever for FixedRetriever {
    async fn retrieve(
        &self,
        application_id: &str,
        query: &str,
        _limit: usize,
        _similarity_threshold: f64,
    ) -> Result<Vec<RetrievedChunk>> {
        Ok(vec![RetrievedChunk {
            content: format!("about {}", query),
            score: 0.9,
            source_id: format!("{}-doc-1", application_id),
            source_name: "handbook".to_string(),
        }])
    }
}

/// Tool invoker answering `{"echo": <arguments>}`
#[derive(Debug, Default)]
pub struct EchoTools;

#[async_trait]
impl ToolInvoker for EchoTools {
    async fn call_tool(&self, _server: &str, _tool: &str, arguments: &Value) -> Result<Value> {
        Ok(json!({ "echo": arguments }))
    }
}

/// Tool invoker that blocks each call until released
#[derive(Debug, Default)]
pub struct GatedTools {
    pub entered: Notify,
    pub release: Notify,
}

#[async_trait]
impl ToolInvoker for GatedTools {
    async fn call_tool(&self, _server: &str, _tool: &str, arguments: &Value) -> Result<Value> {
        self.entered.notify_one();
        self.release.notified().await;
        Ok(json!({ "echo": arguments }))
    }
}

pub fn executor_with_tools(tools: Arc<dyn ToolInvoker>) -> NodeExecutor {
    NodeExecutor::new(
        Arc::new(EchoCompletion::new()),
        Arc::new(FixedRetriever),
        tools,
    )
}

pub fn engine_on(store: Arc<dyn ExecutionStore>, tools: Arc<dyn ToolInvoker>) -> WorkflowEngine {
    WorkflowEngine::new(store, executor_with_tools(tools), &ExecutionConfig::default())
}

pub fn memory_engine() -> WorkflowEngine {
    engine_on(Arc::new(MemoryStore::new()), Arc::new(EchoTools))
}

/// `start -(x > 5)-> node_a`, `start -> node_b`
pub fn branching_workflow() -> Workflow {
    Workflow::new("branching")
        .with_node(Node::new("start", NodeType::Start))
        .with_node(Node::new("node_a", NodeType::End))
        .with_node(Node::new("node_b", NodeType::End))
        .with_edge(Edge::when("start", "node_a", "x > 5"))
        .with_edge(Edge::new("start", "node_b"))
}

/// `start -> fetch (mcp_tool) -> double (function) -> report (function)`
pub fn four_node_chain() -> Workflow {
    Workflow::new("chain")
        .with_node(Node::new("start", NodeType::Start))
        .with_node(
            Node::new("fetch", NodeType::McpTool)
                .with_config("server_name", "data")
                .with_config("tool_name", "lookup")
                .with_config("args", json!({"n": "{{n}}"})),
        )
        .with_node(
            Node::new("double", NodeType::Function)
                .with_config("function_code", "output = int(result['echo']['n']) * 2"),
        )
        .with_node(
            Node::new("report", NodeType::Function)
                .with_config("function_code", "output = {'final': function_output + 1, 'n': n}"),
        )
        .with_edge(Edge::new("start", "fetch"))
        .with_edge(Edge::new("fetch", "double"))
        .with_edge(Edge::new("double", "report"))
}

/// Context with run-specific timestamps removed
pub fn stable_context(mut context: Context) -> Context {
    context.remove("timestamp");
    context
}
