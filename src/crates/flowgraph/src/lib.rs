//! # Flowgraph - resumable workflow execution engine
//!
//! Runs declarative node-and-edge workflows one node at a time, sharing an
//! execution context between nodes, choosing branches with a sandboxed
//! expression language, and persisting every step so runs can be paused,
//! inspected and resumed.
//!
//! ## Features
//!
//! - **Graph walker** - first-match edge selection, pause/resume at node boundaries
//! - **Node types** - start, end, ai_chat, knowledge_retrieval, condition, mcp_tool, function
//! - **Restricted evaluator** - `{{var}}` templates, conditions and function scripts
//!   with no attribute access, imports or I/O
//! - **Pluggable collaborators** - completion, retrieval and tool invocation behind traits
//! - **SQLite persistence** - one atomic write per step via `sqlx`
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use flowgraph::client::EchoCompletion;
//! use flowgraph::config::ExecutionConfig;
//! use flowgraph::executor::NodeExecutor;
//! use flowgraph::models::{Context, Edge, Node, NodeType, Workflow};
//! use flowgraph::services::{NoTools, UnavailableRetriever};
//! use flowgraph::store::MemoryStore;
//! use flowgraph::WorkflowEngine;
//! use std::sync::Arc;
//!
//! # async fn example() -> flowgraph::Result<()> {
//! let workflow = Workflow::new("greet")
//!     .with_node(Node::new("start", NodeType::Start))
//!     .with_node(Node::new("ask", NodeType::AiChat).with_config("prompt", "Hello {{name}}"))
//!     .with_edge(Edge::new("start", "ask"));
//!
//! let executor = NodeExecutor::new(
//!     Arc::new(EchoCompletion::new()),
//!     Arc::new(UnavailableRetriever),
//!     Arc::new(NoTools),
//! );
//! let engine = WorkflowEngine::new(Arc::new(MemoryStore::new()), executor, &ExecutionConfig::default());
//! engine.register_workflow(&workflow).await?;
//!
//! let mut input = Context::new();
//! input.insert("name".into(), "Ada".into());
//! let id = engine.start_workflow(&workflow.id, input, None, None).await?;
//! let report = engine.get_execution_status(&id).await?;
//! println!("{}", report.execution.status);
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod db;
pub mod engine;
pub mod executor;
pub mod expression;
pub mod logging;
pub mod models;
pub mod repositories;
pub mod services;
pub mod store;
pub mod version;

mod error;

pub use engine::{ExecutionReport, GraphWalker, WorkflowEngine};
pub use error::{EngineError, Result};
