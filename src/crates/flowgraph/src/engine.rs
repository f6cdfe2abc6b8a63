//! Workflow execution engine
//!
//! [`GraphWalker`] drives one execution through the graph;
//! [`WorkflowEngine`] is the caller-facing API on top of it.

mod service;
mod walker;

pub use service::{ExecutionReport, WorkflowEngine};
pub use walker::{select_next, GraphWalker};
