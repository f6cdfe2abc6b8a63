//! Workflow, execution and node-execution records
//!
//! Workflows are read-only graph definitions. Executions and node executions
//! are the mutable run state and its append-only audit trail.

pub mod execution;
pub mod node_execution;
pub mod workflow;

pub use execution::{ExecutionStatus, WorkflowExecution};
pub use node_execution::{NodeExecution, NodeExecutionStatus, NodeRun};
pub use workflow::{Context, Edge, Node, NodeType, Workflow};
