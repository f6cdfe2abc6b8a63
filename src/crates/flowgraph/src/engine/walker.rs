//! Graph walker
//!
//! Runs one execution node by node. After every node the output is merged
//! into the context, the next node is chosen by the first matching outgoing
//! edge, and the step is persisted in one `record_step`, together with the
//! final status when the run ends. The stored status is re-read before each
//! node so a pause takes effect at the next node boundary. A resume bumps
//! the execution's generation; a walker left over from before the pause
//! then finds its writes rejected and stops.

use crate::error::{EngineError, Result};
use crate::executor::NodeExecutor;
use crate::expression::evaluate_condition;
use crate::models::{Context, Edge, ExecutionStatus, NodeExecution, Workflow, WorkflowExecution};
use crate::store::{ExecutionStore, Finish};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// First outgoing edge of `node_id` whose condition is absent or truthy
///
/// Edges are scanned in declaration order. An edge whose condition fails to
/// evaluate counts as not matching.
pub fn select_next<'a>(workflow: &'a Workflow, node_id: &str, context: &Context) -> Option<&'a Edge> {
    workflow.edges.iter().filter(|edge| edge.source == node_id).find(|edge| {
        let condition = match edge.condition.as_deref().map(str::trim) {
            None | Some("") => return true,
            Some(condition) => condition,
        };
        match evaluate_condition(condition, context) {
            Ok(matched) => matched,
            Err(e) => {
                warn!(
                    source = %edge.source,
                    target = %edge.target,
                    condition = %condition,
                    error = %e,
                    "Edge condition failed, treating as no match"
                );
                false
            }
        }
    })
}

/// Drives executions through a workflow graph
#[derive(Clone)]
pub struct GraphWalker {
    store: Arc<dyn ExecutionStore>,
    executor: NodeExecutor,
}

impl std::fmt::Debug for GraphWalker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphWalker")
            .field("executor", &self.executor)
            .finish_non_exhaustive()
    }
}

impl GraphWalker {
    pub fn new(store: Arc<dyn ExecutionStore>, executor: NodeExecutor) -> Self {
        Self { store, executor }
    }

    /// Validate the graph and persist a new active execution without running it
    pub async fn create(
        &self,
        workflow: &Workflow,
        input: Context,
        started_by: Option<String>,
        chat_id: Option<String>,
    ) -> Result<WorkflowExecution> {
        workflow.validate()?;

        let execution = WorkflowExecution::new(workflow, input)
            .with_started_by(started_by)
            .with_chat_id(chat_id);
        self.store.create_execution(&execution).await?;

        info!(
            execution_id = %execution.id,
            workflow_id = %workflow.id,
            "Workflow execution started"
        );
        Ok(execution)
    }

    /// Create an execution and run it until it stops
    pub async fn start(
        &self,
        workflow: &Workflow,
        input: Context,
        started_by: Option<String>,
        chat_id: Option<String>,
    ) -> Result<WorkflowExecution> {
        let execution = self.create(workflow, input, started_by, chat_id).await?;
        self.run(execution, workflow).await
    }

    /// Step an execution until it completes, fails or is paused
    ///
    /// Returns the execution as stored when the walker stopped. Node errors
    /// fail the execution and are not returned as `Err`; only store errors
    /// are.
    pub async fn run(&self, mut execution: WorkflowExecution, workflow: &Workflow) -> Result<WorkflowExecution> {
        loop {
            let stored = self.store.load_execution(&execution.id).await?;
            if stored.status != ExecutionStatus::Active || stored.generation != execution.generation {
                info!(
                    execution_id = %execution.id,
                    status = %stored.status,
                    current_node_id = ?stored.current_node_id,
                    superseded = stored.generation != execution.generation,
                    "Walker stopped at node boundary"
                );
                return Ok(stored);
            }

            let node = match execution.current_node_id.as_deref() {
                Some(id) => workflow.node(id).ok_or_else(|| {
                    EngineError::graph(format!("Node '{}' does not exist in workflow {}", id, workflow.id))
                }),
                None => workflow.start_node(),
            };
            let node = match node {
                Ok(node) => node,
                Err(e) => return self.fail(&execution, None, &e).await,
            };

            let run = NodeExecution::start(&execution.id, node, &execution.execution_context);
            let output = match self.executor.execute(node, &execution.execution_context).await {
                Ok(output) => output,
                Err(e) => {
                    error!(
                        execution_id = %execution.id,
                        node_id = %node.id,
                        node_type = %node.node_type,
                        error = %e,
                        "Node execution failed"
                    );
                    execution.current_node_id = Some(node.id.clone());
                    return self.fail(&execution, Some(&run.fail(&e)), &e).await;
                }
            };

            execution.merge_output(&output);
            let next = select_next(workflow, &node.id, &execution.execution_context)
                .map(|edge| edge.target.clone());
            debug!(
                execution_id = %execution.id,
                node_id = %node.id,
                next = ?next,
                "Node completed"
            );
            execution.current_node_id = next;

            let record = run.complete(output);
            let finish = execution.current_node_id.is_none().then(Finish::completed);
            if !self.store.record_step(&execution, Some(&record), finish.as_ref()).await? {
                return self.retire(&execution).await;
            }

            if finish.is_some() {
                info!(execution_id = %execution.id, last_node = %node.id, "Workflow execution completed");
                return self.store.load_execution(&execution.id).await;
            }
        }
    }

    async fn fail(
        &self,
        execution: &WorkflowExecution,
        record: Option<&NodeExecution>,
        err: &EngineError,
    ) -> Result<WorkflowExecution> {
        let message = err.to_record_message();
        let finish = Finish::failed(message.as_str());
        if !self.store.record_step(execution, record, Some(&finish)).await? {
            return self.retire(execution).await;
        }
        info!(execution_id = %execution.id, error = %message, "Workflow execution failed");
        self.store.load_execution(&execution.id).await
    }

    /// Stop after the store rejected a step from this walker
    async fn retire(&self, execution: &WorkflowExecution) -> Result<WorkflowExecution> {
        let stored = self.store.load_execution(&execution.id).await?;
        warn!(
            execution_id = %execution.id,
            generation = execution.generation,
            stored_generation = stored.generation,
            status = %stored.status,
            "Execution taken over, discarding in-flight step"
        );
        Ok(stored)
    }

    /// Move an active execution to paused
    ///
    /// The walker driving it stops before its next node.
    pub async fn pause(&self, execution_id: &str) -> Result<WorkflowExecution> {
        self.change_status(execution_id, ExecutionStatus::Active, ExecutionStatus::Paused)
            .await?;
        info!(execution_id = %execution_id, "Workflow execution paused");
        self.store.load_execution(execution_id).await
    }

    /// Move a paused execution back to active and keep walking from the
    /// stored `current_node_id` and context
    pub async fn resume(&self, execution_id: &str) -> Result<WorkflowExecution> {
        let execution = self.store.load_execution(execution_id).await?;
        let workflow = self.store.load_workflow(&execution.workflow_id).await?;

        self.change_status(execution_id, ExecutionStatus::Paused, ExecutionStatus::Active)
            .await?;
        info!(
            execution_id = %execution_id,
            current_node_id = ?execution.current_node_id,
            "Workflow execution resumed"
        );

        let execution = self.store.load_execution(execution_id).await?;
        self.run(execution, &workflow).await
    }

    async fn change_status(&self, execution_id: &str, from: ExecutionStatus, to: ExecutionStatus) -> Result<()> {
        if self.store.transition(execution_id, &[from], to, None).await? {
            return Ok(());
        }
        let current = self.store.load_execution(execution_id).await?;
        Err(EngineError::InvalidStateTransition {
            from: current.status.to_string(),
            to: to.to_string(),
        })
    }
}
