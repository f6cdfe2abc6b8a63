//! Flowgraph CLI
//!
//! Imports workflow definitions and drives, inspects, pauses and resumes
//! their executions against the configured SQLite database.

use anyhow::{bail, Context as _, Result};
use clap::{Parser, Subcommand, ValueEnum};
use flowgraph::client::{EchoCompletion, HttpToolClient, RetryConfig};
use flowgraph::config::{load_config, FlowgraphConfig};
use flowgraph::db::Database;
use flowgraph::executor::NodeExecutor;
use flowgraph::models::{Context, Workflow};
use flowgraph::services::UnavailableRetriever;
use flowgraph::store::SqliteStore;
use flowgraph::{logging, version, ExecutionReport, WorkflowEngine};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

#[derive(Parser)]
#[command(name = "flowgraph")]
#[command(about = "Flowgraph - resumable workflow execution engine", long_about = None)]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    /// Extra config file, applied after the user and project files
    #[arg(short, long, global = true, env = "FLOWGRAPH_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the database and run migrations
    Init,

    /// Import a workflow definition (.json, .yaml or .yml)
    Import {
        /// Definition file
        file: PathBuf,
    },

    /// List imported workflows
    Workflows,

    /// Start a workflow and run it until it stops
    Run {
        /// Workflow ID
        workflow_id: String,
        /// Input data as a JSON object
        #[arg(short, long)]
        input: Option<String>,
        /// Who is starting the run
        #[arg(long)]
        started_by: Option<String>,
        /// Chat session to correlate with
        #[arg(long)]
        chat_id: Option<String>,
    },

    /// Show an execution and its node history
    Status {
        /// Execution ID
        execution_id: String,
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Pause an active execution
    Pause {
        /// Execution ID
        execution_id: String,
    },

    /// Resume a paused execution and run it until it stops
    Resume {
        /// Execution ID
        execution_id: String,
    },

    /// List executions of a workflow
    List {
        /// Workflow ID
        workflow_id: String,
    },

    /// Show version information
    Version,
}

async fn open_store(config: &FlowgraphConfig) -> Result<SqliteStore> {
    let path = config.database_path();
    let db = Database::initialize(&path, config.database.max_connections)
        .await
        .with_context(|| format!("opening database {}", path.display()))?;
    Ok(SqliteStore::new(Arc::new(db)))
}

fn build_engine(config: &FlowgraphConfig, store: SqliteStore) -> Result<WorkflowEngine> {
    let tools = HttpToolClient::new(
        config.tools.servers.clone(),
        RetryConfig::from(&config.tools.retry),
    )?;
    let servers: Vec<&str> = tools.server_names().collect();
    info!(servers = ?servers, "Tool servers configured");
    let executor = NodeExecutor::new(
        Arc::new(EchoCompletion::new()),
        Arc::new(UnavailableRetriever),
        Arc::new(tools),
    );
    Ok(WorkflowEngine::new(Arc::new(store), executor, &config.execution))
}

fn parse_input(raw: Option<&str>) -> Result<Context> {
    let Some(raw) = raw else {
        return Ok(Context::new());
    };
    match serde_json::from_str(raw).context("--input is not valid JSON")? {
        serde_json::Value::Object(map) => Ok(map),
        other => bail!("--input must be a JSON object, got {}", other),
    }
}

fn print_report(report: &ExecutionReport, format: OutputFormat) -> Result<()> {
    if let OutputFormat::Json = format {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }

    let execution = &report.execution;
    println!("Execution: {}", execution.id);
    println!("Workflow:  {}", execution.workflow_id);
    println!("Status:    {}", execution.status);
    if let Some(node) = &execution.current_node_id {
        println!("Next node: {}", node);
    }
    if let Some(error) = &execution.error_message {
        println!("Error:     {}", error);
    }
    println!("Started:   {}", execution.started_at.to_rfc3339());
    if let Some(done) = execution.completed_at {
        println!("Finished:  {}", done.to_rfc3339());
    }

    println!("\nNodes ({}):", report.node_executions.len());
    for node in &report.node_executions {
        let detail = node.error_message.as_deref().unwrap_or("");
        println!(
            "  {:<20} {:<20} {:<10} {:>6}ms {}",
            node.node_id,
            node.node_type.as_str(),
            node.status.as_str(),
            node.execution_time_ms,
            detail
        );
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(cli.config.clone()).await?;
    logging::init(&config.logging)?;
    info!("{}", version::long_version());

    match cli.command {
        Commands::Init => {
            let store = open_store(&config).await?;
            store.database().health_check().await?;
            println!("Database ready at {}", config.database_path().display());
        }
        Commands::Import { file } => {
            let workflow = Workflow::from_path(&file).await?;
            workflow.validate()?;
            let store = open_store(&config).await?;
            let engine = build_engine(&config, store)?;
            engine.register_workflow(&workflow).await?;
            println!("{}", workflow.id);
        }
        Commands::Workflows => {
            let store = open_store(&config).await?;
            for (id, name) in store.workflows().list().await? {
                println!("{}  {}", id, name);
            }
        }
        Commands::Run {
            workflow_id,
            input,
            started_by,
            chat_id,
        } => {
            let input = parse_input(input.as_deref())?;
            let engine = build_engine(&config, open_store(&config).await?)?;
            let execution_id = engine
                .start_workflow(&workflow_id, input, started_by, chat_id)
                .await?;
            let report = engine.get_execution_status(&execution_id).await?;
            print_report(&report, OutputFormat::Text)?;
        }
        Commands::Status {
            execution_id,
            format,
        } => {
            let engine = build_engine(&config, open_store(&config).await?)?;
            let report = engine.get_execution_status(&execution_id).await?;
            print_report(&report, format)?;
        }
        Commands::Pause { execution_id } => {
            let engine = build_engine(&config, open_store(&config).await?)?;
            let paused = engine.pause_execution(&execution_id).await?;
            println!("{}", if paused { "paused" } else { "not active, unchanged" });
        }
        Commands::Resume { execution_id } => {
            let engine = build_engine(&config, open_store(&config).await?)?;
            if engine.resume_execution(&execution_id).await? {
                let report = engine.get_execution_status(&execution_id).await?;
                print_report(&report, OutputFormat::Text)?;
            } else {
                println!("not paused, unchanged");
            }
        }
        Commands::List { workflow_id } => {
            let engine = build_engine(&config, open_store(&config).await?)?;
            for execution in engine.list_executions(&workflow_id).await? {
                println!(
                    "{}  {:<10} {}",
                    execution.id,
                    execution.status.as_str(),
                    execution.started_at.to_rfc3339()
                );
            }
        }
        Commands::Version => println!("{}", version::long_version()),
    }

    Ok(())
}
