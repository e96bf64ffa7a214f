//! Subcommand handlers.

use color_eyre::eyre::{eyre, Result, WrapErr};
use colored::Colorize;
use fk_core::engine::{RunOptions, WorkflowEngine};
use fk_core::registry::WorkflowRegistry;
use fk_core::state::ExecutionManager;
use fk_core::Workflow;
use fk_protocol::{EventStatus, ExecutionResult, ExecutionStatus, StreamEvent, StreamEventType};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio_stream::StreamExt;
use tracing::info;

/// How `run` reports progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Output {
    /// Only the final result.
    Result,
    /// One line per event, then the result.
    Events,
    /// Raw server-sent-events records.
    Sse,
}

pub fn list(registry: &WorkflowRegistry) {
    for workflow in registry.list() {
        println!(
            "{}  {} ({} steps)",
            workflow.id().bold(),
            workflow.description().unwrap_or(workflow.name()),
            workflow.steps().len()
        );
    }
}

pub async fn run(
    engine: &WorkflowEngine,
    registry: &WorkflowRegistry,
    workflow_id: &str,
    input: &str,
    output: Output,
    timeout_ms: Option<u64>,
) -> Result<()> {
    let workflow = lookup(registry, workflow_id)?;
    let input = parse_input(input)?;
    let mut options = RunOptions::new();
    if let Some(ms) = timeout_ms {
        options = options.with_timeout(Duration::from_millis(ms));
    }

    match output {
        Output::Result => {
            let result = engine.run(&workflow, input, options).await?;
            print_result(&result)
        }
        Output::Events => {
            let mut stream = engine.stream(&workflow, input, options)?;
            while let Some(event) = stream.next().await {
                println!("{}", format_event(&event));
            }
            let result = stream.result().await?;
            print_result(&result)
        }
        Output::Sse => {
            let stream = engine.stream(&workflow, input, options)?;
            let mut records = Box::pin(stream.to_external_protocol_response());
            while let Some(record) = records.next().await {
                print!("{record}");
            }
            Ok(())
        }
    }
}

/// Start a workflow, and if it suspends, resume it once with `resume_input`.
pub async fn run_and_resume(
    manager: &ExecutionManager,
    workflow_id: &str,
    input: &str,
    resume_input: &str,
    user_id: Option<String>,
) -> Result<()> {
    let input = parse_input(input)?;
    let resume_input = parse_input(resume_input)?;

    let mut options = RunOptions::new();
    if let Some(user_id) = user_id {
        options = options.with_user_id(user_id);
    }

    let execution_id = manager.start(workflow_id, input, options.clone()).await?;
    let first = manager.wait(execution_id).await?;

    if first.status != ExecutionStatus::Suspended {
        return print_result(&first);
    }

    let reason = first
        .suspension
        .as_ref()
        .and_then(|s| s.reason.as_deref())
        .unwrap_or("no reason given");
    println!(
        "{} {} ({})",
        "suspended".yellow().bold(),
        execution_id,
        reason
    );
    info!(%execution_id, "resuming with provided input");

    manager.resume(execution_id, resume_input, options).await?;
    let resumed = manager.wait(execution_id).await?;
    print_result(&resumed)
}

fn lookup(registry: &WorkflowRegistry, workflow_id: &str) -> Result<Arc<Workflow>> {
    registry
        .get(workflow_id)
        .ok_or_else(|| eyre!("unknown workflow '{workflow_id}', see `flowkit list`"))
}

fn parse_input(input: &str) -> Result<Value> {
    serde_json::from_str(input).wrap_err_with(|| format!("input is not valid JSON: {input}"))
}

fn print_result(result: &ExecutionResult) -> Result<()> {
    let status = match result.status {
        ExecutionStatus::Completed => "completed".green(),
        ExecutionStatus::Suspended => "suspended".yellow(),
        ExecutionStatus::Cancelled => "cancelled".yellow(),
        ExecutionStatus::Error => "error".red(),
        ExecutionStatus::Running => "running".normal(),
    };
    println!("{} {}", status.bold(), result.execution_id);
    println!("{}", serde_json::to_string_pretty(result)?);

    if result.status == ExecutionStatus::Error {
        let message = result
            .error
            .as_ref()
            .map_or("unknown error", |e| e.message.as_str());
        return Err(eyre!("workflow failed: {message}"));
    }
    Ok(())
}

fn format_event(event: &StreamEvent) -> String {
    let kind = event.event_type.as_str();
    let kind = match (event.event_type, event.status) {
        (_, EventStatus::Error) => kind.red(),
        (_, EventStatus::Cancelled | EventStatus::Suspended) => kind.yellow(),
        (StreamEventType::WorkflowComplete | StreamEventType::StepComplete, _) => kind.green(),
        _ => kind.cyan(),
    };

    let step = event
        .step_index
        .map(|index| format!(" #{index}"))
        .unwrap_or_default();
    format!("{kind} {}{step}", event.from.bold())
}
