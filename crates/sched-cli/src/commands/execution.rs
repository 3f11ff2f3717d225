// SPDX-License-Identifier: MIT

//! `sched execution` subcommands: cancel/show plus a read-only list.

use clap::{Args, Subcommand};
use sched_core::execution::ExecutionId;
use sched_wire::{ExecutionDetail, ExecutionSummary, Request, Response};

use crate::client::DaemonClient;
use crate::exit_error::ExitError;
use crate::output::{format_or_json, handle_list, OutputFormat};

#[derive(Args)]
pub struct ExecutionArgs {
    #[command(subcommand)]
    pub command: ExecutionCommand,
}

#[derive(Subcommand)]
pub enum ExecutionCommand {
    /// Request cooperative cancellation of an in-progress execution.
    Cancel { metadata_id: String },
    /// Show one execution's full detail.
    Show { metadata_id: String },
    /// List every execution.
    List,
}

pub async fn handle(command: ExecutionCommand, client: &DaemonClient, format: OutputFormat) -> anyhow::Result<()> {
    match command {
        ExecutionCommand::Cancel { metadata_id } => {
            let metadata_id = ExecutionId::from_string(&metadata_id);
            match client.send(&Request::RequestCancel { metadata_id }).await? {
                Response::CancelRequested { metadata_id } => {
                    println!("cancel requested for execution {metadata_id}");
                    Ok(())
                }
                other => DaemonClient::reject(other),
            }
        }
        ExecutionCommand::Show { metadata_id } => {
            let metadata_id = ExecutionId::from_string(&metadata_id);
            let execution = match client.send(&Request::GetExecution { metadata_id }).await? {
                Response::Execution { execution } => execution,
                other => return DaemonClient::reject(other),
            };
            let Some(execution) = execution else {
                return Err(ExitError::new(1, format!("execution {metadata_id} not found")).into());
            };
            format_or_json(format, &*execution, render_detail)?;
            Ok(())
        }
        ExecutionCommand::List => {
            let executions = match client.send(&Request::ListExecutions).await? {
                Response::Executions { executions } => executions,
                other => return DaemonClient::reject(other),
            };
            handle_list(format, &executions, "no executions", render_summary)?;
            Ok(())
        }
    }
}

fn render_summary(e: &ExecutionSummary) {
    println!(
        "{}  {}  state={:?}  start={}  end={}",
        e.id,
        e.name,
        e.workflow_state,
        e.start_time_ms,
        e.end_time_ms.map(|t| t.to_string()).unwrap_or_else(|| "-".into())
    );
}

fn render_detail(e: &ExecutionDetail) {
    println!("id:               {}", e.id);
    println!("name:             {}", e.name);
    println!("workflow_state:   {:?}", e.workflow_state);
    println!("start_time_ms:    {}", e.start_time_ms);
    if let Some(end) = e.end_time_ms {
        println!("end_time_ms:      {end}");
    }
    if let Some(step) = &e.failure_step {
        println!("failure_step:     {step}");
    }
    if let Some(exc) = &e.failure_exception {
        println!("failure_exception: {exc}");
    }
    if let Some(reason) = &e.failure_reason {
        println!("failure_reason:   {reason}");
    }
    println!("cancel_requested: {}", e.cancel_requested);
}
