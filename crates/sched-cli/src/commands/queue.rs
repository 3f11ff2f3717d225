// SPDX-License-Identifier: MIT

//! `sched queue` subcommands: a read-only list of the dispatcher's queue.

use clap::{Args, Subcommand};
use sched_wire::{Request, Response, WorkQueueSummary};

use crate::client::DaemonClient;
use crate::output::{handle_list, OutputFormat};

#[derive(Args)]
pub struct QueueArgs {
    #[command(subcommand)]
    pub command: QueueCommand,
}

#[derive(Subcommand)]
pub enum QueueCommand {
    /// List every work queue entry awaiting or under dispatch.
    List,
}

pub async fn handle(command: QueueCommand, client: &DaemonClient, format: OutputFormat) -> anyhow::Result<()> {
    match command {
        QueueCommand::List => {
            let entries = match client.send(&Request::ListWorkQueue).await? {
                Response::WorkQueue { entries } => entries,
                other => return DaemonClient::reject(other),
            };
            handle_list(format, &entries, "no queued work", render_summary)?;
            Ok(())
        }
    }
}

fn render_summary(e: &WorkQueueSummary) {
    println!(
        "{}  workflow={}  status={:?}  priority={}  created_at={}",
        e.id, e.workflow_name, e.status, e.priority, e.created_at_ms
    );
}
