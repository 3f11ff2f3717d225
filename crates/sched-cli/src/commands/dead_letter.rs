// SPDX-License-Identifier: MIT

//! `sched dead-letter` subcommands: retry/acknowledge plus a read-only list.

use clap::{Args, Subcommand};
use sched_core::dead_letter::DeadLetterId;
use sched_wire::{DeadLetterSummary, Request, Response};

use crate::client::DaemonClient;
use crate::output::{handle_list, OutputFormat};

#[derive(Args)]
pub struct DeadLetterArgs {
    #[command(subcommand)]
    pub command: DeadLetterCommand,
}

#[derive(Subcommand)]
pub enum DeadLetterCommand {
    /// Re-queue a dead-lettered manifest's work and mark it retried.
    Retry { dead_letter_id: String },
    /// Resolve a dead letter without re-running it.
    Acknowledge {
        dead_letter_id: String,
        /// Optional free-text note explaining the resolution.
        #[arg(long)]
        note: Option<String>,
    },
    /// List every dead letter.
    List,
}

pub async fn handle(command: DeadLetterCommand, client: &DaemonClient, format: OutputFormat) -> anyhow::Result<()> {
    match command {
        DeadLetterCommand::Retry { dead_letter_id } => {
            let dead_letter_id = DeadLetterId::from_string(&dead_letter_id);
            match client.send(&Request::RetryDeadLetter { dead_letter_id }).await? {
                Response::DeadLetterRetried { dead_letter_id, retry_metadata_id } => {
                    println!("retried dead letter {dead_letter_id} as execution {retry_metadata_id}");
                    Ok(())
                }
                other => DaemonClient::reject(other),
            }
        }
        DeadLetterCommand::Acknowledge { dead_letter_id, note } => {
            let dead_letter_id = DeadLetterId::from_string(&dead_letter_id);
            match client
                .send(&Request::AcknowledgeDeadLetter { dead_letter_id, resolution_note: note })
                .await?
            {
                Response::DeadLetterAcknowledged { dead_letter_id } => {
                    println!("acknowledged dead letter {dead_letter_id}");
                    Ok(())
                }
                other => DaemonClient::reject(other),
            }
        }
        DeadLetterCommand::List => {
            let dead_letters = match client.send(&Request::ListDeadLetters).await? {
                Response::DeadLetters { dead_letters } => dead_letters,
                other => return DaemonClient::reject(other),
            };
            handle_list(format, &dead_letters, "no dead letters", render_summary)?;
            Ok(())
        }
    }
}

fn render_summary(dl: &DeadLetterSummary) {
    println!(
        "{}  manifest={}  status={:?}  dead_lettered_at={}  reason={}",
        dl.id, dl.manifest_id, dl.status, dl.dead_lettered_at_ms, dl.reason
    );
}
