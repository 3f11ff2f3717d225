// SPDX-License-Identifier: MIT

//! `sched`: the admin CLI for a running `sched-daemon`, talking the Trigger
//! API's framed protocol over its Unix socket.

mod client;
mod commands;
mod exit_error;
mod output;

use clap::{Parser, Subcommand};
use exit_error::ExitError;
use output::OutputFormat;

use commands::{dead_letter, execution, manifest, queue};

#[derive(Parser)]
#[command(name = "sched", about = "Admin CLI for the sched-daemon scheduler")]
struct Cli {
    /// Output format for list/show commands.
    #[arg(long, value_enum, global = true, default_value = "text")]
    output: OutputFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Manifest lifecycle: enable, disable, trigger, list, get.
    Manifest(manifest::ManifestArgs),
    /// Dead letter handling: retry, acknowledge, list.
    #[command(name = "dead-letter")]
    DeadLetter(dead_letter::DeadLetterArgs),
    /// Execution inspection: cancel, show, list.
    Execution(execution::ExecutionArgs),
    /// Work queue inspection: list.
    Queue(queue::QueueArgs),
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        if let Some(exit_err) = err.downcast_ref::<ExitError>() {
            eprintln!("error: {}", exit_err.message);
            std::process::exit(exit_err.code);
        }
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let paths = sched_daemon::Paths::resolve()?;
    let client = client::DaemonClient::new(paths.socket_path);

    match cli.command {
        Command::Manifest(args) => manifest::handle(args.command, &client, cli.output).await,
        Command::DeadLetter(args) => dead_letter::handle(args.command, &client, cli.output).await,
        Command::Execution(args) => execution::handle(args.command, &client, cli.output).await,
        Command::Queue(args) => queue::handle(args.command, &client, cli.output).await,
    }
}
