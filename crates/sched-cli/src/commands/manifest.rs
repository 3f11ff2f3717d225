// SPDX-License-Identifier: MIT

//! `sched manifest` subcommands: upsert/enable/disable/trigger plus
//! read-only list/get against the daemon's materialized manifest state.

use clap::{Args, Subcommand};
use sched_core::manifest::{ManifestId, ManifestSpec, ScheduleType};
use sched_wire::{ManifestDetail, ManifestSummary, Request, Response};

use crate::client::DaemonClient;
use crate::exit_error::ExitError;
use crate::output::{format_or_json, handle_list, OutputFormat};

#[derive(Args)]
pub struct ManifestArgs {
    #[command(subcommand)]
    pub command: ManifestCommand,
}

#[derive(Subcommand)]
pub enum ManifestCommand {
    /// Register or replace a manifest, looked up by external_id.
    Upsert {
        external_id: String,
        #[arg(long)]
        workflow_name: String,
        #[arg(long, default_value = "Input")]
        input_type_name: String,
        /// JSON blob for input_properties; defaults to `{}`.
        #[arg(long)]
        input_properties: Option<String>,
        #[arg(long)]
        cron: Option<String>,
        #[arg(long)]
        interval_secs: Option<u64>,
        #[arg(long)]
        depends_on: Option<String>,
        #[arg(long)]
        dormant_dependent_on: Option<String>,
        #[arg(long)]
        disabled: bool,
        #[arg(long, default_value_t = 3)]
        max_retries: u32,
        #[arg(long)]
        timeout_secs: Option<u64>,
        #[arg(long, default_value_t = 0)]
        priority: i32,
    },
    /// Re-enable a manifest for automatic scheduling.
    Enable { external_id: String },
    /// Disable a manifest; in-flight executions are unaffected.
    Disable { external_id: String },
    /// Enqueue one ad-hoc execution regardless of schedule.
    Trigger {
        external_id: String,
        /// JSON blob overriding the manifest's own input_properties.
        #[arg(long)]
        input: Option<String>,
    },
    /// List every known manifest.
    List,
    /// Show one manifest's full detail.
    Get { manifest_id: String },
}

pub async fn handle(command: ManifestCommand, client: &DaemonClient, format: OutputFormat) -> anyhow::Result<()> {
    match command {
        ManifestCommand::Upsert {
            external_id,
            workflow_name,
            input_type_name,
            input_properties,
            cron,
            interval_secs,
            depends_on,
            dormant_dependent_on,
            disabled,
            max_retries,
            timeout_secs,
            priority,
        } => {
            let spec = build_spec(
                external_id,
                workflow_name,
                input_type_name,
                input_properties,
                cron,
                interval_secs,
                depends_on,
                dormant_dependent_on,
                disabled,
                max_retries,
                timeout_secs,
                priority,
            )?;
            match client.send(&Request::Upsert { spec }).await? {
                Response::Upserted { manifest } => {
                    println!("upserted manifest {} ({})", manifest.external_id, manifest.id);
                    Ok(())
                }
                other => DaemonClient::reject(other),
            }
        }
        ManifestCommand::Enable { external_id } => match client.send(&Request::Enable { external_id }).await? {
            Response::ManifestEnabled { external_id } => {
                println!("enabled manifest {external_id}");
                Ok(())
            }
            other => DaemonClient::reject(other),
        },
        ManifestCommand::Disable { external_id } => match client.send(&Request::Disable { external_id }).await? {
            Response::ManifestDisabled { external_id } => {
                println!("disabled manifest {external_id}");
                Ok(())
            }
            other => DaemonClient::reject(other),
        },
        ManifestCommand::Trigger { external_id, input } => {
            let input_override = input.map(|raw| serde_json::from_str(&raw)).transpose()?;
            match client.send(&Request::Trigger { external_id, input_override }).await? {
                Response::Triggered { external_id, work_queue_id } => {
                    println!("queued manifest {external_id} as work queue entry {work_queue_id}");
                    Ok(())
                }
                other => DaemonClient::reject(other),
            }
        }
        ManifestCommand::List => {
            let manifests = match client.send(&Request::ListManifests).await? {
                Response::Manifests { manifests } => manifests,
                other => return DaemonClient::reject(other),
            };
            handle_list(format, &manifests, "no manifests", render_summary)?;
            Ok(())
        }
        ManifestCommand::Get { manifest_id } => {
            let manifest_id = ManifestId::from_string(&manifest_id);
            let manifest = match client.send(&Request::GetManifest { manifest_id }).await? {
                Response::Manifest { manifest } => manifest,
                other => return DaemonClient::reject(other),
            };
            let Some(manifest) = manifest else {
                return Err(ExitError::new(1, format!("manifest {manifest_id} not found")).into());
            };
            format_or_json(format, &*manifest, render_detail)?;
            Ok(())
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn build_spec(
    external_id: String,
    workflow_name: String,
    input_type_name: String,
    input_properties: Option<String>,
    cron: Option<String>,
    interval_secs: Option<u64>,
    depends_on: Option<String>,
    dormant_dependent_on: Option<String>,
    disabled: bool,
    max_retries: u32,
    timeout_secs: Option<u64>,
    priority: i32,
) -> anyhow::Result<ManifestSpec> {
    let (schedule_type, depends_on_external_id) = if let Some(parent) = dormant_dependent_on {
        (ScheduleType::DormantDependent, Some(parent))
    } else if let Some(parent) = depends_on {
        (ScheduleType::Dependent, Some(parent))
    } else if cron.is_some() {
        (ScheduleType::Cron, None)
    } else if interval_secs.is_some() {
        (ScheduleType::Interval, None)
    } else {
        (ScheduleType::None, None)
    };

    let mut spec = ManifestSpec::new(external_id, workflow_name, input_type_name, schedule_type);
    if let Some(raw) = input_properties {
        spec.input_properties = serde_json::from_str(&raw)?;
    }
    spec.cron_expression = cron;
    spec.interval = interval_secs.map(std::time::Duration::from_secs);
    spec.depends_on_external_id = depends_on_external_id;
    spec.is_enabled = !disabled;
    spec.max_retries = max_retries;
    spec.timeout = timeout_secs.map(std::time::Duration::from_secs);
    spec.priority = priority;
    Ok(spec)
}

fn render_summary(m: &ManifestSummary) {
    println!(
        "{}  {}  enabled={}  schedule={:?}  workflow={}",
        m.id, m.external_id, m.is_enabled, m.schedule_type, m.workflow_name
    );
}

fn render_detail(m: &ManifestDetail) {
    println!("id:               {}", m.id);
    println!("external_id:      {}", m.external_id);
    println!("workflow_name:    {}", m.workflow_name);
    println!("input_type_name:  {}", m.input_type_name);
    println!("enabled:          {}", m.is_enabled);
    println!("schedule_type:    {:?}", m.schedule_type);
    if let Some(cron) = &m.cron_expression {
        println!("cron_expression:  {cron}");
    }
    if let Some(dep) = &m.depends_on_manifest_id {
        println!("depends_on:       {dep}");
    }
    println!("priority:         {}", m.priority);
    println!("max_retries:      {}", m.max_retries);
    if let Some(last) = m.last_successful_run {
        println!("last_successful:  {last}");
    }
}
