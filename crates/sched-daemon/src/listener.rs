// SPDX-License-Identifier: MIT

//! Listener: accepts Unix socket connections and dispatches each framed
//! request to either a `TriggerApi` mutation or a direct read of the
//! store's materialized state, one task per connection racing nothing
//! beyond the shared cancellation token used to stop accepting on
//! shutdown.

use std::sync::Arc;

use parking_lot::Mutex;
use sched_core::manifest::ManifestSpec;
use sched_core::Clock;
use sched_engine::{EngineError, ManifestStore, TriggerApi};
use sched_store::Store;
use sched_wire::contract;
use sched_wire::{ProtocolError, Request, Response};
use tokio::net::{UnixListener, UnixStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

pub async fn run<C: Clock>(
    listener: UnixListener,
    store: Arc<Mutex<Store>>,
    trigger_api: Arc<TriggerApi<C>>,
    manifest_store: Arc<ManifestStore>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                info!("listener shutting down");
                break;
            }
            accepted = listener.accept() => {
                match accepted {
                    Ok((stream, _addr)) => {
                        let store = Arc::clone(&store);
                        let trigger_api = Arc::clone(&trigger_api);
                        let manifest_store = Arc::clone(&manifest_store);
                        tokio::spawn(async move {
                            if let Err(err) = handle_connection(stream, store, trigger_api, manifest_store).await {
                                log_connection_error(err);
                            }
                        });
                    }
                    Err(err) => error!(error = %err, "accept failed"),
                }
            }
        }
    }
}

fn log_connection_error(err: ProtocolError) {
    match err {
        ProtocolError::Io(ref io) if io.kind() == std::io::ErrorKind::UnexpectedEof => {
            debug!("client disconnected")
        }
        other => warn!(error = %other, "connection error"),
    }
}

async fn handle_connection<C: Clock>(
    mut stream: UnixStream,
    store: Arc<Mutex<Store>>,
    trigger_api: Arc<TriggerApi<C>>,
    manifest_store: Arc<ManifestStore>,
) -> Result<(), ProtocolError> {
    let request = sched_wire::read_request(&mut stream).await?;
    debug!(request = ?request, "received request");
    let response = handle_request(request, &store, &trigger_api, &manifest_store);
    sched_wire::write_response(&mut stream, &response).await
}

fn handle_request<C: Clock>(
    request: Request,
    store: &Arc<Mutex<Store>>,
    trigger_api: &TriggerApi<C>,
    manifest_store: &ManifestStore,
) -> Response {
    match request {
        Request::Upsert { spec } => {
            let spec = match canonicalize_spec(spec) {
                Ok(spec) => spec,
                Err(err) => return Response::Error { message: err.to_string() },
            };
            match manifest_store.upsert(spec) {
                Ok(manifest) => Response::Upserted { manifest: Box::new((&manifest).into()) },
                Err(err) => error_response(err),
            }
        }
        Request::ScheduleMany { specs, prune_prefix } => {
            let specs = match specs.into_iter().map(canonicalize_spec).collect::<Result<Vec<_>, _>>() {
                Ok(specs) => specs,
                Err(err) => return Response::Error { message: err.to_string() },
            };
            match manifest_store.schedule_many(specs, prune_prefix.as_deref()) {
                Ok(manifests) => Response::ScheduleManyApplied {
                    manifests: manifests.iter().map(Into::into).collect(),
                    pruned: Vec::new(),
                },
                Err(err) => error_response(err),
            }
        }
        Request::Enable { external_id } => match trigger_api.enable(&external_id) {
            Ok(()) => Response::ManifestEnabled { external_id },
            Err(err) => error_response(err),
        },
        Request::Disable { external_id } => match trigger_api.disable(&external_id) {
            Ok(()) => Response::ManifestDisabled { external_id },
            Err(err) => error_response(err),
        },
        Request::Trigger { external_id, input_override } => {
            let input_override = match input_override.map(contract::canonicalize).transpose() {
                Ok(input_override) => input_override,
                Err(err) => return Response::Error { message: err.to_string() },
            };
            match trigger_api.trigger(&external_id, input_override) {
                Ok(outcome) => {
                    let work_queue_id = match outcome {
                        sched_engine::TriggerOutcome::Queued(id) => id,
                        sched_engine::TriggerOutcome::AlreadyQueued => {
                            return Response::Error {
                                message: format!("manifest {external_id} already has queued work"),
                            }
                        }
                    };
                    Response::Triggered { external_id, work_queue_id }
                }
                Err(err) => error_response(err),
            }
        }
        Request::RetryDeadLetter { dead_letter_id } => match trigger_api.retry_dead_letter(dead_letter_id) {
            Ok(retry_metadata_id) => Response::DeadLetterRetried { dead_letter_id, retry_metadata_id },
            Err(err) => error_response(err),
        },
        Request::AcknowledgeDeadLetter { dead_letter_id, resolution_note } => {
            match trigger_api.acknowledge_dead_letter(dead_letter_id, resolution_note) {
                Ok(()) => Response::DeadLetterAcknowledged { dead_letter_id },
                Err(err) => error_response(err),
            }
        }
        Request::RequestCancel { metadata_id } => match trigger_api.request_cancel(metadata_id) {
            Ok(()) => Response::CancelRequested { metadata_id },
            Err(err) => error_response(err),
        },

        Request::ListManifests => {
            let guard = store.lock();
            let manifests = guard.state().manifests.values().map(Into::into).collect();
            Response::Manifests { manifests }
        }
        Request::GetManifest { manifest_id } => {
            let guard = store.lock();
            let manifest = guard.state().manifests.get(&manifest_id).map(|m| Box::new(m.into()));
            Response::Manifest { manifest }
        }
        Request::ListDeadLetters => {
            let guard = store.lock();
            let dead_letters = guard.state().dead_letters.values().map(Into::into).collect();
            Response::DeadLetters { dead_letters }
        }
        Request::ListExecutions => {
            let guard = store.lock();
            let executions = guard.state().executions.values().map(Into::into).collect();
            Response::Executions { executions }
        }
        Request::GetExecution { metadata_id } => {
            let guard = store.lock();
            let execution = guard.state().executions.get(&metadata_id).map(|e| Box::new(e.into()));
            Response::Execution { execution }
        }
        Request::ListWorkQueue => {
            let guard = store.lock();
            let entries = guard.state().work_queue.values().map(Into::into).collect();
            Response::WorkQueue { entries }
        }
    }
}

fn error_response(err: EngineError) -> Response {
    Response::Error { message: err.to_string() }
}

/// Runs a manifest spec's `input_properties` through the wire's JSON
/// canonicalization profile before it reaches the manifest store — the
/// same contract applied to queued work's `input_override` above.
fn canonicalize_spec(mut spec: ManifestSpec) -> Result<ManifestSpec, contract::ContractError> {
    spec.input_properties = contract::canonicalize(&spec.input_properties)?;
    Ok(spec)
}
