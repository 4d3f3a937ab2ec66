//! Upload orchestration.
//!
//! [`UploadService`] drives a batch through its phases: schedule, create every
//! record in order, patch the stashed values, and finish. Requests are issued
//! strictly one at a time. The state is checkpointed through the
//! [`StatePersistence`] port so an interrupted run can be resumed.

use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::application::events::{emit, UploadEvent};
use crate::application::ports::{CreationClient, RecordSource, StatePersistence, UploadEventHandler};
use crate::application::retry::retry_with_backoff;
use crate::application::scheduling::{schedule, Schedule};
use crate::config::UploadConfig;
use crate::domain::record::{LocalId, Record, ServerIri, ValueId};
use crate::domain::stash::{StashItem, UnresolvedReason, UnresolvedStashEntry};
use crate::domain::upload_state::{BatchPhase, UploadState, STATE_FORMAT_VERSION};
use crate::error::CoreError;

/// Outcome of a run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UploadReport {
    /// Batch key
    pub batch_key: String,
    /// Phase the batch ended in
    pub phase: BatchPhase,
    /// Every created record and its IRI
    pub created: BTreeMap<LocalId, ServerIri>,
    /// Every failed record and its last error
    pub failed: BTreeMap<LocalId, String>,
    /// Stashed values that were not patched
    pub unresolved_stash: Vec<UnresolvedStashEntry>,
    /// True if the run stopped on a cancellation request
    pub interrupted: bool,
}

impl UploadReport {
    fn from_state(state: &UploadState, interrupted: bool) -> Self {
        Self {
            batch_key: state.batch_key.clone(),
            phase: state.phase,
            created: state.iri_resolver.lookup().clone(),
            failed: state
                .failed
                .iter()
                .map(|(id, f)| (id.clone(), f.error.clone()))
                .collect(),
            unresolved_stash: state.unresolved_stash.clone(),
            interrupted,
        }
    }

    /// True if everything was created and patched
    pub fn is_success(&self) -> bool {
        self.phase == BatchPhase::Done && !self.interrupted
    }

    /// Ids of the stashed values that were not patched
    pub fn unresolved_value_ids(&self) -> Vec<ValueId> {
        self.unresolved_stash.iter().map(|e| e.value_id().clone()).collect()
    }
}

/// Service for uploading a batch of records
pub struct UploadService {
    /// Remote repository
    client: Arc<dyn CreationClient>,

    /// Durable storage of the upload state
    persistence: Arc<dyn StatePersistence>,

    /// Event sink
    event_handler: Arc<dyn UploadEventHandler>,

    /// Configuration for fresh batches; resumed batches keep their own
    config: UploadConfig,

    /// Key of fresh batches
    batch_key: String,

    /// Checked between records and between patches
    cancellation: CancellationToken,
}

impl UploadService {
    /// Create a new upload service
    pub fn new(
        client: Arc<dyn CreationClient>,
        persistence: Arc<dyn StatePersistence>,
        event_handler: Arc<dyn UploadEventHandler>,
        config: UploadConfig,
    ) -> Self {
        Self {
            client,
            persistence,
            event_handler,
            config,
            batch_key: uuid::Uuid::new_v4().to_string(),
            cancellation: CancellationToken::new(),
        }
    }

    /// Use a fixed batch key instead of a random one
    pub fn with_batch_key(mut self, batch_key: impl Into<String>) -> Self {
        self.batch_key = batch_key.into();
        self
    }

    /// Stop the run when `token` is cancelled
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    /// Token that interrupts this service's runs when cancelled
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation.clone()
    }

    /// Upload a batch.
    ///
    /// If persisted state exists it is resumed and `source` is not read.
    /// Otherwise the records are scheduled first; input errors are returned
    /// before any request is sent.
    pub async fn run(&self, source: &dyn RecordSource) -> Result<UploadReport, CoreError> {
        if let Some(state) = self.persistence.load().await? {
            info!(batch = %state.batch_key, "Found saved upload state");
            return self.resume(state).await;
        }

        let records = source.records().await?;
        let Schedule { ordered, stash } = schedule(records)?;

        let mut state = UploadState::new(self.batch_key.clone(), ordered, stash, self.config.clone());
        self.emit(UploadEvent::Scheduled {
            batch_key: state.batch_key.clone(),
            records: state.pending.len(),
            stashed: state.stash.len(),
        })
        .await;

        self.set_phase(&mut state, BatchPhase::Uploading).await?;
        self.checkpoint(&mut state).await?;
        self.drive(state).await
    }

    /// Continue a batch from a saved state.
    ///
    /// Records already created are never sent again. With
    /// `retry_failed_on_resume`, failed records and unresolved stash entries
    /// get another attempt.
    pub async fn resume(&self, mut state: UploadState) -> Result<UploadReport, CoreError> {
        if state.format_version != STATE_FORMAT_VERSION {
            return Err(CoreError::UnsupportedStateVersion {
                found: state.format_version,
                supported: STATE_FORMAT_VERSION,
            });
        }
        if state.phase == BatchPhase::Done {
            self.persistence.clear().await?;
            return Ok(UploadReport::from_state(&state, false));
        }

        let recovered = state.recover_interrupted();
        if recovered > 0 {
            debug!(recovered, "Reset records interrupted mid-request");
        }
        let requeued = if state.config.retry_failed_on_resume {
            state.requeue_failed()
        } else {
            0
        };

        let needs_upload = !state.pending.is_empty() || state.phase == BatchPhase::Scheduling;
        if state.phase == BatchPhase::DoneWithFailures || (needs_upload && state.phase != BatchPhase::Uploading) {
            self.set_phase(&mut state, BatchPhase::Uploading).await?;
        }

        self.emit(UploadEvent::Resumed {
            batch_key: state.batch_key.clone(),
            pending: state.pending.len(),
            requeued,
        })
        .await;

        self.drive(state).await
    }

    async fn drive(&self, mut state: UploadState) -> Result<UploadReport, CoreError> {
        if state.phase == BatchPhase::Uploading {
            if self.upload_records(&mut state).await? {
                return self.interrupt(state).await;
            }
            self.set_phase(&mut state, BatchPhase::PatchingStash).await?;
        }

        if state.phase == BatchPhase::PatchingStash {
            if self.patch_stash(&mut state).await? {
                return self.interrupt(state).await;
            }

            let terminal = if state.failed.is_empty() && state.unresolved_stash.is_empty() {
                BatchPhase::Done
            } else {
                BatchPhase::DoneWithFailures
            };
            self.set_phase(&mut state, terminal).await?;

            if terminal == BatchPhase::Done {
                self.persistence.clear().await?;
            } else {
                self.checkpoint(&mut state).await?;
            }

            self.emit(UploadEvent::Finished {
                batch_key: state.batch_key.clone(),
                phase: terminal,
                created: state.iri_resolver.len(),
                failed: state.failed.len(),
                unresolved: state.unresolved_stash.len(),
            })
            .await;
        }

        Ok(UploadReport::from_state(&state, false))
    }

    /// Create every pending record. Returns true if cancelled.
    async fn upload_records(&self, state: &mut UploadState) -> Result<bool, CoreError> {
        let policy = state.config.retry.clone();
        let checkpoint_every = state.config.checkpoint_every.max(1);
        let mut since_checkpoint = 0;

        while let Some(head) = state.next_pending() {
            if self.cancellation.is_cancelled() {
                return Ok(true);
            }

            let id = head.local_id.clone();
            self.defer_unresolvable_values(state, &id).await?;

            let Some(record) = state.next_pending().cloned() else {
                break;
            };
            let request = resolve_record(&record, state)?;

            state.mark_creating(&id)?;
            let position = state.processed + 1;
            let total = state.total();
            let label = format!("Creating {}", record.designation());

            let client = &self.client;
            let result = retry_with_backoff(&policy, &label, self.event_handler.as_ref(), || {
                client.create(&request)
            })
            .await;

            match result {
                Ok(iri) => {
                    state.mark_created(&id, iri.clone())?;
                    self.emit(UploadEvent::RecordCreated {
                        position,
                        total,
                        local_id: id,
                        label: record.label.clone(),
                        iri,
                    })
                    .await;
                }
                Err(err) => {
                    state.mark_failed(&id, err.to_string())?;
                    self.emit(UploadEvent::RecordFailed {
                        position,
                        total,
                        local_id: id,
                        label: record.label.clone(),
                        error: err.to_string(),
                    })
                    .await;
                }
            }

            since_checkpoint += 1;
            if since_checkpoint >= checkpoint_every || state.pending.is_empty() {
                self.checkpoint(state).await?;
                since_checkpoint = 0;
            }
        }

        Ok(false)
    }

    /// Move values whose targets have no IRI out of the head record and into the stash
    async fn defer_unresolvable_values(&self, state: &mut UploadState, id: &LocalId) -> Result<(), CoreError> {
        let Some(head) = state.next_pending() else {
            return Ok(());
        };

        let mut blocked: Vec<(ValueId, Vec<LocalId>)> = Vec::new();
        for value in &head.values {
            let missing: Vec<LocalId> = value
                .referenced_ids()
                .into_iter()
                .filter(|target| !state.iri_resolver.contains(target))
                .collect();
            if !missing.is_empty() {
                blocked.push((value.id.clone(), missing));
            }
        }
        if blocked.is_empty() {
            return Ok(());
        }

        let ids: HashSet<ValueId> = blocked.iter().map(|(v, _)| v.clone()).collect();
        state.defer_values(id, &ids)?;
        for (value_id, missing) in blocked {
            self.emit(UploadEvent::ValueDeferred {
                source: id.clone(),
                value_id,
                missing,
            })
            .await;
        }
        Ok(())
    }

    /// Patch every stashed value onto its record. Returns true if cancelled.
    async fn patch_stash(&self, state: &mut UploadState) -> Result<bool, CoreError> {
        let policy = state.config.retry.clone();
        let checkpoint_every = state.config.checkpoint_every.max(1);
        let mut since_checkpoint = 0;

        let items: Vec<StashItem> = state.stash.iter().cloned().collect();
        for item in items {
            if self.cancellation.is_cancelled() {
                return Ok(true);
            }
            state.stash.remove(&item.source, &item.value.id);

            let outcome = match state.iri_resolver.get(&item.source).cloned() {
                None => Err(UnresolvedReason::SourceNotCreated),
                Some(source_iri) => match item.value.resolved(&state.iri_resolver) {
                    Err(missing) => Err(UnresolvedReason::MissingTargets { targets: missing }),
                    Ok(value) => {
                        let label = format!("Patching value '{}' of '{}'", item.value.id, item.source);
                        let client = &self.client;
                        retry_with_backoff(&policy, &label, self.event_handler.as_ref(), || {
                            client.patch(&source_iri, &value)
                        })
                        .await
                        .map(|_| source_iri.clone())
                        .map_err(|e| UnresolvedReason::PatchFailed { message: e.to_string() })
                    }
                },
            };

            match outcome {
                Ok(iri) => {
                    self.emit(UploadEvent::StashPatched {
                        source: item.source.clone(),
                        value_id: item.value.id.clone(),
                        iri,
                    })
                    .await;
                }
                Err(reason) => {
                    self.emit(UploadEvent::StashUnresolved {
                        source: item.source.clone(),
                        value_id: item.value.id.clone(),
                        reason: reason.clone(),
                    })
                    .await;
                    state.add_unresolved(UnresolvedStashEntry { item, reason });
                }
            }

            since_checkpoint += 1;
            if since_checkpoint >= checkpoint_every {
                self.checkpoint(state).await?;
                since_checkpoint = 0;
            }
        }

        Ok(false)
    }

    async fn interrupt(&self, mut state: UploadState) -> Result<UploadReport, CoreError> {
        self.checkpoint(&mut state).await?;
        self.emit(UploadEvent::Cancelled {
            batch_key: state.batch_key.clone(),
            pending: state.pending.len(),
        })
        .await;
        Ok(UploadReport::from_state(&state, true))
    }

    async fn checkpoint(&self, state: &mut UploadState) -> Result<(), CoreError> {
        state.update_timestamp();
        self.persistence.save(state).await?;
        self.emit(UploadEvent::Checkpointed {
            batch_key: state.batch_key.clone(),
            processed: state.processed,
        })
        .await;
        Ok(())
    }

    async fn set_phase(&self, state: &mut UploadState, next: BatchPhase) -> Result<(), CoreError> {
        let from = state.phase;
        state.set_phase(next)?;
        if from != next {
            self.emit(UploadEvent::PhaseChanged {
                batch_key: state.batch_key.clone(),
                from,
                to: next,
            })
            .await;
        }
        Ok(())
    }

    async fn emit(&self, event: UploadEvent) {
        emit(self.event_handler.as_ref(), event).await;
    }
}

/// Copy of `record` with every reference replaced by its IRI
fn resolve_record(record: &Record, state: &UploadState) -> Result<Record, CoreError> {
    let values = record
        .values
        .iter()
        .map(|value| {
            value.resolved(&state.iri_resolver).map_err(|missing| {
                CoreError::InvariantViolation(format!(
                    "value '{}' of '{}' still references ids without IRI: {:?}",
                    value.id, record.local_id, missing
                ))
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Record {
        local_id: record.local_id.clone(),
        label: record.label.clone(),
        class: record.class.clone(),
        values,
    })
}
