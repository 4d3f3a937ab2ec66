use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::application::ports::UploadEventHandler;
use crate::domain::record::{LocalId, ServerIri, ValueId};
use crate::domain::stash::UnresolvedReason;
use crate::domain::upload_state::BatchPhase;
use crate::error::CoreError;

/// Progress of an upload, as reported to an [`UploadEventHandler`]
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum UploadEvent {
    /// The batch moved to another phase
    PhaseChanged {
        /// Batch key
        batch_key: String,
        /// Previous phase
        from: BatchPhase,
        /// New phase
        to: BatchPhase,
    },

    /// A fresh batch was scheduled
    Scheduled {
        /// Batch key
        batch_key: String,
        /// Records to create
        records: usize,
        /// Values stashed to break cycles
        stashed: usize,
    },

    /// A persisted batch was picked up again
    Resumed {
        /// Batch key
        batch_key: String,
        /// Records still to create
        pending: usize,
        /// Previously failed records queued again
        requeued: usize,
    },

    /// A record was created
    RecordCreated {
        /// 1-based position in the run
        position: usize,
        /// Number of records in the batch
        total: usize,
        /// Local id
        local_id: LocalId,
        /// Label of the record
        label: String,
        /// Assigned IRI
        iri: ServerIri,
    },

    /// A record could not be created
    RecordFailed {
        /// 1-based position in the run
        position: usize,
        /// Number of records in the batch
        total: usize,
        /// Local id
        local_id: LocalId,
        /// Label of the record
        label: String,
        /// Last error
        error: String,
    },

    /// A request failed and will be repeated
    RetryScheduled {
        /// What is being retried
        label: String,
        /// Attempt that just failed, 1-based
        attempt: u32,
        /// Attempts allowed in total
        max_attempts: u32,
        /// Wait before the next attempt
        delay_ms: u64,
        /// Error of the failed attempt
        error: String,
    },

    /// A value was moved to the stash because a target has no IRI
    ValueDeferred {
        /// Record holding the value
        source: LocalId,
        /// The value
        value_id: ValueId,
        /// Targets without an IRI
        missing: Vec<LocalId>,
    },

    /// A stashed value was patched onto its record
    StashPatched {
        /// Record holding the value
        source: LocalId,
        /// The value
        value_id: ValueId,
        /// IRI of the record
        iri: ServerIri,
    },

    /// A stashed value could not be patched
    StashUnresolved {
        /// Record holding the value
        source: LocalId,
        /// The value
        value_id: ValueId,
        /// What prevented the patch
        reason: UnresolvedReason,
    },

    /// The state was persisted
    Checkpointed {
        /// Batch key
        batch_key: String,
        /// Record outcomes so far
        processed: usize,
    },

    /// The run stopped on request; the state is saved for a resume
    Cancelled {
        /// Batch key
        batch_key: String,
        /// Records still to create
        pending: usize,
    },

    /// The run reached a terminal phase
    Finished {
        /// Batch key
        batch_key: String,
        /// Terminal phase
        phase: BatchPhase,
        /// Records created
        created: usize,
        /// Records failed
        failed: usize,
        /// Stashed values not patched
        unresolved: usize,
    },
}

impl UploadEvent {
    /// Returns the type of the event as a string
    pub fn event_type(&self) -> &'static str {
        match self {
            UploadEvent::PhaseChanged { .. } => "upload.phase_changed",
            UploadEvent::Scheduled { .. } => "upload.scheduled",
            UploadEvent::Resumed { .. } => "upload.resumed",
            UploadEvent::RecordCreated { .. } => "upload.record_created",
            UploadEvent::RecordFailed { .. } => "upload.record_failed",
            UploadEvent::RetryScheduled { .. } => "upload.retry_scheduled",
            UploadEvent::ValueDeferred { .. } => "upload.value_deferred",
            UploadEvent::StashPatched { .. } => "upload.stash_patched",
            UploadEvent::StashUnresolved { .. } => "upload.stash_unresolved",
            UploadEvent::Checkpointed { .. } => "upload.checkpointed",
            UploadEvent::Cancelled { .. } => "upload.cancelled",
            UploadEvent::Finished { .. } => "upload.finished",
        }
    }
}

/// Deliver an event; a failing handler never stops the upload
pub(crate) async fn emit(handler: &dyn UploadEventHandler, event: UploadEvent) {
    if let Err(e) = handler.handle(&event).await {
        warn!(event = event.event_type(), error = %e, "Event handler failed");
    }
}

/// Event handler that writes every event to `tracing`
#[derive(Debug, Default, Clone)]
pub struct TracingEventHandler;

impl TracingEventHandler {
    /// Create a new handler
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl UploadEventHandler for TracingEventHandler {
    async fn handle(&self, event: &UploadEvent) -> Result<(), CoreError> {
        match event {
            UploadEvent::PhaseChanged { batch_key, from, to } => {
                info!(batch = %batch_key, ?from, ?to, "Batch phase changed");
            }
            UploadEvent::Scheduled { batch_key, records, stashed } => {
                info!(batch = %batch_key, records, stashed, "Batch scheduled");
            }
            UploadEvent::Resumed { batch_key, pending, requeued } => {
                info!(batch = %batch_key, pending, requeued, "Resuming batch");
            }
            UploadEvent::RecordCreated { position, total, local_id, label, iri } => {
                info!("Created resource {position}/{total}: '{label}' (ID: '{local_id}', IRI: '{iri}')");
            }
            UploadEvent::RecordFailed { position, total, local_id, label, error } => {
                error!("Unable to create resource {position}/{total}: '{label}' (ID: '{local_id}'): {error}");
            }
            UploadEvent::RetryScheduled { label, attempt, max_attempts, delay_ms, error } => {
                warn!(attempt, max_attempts, delay_ms, %error, "{label} failed, retrying");
            }
            UploadEvent::ValueDeferred { source, value_id, missing } => {
                warn!(%source, %value_id, ?missing, "Value deferred until its targets exist");
            }
            UploadEvent::StashPatched { source, value_id, iri } => {
                debug!(%source, %value_id, %iri, "Stashed value patched");
            }
            UploadEvent::StashUnresolved { source, value_id, reason } => {
                warn!(%source, %value_id, ?reason, "Stashed value could not be patched");
            }
            UploadEvent::Checkpointed { batch_key, processed } => {
                debug!(batch = %batch_key, processed, "Upload state saved");
            }
            UploadEvent::Cancelled { batch_key, pending } => {
                warn!(batch = %batch_key, pending, "Upload cancelled, state saved for resume");
            }
            UploadEvent::Finished { batch_key, phase, created, failed, unresolved } => {
                info!(batch = %batch_key, ?phase, created, failed, unresolved, "Upload finished");
            }
        }
        Ok(())
    }
}
