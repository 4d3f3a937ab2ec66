//! Resumable state of one upload batch.
//!
//! The state is the only mutable thing the orchestrator owns. It is persisted
//! as versioned JSON after record outcomes and after the stash pass, and is
//! loaded instead of scheduling again when a run resumes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet, VecDeque};

use crate::config::UploadConfig;
use crate::domain::iri_resolver::IriResolver;
use crate::domain::record::{LocalId, Record, ServerIri, ValueId};
use crate::domain::stash::{Stash, StashItem, StashReason, UnresolvedStashEntry};
use crate::error::CoreError;

/// Version of the persisted state layout
pub const STATE_FORMAT_VERSION: u32 = 1;

/// Status of a single record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecordStatus {
    /// Waiting to be created
    Pending,
    /// A create request is in flight
    Creating,
    /// Created on the server
    Created,
    /// Creation failed
    Failed,
}

/// Phase of the whole batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BatchPhase {
    /// Building the schedule
    Scheduling,
    /// Creating records in schedule order
    Uploading,
    /// Patching stashed values onto created records
    PatchingStash,
    /// Everything was created and patched
    Done,
    /// Finished, but some records or stashed values are outstanding
    DoneWithFailures,
}

impl BatchPhase {
    /// Whether the batch may move from `self` to `next`
    pub fn can_transition_to(self, next: BatchPhase) -> bool {
        use BatchPhase::*;
        self == next
            || matches!(
                (self, next),
                (Scheduling, Uploading)
                    | (Uploading, PatchingStash)
                    | (PatchingStash, Done)
                    | (PatchingStash, DoneWithFailures)
                    | (PatchingStash, Uploading)
                    | (DoneWithFailures, Uploading)
            )
    }

    /// True for `Done` and `DoneWithFailures`
    pub fn is_terminal(self) -> bool {
        matches!(self, BatchPhase::Done | BatchPhase::DoneWithFailures)
    }
}

/// A record whose creation failed, kept so a later run can retry it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailedRecord {
    /// The record as it was sent
    pub record: Record,
    /// Last error reported for it
    pub error: String,
    /// Position in the processing order, used to re-queue failures in order
    pub position: usize,
}

/// Aggregate: upload state of one batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadState {
    /// Layout version, see [`STATE_FORMAT_VERSION`]
    pub format_version: u32,

    /// Key identifying the batch (input and target server)
    pub batch_key: String,

    /// Current batch phase
    pub phase: BatchPhase,

    /// Records still to be created, in schedule order
    pub pending: VecDeque<Record>,

    /// Status of every record of the batch
    pub statuses: BTreeMap<LocalId, RecordStatus>,

    /// Values waiting to be patched
    pub stash: Stash,

    /// IRIs of the records created so far
    pub iri_resolver: IriResolver,

    /// Records whose creation failed
    pub failed: BTreeMap<LocalId, FailedRecord>,

    /// Stashed values that could not be patched
    pub unresolved_stash: Vec<UnresolvedStashEntry>,

    /// Configuration of the run that created this state
    pub config: UploadConfig,

    /// Number of record outcomes so far
    pub processed: usize,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

impl UploadState {
    /// Create the state for a freshly scheduled batch
    pub fn new(batch_key: impl Into<String>, ordered: Vec<Record>, stash: Stash, config: UploadConfig) -> Self {
        let now = Utc::now();
        let statuses = ordered
            .iter()
            .map(|r| (r.local_id.clone(), RecordStatus::Pending))
            .collect();

        Self {
            format_version: STATE_FORMAT_VERSION,
            batch_key: batch_key.into(),
            phase: BatchPhase::Scheduling,
            pending: ordered.into(),
            statuses,
            stash,
            iri_resolver: IriResolver::new(),
            failed: BTreeMap::new(),
            unresolved_stash: Vec::new(),
            config,
            processed: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Update the timestamp
    #[inline]
    pub fn update_timestamp(&mut self) {
        self.updated_at = Utc::now();
    }

    /// Number of records in the batch
    pub fn total(&self) -> usize {
        self.statuses.len()
    }

    /// Status of a record
    pub fn status(&self, id: &LocalId) -> Option<RecordStatus> {
        self.statuses.get(id).copied()
    }

    /// Whether the record has been created
    pub fn is_created(&self, id: &LocalId) -> bool {
        self.status(id) == Some(RecordStatus::Created)
    }

    /// The next record to create
    pub fn next_pending(&self) -> Option<&Record> {
        self.pending.front()
    }

    /// Move the batch to another phase
    pub fn set_phase(&mut self, next: BatchPhase) -> Result<(), CoreError> {
        if !self.phase.can_transition_to(next) {
            return Err(CoreError::InvariantViolation(format!(
                "Cannot move batch from {:?} to {:?}",
                self.phase, next
            )));
        }
        self.phase = next;
        self.update_timestamp();
        Ok(())
    }

    /// Mark the head of the queue as being created
    pub fn mark_creating(&mut self, id: &LocalId) -> Result<(), CoreError> {
        self.expect_head(id)?;
        self.transition(id, RecordStatus::Pending, RecordStatus::Creating)
    }

    /// Record the IRI of the head record and drop it from the queue
    pub fn mark_created(&mut self, id: &LocalId, iri: ServerIri) -> Result<(), CoreError> {
        self.expect_head(id)?;
        self.transition(id, RecordStatus::Creating, RecordStatus::Created)?;
        self.pending.pop_front();
        self.iri_resolver.insert(id.clone(), iri);
        self.processed += 1;
        Ok(())
    }

    /// Record the failure of the head record and drop it from the queue
    pub fn mark_failed(&mut self, id: &LocalId, error: impl Into<String>) -> Result<(), CoreError> {
        self.expect_head(id)?;
        self.transition(id, RecordStatus::Creating, RecordStatus::Failed)?;
        if let Some(record) = self.pending.pop_front() {
            self.failed.insert(
                id.clone(),
                FailedRecord {
                    record,
                    error: error.into(),
                    position: self.processed,
                },
            );
        }
        self.processed += 1;
        Ok(())
    }

    /// Move values of the head record into the stash because their targets have no IRI.
    ///
    /// Returns the stashed items.
    pub fn defer_values(&mut self, id: &LocalId, value_ids: &HashSet<ValueId>) -> Result<Vec<StashItem>, CoreError> {
        self.expect_head(id)?;
        let Some(head) = self.pending.front_mut() else {
            return Ok(Vec::new());
        };

        let (stripped, removed) = head.without_values(value_ids);
        *head = stripped;

        let items: Vec<StashItem> = removed
            .into_iter()
            .map(|value| StashItem::new(id.clone(), value, StashReason::FailedTarget))
            .collect();
        for item in &items {
            self.stash.add(item.clone());
        }
        self.update_timestamp();
        Ok(items)
    }

    /// Record a stashed value that could not be patched
    pub fn add_unresolved(&mut self, entry: UnresolvedStashEntry) {
        self.unresolved_stash.push(entry);
        self.update_timestamp();
    }

    /// Reset records left in `Creating` by an interrupted run back to `Pending`
    pub fn recover_interrupted(&mut self) -> usize {
        let mut recovered = 0;
        for status in self.statuses.values_mut() {
            if *status == RecordStatus::Creating {
                *status = RecordStatus::Pending;
                recovered += 1;
            }
        }
        recovered
    }

    /// Put failed records and unresolved stash entries back in line for another attempt.
    ///
    /// Failed records go ahead of the remaining queue in their original order.
    /// Returns the number of re-queued records.
    pub fn requeue_failed(&mut self) -> usize {
        let mut failed: Vec<FailedRecord> = std::mem::take(&mut self.failed).into_values().collect();
        failed.sort_by_key(|f| f.position);
        let count = failed.len();

        for failure in failed.into_iter().rev() {
            self.statuses
                .insert(failure.record.local_id.clone(), RecordStatus::Pending);
            self.pending.push_front(failure.record);
        }
        self.processed = self.processed.saturating_sub(count);

        for entry in std::mem::take(&mut self.unresolved_stash) {
            self.stash.add(entry.item);
        }

        self.update_timestamp();
        count
    }

    /// Serialize to JSON
    pub fn to_json(&self) -> Result<String, CoreError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Deserialize from JSON, rejecting states written with another layout version
    pub fn from_json(json: &str) -> Result<Self, CoreError> {
        let raw: serde_json::Value = serde_json::from_str(json)?;
        let found = raw
            .get("format_version")
            .and_then(serde_json::Value::as_u64)
            .ok_or_else(|| CoreError::SerializationError("upload state has no format_version".to_string()))?;

        if found != u64::from(STATE_FORMAT_VERSION) {
            return Err(CoreError::UnsupportedStateVersion {
                found: u32::try_from(found).unwrap_or(u32::MAX),
                supported: STATE_FORMAT_VERSION,
            });
        }

        Ok(serde_json::from_value(raw)?)
    }

    fn expect_head(&self, id: &LocalId) -> Result<(), CoreError> {
        match self.pending.front() {
            Some(head) if &head.local_id == id => Ok(()),
            Some(head) => Err(CoreError::InvariantViolation(format!(
                "Record '{}' is not next in line ('{}' is)",
                id, head.local_id
            ))),
            None => Err(CoreError::InvariantViolation(format!(
                "Record '{}' is not pending, the queue is empty",
                id
            ))),
        }
    }

    fn transition(&mut self, id: &LocalId, from: RecordStatus, to: RecordStatus) -> Result<(), CoreError> {
        match self.statuses.get_mut(id) {
            Some(status) if *status == from => {
                *status = to;
                self.update_timestamp();
                Ok(())
            }
            Some(status) => Err(CoreError::InvariantViolation(format!(
                "Cannot move record '{}' from {:?} to {:?}",
                id, status, to
            ))),
            None => Err(CoreError::InvariantViolation(format!("Unknown record '{}'", id))),
        }
    }
}
