use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

use crate::domain::record::{LocalId, Value, ValueId};

/// Why a value was withheld from its record's creation request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StashReason {
    /// Removed to break a reference cycle
    Cycle,
    /// A target failed creation, so the value could not be sent
    FailedTarget,
}

/// A value waiting to be patched onto its already-created record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StashItem {
    /// Record the value belongs to
    pub source: LocalId,
    /// The value, still carrying local ids
    pub value: Value,
    /// Local ids the value refers to
    pub targets: Vec<LocalId>,
    /// Why it was stashed
    pub reason: StashReason,
}

impl StashItem {
    /// Create a stash item, deriving its targets from the value
    pub fn new(source: LocalId, value: Value, reason: StashReason) -> Self {
        let targets = value.referenced_ids();
        Self {
            source,
            value,
            targets,
            reason,
        }
    }
}

/// Stashed values keyed by source record
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Stash {
    items: BTreeMap<LocalId, Vec<StashItem>>,
}

impl Stash {
    /// Create an empty stash
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an item. A value already stashed for the same source is replaced.
    pub fn add(&mut self, item: StashItem) {
        let entries = self.items.entry(item.source.clone()).or_default();
        entries.retain(|existing| existing.value.id != item.value.id);
        entries.push(item);
    }

    /// Remove and return one stashed value
    pub fn remove(&mut self, source: &LocalId, value_id: &ValueId) -> Option<StashItem> {
        let entries = self.items.get_mut(source)?;
        let position = entries.iter().position(|item| &item.value.id == value_id)?;
        let item = entries.remove(position);
        if entries.is_empty() {
            self.items.remove(source);
        }
        Some(item)
    }

    /// Items stashed for one record
    pub fn items_for(&self, source: &LocalId) -> &[StashItem] {
        self.items.get(source).map(Vec::as_slice).unwrap_or_default()
    }

    /// Total number of stashed values
    pub fn len(&self) -> usize {
        self.items.values().map(Vec::len).sum()
    }

    /// True when nothing is stashed
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// All items, ordered by source id then stash order
    pub fn iter(&self) -> impl Iterator<Item = &StashItem> {
        self.items.values().flatten()
    }

    /// Ids of every stashed value
    pub fn value_ids(&self) -> HashSet<ValueId> {
        self.iter().map(|item| item.value.id.clone()).collect()
    }
}

/// Why a stashed value could not be patched
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum UnresolvedReason {
    /// Some targets never received an IRI
    MissingTargets {
        /// The targets without an IRI
        targets: Vec<LocalId>,
    },
    /// The record owning the value was never created
    SourceNotCreated,
    /// The patch request itself failed
    PatchFailed {
        /// Error reported by the client
        message: String,
    },
}

/// A stashed value that is reported back instead of being patched
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnresolvedStashEntry {
    /// The stashed item, kept whole so a later run can retry it
    pub item: StashItem,
    /// What prevented the patch
    pub reason: UnresolvedReason,
}

impl UnresolvedStashEntry {
    /// Identifier of the unresolved value
    pub fn value_id(&self) -> &ValueId {
        &self.item.value.id
    }
}
