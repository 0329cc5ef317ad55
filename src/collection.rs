use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::record::{Record, TrackedRecord};

/// Ordered set of [`TrackedRecord`]s keyed by community id.
///
/// New ids are appended, known ids are replaced in place, so order of first appearance
/// is kept for the lifetime of the collection. Nothing is ever removed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Collection {
    records: Vec<TrackedRecord>,
    index: HashMap<String, usize>,
}

/// Outcome of merging one batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeSummary {
    pub created: usize,
    pub updated: usize,
    pub duplicates: usize,
}

impl Collection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a collection from persisted records. The first record seen for an id wins.
    pub fn from_records(records: Vec<TrackedRecord>) -> Self {
        let mut collection = Self {
            records: Vec::with_capacity(records.len()),
            index: HashMap::with_capacity(records.len()),
        };
        for tracked in records {
            if collection.index.contains_key(tracked.id()) {
                warn!(id = tracked.id(), "dropping duplicate id in persisted collection");
                continue;
            }
            collection
                .index
                .insert(tracked.id().to_owned(), collection.records.len());
            collection.records.push(tracked);
        }
        collection
    }

    /// Applies a batch of observations.
    ///
    /// Each id is merged at most once per batch, against the state the collection had
    /// when the call started. Repeats of an id later in the same batch are skipped.
    pub fn merge(&mut self, batch: Vec<Record>, now: DateTime<Utc>) -> MergeSummary {
        let mut summary = MergeSummary::default();
        let mut seen = HashSet::with_capacity(batch.len());

        for record in batch {
            if !seen.insert(record.id.clone()) {
                debug!(id = %record.id, "skipping repeated id within batch");
                summary.duplicates += 1;
                continue;
            }

            match self.index.get(&record.id).copied() {
                Some(pos) => {
                    let next = self.records[pos].observe(record, now);
                    self.records[pos] = next;
                    summary.updated += 1;
                }
                None => {
                    self.index.insert(record.id.clone(), self.records.len());
                    self.records
                        .push(TrackedRecord::first_observation(record, now));
                    summary.created += 1;
                }
            }
        }
        summary
    }

    pub fn get(&self, id: &str) -> Option<&TrackedRecord> {
        self.index.get(id).map(|&pos| &self.records[pos])
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TrackedRecord> {
        self.records.iter()
    }

    pub fn records(&self) -> &[TrackedRecord] {
        &self.records
    }

    pub fn into_records(self) -> Vec<TrackedRecord> {
        self.records
    }
}
