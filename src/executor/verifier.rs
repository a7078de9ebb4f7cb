use crate::core::{ConflictedEntry, Result, SaveError};
use crate::storage::BulkWriteResult;
use crate::update::{Batch, OperationKind};
use std::fmt;
use tracing::{Level, event};

/// Documents inserted, updated and deleted by one batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteCounts {
    pub inserted: usize,
    pub updated: usize,
    pub deleted: usize,
}

impl WriteCounts {
    /// What a batch should affect if no concurrent writer interfered.
    pub fn expected(batch: &Batch) -> Self {
        let mut counts = WriteCounts::default();
        for operation in &batch.operations {
            match operation.kind() {
                OperationKind::Insert => counts.inserted += 1,
                OperationKind::Update => counts.updated += 1,
                OperationKind::Delete => counts.deleted += 1,
            }
        }
        counts
    }

    /// Updates count as matched, so an update that changed nothing still succeeds.
    pub fn reported(result: &BulkWriteResult) -> Self {
        WriteCounts {
            inserted: result.inserted_count,
            updated: result.matched_count,
            deleted: result.deleted_count,
        }
    }

    pub fn total(&self) -> usize {
        self.inserted + self.updated + self.deleted
    }

    fn diverges(&self, other: &WriteCounts, kind: OperationKind) -> bool {
        match kind {
            OperationKind::Insert => self.inserted != other.inserted,
            OperationKind::Update => self.updated != other.updated,
            OperationKind::Delete => self.deleted != other.deleted,
        }
    }
}

impl fmt::Display for WriteCounts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} inserted, {} updated, {} deleted",
            self.inserted, self.updated, self.deleted
        )
    }
}

/// Checks a batch outcome against its operations and returns the affected count.
pub fn verify_batch(batch: &Batch, result: &BulkWriteResult) -> Result<usize> {
    let expected = WriteCounts::expected(batch);
    let actual = WriteCounts::reported(result);
    if expected == actual {
        return Ok(actual.total());
    }

    let entries: Vec<ConflictedEntry> = batch
        .operations
        .iter()
        .filter(|op| expected.diverges(&actual, op.kind()))
        .map(|op| ConflictedEntry {
            entry: op.entry,
            entity_type: op.entity_type.clone(),
            kind: op.kind(),
            key: op.target_id().map(|id| id.to_string()).unwrap_or_default(),
        })
        .collect();

    event!(
        Level::WARN,
        collection = %batch.collection,
        expected = %expected,
        actual = %actual,
        suspects = entries.len(),
        "concurrency conflict"
    );

    Err(SaveError::ConcurrencyConflict {
        collection: batch.collection.clone(),
        expected,
        actual,
        entries,
    })
}
