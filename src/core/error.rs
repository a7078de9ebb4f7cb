use crate::executor::WriteCounts;
use crate::storage::StorageError;
use crate::tracking::EntryId;
use crate::update::OperationKind;
use std::fmt;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SaveError {
    #[error("Entity type '{0}' has no primary key; root documents need a key to be written")]
    MissingPrimaryKey(String),

    #[error(
        "Owned entity of type '{entity_type}' is not reachable from a tracked root entry; \
         load or attach the owning aggregate before saving"
    )]
    MissingRootEntry { entity_type: String },

    #[error(
        "The storage engine does not support transactions ({reason}). \
         Set the auto-transaction behavior to `Never` or use a transaction-capable \
         topology such as a replica set"
    )]
    TransactionUnsupported { reason: String },

    #[error(
        "Concurrency conflict in collection '{collection}': expected {expected}, storage reported {actual}"
    )]
    ConcurrencyConflict {
        collection: String,
        expected: WriteCounts,
        actual: WriteCounts,
        entries: Vec<ConflictedEntry>,
    },

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("Invalid transaction state: {0}")]
    InvalidTransactionState(String),

    #[error("SaveChanges was cancelled")]
    Cancelled,

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Invalid model: {0}")]
    InvalidModel(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Change tracking error: {0}")]
    Tracking(String),

    #[error("Lock error: {0}")]
    LockError(String),
}

impl SaveError {
    /// `true` for the only outcome a caller may reasonably retry after
    /// reloading the affected entities.
    pub fn is_concurrency_conflict(&self) -> bool {
        matches!(self, SaveError::ConcurrencyConflict { .. })
    }

    /// Entries attributed to a concurrency conflict. Empty for every other error.
    ///
    /// Bulk-write results only carry aggregate counts, so this is a hint: it
    /// lists every operation of a kind whose count diverged.
    pub fn conflicted_entries(&self) -> &[ConflictedEntry] {
        match self {
            SaveError::ConcurrencyConflict { entries, .. } => entries,
            _ => &[],
        }
    }
}

pub type Result<T> = std::result::Result<T, SaveError>;

impl<T> From<std::sync::PoisonError<T>> for SaveError {
    fn from(err: std::sync::PoisonError<T>) -> Self {
        Self::LockError(err.to_string())
    }
}

/// An operation reported as a possible participant in a concurrency conflict.
#[derive(Debug, Clone, PartialEq)]
pub struct ConflictedEntry {
    pub entry: EntryId,
    pub entity_type: String,
    pub kind: OperationKind,
    /// The `_id` the operation targeted, rendered for diagnostics.
    pub key: String,
}

impl fmt::Display for ConflictedEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.kind, self.entity_type, self.key)
    }
}
