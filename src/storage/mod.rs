// ============================================================================
// Storage Engine Boundary
// ============================================================================
//
// Sessions, transactions and ordered bulk writes against a document store.
// The sync and async traits mirror each other; InMemoryEngine implements both.
//
// ============================================================================

pub mod memory;

pub use memory::{InMemoryEngine, InMemorySession, Topology};

use crate::update::WriteOperation;
use async_trait::async_trait;
use std::sync::PoisonError;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum StorageError {
    #[error("Transactions are not supported: {0}")]
    TransactionsNotSupported(String),

    #[error("Duplicate key in collection '{collection}': {key}")]
    DuplicateKey { collection: String, key: String },

    #[error("Write conflict: {0}")]
    WriteConflict(String),

    #[error("Command failed: {0}")]
    CommandFailed(String),

    #[error("Session is closed")]
    SessionClosed,

    #[error("Lock error: {0}")]
    LockError(String),
}

impl<T> From<PoisonError<T>> for StorageError {
    fn from(err: PoisonError<T>) -> Self {
        StorageError::LockError(err.to_string())
    }
}

pub type StorageResult<T> = std::result::Result<T, StorageError>;

/// Per-kind effect counts reported by one bulk write.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BulkWriteResult {
    pub inserted_count: usize,
    pub matched_count: usize,
    pub modified_count: usize,
    pub deleted_count: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransactionOptions {
    pub max_commit_time: Option<Duration>,
}

pub trait StorageClient: Send + Sync {
    type Session: StorageSession;

    fn start_session(&self) -> StorageResult<Self::Session>;
}

pub trait StorageSession: Send {
    fn start_transaction(&mut self, options: &TransactionOptions) -> StorageResult<()>;

    fn commit_transaction(&mut self) -> StorageResult<()>;

    fn abort_transaction(&mut self) -> StorageResult<()>;

    /// Applies `operations` in order as one request against `collection`.
    fn bulk_write(
        &mut self,
        collection: &str,
        operations: &[WriteOperation],
    ) -> StorageResult<BulkWriteResult>;

    /// Releases the session. Must be safe to call more than once.
    ///
    /// A transaction still open on the session is discarded, never committed.
    fn end_session(&mut self);
}

#[async_trait]
pub trait AsyncStorageClient: Send + Sync {
    type Session: AsyncStorageSession;

    async fn start_session(&self) -> StorageResult<Self::Session>;
}

#[async_trait]
pub trait AsyncStorageSession: Send {
    async fn start_transaction(&mut self, options: &TransactionOptions) -> StorageResult<()>;

    async fn commit_transaction(&mut self) -> StorageResult<()>;

    async fn abort_transaction(&mut self) -> StorageResult<()>;

    async fn bulk_write(
        &mut self,
        collection: &str,
        operations: &[WriteOperation],
    ) -> StorageResult<BulkWriteResult>;

    /// Releases the session. Synchronous so it can run from `Drop`, and safe
    /// to call more than once.
    ///
    /// A transaction still open on the session must be discarded, never
    /// committed: an async scope dropped mid-save relies on this in place of
    /// an abort it cannot await.
    fn end_session(&mut self);
}
