// ============================================================================
// docsave Library
// ============================================================================
//
// Unit-of-work persistence for document stores:
//
//   ChangeTracker -> root resolution -> operation synthesis -> batching
//                 -> transactional execution with concurrency verification
//
// ============================================================================

pub mod cancel;
pub mod core;
pub mod executor;
pub mod facade;
pub mod model;
pub mod serializer;
pub mod storage;
pub mod tracking;
pub mod transaction;
pub mod update;

pub use cancel::CancellationToken;
pub use core::{ConflictedEntry, Document, Result, SaveError, Value};
pub use executor::WriteCounts;
pub use facade::{DocumentDatabase, SaveChangesConfig};
pub use model::{EntityType, Model, NavigationDescriptor, PropertyDescriptor, ValueGeneration, ValueKind};
pub use serializer::{DocumentReader, MaterializedEntity, StandardConverter, ValueConverter};
pub use storage::{
    AsyncStorageClient, AsyncStorageSession, BulkWriteResult, InMemoryEngine, StorageClient,
    StorageError, StorageSession, TransactionOptions,
};
pub use tracking::{ChangeTracker, EntityState, EntryId};
pub use transaction::{AutoTransactionBehavior, TransactionState};
pub use update::{OperationKind, WriteOperation};
