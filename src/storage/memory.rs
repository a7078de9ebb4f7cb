use super::{
    AsyncStorageClient, AsyncStorageSession, BulkWriteResult, StorageClient, StorageError,
    StorageResult, StorageSession, TransactionOptions,
};
use crate::core::{Document, Value};
use crate::serializer::ID_ELEMENT;
use crate::update::{WriteModel, WriteOperation};
use async_trait::async_trait;
use log::debug;
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::{Arc, Mutex};

/// Deployment shape of the engine. Only replica sets accept transactions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Topology {
    Standalone,
    #[default]
    ReplicaSet,
}

#[derive(Debug, Clone, Default)]
struct Collection {
    documents: Vec<Document>,
    /// Bumped on every mutation; used to detect write-write conflicts at commit.
    version: u64,
}

impl Collection {
    fn position(&self, filter: &Document) -> Option<usize> {
        self.documents.iter().position(|doc| matches_filter(doc, filter))
    }

    /// Ordered apply: stops at the first failing operation, keeping earlier effects.
    fn apply(&mut self, name: &str, operations: &[WriteOperation]) -> StorageResult<BulkWriteResult> {
        let mut result = BulkWriteResult::default();

        for operation in operations {
            match &operation.model {
                WriteModel::InsertOne { document } => {
                    let id = document.get(ID_ELEMENT).unwrap_or(&Value::Null);
                    let duplicate = self
                        .documents
                        .iter()
                        .any(|existing| existing.get(ID_ELEMENT).unwrap_or(&Value::Null) == id);
                    if duplicate {
                        return Err(StorageError::DuplicateKey {
                            collection: name.to_string(),
                            key: id.to_string(),
                        });
                    }
                    self.documents.push(document.clone());
                    self.version += 1;
                    result.inserted_count += 1;
                }
                WriteModel::UpdateOne { filter, set } => {
                    if let Some(index) = self.position(filter) {
                        result.matched_count += 1;
                        let target = &mut self.documents[index];
                        let mut changed = false;
                        for (name, value) in set.iter() {
                            if target.get(name) != Some(value) {
                                target.insert(name, value.clone());
                                changed = true;
                            }
                        }
                        if changed {
                            self.version += 1;
                            result.modified_count += 1;
                        }
                    }
                }
                WriteModel::DeleteOne { filter } => {
                    if let Some(index) = self.position(filter) {
                        self.documents.remove(index);
                        self.version += 1;
                        result.deleted_count += 1;
                    }
                }
            }
        }

        Ok(result)
    }
}

/// Equality on every filter element; a missing element compares as null.
fn matches_filter(document: &Document, filter: &Document) -> bool {
    filter
        .iter()
        .all(|(path, expected)| document.get_path(path).unwrap_or(&Value::Null) == expected)
}

#[derive(Debug, Default)]
struct EngineState {
    collections: HashMap<String, Collection>,
    failing_writes: HashMap<String, String>,
    failing_commit: Option<String>,
    failing_abort: Option<String>,
    open_sessions: usize,
    sessions_started: usize,
}

/// Embedded document store with sessions and snapshot transactions.
///
/// Clones share the same data, so a test can keep a handle for inspection
/// while a `DocumentDatabase` owns another.
#[derive(Debug, Clone, Default)]
pub struct InMemoryEngine {
    state: Arc<Mutex<EngineState>>,
    topology: Topology,
}

impl InMemoryEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// A single-node deployment that rejects transactions.
    pub fn standalone() -> Self {
        Self {
            state: Arc::default(),
            topology: Topology::Standalone,
        }
    }

    pub fn topology(&self) -> Topology {
        self.topology
    }

    /// All committed documents of a collection, in insertion order.
    pub fn documents(&self, collection: &str) -> StorageResult<Vec<Document>> {
        let state = self.state.lock()?;
        Ok(state
            .collections
            .get(collection)
            .map(|c| c.documents.clone())
            .unwrap_or_default())
    }

    pub fn find(&self, collection: &str, filter: &Document) -> StorageResult<Vec<Document>> {
        let state = self.state.lock()?;
        Ok(state
            .collections
            .get(collection)
            .map(|c| {
                c.documents
                    .iter()
                    .filter(|doc| matches_filter(doc, filter))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    pub fn find_one(&self, collection: &str, filter: &Document) -> StorageResult<Option<Document>> {
        Ok(self.find(collection, filter)?.into_iter().next())
    }

    pub fn count(&self, collection: &str) -> StorageResult<usize> {
        let state = self.state.lock()?;
        Ok(state.collections.get(collection).map_or(0, |c| c.documents.len()))
    }

    /// Makes the next bulk write against `collection` fail without applying anything.
    pub fn fail_next_write(&self, collection: &str, message: &str) -> StorageResult<()> {
        let mut state = self.state.lock()?;
        state
            .failing_writes
            .insert(collection.to_string(), message.to_string());
        Ok(())
    }

    /// Makes the next transaction commit fail. The transaction's writes are lost.
    pub fn fail_next_commit(&self, message: &str) -> StorageResult<()> {
        let mut state = self.state.lock()?;
        state.failing_commit = Some(message.to_string());
        Ok(())
    }

    /// Makes the next transaction abort fail. The transaction stays pending
    /// until its session ends, which discards it.
    pub fn fail_next_abort(&self, message: &str) -> StorageResult<()> {
        let mut state = self.state.lock()?;
        state.failing_abort = Some(message.to_string());
        Ok(())
    }

    /// Sessions started and not yet ended.
    pub fn open_sessions(&self) -> StorageResult<usize> {
        Ok(self.state.lock()?.open_sessions)
    }

    pub fn sessions_started(&self) -> StorageResult<usize> {
        Ok(self.state.lock()?.sessions_started)
    }

    fn open_session(&self) -> StorageResult<InMemorySession> {
        let mut state = self.state.lock()?;
        state.open_sessions += 1;
        state.sessions_started += 1;
        debug!("in-memory session opened ({} open)", state.open_sessions);
        Ok(InMemorySession {
            engine: self.clone(),
            transaction: None,
            ended: false,
        })
    }
}

#[derive(Debug, Default)]
struct PendingTransaction {
    /// Private copies of every collection the transaction has written.
    working: HashMap<String, Collection>,
    base_versions: HashMap<String, u64>,
}

#[derive(Debug)]
pub struct InMemorySession {
    engine: InMemoryEngine,
    transaction: Option<PendingTransaction>,
    ended: bool,
}

impl InMemorySession {
    pub fn in_transaction(&self) -> bool {
        self.transaction.is_some()
    }

    fn ensure_open(&self) -> StorageResult<()> {
        if self.ended {
            Err(StorageError::SessionClosed)
        } else {
            Ok(())
        }
    }

    fn begin(&mut self, options: &TransactionOptions) -> StorageResult<()> {
        self.ensure_open()?;
        if self.engine.topology == Topology::Standalone {
            return Err(StorageError::TransactionsNotSupported(
                "Transaction numbers are only allowed on a replica set member or mongos".to_string(),
            ));
        }
        if self.transaction.is_some() {
            return Err(StorageError::CommandFailed(
                "Transaction already in progress".to_string(),
            ));
        }
        debug!("transaction started (max_commit_time={:?})", options.max_commit_time);
        self.transaction = Some(PendingTransaction::default());
        Ok(())
    }

    fn commit(&mut self) -> StorageResult<()> {
        self.ensure_open()?;
        let transaction = self.transaction.take().ok_or_else(|| {
            StorageError::CommandFailed("No transaction in progress".to_string())
        })?;

        let mut state = self.engine.state.lock()?;
        if let Some(message) = state.failing_commit.take() {
            return Err(StorageError::CommandFailed(message));
        }

        for (name, base) in &transaction.base_versions {
            let current = state.collections.get(name).map_or(0, |c| c.version);
            if current != *base {
                return Err(StorageError::WriteConflict(format!(
                    "Collection '{}' was modified by another transaction",
                    name
                )));
            }
        }

        for (name, mut collection) in transaction.working {
            let base = transaction.base_versions.get(&name).copied().unwrap_or(0);
            if collection.version != base {
                collection.version = base + 1;
                state.collections.insert(name, collection);
            }
        }
        debug!("transaction committed");
        Ok(())
    }

    fn abort(&mut self) -> StorageResult<()> {
        self.ensure_open()?;
        if self.transaction.is_some() {
            if let Some(message) = self.engine.state.lock()?.failing_abort.take() {
                return Err(StorageError::CommandFailed(message));
            }
        }
        match self.transaction.take() {
            Some(_) => {
                debug!("transaction aborted");
                Ok(())
            }
            None => Err(StorageError::CommandFailed(
                "No transaction in progress".to_string(),
            )),
        }
    }

    fn write(&mut self, collection: &str, operations: &[WriteOperation]) -> StorageResult<BulkWriteResult> {
        self.ensure_open()?;
        let mut state = self.engine.state.lock()?;
        if let Some(message) = state.failing_writes.remove(collection) {
            return Err(StorageError::CommandFailed(message));
        }

        let result = match self.transaction.as_mut() {
            None => state
                .collections
                .entry(collection.to_string())
                .or_default()
                .apply(collection, operations),
            Some(transaction) => {
                let working = match transaction.working.entry(collection.to_string()) {
                    Entry::Occupied(entry) => entry.into_mut(),
                    Entry::Vacant(entry) => {
                        let snapshot = state.collections.get(collection).cloned().unwrap_or_default();
                        transaction
                            .base_versions
                            .insert(collection.to_string(), snapshot.version);
                        entry.insert(snapshot)
                    }
                };
                working.apply(collection, operations)
            }
        };

        debug!(
            "bulk write on '{}': {} operation(s) -> {:?}",
            collection,
            operations.len(),
            result
        );
        result
    }

    fn release(&mut self) {
        if self.ended {
            return;
        }
        self.ended = true;
        self.transaction = None;
        if let Ok(mut state) = self.engine.state.lock() {
            state.open_sessions = state.open_sessions.saturating_sub(1);
            debug!("in-memory session ended ({} open)", state.open_sessions);
        }
    }
}

impl Drop for InMemorySession {
    fn drop(&mut self) {
        self.release();
    }
}

impl StorageClient for InMemoryEngine {
    type Session = InMemorySession;

    fn start_session(&self) -> StorageResult<InMemorySession> {
        self.open_session()
    }
}

impl StorageSession for InMemorySession {
    fn start_transaction(&mut self, options: &TransactionOptions) -> StorageResult<()> {
        self.begin(options)
    }

    fn commit_transaction(&mut self) -> StorageResult<()> {
        self.commit()
    }

    fn abort_transaction(&mut self) -> StorageResult<()> {
        self.abort()
    }

    fn bulk_write(
        &mut self,
        collection: &str,
        operations: &[WriteOperation],
    ) -> StorageResult<BulkWriteResult> {
        self.write(collection, operations)
    }

    fn end_session(&mut self) {
        self.release();
    }
}

#[async_trait]
impl AsyncStorageClient for InMemoryEngine {
    type Session = InMemorySession;

    async fn start_session(&self) -> StorageResult<InMemorySession> {
        tokio::task::yield_now().await;
        self.open_session()
    }
}

#[async_trait]
impl AsyncStorageSession for InMemorySession {
    async fn start_transaction(&mut self, options: &TransactionOptions) -> StorageResult<()> {
        tokio::task::yield_now().await;
        self.begin(options)
    }

    async fn commit_transaction(&mut self) -> StorageResult<()> {
        tokio::task::yield_now().await;
        self.commit()
    }

    async fn abort_transaction(&mut self) -> StorageResult<()> {
        tokio::task::yield_now().await;
        self.abort()
    }

    async fn bulk_write(
        &mut self,
        collection: &str,
        operations: &[WriteOperation],
    ) -> StorageResult<BulkWriteResult> {
        tokio::task::yield_now().await;
        self.write(collection, operations)
    }

    fn end_session(&mut self) {
        self.release();
    }
}
