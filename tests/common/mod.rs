//! Shared fixtures: an order/customer model and a storage client that records
//! every bulk write it forwards to an `InMemoryEngine`.
#![allow(dead_code)]

use async_trait::async_trait;
use docsave::storage::{InMemorySession, StorageResult};
use docsave::{
    AsyncStorageClient, AsyncStorageSession, BulkWriteResult, CancellationToken, ChangeTracker,
    DocumentDatabase, EntityType, EntryId, InMemoryEngine, Model, PropertyDescriptor,
    StorageClient, StorageSession, TransactionOptions, ValueGeneration, ValueKind, WriteOperation,
};
use serde_json::{Value as JsonValue, json};
use std::sync::{Arc, Mutex};
use tracing_subscriber::EnvFilter;

/// Routes pipeline events to the test output; `RUST_LOG=docsave=debug` shows batches.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn model() -> Model {
    Model::builder()
        .entity(
            EntityType::root("Order", "orders")
                .property(PropertyDescriptor::key("Id", ValueKind::Uuid).generated(ValueGeneration::Uuid))
                .property(PropertyDescriptor::scalar("Customer", ValueKind::String))
                .property(PropertyDescriptor::scalar("Total", ValueKind::Float))
                .property(PropertyDescriptor::scalar("PlacedAt", ValueKind::DateTime))
                .property(PropertyDescriptor::row_version("Version"))
                .owns_one("Shipping", "Address")
                .owns_many("Lines", "Line"),
        )
        .entity(
            EntityType::owned("Address", "Order")
                .property(PropertyDescriptor::scalar("Street", ValueKind::String))
                .property(PropertyDescriptor::scalar("City", ValueKind::String)),
        )
        .entity(
            EntityType::owned("Line", "Order")
                .property(PropertyDescriptor::ordinal("Ordinal"))
                .property(PropertyDescriptor::scalar("Sku", ValueKind::String))
                .property(PropertyDescriptor::scalar("Quantity", ValueKind::Integer)),
        )
        .entity(
            EntityType::root("Customer", "customers")
                .property(PropertyDescriptor::key("Id", ValueKind::Integer))
                .property(PropertyDescriptor::scalar("Name", ValueKind::String))
                .owns_one("Contact", "ContactInfo"),
        )
        .entity(
            EntityType::owned("ContactInfo", "Customer")
                .property(PropertyDescriptor::scalar("Email", ValueKind::String))
                .property(PropertyDescriptor::scalar("Phone", ValueKind::String)),
        )
        .entity(
            EntityType::root("Product", "products")
                .property(PropertyDescriptor::key("Sku", ValueKind::String))
                .property(PropertyDescriptor::scalar("Price", ValueKind::Float))
                .property(PropertyDescriptor::scalar("ETag", ValueKind::String).concurrency_token()),
        )
        .entity(
            EntityType::root("Shipment", "shipments")
                .property(PropertyDescriptor::key("Carrier", ValueKind::String))
                .property(PropertyDescriptor::key("TrackingNo", ValueKind::String))
                .property(PropertyDescriptor::scalar("Status", ValueKind::String)),
        )
        .entity(
            EntityType::root("Note", "notes")
                .property(PropertyDescriptor::scalar("Text", ValueKind::String)),
        )
        .build()
        .unwrap()
}

pub fn entity_type<C>(db: &DocumentDatabase<C>, name: &str) -> Arc<EntityType> {
    db.model().require(name).unwrap().clone()
}

pub fn add_customer<C>(db: &DocumentDatabase<C>, tracker: &mut ChangeTracker, id: i64, name: &str) -> EntryId {
    tracker
        .add(&entity_type(db, "Customer"), [("Id", json!(id)), ("Name", json!(name))])
        .unwrap()
}

/// Adds an order with a shipping address and two lines.
pub fn add_order<C>(db: &DocumentDatabase<C>, tracker: &mut ChangeTracker, customer: &str) -> EntryId {
    let order = tracker
        .add(&entity_type(db, "Order"), [
            ("Customer", json!(customer)),
            ("Total", json!(42.5)),
            ("PlacedAt", json!("2024-05-01T10:00:00Z")),
        ])
        .unwrap();
    tracker
        .add_owned(order, "Shipping", &entity_type(db, "Address"), [
            ("Street", json!("1 Main St")),
            ("City", json!("Oslo")),
        ])
        .unwrap();
    let line = entity_type(db, "Line");
    tracker
        .add_owned(order, "Lines", &line, [("Sku", json!("apple")), ("Quantity", json!(3))])
        .unwrap();
    tracker
        .add_owned(order, "Lines", &line, [("Sku", json!("pear")), ("Quantity", json!(1))])
        .unwrap();
    order
}

/// Loads every stored document of `type_name` into a fresh tracker.
pub fn load_all<C>(db: &DocumentDatabase<C>, engine: &InMemoryEngine, type_name: &str) -> (ChangeTracker, Vec<EntryId>) {
    let collection = db.model().require(type_name).unwrap().collection_name.clone().unwrap();
    let mut tracker = ChangeTracker::new();
    let mut ids = Vec::new();
    for document in engine.documents(&collection).unwrap() {
        let entity = db.reader().read(type_name, &document).unwrap();
        ids.push(tracker.attach_document(db.model(), &entity).unwrap());
    }
    (tracker, ids)
}

pub fn value(tracker: &ChangeTracker, id: EntryId, property: &str) -> JsonValue {
    tracker
        .entry(id)
        .unwrap()
        .current_value(property)
        .cloned()
        .unwrap_or(JsonValue::Null)
}

/// One forwarded bulk write.
#[derive(Debug, Clone)]
pub struct RecordedWrite {
    pub collection: String,
    pub operations: Vec<WriteOperation>,
}

/// Forwards to an `InMemoryEngine`, recording writes and optionally
/// cancelling a token once a number of writes went through.
#[derive(Clone)]
pub struct RecordingClient {
    pub engine: InMemoryEngine,
    pub writes: Arc<Mutex<Vec<RecordedWrite>>>,
    cancel_after: Option<(usize, CancellationToken)>,
}

impl RecordingClient {
    pub fn new(engine: InMemoryEngine) -> Self {
        Self {
            engine,
            writes: Arc::default(),
            cancel_after: None,
        }
    }

    pub fn cancelling_after(mut self, writes: usize, token: CancellationToken) -> Self {
        self.cancel_after = Some((writes, token));
        self
    }

    pub fn recorded(&self) -> Vec<RecordedWrite> {
        self.writes.lock().unwrap().clone()
    }

    /// `(collection, operation count)` for each recorded write.
    pub fn shape(&self) -> Vec<(String, usize)> {
        self.recorded()
            .into_iter()
            .map(|w| (w.collection, w.operations.len()))
            .collect()
    }

    fn session(&self, inner: InMemorySession) -> RecordingSession {
        RecordingSession {
            inner,
            writes: self.writes.clone(),
            cancel_after: self.cancel_after.clone(),
        }
    }
}

pub struct RecordingSession {
    inner: InMemorySession,
    writes: Arc<Mutex<Vec<RecordedWrite>>>,
    cancel_after: Option<(usize, CancellationToken)>,
}

impl RecordingSession {
    fn record(&self, collection: &str, operations: &[WriteOperation]) {
        let mut writes = self.writes.lock().unwrap();
        writes.push(RecordedWrite {
            collection: collection.to_string(),
            operations: operations.to_vec(),
        });
        if let Some((limit, token)) = &self.cancel_after {
            if writes.len() >= *limit {
                token.cancel();
            }
        }
    }
}

impl StorageClient for RecordingClient {
    type Session = RecordingSession;

    fn start_session(&self) -> StorageResult<RecordingSession> {
        Ok(self.session(StorageClient::start_session(&self.engine)?))
    }
}

impl StorageSession for RecordingSession {
    fn start_transaction(&mut self, options: &TransactionOptions) -> StorageResult<()> {
        StorageSession::start_transaction(&mut self.inner, options)
    }

    fn commit_transaction(&mut self) -> StorageResult<()> {
        StorageSession::commit_transaction(&mut self.inner)
    }

    fn abort_transaction(&mut self) -> StorageResult<()> {
        StorageSession::abort_transaction(&mut self.inner)
    }

    fn bulk_write(&mut self, collection: &str, operations: &[WriteOperation]) -> StorageResult<BulkWriteResult> {
        let result = StorageSession::bulk_write(&mut self.inner, collection, operations);
        self.record(collection, operations);
        result
    }

    fn end_session(&mut self) {
        StorageSession::end_session(&mut self.inner);
    }
}

#[async_trait]
impl AsyncStorageClient for RecordingClient {
    type Session = RecordingSession;

    async fn start_session(&self) -> StorageResult<RecordingSession> {
        let inner = AsyncStorageClient::start_session(&self.engine).await?;
        Ok(self.session(inner))
    }
}

#[async_trait]
impl AsyncStorageSession for RecordingSession {
    async fn start_transaction(&mut self, options: &TransactionOptions) -> StorageResult<()> {
        AsyncStorageSession::start_transaction(&mut self.inner, options).await
    }

    async fn commit_transaction(&mut self) -> StorageResult<()> {
        AsyncStorageSession::commit_transaction(&mut self.inner).await
    }

    async fn abort_transaction(&mut self) -> StorageResult<()> {
        AsyncStorageSession::abort_transaction(&mut self.inner).await
    }

    async fn bulk_write(&mut self, collection: &str, operations: &[WriteOperation]) -> StorageResult<BulkWriteResult> {
        let result = AsyncStorageSession::bulk_write(&mut self.inner, collection, operations).await;
        self.record(collection, operations);
        result
    }

    fn end_session(&mut self) {
        AsyncStorageSession::end_session(&mut self.inner);
    }
}
