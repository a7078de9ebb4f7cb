use super::SaveChangesConfig;
use crate::cancel::CancellationToken;
use crate::core::{Result, SaveError};
use crate::executor;
use crate::model::Model;
use crate::serializer::{DocumentReader, StandardConverter, ValueConverter};
use crate::storage::{AsyncStorageClient, StorageClient};
use crate::tracking::ChangeTracker;
use crate::update::{OperationSynthesizer, WriteOperation, resolve_roots};
use std::sync::Arc;
use tracing::{Instrument, Level, event, info_span};

/// Entry point for persisting a unit of work to a document store.
///
/// Owns the storage client, the entity model and the value converter; each
/// `save_changes` call opens its own session.
///
/// ```
/// use docsave::{
///     ChangeTracker, DocumentDatabase, EntityType, InMemoryEngine, Model, PropertyDescriptor,
///     ValueKind,
/// };
/// use serde_json::json;
///
/// # fn main() -> docsave::Result<()> {
/// let model = Model::builder()
///     .entity(
///         EntityType::root("Order", "orders")
///             .property(PropertyDescriptor::key("Id", ValueKind::Integer))
///             .property(PropertyDescriptor::scalar("Status", ValueKind::String))
///             .owns_many("Lines", "Line"),
///     )
///     .entity(
///         EntityType::owned("Line", "Order")
///             .property(PropertyDescriptor::ordinal("Ordinal"))
///             .property(PropertyDescriptor::scalar("Sku", ValueKind::String)),
///     )
///     .build()?;
///
/// let engine = InMemoryEngine::new();
/// let db = DocumentDatabase::new(engine.clone(), model);
///
/// let mut tracker = ChangeTracker::new();
/// let order_type = db.model().require("Order")?.clone();
/// let line_type = db.model().require("Line")?.clone();
/// let order = tracker.add(&order_type, [("Id", json!(1)), ("Status", json!("new"))])?;
/// tracker.add_owned(order, "Lines", &line_type, [("Sku", json!("apple"))])?;
///
/// assert_eq!(db.save_changes(&mut tracker)?, 1);
/// assert_eq!(engine.count("orders")?, 1);
/// # Ok(())
/// # }
/// ```
pub struct DocumentDatabase<C> {
    client: C,
    model: Arc<Model>,
    config: SaveChangesConfig,
    converter: Arc<dyn ValueConverter>,
}

impl<C> DocumentDatabase<C> {
    pub fn new(client: C, model: impl Into<Arc<Model>>) -> Self {
        Self {
            client,
            model: model.into(),
            config: SaveChangesConfig::default(),
            converter: Arc::new(StandardConverter),
        }
    }

    pub fn with_config(mut self, config: SaveChangesConfig) -> Result<Self> {
        config.validate().map_err(SaveError::InvalidConfig)?;
        self.config = config;
        Ok(self)
    }

    pub fn with_converter(mut self, converter: Arc<dyn ValueConverter>) -> Self {
        self.converter = converter;
        self
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub fn model(&self) -> &Model {
        &self.model
    }

    pub fn config(&self) -> &SaveChangesConfig {
        &self.config
    }

    /// Reader that materializes stored documents with this database's converter.
    pub fn reader(&self) -> DocumentReader<'_> {
        DocumentReader::new(&self.model, self.converter.as_ref())
    }

    /// Resolves roots and synthesizes their operations, assigning generated values.
    fn prepare(&self, tracker: &mut ChangeTracker) -> Result<Vec<WriteOperation>> {
        let roots = resolve_roots(tracker)?;
        OperationSynthesizer::new(self.converter.as_ref()).synthesize(tracker, &roots)
    }

    fn finish(&self, tracker: &mut ChangeTracker, affected: usize) -> usize {
        if self.config.accept_all_changes_on_success {
            tracker.accept_all_changes();
        }
        event!(Level::DEBUG, affected, "changes saved");
        affected
    }
}

impl<C: StorageClient> DocumentDatabase<C> {
    /// Writes every pending change in `tracker` and returns the number of
    /// documents inserted, updated or deleted.
    pub fn save_changes(&self, tracker: &mut ChangeTracker) -> Result<usize> {
        let span = info_span!("save_changes", entries = tracker.len());
        let _enter = span.enter();

        let operations = self.prepare(tracker)?;
        if operations.is_empty() {
            return Ok(0);
        }
        event!(Level::DEBUG, operations = operations.len(), "operations synthesized");

        let affected = executor::execute(&self.client, operations, &self.config.execution_options())?;
        Ok(self.finish(tracker, affected))
    }
}

impl<C: AsyncStorageClient> DocumentDatabase<C> {
    /// Async form of [`DocumentDatabase::save_changes`].
    ///
    /// Cancellation is honored before each storage call; an open transaction
    /// is rolled back before [`SaveError::Cancelled`] is returned.
    ///
    /// ```
    /// # use docsave::{CancellationToken, ChangeTracker, DocumentDatabase, EntityType, InMemoryEngine, Model, PropertyDescriptor, ValueKind};
    /// # use serde_json::json;
    /// # tokio_test::block_on(async {
    /// let model = Model::builder()
    ///     .entity(
    ///         EntityType::root("Customer", "customers")
    ///             .property(PropertyDescriptor::key("Id", ValueKind::Integer)),
    ///     )
    ///     .build()
    ///     .unwrap();
    /// let db = DocumentDatabase::new(InMemoryEngine::new(), model);
    ///
    /// let mut tracker = ChangeTracker::new();
    /// let customer = db.model().require("Customer").unwrap().clone();
    /// tracker.add(&customer, [("Id", json!(1))]).unwrap();
    ///
    /// let cancel = CancellationToken::new();
    /// assert_eq!(db.save_changes_async(&mut tracker, &cancel).await.unwrap(), 1);
    /// # });
    /// ```
    pub async fn save_changes_async(
        &self,
        tracker: &mut ChangeTracker,
        cancel: &CancellationToken,
    ) -> Result<usize> {
        let span = info_span!("save_changes_async", entries = tracker.len());
        async move {
            cancel.check()?;
            let operations = self.prepare(tracker)?;
            if operations.is_empty() {
                return Ok(0);
            }
            event!(Level::DEBUG, operations = operations.len(), "operations synthesized");

            let options = self.config.execution_options();
            let affected = executor::execute_async(&self.client, operations, &options, cancel).await?;
            Ok(self.finish(tracker, affected))
        }
        .instrument(span)
        .await
    }
}
