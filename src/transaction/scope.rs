use super::{TransactionLifecycle, TransactionState};
use crate::core::{Result, SaveError};
use crate::storage::{
    AsyncStorageSession, BulkWriteResult, StorageError, StorageSession, TransactionOptions,
};
use crate::update::WriteOperation;
use tracing::{Level, event};

/// Maps a failed `start_transaction` to the error a caller can act on.
fn start_error(err: StorageError) -> SaveError {
    match err {
        StorageError::TransactionsNotSupported(reason) => SaveError::TransactionUnsupported { reason },
        other => SaveError::Storage(other),
    }
}

fn no_transaction(action: &str) -> SaveError {
    SaveError::InvalidTransactionState(format!("Cannot {}: no transaction was started", action))
}

/// A storage session owned by one save, plus its optional transaction.
///
/// Dropping the scope aborts a still-active transaction and ends the session.
pub struct SessionScope<S: StorageSession> {
    session: S,
    transaction: Option<TransactionLifecycle>,
}

impl<S: StorageSession> SessionScope<S> {
    pub fn new(session: S) -> Self {
        Self {
            session,
            transaction: None,
        }
    }

    pub fn transaction_state(&self) -> Option<TransactionState> {
        self.transaction.as_ref().map(TransactionLifecycle::state)
    }

    pub fn begin(&mut self, options: &TransactionOptions) -> Result<()> {
        if let Some(existing) = &self.transaction {
            return Err(SaveError::InvalidTransactionState(format!(
                "Transaction {} already started",
                existing.id()
            )));
        }
        self.session.start_transaction(options).map_err(start_error)?;
        let lifecycle = TransactionLifecycle::new();
        event!(Level::DEBUG, transaction = %lifecycle.id(), "transaction started");
        self.transaction = Some(lifecycle);
        Ok(())
    }

    pub fn bulk_write(&mut self, collection: &str, operations: &[WriteOperation]) -> Result<BulkWriteResult> {
        if let Some(transaction) = &self.transaction {
            transaction.ensure_active("write")?;
        }
        Ok(self.session.bulk_write(collection, operations)?)
    }

    pub fn commit(&mut self) -> Result<()> {
        let transaction = self.transaction.as_mut().ok_or_else(|| no_transaction("commit"))?;
        transaction.begin_commit()?;
        match self.session.commit_transaction() {
            Ok(()) => {
                transaction.complete_commit()?;
                event!(Level::DEBUG, transaction = %transaction.id(), "transaction committed");
                Ok(())
            }
            Err(err) => {
                transaction.fail()?;
                Err(err.into())
            }
        }
    }

    pub fn rollback(&mut self) -> Result<()> {
        let transaction = self.transaction.as_mut().ok_or_else(|| no_transaction("rollback"))?;
        transaction.begin_rollback()?;
        match self.session.abort_transaction() {
            Ok(()) => {
                transaction.complete_rollback()?;
                event!(Level::DEBUG, transaction = %transaction.id(), "transaction rolled back");
                Ok(())
            }
            Err(err) => {
                transaction.fail()?;
                Err(err.into())
            }
        }
    }
}

impl<S: StorageSession> Drop for SessionScope<S> {
    fn drop(&mut self) {
        if self.transaction_state() == Some(TransactionState::Active) {
            if let Err(err) = self.rollback() {
                event!(Level::ERROR, error = %err, "rollback on release failed");
            }
        }
        if let Some(transaction) = self.transaction.as_mut() {
            let _ = transaction.dispose();
        }
        self.session.end_session();
    }
}

/// Async counterpart of [`SessionScope`].
///
/// `Drop` cannot await, so an active transaction is not aborted there; ending
/// the session discards it. Callers roll back explicitly on every error path.
pub struct AsyncSessionScope<S: AsyncStorageSession> {
    session: S,
    transaction: Option<TransactionLifecycle>,
}

impl<S: AsyncStorageSession> AsyncSessionScope<S> {
    pub fn new(session: S) -> Self {
        Self {
            session,
            transaction: None,
        }
    }

    pub fn transaction_state(&self) -> Option<TransactionState> {
        self.transaction.as_ref().map(TransactionLifecycle::state)
    }

    pub async fn begin(&mut self, options: &TransactionOptions) -> Result<()> {
        if let Some(existing) = &self.transaction {
            return Err(SaveError::InvalidTransactionState(format!(
                "Transaction {} already started",
                existing.id()
            )));
        }
        self.session.start_transaction(options).await.map_err(start_error)?;
        let lifecycle = TransactionLifecycle::new();
        event!(Level::DEBUG, transaction = %lifecycle.id(), "transaction started");
        self.transaction = Some(lifecycle);
        Ok(())
    }

    pub async fn bulk_write(
        &mut self,
        collection: &str,
        operations: &[WriteOperation],
    ) -> Result<BulkWriteResult> {
        if let Some(transaction) = &self.transaction {
            transaction.ensure_active("write")?;
        }
        Ok(self.session.bulk_write(collection, operations).await?)
    }

    pub async fn commit(&mut self) -> Result<()> {
        let transaction = self.transaction.as_mut().ok_or_else(|| no_transaction("commit"))?;
        transaction.begin_commit()?;
        match self.session.commit_transaction().await {
            Ok(()) => {
                transaction.complete_commit()?;
                event!(Level::DEBUG, transaction = %transaction.id(), "transaction committed");
                Ok(())
            }
            Err(err) => {
                transaction.fail()?;
                Err(err.into())
            }
        }
    }

    pub async fn rollback(&mut self) -> Result<()> {
        let transaction = self.transaction.as_mut().ok_or_else(|| no_transaction("rollback"))?;
        transaction.begin_rollback()?;
        match self.session.abort_transaction().await {
            Ok(()) => {
                transaction.complete_rollback()?;
                event!(Level::DEBUG, transaction = %transaction.id(), "transaction rolled back");
                Ok(())
            }
            Err(err) => {
                transaction.fail()?;
                Err(err.into())
            }
        }
    }
}

impl<S: AsyncStorageSession> Drop for AsyncSessionScope<S> {
    fn drop(&mut self) {
        let Some(transaction) = self.transaction.as_mut() else {
            self.session.end_session();
            return;
        };
        if transaction.state().is_active() {
            event!(Level::WARN, transaction = %transaction.id(), "session released with an active transaction");
            // Ending the session discards the transaction.
            let _ = transaction.begin_rollback();
            self.session.end_session();
            let _ = transaction.complete_rollback();
        } else {
            self.session.end_session();
        }
        let _ = transaction.dispose();
    }
}
