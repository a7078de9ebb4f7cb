use super::verify_batch;
use crate::cancel::CancellationToken;
use crate::core::Result;
use crate::storage::{AsyncStorageClient, AsyncStorageSession, StorageClient, StorageSession, TransactionOptions};
use crate::transaction::{AsyncSessionScope, AutoTransactionBehavior, SessionScope, TransactionState};
use crate::update::{Batch, WriteOperation, batch_operations};
use tracing::{Level, event};

/// How one save talks to storage.
#[derive(Debug, Clone, Default)]
pub struct ExecutionOptions {
    pub auto_transaction: AutoTransactionBehavior,
    pub transaction: TransactionOptions,
}

/// Writes `operations` batch by batch and returns the documents affected.
///
/// On failure an active transaction is rolled back and the original error is
/// returned. The session is released before returning on every path.
pub fn execute<C: StorageClient>(
    client: &C,
    operations: Vec<WriteOperation>,
    options: &ExecutionOptions,
) -> Result<usize> {
    let transact = options.auto_transaction.should_transact(operations.len());
    let mut scope = SessionScope::new(client.start_session()?);
    if transact {
        scope.begin(&options.transaction)?;
    }

    let outcome = run_batches(&mut scope, batch_operations(operations)).and_then(|affected| {
        if transact {
            scope.commit()?;
        }
        Ok(affected)
    });

    if outcome.is_err() && scope.transaction_state() == Some(TransactionState::Active) {
        if let Err(rollback_err) = scope.rollback() {
            event!(Level::ERROR, error = %rollback_err, "rollback after failed save also failed");
        }
    }
    outcome
}

fn run_batches<S, I>(scope: &mut SessionScope<S>, batches: I) -> Result<usize>
where
    S: StorageSession,
    I: Iterator<Item = Batch>,
{
    let mut affected = 0;
    for batch in batches {
        event!(Level::DEBUG, collection = %batch.collection, operations = batch.len(), "executing batch");
        let result = scope.bulk_write(&batch.collection, &batch.operations)?;
        affected += verify_batch(&batch, &result)?;
    }
    Ok(affected)
}

/// Async form of [`execute`]; `cancel` is checked before every storage call.
///
/// A cancelled save still rolls back its transaction before reporting
/// [`crate::SaveError::Cancelled`].
pub async fn execute_async<C: AsyncStorageClient>(
    client: &C,
    operations: Vec<WriteOperation>,
    options: &ExecutionOptions,
    cancel: &CancellationToken,
) -> Result<usize> {
    cancel.check()?;
    let transact = options.auto_transaction.should_transact(operations.len());
    let mut scope = AsyncSessionScope::new(client.start_session().await?);
    if transact {
        cancel.check()?;
        scope.begin(&options.transaction).await?;
    }

    let outcome = match run_batches_async(&mut scope, batch_operations(operations), cancel).await {
        Ok(affected) if transact => match cancel.check() {
            Ok(()) => scope.commit().await.map(|_| affected),
            Err(err) => Err(err),
        },
        other => other,
    };

    if outcome.is_err() && scope.transaction_state() == Some(TransactionState::Active) {
        if let Err(rollback_err) = scope.rollback().await {
            event!(Level::ERROR, error = %rollback_err, "rollback after failed save also failed");
        }
    }
    outcome
}

async fn run_batches_async<S, I>(
    scope: &mut AsyncSessionScope<S>,
    batches: I,
    cancel: &CancellationToken,
) -> Result<usize>
where
    S: AsyncStorageSession,
    I: Iterator<Item = Batch>,
{
    let mut affected = 0;
    for batch in batches {
        cancel.check()?;
        event!(Level::DEBUG, collection = %batch.collection, operations = batch.len(), "executing batch");
        let result = scope.bulk_write(&batch.collection, &batch.operations).await?;
        affected += verify_batch(&batch, &result)?;
    }
    Ok(affected)
}
