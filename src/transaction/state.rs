// ============================================================================
// Transaction State Management
// ============================================================================
//
// State Pattern for the lifecycle of the single transaction a save may open:
//
//   Active ──commit──> Committing ──> Committed ──┐
//     │                    └──error──> Failed ────┤
//     └──rollback──> RollingBack ──> RolledBack ──┼──dispose──> Disposed
//                          └──error──> Failed ────┘
//
// Every transition is guarded; an action from the wrong state is reported as
// InvalidTransactionState instead of being silently ignored.
//
// ============================================================================

use crate::core::{Result, SaveError};
use std::sync::atomic::{AtomicU64, Ordering};

/// Global transaction ID counter
static NEXT_TXN_ID: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TransactionId(pub u64);

impl TransactionId {
    /// Generate a new unique transaction ID
    pub fn new() -> Self {
        TransactionId(NEXT_TXN_ID.fetch_add(1, Ordering::SeqCst))
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Default for TransactionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TransactionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "txn_{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    /// Started on the session; writes go through it
    Active,
    Committing,
    Committed,
    RollingBack,
    RolledBack,
    /// Commit or rollback failed; nothing further may be attempted
    Failed,
    /// Released together with its session
    Disposed,
}

impl TransactionState {
    pub fn is_active(&self) -> bool {
        matches!(self, TransactionState::Active)
    }

    /// No further commit or rollback is possible
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TransactionState::Committed
                | TransactionState::RolledBack
                | TransactionState::Failed
                | TransactionState::Disposed
        )
    }
}

impl std::fmt::Display for TransactionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransactionState::Active => write!(f, "ACTIVE"),
            TransactionState::Committing => write!(f, "COMMITTING"),
            TransactionState::Committed => write!(f, "COMMITTED"),
            TransactionState::RollingBack => write!(f, "ROLLING BACK"),
            TransactionState::RolledBack => write!(f, "ROLLED BACK"),
            TransactionState::Failed => write!(f, "FAILED"),
            TransactionState::Disposed => write!(f, "DISPOSED"),
        }
    }
}

/// Bookkeeping for one storage transaction.
///
/// Holds no storage resources itself; the session scope drives it alongside
/// the real session calls.
#[derive(Debug)]
pub struct TransactionLifecycle {
    id: TransactionId,
    state: TransactionState,
    start_time: std::time::Instant,
}

impl TransactionLifecycle {
    pub fn new() -> Self {
        Self {
            id: TransactionId::new(),
            state: TransactionState::Active,
            start_time: std::time::Instant::now(),
        }
    }

    pub fn id(&self) -> TransactionId {
        self.id
    }

    pub fn state(&self) -> TransactionState {
        self.state
    }

    pub fn duration(&self) -> std::time::Duration {
        self.start_time.elapsed()
    }

    pub fn ensure_active(&self, action: &str) -> Result<()> {
        if self.state.is_active() {
            Ok(())
        } else {
            Err(self.invalid(action))
        }
    }

    pub fn begin_commit(&mut self) -> Result<()> {
        self.transition(TransactionState::Active, TransactionState::Committing, "commit")
    }

    pub fn complete_commit(&mut self) -> Result<()> {
        self.transition(TransactionState::Committing, TransactionState::Committed, "complete commit")
    }

    pub fn begin_rollback(&mut self) -> Result<()> {
        self.transition(TransactionState::Active, TransactionState::RollingBack, "rollback")
    }

    pub fn complete_rollback(&mut self) -> Result<()> {
        self.transition(TransactionState::RollingBack, TransactionState::RolledBack, "complete rollback")
    }

    /// Records a failed commit or rollback.
    pub fn fail(&mut self) -> Result<()> {
        match self.state {
            TransactionState::Committing | TransactionState::RollingBack => {
                self.state = TransactionState::Failed;
                Ok(())
            }
            _ => Err(self.invalid("fail")),
        }
    }

    /// Releases the transaction. Allowed from any state except `Disposed`.
    pub fn dispose(&mut self) -> Result<()> {
        if self.state == TransactionState::Disposed {
            return Err(self.invalid("dispose"));
        }
        self.state = TransactionState::Disposed;
        Ok(())
    }

    fn transition(&mut self, from: TransactionState, to: TransactionState, action: &str) -> Result<()> {
        if self.state != from {
            return Err(self.invalid(action));
        }
        self.state = to;
        Ok(())
    }

    fn invalid(&self, action: &str) -> SaveError {
        SaveError::InvalidTransactionState(format!(
            "Cannot {}: transaction {} is {}",
            action, self.id, self.state
        ))
    }
}

impl Default for TransactionLifecycle {
    fn default() -> Self {
        Self::new()
    }
}
