// ============================================================================
// Transaction Management Module
// ============================================================================
//
// At most one storage transaction per save, owned by the session scope that
// opened it and released with it.
//
// Design Patterns Used:
// - State Pattern: guarded lifecycle (Active, Committing, Committed, ...)
// - Scope guard: session and transaction released on every exit path
// - Policy: AutoTransactionBehavior decides whether to open a transaction
//
// ============================================================================

pub mod policy;
pub mod scope;
pub mod state;

pub use policy::AutoTransactionBehavior;
pub use scope::{AsyncSessionScope, SessionScope};
pub use state::{TransactionId, TransactionLifecycle, TransactionState};
