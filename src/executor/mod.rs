// ============================================================================
// Transactional Executor
// ============================================================================
//
// Runs batches strictly in order on one session, verifying each bulk-write
// outcome before moving on. Sync and async paths share the same steps:
//
//   session -> [begin] -> (bulk_write -> verify)* -> [commit | rollback]
//
// ============================================================================

pub mod pipeline;
pub mod verifier;

pub use pipeline::{ExecutionOptions, execute, execute_async};
pub use verifier::{WriteCounts, verify_batch};
