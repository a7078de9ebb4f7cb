// ============================================================================
// Update Pipeline
// ============================================================================
//
// Changed entries are collapsed into document roots, each root becomes one
// write operation, and adjacent operations on the same collection are grouped
// into batches.
//
//   ChangeTracker -> resolve_roots -> OperationSynthesizer -> batch_operations
//
// ============================================================================

pub mod batcher;
pub mod operation;
pub mod root_resolver;
pub mod synthesizer;

pub use batcher::{Batch, Batches, batch_operations};
pub use operation::{OperationKind, WriteModel, WriteOperation};
pub use root_resolver::{ResolvedRoot, resolve_roots};
pub use synthesizer::OperationSynthesizer;
