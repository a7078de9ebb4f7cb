// ============================================================================
// Change Tracking
// ============================================================================
//
// Arena of tracked entity snapshots. Owned entities record the id of their
// document root and are reached downwards through navigation child lists.
//
// ============================================================================

pub mod entry;
pub mod state;
pub mod tracker;

pub use entry::{ChangeEntry, EntryId};
pub use state::EntityState;
pub use tracker::ChangeTracker;
