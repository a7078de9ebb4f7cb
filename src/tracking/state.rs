use std::fmt;

/// Tracking state of one entity instance.
///
/// ```text
/// Added ──save──> Unchanged ──set_value──> Modified ──save──> Unchanged
///                     │                       │
///                     └──────delete──────> Deleted ──save──> Detached
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityState {
    Added,
    Modified,
    Deleted,
    Unchanged,
    Detached,
}

impl EntityState {
    /// Only these states produce write operations.
    pub fn has_pending_write(&self) -> bool {
        matches!(
            self,
            EntityState::Added | EntityState::Modified | EntityState::Deleted
        )
    }

    /// Entries that still contribute content to their owner's document.
    pub fn is_live(&self) -> bool {
        matches!(
            self,
            EntityState::Added | EntityState::Modified | EntityState::Unchanged
        )
    }
}

impl fmt::Display for EntityState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityState::Added => write!(f, "ADDED"),
            EntityState::Modified => write!(f, "MODIFIED"),
            EntityState::Deleted => write!(f, "DELETED"),
            EntityState::Unchanged => write!(f, "UNCHANGED"),
            EntityState::Detached => write!(f, "DETACHED"),
        }
    }
}
