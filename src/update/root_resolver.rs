use crate::core::{Result, SaveError};
use crate::tracking::{ChangeTracker, EntityState, EntryId};
use std::collections::HashSet;

/// A document root that must be written, with its effective state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedRoot {
    pub entry: EntryId,
    pub state: EntityState,
}

/// Collapses tracked changes into the distinct document roots to write.
///
/// Roots appear in tracking order of the first changed entry that belongs to
/// them. A changed owned entry forces an otherwise unchanged root to be
/// rewritten.
pub fn resolve_roots(tracker: &ChangeTracker) -> Result<Vec<ResolvedRoot>> {
    let mut roots: Vec<ResolvedRoot> = Vec::new();
    let mut seen: HashSet<EntryId> = HashSet::new();

    for entry in tracker.entries() {
        if !entry.state().has_pending_write() {
            continue;
        }

        let (root_id, own_change) = if entry.entity_type().is_owned() {
            let root_id = entry.root().ok_or_else(|| missing_root(entry.entity_type().name.as_str()))?;
            let root = tracker
                .entry(root_id)
                .filter(|root| root.state() != EntityState::Detached && !root.entity_type().is_owned())
                .ok_or_else(|| missing_root(entry.entity_type().name.as_str()))?;
            (root.id(), false)
        } else {
            (entry.id(), true)
        };

        if seen.contains(&root_id) {
            continue;
        }

        let root_state = tracker
            .entry(root_id)
            .map(|root| root.state())
            .unwrap_or(EntityState::Detached);
        let effective = match root_state {
            EntityState::Unchanged if !own_change => EntityState::Modified,
            other => other,
        };

        seen.insert(root_id);
        roots.push(ResolvedRoot {
            entry: root_id,
            state: effective,
        });
    }

    Ok(roots)
}

fn missing_root(entity_type: &str) -> SaveError {
    SaveError::MissingRootEntry {
        entity_type: entity_type.to_string(),
    }
}
