use super::EntityState;
use crate::model::EntityType;
use serde_json::Value as JsonValue;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

/// Index of an entry in the tracker arena. Stable for the tracker's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntryId(pub usize);

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "entry_{}", self.0)
    }
}

/// Snapshot of one tracked entity.
///
/// Owned entries record the id of their document root; the owning tree is
/// reached downwards through `navigations`, never through parent pointers.
#[derive(Debug, Clone)]
pub struct ChangeEntry {
    pub(crate) id: EntryId,
    pub(crate) entity_type: Arc<EntityType>,
    pub(crate) state: EntityState,
    pub(crate) current: BTreeMap<String, JsonValue>,
    pub(crate) original: BTreeMap<String, JsonValue>,
    pub(crate) modified: BTreeSet<String>,
    pub(crate) temporary: BTreeSet<String>,
    pub(crate) root: Option<EntryId>,
    pub(crate) navigations: BTreeMap<String, Vec<EntryId>>,
}

impl ChangeEntry {
    pub(crate) fn new(
        id: EntryId,
        entity_type: Arc<EntityType>,
        state: EntityState,
        values: BTreeMap<String, JsonValue>,
        root: Option<EntryId>,
    ) -> Self {
        Self {
            id,
            entity_type,
            state,
            original: values.clone(),
            current: values,
            modified: BTreeSet::new(),
            temporary: BTreeSet::new(),
            root,
            navigations: BTreeMap::new(),
        }
    }

    pub fn id(&self) -> EntryId {
        self.id
    }

    pub fn entity_type(&self) -> &Arc<EntityType> {
        &self.entity_type
    }

    pub fn state(&self) -> EntityState {
        self.state
    }

    /// Root entry of an owned entity; `None` for document roots.
    pub fn root(&self) -> Option<EntryId> {
        self.root
    }

    pub fn current_value(&self, property: &str) -> Option<&JsonValue> {
        self.current.get(property)
    }

    pub fn original_value(&self, property: &str) -> Option<&JsonValue> {
        self.original.get(property)
    }

    pub fn is_modified(&self, property: &str) -> bool {
        self.modified.contains(property)
    }

    pub fn modified_properties(&self) -> impl Iterator<Item = &str> {
        self.modified.iter().map(String::as_str)
    }

    pub fn has_temporary_value(&self, property: &str) -> bool {
        self.temporary.contains(property)
    }

    /// Children under an owned navigation, in enumeration order.
    pub fn children(&self, navigation: &str) -> &[EntryId] {
        self.navigations
            .get(navigation)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub(crate) fn all_children(&self) -> impl Iterator<Item = EntryId> + '_ {
        self.navigations.values().flatten().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{PropertyDescriptor, ValueKind};
    use serde_json::json;

    #[test]
    fn test_new_entry_copies_original_values() {
        let entity_type = Arc::new(
            EntityType::root("Customer", "customers")
                .property(PropertyDescriptor::key("Id", ValueKind::Integer)),
        );
        let values = BTreeMap::from([("Id".to_string(), json!(7))]);
        let entry = ChangeEntry::new(EntryId(0), entity_type, EntityState::Unchanged, values, None);

        assert_eq!(entry.current_value("Id"), Some(&json!(7)));
        assert_eq!(entry.original_value("Id"), Some(&json!(7)));
        assert!(entry.children("Orders").is_empty());
        assert_eq!(entry.id().to_string(), "entry_0");
    }
}
