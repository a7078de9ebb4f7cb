use super::ValueConverter;
use crate::core::{Document, Result, SaveError, Value};
use crate::model::{EntityType, NavigationDescriptor, PropertyDescriptor, PropertyRole};
use crate::tracking::{ChangeEntry, ChangeTracker, EntryId};
use serde_json::Value as JsonValue;

/// Element holding the key of a root document.
pub const ID_ELEMENT: &str = "_id";

/// Serializes tracked entity graphs into documents.
///
/// Read-only over the tracker: generated values must already be assigned.
pub struct DocumentWriter<'a> {
    converter: &'a dyn ValueConverter,
}

impl<'a> DocumentWriter<'a> {
    pub fn new(converter: &'a dyn ValueConverter) -> Self {
        Self { converter }
    }

    /// The `_id` value of a root entry: the key itself, or a key document when composite.
    pub fn key_value(&self, entry: &ChangeEntry) -> Result<Value> {
        let entity_type = entry.entity_type();
        let keys: Vec<&PropertyDescriptor> = entity_type
            .properties
            .iter()
            .filter(|p| matches!(p.role, PropertyRole::Key))
            .collect();

        match keys.as_slice() {
            [] => Err(SaveError::MissingPrimaryKey(entity_type.name.clone())),
            [single] => self.current(entry, single),
            composite => {
                let mut key = Document::new();
                for property in composite {
                    key.insert(property.element_name.clone(), self.current(entry, property)?);
                }
                Ok(Value::Document(key))
            }
        }
    }

    /// Full document for a root entry and all of its live owned descendants.
    pub fn root_document(&self, tracker: &ChangeTracker, entry: &ChangeEntry) -> Result<Document> {
        let mut document = Document::new();
        document.insert(ID_ELEMENT, self.key_value(entry)?);
        for property in entry.entity_type().stored_properties() {
            if property.is_key() {
                continue;
            }
            document.insert(property.element_name.clone(), self.current(entry, property)?);
        }
        self.write_navigations(tracker, entry, &mut document)?;
        Ok(document)
    }

    /// Sub-document for an owned entry. Shadow properties are left out.
    pub fn owned_document(&self, tracker: &ChangeTracker, entry: &ChangeEntry) -> Result<Document> {
        let mut document = Document::new();
        for property in entry.entity_type().stored_properties() {
            document.insert(property.element_name.clone(), self.current(entry, property)?);
        }
        self.write_navigations(tracker, entry, &mut document)?;
        Ok(document)
    }

    /// Serialized value of one owned navigation: a sub-document, `null`, or an array.
    pub fn navigation_value(
        &self,
        tracker: &ChangeTracker,
        entry: &ChangeEntry,
        navigation: &NavigationDescriptor,
    ) -> Result<Value> {
        let live = live_children(tracker, entry, &navigation.name)?
            .into_iter()
            .map(|child| tracker.require(child))
            .collect::<Result<Vec<_>>>()?;

        if navigation.collection {
            let items = live
                .into_iter()
                .map(|child| self.owned_document(tracker, child).map(Value::Document))
                .collect::<Result<Vec<_>>>()?;
            Ok(Value::Array(items))
        } else {
            match live.last() {
                Some(child) => Ok(Value::Document(self.owned_document(tracker, child)?)),
                None => Ok(Value::Null),
            }
        }
    }

    pub fn converted(&self, property: &PropertyDescriptor, value: &JsonValue) -> Result<Value> {
        self.converter.to_storage(property, value)
    }

    fn current(&self, entry: &ChangeEntry, property: &PropertyDescriptor) -> Result<Value> {
        match entry.current_value(&property.name) {
            Some(value) => self.converted(property, value),
            None => Ok(Value::Null),
        }
    }

    fn write_navigations(
        &self,
        tracker: &ChangeTracker,
        entry: &ChangeEntry,
        document: &mut Document,
    ) -> Result<()> {
        let entity_type: &EntityType = entry.entity_type();
        for navigation in &entity_type.navigations {
            let value = self.navigation_value(tracker, entry, navigation)?;
            document.insert(navigation.element_name.clone(), value);
        }
        Ok(())
    }
}

/// Finds the live children of an entry under one navigation.
pub(crate) fn live_children(
    tracker: &ChangeTracker,
    entry: &ChangeEntry,
    navigation: &str,
) -> Result<Vec<EntryId>> {
    let mut live = Vec::new();
    for child in entry.children(navigation) {
        if tracker.require(*child)?.state().is_live() {
            live.push(*child);
        }
    }
    Ok(live)
}
