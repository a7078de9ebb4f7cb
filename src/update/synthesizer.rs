use super::{ResolvedRoot, WriteModel, WriteOperation};
use crate::core::{Document, Result, SaveError, Value};
use crate::model::{ConcurrencyToken, EntityType, ValueGeneration};
use crate::serializer::{DocumentWriter, ID_ELEMENT, ValueConverter, writer::live_children};
use crate::tracking::{ChangeTracker, EntityState, EntryId};
use serde_json::Value as JsonValue;
use uuid::Uuid;

/// Turns resolved roots into storage write operations.
///
/// Generated values (UUID keys, owned-collection ordinals, row versions) are
/// recorded back on the tracker as they are assigned.
pub struct OperationSynthesizer<'a> {
    converter: &'a dyn ValueConverter,
}

impl<'a> OperationSynthesizer<'a> {
    pub fn new(converter: &'a dyn ValueConverter) -> Self {
        Self { converter }
    }

    pub fn synthesize(
        &self,
        tracker: &mut ChangeTracker,
        roots: &[ResolvedRoot],
    ) -> Result<Vec<WriteOperation>> {
        // Every root must be addressable before anything is generated or serialized
        for root in roots {
            let entity_type = tracker.require(root.entry)?.entity_type();
            if !entity_type.has_primary_key() {
                return Err(SaveError::MissingPrimaryKey(entity_type.name.clone()));
            }
        }

        roots
            .iter()
            .map(|root| self.synthesize_root(tracker, *root))
            .collect()
    }

    fn synthesize_root(&self, tracker: &mut ChangeTracker, root: ResolvedRoot) -> Result<WriteOperation> {
        let entity_type = tracker.require(root.entry)?.entity_type().clone();
        let collection = entity_type.collection_name.clone().ok_or_else(|| {
            SaveError::InvalidModel(format!("Root type '{}' has no collection", entity_type.name))
        })?;

        let model = match root.state {
            EntityState::Added => self.insert(tracker, root.entry, &entity_type)?,
            EntityState::Modified => self.update(tracker, root.entry, &entity_type)?,
            EntityState::Deleted => WriteModel::DeleteOne {
                filter: self.filter(tracker, root.entry, &entity_type)?,
            },
            EntityState::Unchanged | EntityState::Detached => {
                return Err(SaveError::Tracking(format!(
                    "{} '{}' has no pending write in state {}",
                    root.entry, entity_type.name, root.state
                )));
            }
        };

        Ok(WriteOperation {
            collection,
            entry: root.entry,
            entity_type: entity_type.name.clone(),
            model,
        })
    }

    fn insert(
        &self,
        tracker: &mut ChangeTracker,
        id: EntryId,
        entity_type: &EntityType,
    ) -> Result<WriteModel> {
        for token in entity_type.concurrency_tokens() {
            if token.is_row_version() {
                tracker.set_generated_value(id, &token.name, JsonValue::from(1))?;
            }
        }
        self.generate_values(tracker, id)?;

        let writer = DocumentWriter::new(self.converter);
        let document = writer.root_document(tracker, tracker.require(id)?)?;
        Ok(WriteModel::InsertOne { document })
    }

    fn update(
        &self,
        tracker: &mut ChangeTracker,
        id: EntryId,
        entity_type: &EntityType,
    ) -> Result<WriteModel> {
        // Built from original values, before any row version is bumped
        let filter = self.filter(tracker, id, entity_type)?;

        let mut bumped = Vec::new();
        for token in entity_type.concurrency_tokens() {
            if token.is_row_version() {
                let next = effective_row_version(tracker.require(id)?.original_value(&token.name)) + 1;
                tracker.set_generated_value(id, &token.name, JsonValue::from(next))?;
                bumped.push(token);
            }
        }
        self.generate_values(tracker, id)?;

        let writer = DocumentWriter::new(self.converter);
        let entry = tracker.require(id)?;
        let mut set = Document::new();
        for property in entity_type.stored_properties() {
            if property.is_key() || property.is_row_version() || !entry.is_modified(&property.name) {
                continue;
            }
            let value = entry.current_value(&property.name).unwrap_or(&JsonValue::Null);
            set.insert(property.element_name.clone(), writer.converted(property, value)?);
        }
        for token in bumped {
            let value = entry.current_value(&token.name).unwrap_or(&JsonValue::Null);
            set.insert(token.element_name.clone(), writer.converted(token, value)?);
        }
        // Owned sub-documents are always rewritten whole
        for navigation in &entity_type.navigations {
            set.insert(
                navigation.element_name.clone(),
                writer.navigation_value(tracker, entry, navigation)?,
            );
        }

        Ok(WriteModel::UpdateOne { filter, set })
    }

    /// Key equality plus original-value equality on every concurrency token.
    fn filter(&self, tracker: &ChangeTracker, id: EntryId, entity_type: &EntityType) -> Result<Document> {
        let writer = DocumentWriter::new(self.converter);
        let entry = tracker.require(id)?;

        let mut filter = Document::new();
        filter.insert(ID_ELEMENT, writer.key_value(entry)?);
        for token in entity_type.concurrency_tokens() {
            let original = entry.original_value(&token.name);
            let value = match token.concurrency {
                Some(ConcurrencyToken::RowVersion) => Value::Integer(effective_row_version(original)),
                _ => writer.converted(token, original.unwrap_or(&JsonValue::Null))?,
            };
            filter.insert(token.element_name.clone(), value);
        }
        Ok(filter)
    }

    /// Replaces temporary values across the live owned graph below `id`.
    fn generate_values(&self, tracker: &mut ChangeTracker, id: EntryId) -> Result<()> {
        let mut pending = vec![id];
        while let Some(current) = pending.pop() {
            let entry = tracker.require(current)?;
            let entity_type = entry.entity_type().clone();

            let generated: Vec<(String, JsonValue)> = entity_type
                .properties
                .iter()
                .filter(|p| p.generation == ValueGeneration::Uuid && entry.has_temporary_value(&p.name))
                .map(|p| (p.name.clone(), JsonValue::String(Uuid::new_v4().to_string())))
                .collect();
            for (property, value) in generated {
                tracker.set_generated_value(current, &property, value)?;
            }

            for navigation in &entity_type.navigations {
                let children = live_children(tracker, tracker.require(current)?, &navigation.name)?;
                if navigation.collection {
                    assign_ordinals(tracker, &children)?;
                }
                pending.extend(children.into_iter().rev());
            }
        }
        Ok(())
    }
}

/// Gives temporary ordinals the next values after the highest existing one.
///
/// Existing items keep their ordinal, so ordinals need not stay contiguous.
fn assign_ordinals(tracker: &mut ChangeTracker, items: &[EntryId]) -> Result<()> {
    let mut existing_max: Option<i64> = None;
    let mut temporary = Vec::new();

    for item in items {
        let entry = tracker.require(*item)?;
        let Some(ordinal) = entry.entity_type().ordinal_property() else {
            continue;
        };
        if entry.has_temporary_value(&ordinal.name) {
            temporary.push((*item, ordinal.name.clone()));
        } else if let Some(value) = entry.current_value(&ordinal.name).and_then(JsonValue::as_i64) {
            existing_max = Some(existing_max.map_or(value, |max| max.max(value)));
        }
    }

    let mut next = existing_max.map_or(0, |max| max + 1);
    for (item, property) in temporary {
        tracker.set_generated_value(item, &property, JsonValue::from(next))?;
        next += 1;
    }
    Ok(())
}

/// Row version used in filters; an unset counter is treated as 1.
fn effective_row_version(original: Option<&JsonValue>) -> i64 {
    match original.and_then(JsonValue::as_i64) {
        Some(0) | None => 1,
        Some(version) => version,
    }
}
