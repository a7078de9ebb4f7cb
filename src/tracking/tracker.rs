use super::{ChangeEntry, EntityState, EntryId};
use crate::core::{Result, SaveError};
use crate::model::{EntityType, Model, ValueGeneration};
use crate::serializer::{MaterializedEntity, OwnedValue};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Arena of tracked entities for one unit of work.
///
/// Entries keep their tracking order; that order is the order in which
/// document roots are written.
#[derive(Debug, Clone, Default)]
pub struct ChangeTracker {
    entries: Vec<ChangeEntry>,
}

impl ChangeTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tracks a new root entity in the `Added` state.
    pub fn add<I, K>(&mut self, entity_type: &Arc<EntityType>, values: I) -> Result<EntryId>
    where
        I: IntoIterator<Item = (K, JsonValue)>,
        K: Into<String>,
    {
        self.track_root(entity_type, values, EntityState::Added)
    }

    /// Tracks an existing root entity in the `Unchanged` state.
    pub fn attach<I, K>(&mut self, entity_type: &Arc<EntityType>, values: I) -> Result<EntryId>
    where
        I: IntoIterator<Item = (K, JsonValue)>,
        K: Into<String>,
    {
        self.track_root(entity_type, values, EntityState::Unchanged)
    }

    /// Adds a new owned entity under `navigation` of `owner`.
    pub fn add_owned<I, K>(
        &mut self,
        owner: EntryId,
        navigation: &str,
        entity_type: &Arc<EntityType>,
        values: I,
    ) -> Result<EntryId>
    where
        I: IntoIterator<Item = (K, JsonValue)>,
        K: Into<String>,
    {
        self.track_owned(owner, navigation, entity_type, values, EntityState::Added)
    }

    /// Attaches an existing owned entity under `navigation` of `owner`.
    pub fn attach_owned<I, K>(
        &mut self,
        owner: EntryId,
        navigation: &str,
        entity_type: &Arc<EntityType>,
        values: I,
    ) -> Result<EntryId>
    where
        I: IntoIterator<Item = (K, JsonValue)>,
        K: Into<String>,
    {
        self.track_owned(owner, navigation, entity_type, values, EntityState::Unchanged)
    }

    /// Attaches a document read back from storage, including its owned graph.
    ///
    /// Owned collection items receive positional ordinals.
    pub fn attach_document(&mut self, model: &Model, entity: &MaterializedEntity) -> Result<EntryId> {
        let entity_type = model.require(&entity.entity_type)?.clone();
        let root = self.attach(&entity_type, entity.values.clone())?;
        self.attach_owned_graph(model, root, entity)?;
        Ok(root)
    }

    fn attach_owned_graph(
        &mut self,
        model: &Model,
        owner: EntryId,
        entity: &MaterializedEntity,
    ) -> Result<()> {
        for (navigation, owned) in &entity.owned {
            match owned {
                OwnedValue::One(None) => {}
                OwnedValue::One(Some(child)) => {
                    let child_type = model.require(&child.entity_type)?.clone();
                    let id =
                        self.attach_owned(owner, navigation, &child_type, child.values.clone())?;
                    self.attach_owned_graph(model, id, child)?;
                }
                OwnedValue::Many(items) => {
                    for (position, item) in items.iter().enumerate() {
                        let item_type = model.require(&item.entity_type)?.clone();
                        let mut values = item.values.clone();
                        if let Some(ordinal) = item_type.ordinal_property() {
                            values.insert(ordinal.name.clone(), JsonValue::from(position as i64));
                        }
                        let id = self.attach_owned(owner, navigation, &item_type, values)?;
                        self.attach_owned_graph(model, id, item)?;
                    }
                }
            }
        }
        Ok(())
    }

    pub fn entry(&self, id: EntryId) -> Option<&ChangeEntry> {
        self.entries.get(id.0)
    }

    pub(crate) fn entry_mut(&mut self, id: EntryId) -> Result<&mut ChangeEntry> {
        self.entries
            .get_mut(id.0)
            .ok_or_else(|| SaveError::Tracking(format!("{} is not tracked", id)))
    }

    pub(crate) fn require(&self, id: EntryId) -> Result<&ChangeEntry> {
        self.entry(id)
            .ok_or_else(|| SaveError::Tracking(format!("{} is not tracked", id)))
    }

    /// All entries in tracking order, detached ones included.
    pub fn entries(&self) -> impl Iterator<Item = &ChangeEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn has_changes(&self) -> bool {
        self.entries.iter().any(|e| e.state.has_pending_write())
    }

    /// Assigns a new current value and flags the property as modified.
    pub fn set_value(&mut self, id: EntryId, property: &str, value: JsonValue) -> Result<()> {
        let entry = self.entry_mut(id)?;
        let descriptor = entry.entity_type.find_property(property).ok_or_else(|| {
            SaveError::Tracking(format!(
                "Entity type '{}' has no property '{}'",
                entry.entity_type.name, property
            ))
        })?;
        let is_key = descriptor.is_key();

        match entry.state {
            EntityState::Deleted | EntityState::Detached => {
                return Err(SaveError::Tracking(format!(
                    "Cannot modify {} '{}' in state {}",
                    id, entry.entity_type.name, entry.state
                )));
            }
            EntityState::Added => {
                entry.temporary.remove(property);
                entry.current.insert(property.to_string(), value);
                return Ok(());
            }
            EntityState::Unchanged | EntityState::Modified => {}
        }

        if is_key {
            return Err(SaveError::Tracking(format!(
                "Key property '{}.{}' cannot change once the entity is persisted",
                entry.entity_type.name, property
            )));
        }

        if entry.original.get(property) == Some(&value) {
            entry.modified.remove(property);
        } else {
            entry.modified.insert(property.to_string());
        }
        entry.current.insert(property.to_string(), value);
        if entry.state == EntityState::Unchanged {
            entry.state = EntityState::Modified;
        }
        Ok(())
    }

    /// Marks a property as holding a client-side placeholder.
    pub fn set_temporary_value(&mut self, id: EntryId, property: &str, value: JsonValue) -> Result<()> {
        let entry = self.entry_mut(id)?;
        entry.current.insert(property.to_string(), value);
        entry.temporary.insert(property.to_string());
        Ok(())
    }

    /// Records a value generated while saving and clears its temporary flag.
    pub fn set_generated_value(&mut self, id: EntryId, property: &str, value: JsonValue) -> Result<()> {
        let entry = self.entry_mut(id)?;
        entry.temporary.remove(property);
        entry.current.insert(property.to_string(), value);
        Ok(())
    }

    /// Deletes an entity together with its owned descendants.
    ///
    /// Entities that were never saved are simply detached.
    pub fn delete(&mut self, id: EntryId) -> Result<()> {
        let mut pending = vec![id];
        while let Some(current) = pending.pop() {
            let entry = self.entry_mut(current)?;
            entry.state = match entry.state {
                EntityState::Added => EntityState::Detached,
                EntityState::Unchanged | EntityState::Modified => EntityState::Deleted,
                other => other,
            };
            pending.extend(entry.all_children());
        }
        Ok(())
    }

    /// Removes an owned entity from its owner's navigation.
    pub fn remove_owned(&mut self, owner: EntryId, navigation: &str, child: EntryId) -> Result<()> {
        let owner_entry = self.require(owner)?;
        if !owner_entry.children(navigation).contains(&child) {
            return Err(SaveError::Tracking(format!(
                "{} is not an item of '{}.{}'",
                child, owner_entry.entity_type.name, navigation
            )));
        }
        self.delete(child)
    }

    /// Stops tracking a single entry. Owned descendants stay tracked.
    pub fn detach(&mut self, id: EntryId) -> Result<()> {
        self.entry_mut(id)?.state = EntityState::Detached;
        Ok(())
    }

    /// Makes the tracked state match what was just persisted.
    pub fn accept_all_changes(&mut self) {
        for entry in &mut self.entries {
            match entry.state {
                EntityState::Deleted | EntityState::Detached => {
                    entry.state = EntityState::Detached;
                }
                EntityState::Added | EntityState::Modified | EntityState::Unchanged => {
                    entry.state = EntityState::Unchanged;
                    entry.original = entry.current.clone();
                    entry.modified.clear();
                    entry.temporary.clear();
                }
            }
        }

        let detached: Vec<bool> = self
            .entries
            .iter()
            .map(|e| e.state == EntityState::Detached)
            .collect();
        for entry in &mut self.entries {
            for children in entry.navigations.values_mut() {
                children.retain(|child| !detached[child.0]);
            }
        }
    }

    fn track_root<I, K>(
        &mut self,
        entity_type: &Arc<EntityType>,
        values: I,
        state: EntityState,
    ) -> Result<EntryId>
    where
        I: IntoIterator<Item = (K, JsonValue)>,
        K: Into<String>,
    {
        if entity_type.is_owned() {
            return Err(SaveError::Tracking(format!(
                "'{}' is an owned type; track it through its owner's navigation",
                entity_type.name
            )));
        }
        Ok(self.push(entity_type, values, state, None))
    }

    fn track_owned<I, K>(
        &mut self,
        owner: EntryId,
        navigation: &str,
        entity_type: &Arc<EntityType>,
        values: I,
        state: EntityState,
    ) -> Result<EntryId>
    where
        I: IntoIterator<Item = (K, JsonValue)>,
        K: Into<String>,
    {
        let owner_entry = self.require(owner)?;
        let descriptor = owner_entry
            .entity_type
            .find_navigation(navigation)
            .ok_or_else(|| {
                SaveError::Tracking(format!(
                    "Entity type '{}' has no owned navigation '{}'",
                    owner_entry.entity_type.name, navigation
                ))
            })?;
        if descriptor.target != entity_type.name {
            return Err(SaveError::Tracking(format!(
                "Navigation '{}.{}' holds '{}', not '{}'",
                owner_entry.entity_type.name, navigation, descriptor.target, entity_type.name
            )));
        }
        if !owner_entry.state.is_live() {
            return Err(SaveError::Tracking(format!(
                "Cannot add to '{}.{}': owner is {}",
                owner_entry.entity_type.name, navigation, owner_entry.state
            )));
        }

        let root = owner_entry.root.unwrap_or(owner);
        let replaced: Vec<EntryId> = if descriptor.collection {
            Vec::new()
        } else {
            owner_entry
                .children(navigation)
                .iter()
                .copied()
                .filter(|child| self.entries[child.0].state.is_live())
                .collect()
        };
        for child in replaced {
            self.delete(child)?;
        }

        let id = self.push(entity_type, values, state, Some(root));
        self.entry_mut(owner)?
            .navigations
            .entry(navigation.to_string())
            .or_default()
            .push(id);
        Ok(id)
    }

    fn push<I, K>(
        &mut self,
        entity_type: &Arc<EntityType>,
        values: I,
        state: EntityState,
        root: Option<EntryId>,
    ) -> EntryId
    where
        I: IntoIterator<Item = (K, JsonValue)>,
        K: Into<String>,
    {
        let values: BTreeMap<String, JsonValue> =
            values.into_iter().map(|(k, v)| (k.into(), v)).collect();
        let id = EntryId(self.entries.len());
        let mut entry = ChangeEntry::new(id, entity_type.clone(), state, values, root);

        if state == EntityState::Added {
            for property in &entity_type.properties {
                let missing = entry
                    .current
                    .get(&property.name)
                    .is_none_or(JsonValue::is_null);
                if property.generation != ValueGeneration::None && missing {
                    entry.temporary.insert(property.name.clone());
                }
            }
        }

        self.entries.push(entry);
        id
    }
}
