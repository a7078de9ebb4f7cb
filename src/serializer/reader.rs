use super::{ID_ELEMENT, ValueConverter};
use crate::core::{Document, Result, SaveError, Value};
use crate::model::{EntityType, Model, PropertyRole};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;

/// An entity read back from a stored document, with its owned graph.
#[derive(Debug, Clone, PartialEq)]
pub struct MaterializedEntity {
    pub entity_type: String,
    pub values: BTreeMap<String, JsonValue>,
    pub owned: BTreeMap<String, OwnedValue>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum OwnedValue {
    One(Option<Box<MaterializedEntity>>),
    Many(Vec<MaterializedEntity>),
}

impl MaterializedEntity {
    pub fn value(&self, property: &str) -> Option<&JsonValue> {
        self.values.get(property)
    }

    pub fn one(&self, navigation: &str) -> Option<&MaterializedEntity> {
        match self.owned.get(navigation) {
            Some(OwnedValue::One(Some(child))) => Some(child),
            _ => None,
        }
    }

    pub fn many(&self, navigation: &str) -> &[MaterializedEntity] {
        match self.owned.get(navigation) {
            Some(OwnedValue::Many(items)) => items,
            _ => &[],
        }
    }
}

/// Materializes stored documents through the value converter.
pub struct DocumentReader<'a> {
    model: &'a Model,
    converter: &'a dyn ValueConverter,
}

impl<'a> DocumentReader<'a> {
    pub fn new(model: &'a Model, converter: &'a dyn ValueConverter) -> Self {
        Self { model, converter }
    }

    pub fn read(&self, type_name: &str, document: &Document) -> Result<MaterializedEntity> {
        let entity_type = self.model.require(type_name)?;
        if entity_type.is_owned() {
            return Err(SaveError::Serialization(format!(
                "'{}' is an owned type and has no documents of its own",
                type_name
            )));
        }

        let mut values = BTreeMap::new();
        let keys: Vec<_> = entity_type
            .properties
            .iter()
            .filter(|p| matches!(p.role, PropertyRole::Key))
            .collect();
        let id = document.get(ID_ELEMENT).ok_or_else(|| {
            SaveError::Serialization(format!("Document of '{}' has no '{}'", type_name, ID_ELEMENT))
        })?;
        match keys.as_slice() {
            [] => return Err(SaveError::MissingPrimaryKey(type_name.to_string())),
            [single] => {
                values.insert(single.name.clone(), self.converter.from_storage(single, id)?);
            }
            composite => {
                let key = id.as_document().ok_or_else(|| {
                    SaveError::Serialization(format!(
                        "Composite key of '{}' must be stored as a document",
                        type_name
                    ))
                })?;
                for property in composite {
                    if let Some(part) = key.get(&property.element_name) {
                        values.insert(property.name.clone(), self.converter.from_storage(property, part)?);
                    }
                }
            }
        }

        self.read_body(entity_type, document, values, true)
    }

    fn read_owned(&self, type_name: &str, document: &Document) -> Result<MaterializedEntity> {
        let entity_type = self.model.require(type_name)?;
        self.read_body(entity_type, document, BTreeMap::new(), false)
    }

    fn read_body(
        &self,
        entity_type: &EntityType,
        document: &Document,
        mut values: BTreeMap<String, JsonValue>,
        is_root: bool,
    ) -> Result<MaterializedEntity> {
        for property in entity_type.stored_properties() {
            if is_root && property.is_key() {
                continue;
            }
            if let Some(stored) = document.get(&property.element_name) {
                values.insert(property.name.clone(), self.converter.from_storage(property, stored)?);
            }
        }

        let mut owned = BTreeMap::new();
        for navigation in &entity_type.navigations {
            let stored = document.get(&navigation.element_name).unwrap_or(&Value::Null);
            let value = match (navigation.collection, stored) {
                (false, Value::Null) => OwnedValue::One(None),
                (false, Value::Document(sub)) => {
                    OwnedValue::One(Some(Box::new(self.read_owned(&navigation.target, sub)?)))
                }
                (true, Value::Null) => OwnedValue::Many(Vec::new()),
                (true, Value::Array(items)) => {
                    let mut children = Vec::with_capacity(items.len());
                    for item in items {
                        let sub = item.as_document().ok_or_else(|| {
                            SaveError::Serialization(format!(
                                "Items of '{}.{}' must be documents, got {}",
                                entity_type.name,
                                navigation.name,
                                item.type_name()
                            ))
                        })?;
                        children.push(self.read_owned(&navigation.target, sub)?);
                    }
                    OwnedValue::Many(children)
                }
                (_, other) => {
                    return Err(SaveError::Serialization(format!(
                        "Navigation '{}.{}' holds an unexpected {} value",
                        entity_type.name,
                        navigation.name,
                        other.type_name()
                    )));
                }
            };
            owned.insert(navigation.name.clone(), value);
        }

        Ok(MaterializedEntity {
            entity_type: entity_type.name.clone(),
            values,
            owned,
        })
    }
}
