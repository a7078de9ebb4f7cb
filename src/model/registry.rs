use super::EntityType;
use crate::core::{Result, SaveError};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Registry of entity types, validated once at build time.
#[derive(Debug, Clone, Default)]
pub struct Model {
    types: HashMap<String, Arc<EntityType>>,
}

impl Model {
    pub fn builder() -> ModelBuilder {
        ModelBuilder::default()
    }

    pub fn entity_type(&self, name: &str) -> Option<&Arc<EntityType>> {
        self.types.get(name)
    }

    /// Looks up a type that must exist, reporting a model error otherwise.
    pub fn require(&self, name: &str) -> Result<&Arc<EntityType>> {
        self.types
            .get(name)
            .ok_or_else(|| SaveError::InvalidModel(format!("Entity type '{}' is not registered", name)))
    }

    pub fn entity_types(&self) -> impl Iterator<Item = &Arc<EntityType>> {
        self.types.values()
    }

    /// Walks the owned-by relation to the root type.
    pub fn root_type_of(&self, name: &str) -> Result<&Arc<EntityType>> {
        let mut current = self.require(name)?;
        // build() rejects cycles, so the walk terminates
        while let Some(owner) = current.owner.as_deref() {
            current = self.require(owner)?;
        }
        Ok(current)
    }
}

#[derive(Debug, Default)]
pub struct ModelBuilder {
    types: Vec<EntityType>,
}

impl ModelBuilder {
    pub fn entity(mut self, entity_type: EntityType) -> Self {
        self.types.push(entity_type);
        self
    }

    pub fn build(self) -> Result<Model> {
        let mut types = HashMap::new();
        for entity_type in self.types {
            let name = entity_type.name.clone();
            if types.insert(name.clone(), Arc::new(entity_type)).is_some() {
                return Err(SaveError::InvalidModel(format!(
                    "Entity type '{}' is registered twice",
                    name
                )));
            }
        }

        let model = Model { types };
        for entity_type in model.types.values() {
            validate_type(&model, entity_type)?;
        }
        Ok(model)
    }
}

fn validate_type(model: &Model, entity_type: &EntityType) -> Result<()> {
    if entity_type.is_owned() && entity_type.collection_name.is_some() {
        return Err(SaveError::InvalidModel(format!(
            "Owned entity type '{}' cannot map to its own collection",
            entity_type.name
        )));
    }
    if !entity_type.is_owned() && entity_type.collection_name.is_none() {
        return Err(SaveError::InvalidModel(format!(
            "Root entity type '{}' has no collection name",
            entity_type.name
        )));
    }

    let element_names = entity_type
        .stored_properties()
        .map(|p| (p.name.as_str(), p.element_name.as_str()))
        .chain(entity_type.navigations.iter().map(|n| (n.name.as_str(), n.element_name.as_str())));
    for (member, element) in element_names {
        // Filters address nested elements by dotted path.
        if element.is_empty() || element.contains('.') {
            return Err(SaveError::InvalidModel(format!(
                "'{}.{}' maps to element '{}'; element names must be non-empty and contain no '.'",
                entity_type.name, member, element
            )));
        }
    }

    for navigation in &entity_type.navigations {
        let target = model.types.get(&navigation.target).ok_or_else(|| {
            SaveError::InvalidModel(format!(
                "Navigation '{}.{}' targets unknown type '{}'",
                entity_type.name, navigation.name, navigation.target
            ))
        })?;
        if target.owner.as_deref() != Some(entity_type.name.as_str()) {
            return Err(SaveError::InvalidModel(format!(
                "Navigation '{}.{}' targets '{}', which is not owned by '{}'",
                entity_type.name, navigation.name, navigation.target, entity_type.name
            )));
        }
        if navigation.collection && target.ordinal_property().is_none() {
            return Err(SaveError::InvalidModel(format!(
                "Owned collection '{}.{}' requires an ordinal key on '{}'",
                entity_type.name, navigation.name, navigation.target
            )));
        }
    }

    let mut seen = HashSet::new();
    let mut current = entity_type;
    while let Some(owner) = current.owner.as_deref() {
        if !seen.insert(current.name.as_str()) {
            return Err(SaveError::InvalidModel(format!(
                "Ownership cycle detected starting at '{}'",
                entity_type.name
            )));
        }
        current = model.types.get(owner).ok_or_else(|| {
            SaveError::InvalidModel(format!(
                "Entity type '{}' is owned by unknown type '{}'",
                current.name, owner
            ))
        })?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{NavigationDescriptor, PropertyDescriptor, ValueKind};

    fn order_model() -> Result<Model> {
        Model::builder()
            .entity(
                EntityType::root("Order", "orders")
                    .property(PropertyDescriptor::key("Id", ValueKind::Uuid))
                    .owns_one("Shipping", "Address"),
            )
            .entity(
                EntityType::owned("Address", "Order")
                    .property(PropertyDescriptor::owner_key("OrderId", ValueKind::Uuid))
                    .property(PropertyDescriptor::scalar("City", ValueKind::String)),
            )
            .build()
    }

    #[test]
    fn test_build_and_lookup() {
        let model = order_model().unwrap();
        assert!(model.entity_type("Order").is_some());
        assert_eq!(model.root_type_of("Address").unwrap().name, "Order");
        assert!(model.require("Missing").is_err());
    }

    #[test]
    fn test_rejects_ownership_cycle() {
        let result = Model::builder()
            .entity(EntityType::owned("A", "B"))
            .entity(EntityType::owned("B", "A"))
            .build();
        assert!(matches!(result, Err(SaveError::InvalidModel(msg)) if msg.contains("cycle")));
    }

    #[test]
    fn test_rejects_navigation_to_foreign_type() {
        let result = Model::builder()
            .entity(EntityType::root("Order", "orders").owns_one("Shipping", "Address"))
            .entity(EntityType::root("Address", "addresses"))
            .build();
        assert!(matches!(result, Err(SaveError::InvalidModel(_))));
    }

    #[test]
    fn test_rejects_owned_collection_without_ordinal() {
        let result = Model::builder()
            .entity(EntityType::root("Order", "orders").owns_many("Lines", "Line"))
            .entity(EntityType::owned("Line", "Order"))
            .build();
        assert!(matches!(result, Err(SaveError::InvalidModel(msg)) if msg.contains("ordinal")));
    }

    #[test]
    fn test_rejects_duplicate_type() {
        let result = Model::builder()
            .entity(EntityType::root("Order", "orders"))
            .entity(EntityType::root("Order", "orders_v2"))
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn test_rejects_dotted_element_names() {
        let token = Model::builder()
            .entity(
                EntityType::root("Product", "products")
                    .property(PropertyDescriptor::key("Sku", ValueKind::String))
                    .property(
                        PropertyDescriptor::scalar("ETag", ValueKind::String)
                            .element("meta.etag")
                            .concurrency_token(),
                    ),
            )
            .build();
        assert!(matches!(token, Err(SaveError::InvalidModel(msg)) if msg.contains("meta.etag")));

        let navigation = Model::builder()
            .entity(
                EntityType::root("Order", "orders")
                    .property(PropertyDescriptor::key("Id", ValueKind::Uuid))
                    .navigation_descriptor(NavigationDescriptor::one("Shipping", "Address").element("ship.to")),
            )
            .entity(EntityType::owned("Address", "Order"))
            .build();
        assert!(matches!(navigation, Err(SaveError::InvalidModel(_))));

        assert!(
            Model::builder()
                .entity(
                    EntityType::root("Product", "products")
                        .property(PropertyDescriptor::key("Sku", ValueKind::String).element("sku_code")),
                )
                .build()
                .is_ok()
        );
    }
}
