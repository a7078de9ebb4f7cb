use super::{NavigationDescriptor, PropertyDescriptor, PropertyRole};

/// Mapping of one entity type onto the document store.
///
/// Root types are stored as top-level documents in `collection_name`.
/// Owned types have an `owner` and are embedded in their owner's document.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityType {
    pub name: String,
    pub collection_name: Option<String>,
    pub owner: Option<String>,
    pub properties: Vec<PropertyDescriptor>,
    pub navigations: Vec<NavigationDescriptor>,
}

impl EntityType {
    pub fn root(name: &str, collection_name: &str) -> Self {
        Self {
            name: name.to_string(),
            collection_name: Some(collection_name.to_string()),
            owner: None,
            properties: Vec::new(),
            navigations: Vec::new(),
        }
    }

    pub fn owned(name: &str, owner: &str) -> Self {
        Self {
            name: name.to_string(),
            collection_name: None,
            owner: Some(owner.to_string()),
            properties: Vec::new(),
            navigations: Vec::new(),
        }
    }

    pub fn property(mut self, property: PropertyDescriptor) -> Self {
        self.properties.push(property);
        self
    }

    pub fn owns_one(mut self, name: &str, target: &str) -> Self {
        self.navigations.push(NavigationDescriptor::one(name, target));
        self
    }

    pub fn owns_many(mut self, name: &str, target: &str) -> Self {
        self.navigations.push(NavigationDescriptor::many(name, target));
        self
    }

    pub fn navigation_descriptor(mut self, navigation: NavigationDescriptor) -> Self {
        self.navigations.push(navigation);
        self
    }

    pub fn is_owned(&self) -> bool {
        self.owner.is_some()
    }

    pub fn find_property(&self, name: &str) -> Option<&PropertyDescriptor> {
        self.properties.iter().find(|p| p.name == name)
    }

    pub fn find_navigation(&self, name: &str) -> Option<&NavigationDescriptor> {
        self.navigations.iter().find(|n| n.name == name)
    }

    /// Primary key properties in declaration order.
    ///
    /// For owned types this includes owner-key and ordinal properties.
    pub fn key_properties(&self) -> impl Iterator<Item = &PropertyDescriptor> {
        self.properties.iter().filter(|p| {
            matches!(p.role, PropertyRole::Key)
                || (self.is_owned() && matches!(p.role, PropertyRole::OwnerKey | PropertyRole::Ordinal))
        })
    }

    pub fn has_primary_key(&self) -> bool {
        self.key_properties().next().is_some()
    }

    pub fn concurrency_tokens(&self) -> impl Iterator<Item = &PropertyDescriptor> {
        self.properties.iter().filter(|p| p.concurrency.is_some())
    }

    pub fn ordinal_property(&self) -> Option<&PropertyDescriptor> {
        self.properties
            .iter()
            .find(|p| matches!(p.role, PropertyRole::Ordinal))
    }

    /// Properties stored in this type's own (sub-)document.
    pub fn stored_properties(&self) -> impl Iterator<Item = &PropertyDescriptor> {
        self.properties.iter().filter(|p| !p.is_shadow())
    }
}
