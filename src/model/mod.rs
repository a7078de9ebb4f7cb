// ============================================================================
// Entity Model
// ============================================================================
//
// Describes how entity types map onto documents: key properties, concurrency
// tokens, owned navigations and the collection each root type lives in.
//
// ============================================================================

pub mod entity_type;
pub mod property;
pub mod registry;

pub use entity_type::EntityType;
pub use property::{
    ConcurrencyToken, NavigationDescriptor, PropertyDescriptor, PropertyRole, ValueGeneration,
    ValueKind,
};
pub use registry::{Model, ModelBuilder};
