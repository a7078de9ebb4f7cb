// ============================================================================
// Document Serialization
// ============================================================================
//
// Turns tracked entity graphs into storage documents and back. Scalar values
// go through a ValueConverter; owned entities are walked recursively.
//
// ============================================================================

pub mod converter;
pub mod reader;
pub mod writer;

pub use converter::{StandardConverter, ValueConverter};
pub use reader::{DocumentReader, MaterializedEntity, OwnedValue};
pub use writer::{DocumentWriter, ID_ELEMENT};
