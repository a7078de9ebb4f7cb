pub mod error;
pub mod value;

pub use error::{ConflictedEntry, Result, SaveError};
pub use value::{Document, Value};
