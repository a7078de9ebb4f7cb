use crate::core::{Document, Value};
use crate::serializer::ID_ELEMENT;
use crate::tracking::EntryId;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    Insert,
    Update,
    Delete,
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperationKind::Insert => write!(f, "INSERT"),
            OperationKind::Update => write!(f, "UPDATE"),
            OperationKind::Delete => write!(f, "DELETE"),
        }
    }
}

/// The storage command for one document root.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteModel {
    /// Insert a complete document.
    InsertOne { document: Document },
    /// Set the listed elements on the single document matching `filter`.
    UpdateOne { filter: Document, set: Document },
    /// Remove the single document matching `filter`.
    DeleteOne { filter: Document },
}

/// One root-level write, tagged with the entry it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct WriteOperation {
    pub collection: String,
    pub entry: EntryId,
    pub entity_type: String,
    pub model: WriteModel,
}

impl WriteOperation {
    pub fn kind(&self) -> OperationKind {
        match self.model {
            WriteModel::InsertOne { .. } => OperationKind::Insert,
            WriteModel::UpdateOne { .. } => OperationKind::Update,
            WriteModel::DeleteOne { .. } => OperationKind::Delete,
        }
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn filter(&self) -> Option<&Document> {
        match &self.model {
            WriteModel::InsertOne { .. } => None,
            WriteModel::UpdateOne { filter, .. } | WriteModel::DeleteOne { filter } => Some(filter),
        }
    }

    /// The inserted document, or the elements an update sets.
    pub fn document(&self) -> Option<&Document> {
        match &self.model {
            WriteModel::InsertOne { document } => Some(document),
            WriteModel::UpdateOne { set, .. } => Some(set),
            WriteModel::DeleteOne { .. } => None,
        }
    }

    /// The `_id` this operation targets.
    pub fn target_id(&self) -> Option<&Value> {
        match &self.model {
            WriteModel::InsertOne { document } => document.get(ID_ELEMENT),
            WriteModel::UpdateOne { filter, .. } | WriteModel::DeleteOne { filter } => {
                filter.get(ID_ELEMENT)
            }
        }
    }
}

impl fmt::Display for WriteOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.target_id() {
            Some(id) => write!(f, "{} {}.{} {}", self.kind(), self.collection, self.entity_type, id),
            None => write!(f, "{} {}.{}", self.kind(), self.collection, self.entity_type),
        }
    }
}
