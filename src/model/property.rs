use std::fmt;

/// The application-side shape of a property, used by the value converter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    /// Converted structurally from the JSON value.
    Any,
    Boolean,
    Integer,
    Float,
    String,
    /// RFC 3339 strings stored as native dates.
    DateTime,
    /// Hyphenated UUID strings stored as native UUIDs.
    Uuid,
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Any => "any",
            Self::Boolean => "bool",
            Self::Integer => "integer",
            Self::Float => "float",
            Self::String => "string",
            Self::DateTime => "datetime",
            Self::Uuid => "uuid",
        };
        write!(f, "{label}")
    }
}

/// Where a property lives relative to the stored document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyRole {
    /// Part of the entity key. For roots this maps into `_id`.
    Key,
    /// Key value copied from the owning entity. Never stored in the owned sub-document.
    OwnerKey,
    /// Synthetic position of an owned collection item. Never stored.
    Ordinal,
    /// Ordinary stored element.
    Scalar,
}

/// Optimistic-concurrency behavior of a property.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConcurrencyToken {
    /// Compared by equality against the original value.
    Value,
    /// Numeric counter compared against the original value and bumped on every write.
    RowVersion,
}

/// How a temporary value is replaced before an insert is serialized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ValueGeneration {
    #[default]
    None,
    /// A random v4 UUID rendered as a string.
    Uuid,
    /// Next free position within an owned collection.
    Ordinal,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PropertyDescriptor {
    pub name: String,
    pub element_name: String,
    pub kind: ValueKind,
    pub role: PropertyRole,
    pub concurrency: Option<ConcurrencyToken>,
    pub generation: ValueGeneration,
}

impl PropertyDescriptor {
    pub fn scalar(name: &str, kind: ValueKind) -> Self {
        Self {
            name: name.to_string(),
            element_name: name.to_string(),
            kind,
            role: PropertyRole::Scalar,
            concurrency: None,
            generation: ValueGeneration::None,
        }
    }

    pub fn key(name: &str, kind: ValueKind) -> Self {
        Self {
            role: PropertyRole::Key,
            ..Self::scalar(name, kind)
        }
    }

    pub fn owner_key(name: &str, kind: ValueKind) -> Self {
        Self {
            role: PropertyRole::OwnerKey,
            ..Self::scalar(name, kind)
        }
    }

    /// Ordinal key of an owned collection item, generated on first write.
    pub fn ordinal(name: &str) -> Self {
        Self {
            role: PropertyRole::Ordinal,
            generation: ValueGeneration::Ordinal,
            ..Self::scalar(name, ValueKind::Integer)
        }
    }

    /// Integer row-version counter.
    pub fn row_version(name: &str) -> Self {
        Self {
            concurrency: Some(ConcurrencyToken::RowVersion),
            ..Self::scalar(name, ValueKind::Integer)
        }
    }

    pub fn element(mut self, element_name: &str) -> Self {
        self.element_name = element_name.to_string();
        self
    }

    pub fn concurrency_token(mut self) -> Self {
        self.concurrency = Some(ConcurrencyToken::Value);
        self
    }

    pub fn generated(mut self, generation: ValueGeneration) -> Self {
        self.generation = generation;
        self
    }

    pub fn is_key(&self) -> bool {
        matches!(self.role, PropertyRole::Key)
    }

    pub fn is_row_version(&self) -> bool {
        matches!(self.concurrency, Some(ConcurrencyToken::RowVersion))
    }

    /// Shadow properties belong to the owning document and are never serialized.
    pub fn is_shadow(&self) -> bool {
        matches!(self.role, PropertyRole::OwnerKey | PropertyRole::Ordinal)
    }
}

/// An owned navigation: a nested sub-document or an array of sub-documents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavigationDescriptor {
    pub name: String,
    pub element_name: String,
    pub target: String,
    pub collection: bool,
}

impl NavigationDescriptor {
    pub fn one(name: &str, target: &str) -> Self {
        Self {
            name: name.to_string(),
            element_name: name.to_string(),
            target: target.to_string(),
            collection: false,
        }
    }

    pub fn many(name: &str, target: &str) -> Self {
        Self {
            collection: true,
            ..Self::one(name, target)
        }
    }

    pub fn element(mut self, element_name: &str) -> Self {
        self.element_name = element_name.to_string();
        self
    }
}
