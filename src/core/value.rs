use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// A storage-native value, the unit the storage engine compares and persists.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Value {
    Null,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    Text(String),
    DateTime(DateTime<Utc>),
    Uuid(Uuid),
    Array(Vec<Value>),
    Document(Document),
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Boolean(_) => "bool",
            Self::Integer(_) => "long",
            Self::Float(_) => "double",
            Self::Text(_) => "string",
            Self::DateTime(_) => "date",
            Self::Uuid(_) => "uuid",
            Self::Array(_) => "array",
            Self::Document(_) => "document",
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Integer(i) => Some(*i),
            Self::Float(f) => {
                if f.is_finite() && *f >= i64::MIN as f64 && *f <= i64::MAX as f64 {
                    Some(*f as i64)
                } else {
                    None
                }
            }
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_document(&self) -> Option<&Document> {
        match self {
            Self::Document(doc) => Some(doc),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Self::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Lossy rendering used for diagnostics and error messages.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Null => serde_json::Value::Null,
            Self::Boolean(b) => serde_json::Value::Bool(*b),
            Self::Integer(i) => serde_json::Value::from(*i),
            Self::Float(f) => serde_json::Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Self::Text(s) => serde_json::Value::String(s.clone()),
            Self::DateTime(dt) => {
                serde_json::Value::String(dt.to_rfc3339_opts(SecondsFormat::AutoSi, true))
            }
            Self::Uuid(id) => serde_json::Value::String(id.to_string()),
            Self::Array(items) => serde_json::Value::Array(items.iter().map(Value::to_json).collect()),
            Self::Document(doc) => doc.to_json(),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Boolean(a), Self::Boolean(b)) => a == b,
            (Self::Integer(a), Self::Integer(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => {
                if a.is_nan() && b.is_nan() {
                    return true;
                }
                a == b
            }
            // Numeric comparison across representations, as the engine does for filters
            (Self::Integer(i), Self::Float(f)) | (Self::Float(f), Self::Integer(i)) => {
                integer_equals_float(*i, *f)
            }
            (Self::Text(a), Self::Text(b)) => a == b,
            (Self::DateTime(a), Self::DateTime(b)) => a == b,
            (Self::Uuid(a), Self::Uuid(b)) => a == b,
            (Self::Array(a), Self::Array(b)) => a == b,
            (Self::Document(a), Self::Document(b)) => a == b,
            _ => false,
        }
    }
}

/// Exact comparison: `i as f64` rounds above 2^53, so the float is converted instead.
fn integer_equals_float(i: i64, f: f64) -> bool {
    const LOWER: f64 = -9_223_372_036_854_775_808.0; // -2^63
    const UPPER: f64 = 9_223_372_036_854_775_808.0; // 2^63, exclusive
    f.fract() == 0.0 && (LOWER..UPPER).contains(&f) && f as i64 == i
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(s) => write!(f, "\"{}\"", s),
            other => write!(f, "{}", other.to_json()),
        }
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Self::Integer(i)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Self::Float(f)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Boolean(b)
    }
}

impl From<Uuid> for Value {
    fn from(id: Uuid) -> Self {
        Self::Uuid(id)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(dt: DateTime<Utc>) -> Self {
        Self::DateTime(dt)
    }
}

impl From<Document> for Value {
    fn from(doc: Document) -> Self {
        Self::Document(doc)
    }
}

/// An insertion-ordered document of named elements.
///
/// Equality is order-sensitive, matching how the engine compares embedded
/// documents such as composite `_id` values.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Document {
    elements: Vec<(String, Value)>,
}

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts an element, replacing an existing element of the same name in place.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        let name = name.into();
        let value = value.into();
        match self.elements.iter_mut().find(|(existing, _)| *existing == name) {
            Some((_, slot)) => Some(std::mem::replace(slot, value)),
            None => {
                self.elements.push((name, value));
                None
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.elements
            .iter()
            .find(|(existing, _)| existing == name)
            .map(|(_, value)| value)
    }

    /// Resolves a dotted path such as `"shipping.city"` through nested documents.
    pub fn get_path(&self, path: &str) -> Option<&Value> {
        let mut segments = path.split('.');
        let mut current = self.get(segments.next()?)?;
        for segment in segments {
            current = current.as_document()?.get(segment)?;
        }
        Some(current)
    }

    pub fn remove(&mut self, name: &str) -> Option<Value> {
        let position = self.elements.iter().position(|(existing, _)| existing == name)?;
        Some(self.elements.remove(position).1)
    }

    pub fn contains_key(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.elements.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.elements.iter().map(|(name, _)| name.as_str())
    }

    pub fn to_json(&self) -> serde_json::Value {
        let map = self
            .elements
            .iter()
            .map(|(name, value)| (name.clone(), value.to_json()))
            .collect::<serde_json::Map<_, _>>();
        serde_json::Value::Object(map)
    }
}

impl fmt::Display for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_json())
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Document {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut doc = Document::new();
        for (name, value) in iter {
            doc.insert(name, value);
        }
        doc
    }
}

impl IntoIterator for Document {
    type Item = (String, Value);
    type IntoIter = std::vec::IntoIter<(String, Value)>;

    fn into_iter(self) -> Self::IntoIter {
        self.elements.into_iter()
    }
}

/// Builds a [`Document`] from `name => value` pairs.
#[macro_export]
macro_rules! doc {
    () => { $crate::core::Document::new() };
    ($($name:expr => $value:expr),+ $(,)?) => {{
        let mut doc = $crate::core::Document::new();
        $( doc.insert($name, $value); )+
        doc
    }};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_equality() {
        assert_eq!(Value::Integer(42), Value::Integer(42));
        assert_eq!(Value::Integer(2), Value::Float(2.0));
        assert_ne!(Value::Integer(1), Value::Text("1".into()));
        assert_eq!(Value::Float(f64::NAN), Value::Float(f64::NAN));
    }

    #[test]
    fn test_integer_float_equality_is_exact() {
        let two_pow_53 = 1i64 << 53;
        assert_eq!(Value::Integer(two_pow_53), Value::Float(two_pow_53 as f64));
        assert_ne!(Value::Integer(two_pow_53 + 1), Value::Float(two_pow_53 as f64));
        assert_ne!(Value::Float(two_pow_53 as f64), Value::Integer(two_pow_53 + 1));
        assert_ne!(Value::Integer(i64::MAX), Value::Float(9_223_372_036_854_775_808.0));
        assert_eq!(Value::Integer(i64::MIN), Value::Float(i64::MIN as f64));
        assert_ne!(Value::Integer(2), Value::Float(2.5));
        assert_ne!(Value::Integer(0), Value::Float(f64::NAN));
        assert_ne!(Value::Integer(0), Value::Float(f64::INFINITY));
    }

    #[test]
    fn test_insert_replaces_in_place() {
        let mut doc = doc! { "a" => 1i64, "b" => "x" };
        let previous = doc.insert("a", 5i64);

        assert_eq!(previous, Some(Value::Integer(1)));
        assert_eq!(doc.keys().collect::<Vec<_>>(), vec!["a", "b"]);
        assert_eq!(doc.get("a"), Some(&Value::Integer(5)));
    }

    #[test]
    fn test_get_path_walks_nested_documents() {
        let doc = doc! { "shipping" => doc! { "city" => "Oslo" } };

        assert_eq!(doc.get_path("shipping.city"), Some(&Value::Text("Oslo".into())));
        assert_eq!(doc.get_path("shipping.zip"), None);
        assert_eq!(doc.get_path("missing.city"), None);
    }

    #[test]
    fn test_document_equality_is_order_sensitive() {
        let ab = doc! { "a" => 1i64, "b" => 2i64 };
        let ba = doc! { "b" => 2i64, "a" => 1i64 };
        assert_ne!(ab, ba);
    }

    #[test]
    fn test_to_json_renders_nested_values() {
        let id = Uuid::nil();
        let doc = doc! { "_id" => id, "tags" => Value::Array(vec!["a".into()]) };
        assert_eq!(
            doc.to_json(),
            serde_json::json!({ "_id": "00000000-0000-0000-0000-000000000000", "tags": ["a"] })
        );
    }
}
