use crate::core::{Document, Result, SaveError, Value};
use crate::model::{PropertyDescriptor, ValueKind};
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::Value as JsonValue;
use std::fmt;
use uuid::Uuid;

/// Converts between application-side property values and storage-native values.
///
/// Invoked once per scalar property; owned entities are handled by the
/// document writer and reader, which call back into the converter.
pub trait ValueConverter: Send + Sync + fmt::Debug {
    fn to_storage(&self, property: &PropertyDescriptor, value: &JsonValue) -> Result<Value>;

    fn from_storage(&self, property: &PropertyDescriptor, value: &Value) -> Result<JsonValue>;
}

/// Default conversion table driven by [`ValueKind`].
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardConverter;

impl ValueConverter for StandardConverter {
    fn to_storage(&self, property: &PropertyDescriptor, value: &JsonValue) -> Result<Value> {
        if value.is_null() {
            return Ok(Value::Null);
        }

        match property.kind {
            ValueKind::Any => Ok(structural_to_storage(value)),
            ValueKind::Boolean => value
                .as_bool()
                .map(Value::Boolean)
                .ok_or_else(|| mismatch(property, value)),
            ValueKind::Integer => value
                .as_i64()
                .map(Value::Integer)
                .ok_or_else(|| mismatch(property, value)),
            ValueKind::Float => value
                .as_f64()
                .map(Value::Float)
                .ok_or_else(|| mismatch(property, value)),
            ValueKind::String => value
                .as_str()
                .map(Value::from)
                .ok_or_else(|| mismatch(property, value)),
            ValueKind::DateTime => {
                let text = value.as_str().ok_or_else(|| mismatch(property, value))?;
                let parsed = DateTime::parse_from_rfc3339(text).map_err(|e| {
                    SaveError::Serialization(format!(
                        "Property '{}' holds an invalid RFC 3339 timestamp '{}': {}",
                        property.name, text, e
                    ))
                })?;
                Ok(Value::DateTime(parsed.with_timezone(&Utc)))
            }
            ValueKind::Uuid => {
                let text = value.as_str().ok_or_else(|| mismatch(property, value))?;
                let parsed = Uuid::parse_str(text).map_err(|e| {
                    SaveError::Serialization(format!(
                        "Property '{}' holds an invalid UUID '{}': {}",
                        property.name, text, e
                    ))
                })?;
                Ok(Value::Uuid(parsed))
            }
        }
    }

    fn from_storage(&self, _property: &PropertyDescriptor, value: &Value) -> Result<JsonValue> {
        Ok(storage_to_json(value))
    }
}

fn mismatch(property: &PropertyDescriptor, value: &JsonValue) -> SaveError {
    SaveError::Serialization(format!(
        "Property '{}' expects a {} value, got {}",
        property.name, property.kind, value
    ))
}

fn structural_to_storage(value: &JsonValue) -> Value {
    match value {
        JsonValue::Null => Value::Null,
        JsonValue::Bool(b) => Value::Boolean(*b),
        JsonValue::Number(n) => match n.as_i64() {
            Some(i) => Value::Integer(i),
            None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
        },
        JsonValue::String(s) => Value::Text(s.clone()),
        JsonValue::Array(items) => Value::Array(items.iter().map(structural_to_storage).collect()),
        JsonValue::Object(map) => Value::Document(
            map.iter()
                .map(|(k, v)| (k.clone(), structural_to_storage(v)))
                .collect::<Document>(),
        ),
    }
}

fn storage_to_json(value: &Value) -> JsonValue {
    match value {
        Value::DateTime(dt) => JsonValue::String(dt.to_rfc3339_opts(SecondsFormat::AutoSi, true)),
        Value::Uuid(id) => JsonValue::String(id.hyphenated().to_string()),
        Value::Array(items) => JsonValue::Array(items.iter().map(storage_to_json).collect()),
        Value::Document(doc) => JsonValue::Object(
            doc.iter()
                .map(|(k, v)| (k.to_string(), storage_to_json(v)))
                .collect(),
        ),
        other => other.to_json(),
    }
}
