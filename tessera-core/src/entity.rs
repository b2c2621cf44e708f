//! Entity identity types.

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fmt;

/// Entity type tag, e.g. `"users"`. Entities are identified by `(type, id)`.
pub type EntityType = String;

/// Property holding an entity's id unless a type overrides it.
pub const DEFAULT_ID_PROPERTY: &str = "id";

/// Identifier of a cached entity within its type.
///
/// JSON integers map to [`EntityId::Int`], strings to [`EntityId::Text`].
/// Integers and strings never collide: `1` and `"1"` are different ids.
/// Deserialization follows [`EntityId::from_value`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(untagged)]
pub enum EntityId {
    Int(i64),
    Text(String),
}

impl EntityId {
    /// Read an id from a JSON value.
    ///
    /// Numbers that do not fit an `i64` (large unsigned, floats) are carried
    /// as their textual form. `null`, booleans, objects and arrays are not ids.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => Some(match n.as_i64() {
                Some(i) => Self::Int(i),
                None => Self::Text(n.to_string()),
            }),
            Value::String(s) => Some(Self::Text(s.clone())),
            _ => None,
        }
    }

    /// Read the id property of an entity. Non-object entities have no id.
    pub fn of_entity(entity: &Value, id_property: &str) -> Option<Self> {
        entity.as_object()?.get(id_property).and_then(Self::from_value)
    }

    /// Convert back to a JSON value.
    pub fn to_value(&self) -> Value {
        match self {
            Self::Int(i) => Value::from(*i),
            Self::Text(s) => Value::from(s.as_str()),
        }
    }
}

impl<'de> Deserialize<'de> for EntityId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        Self::from_value(&value)
            .ok_or_else(|| D::Error::custom(format!("{} is not a valid entity id", value)))
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(i) => write!(f, "{}", i),
            Self::Text(s) => f.write_str(s),
        }
    }
}

impl From<i64> for EntityId {
    fn from(id: i64) -> Self {
        Self::Int(id)
    }
}

impl From<i32> for EntityId {
    fn from(id: i32) -> Self {
        Self::Int(i64::from(id))
    }
}

impl From<u32> for EntityId {
    fn from(id: u32) -> Self {
        Self::Int(i64::from(id))
    }
}

impl From<&str> for EntityId {
    fn from(id: &str) -> Self {
        Self::Text(id.to_string())
    }
}

impl From<String> for EntityId {
    fn from(id: String) -> Self {
        Self::Text(id)
    }
}
