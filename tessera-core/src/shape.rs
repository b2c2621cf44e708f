//! Id-shapes, request records and metadata slots.
//!
//! A request record never holds entity bodies. It holds the *shape* of the
//! response: for each entity type, a single id or an ordered list of ids.
//! Entities themselves live in the data tier and evict independently.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::entity::{EntityId, EntityType};

/// Reference(s) from a request record into one entity type's data map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum IdRef {
    /// The response held one entity of this type.
    Scalar(EntityId),
    /// The response held an ordered list of entities of this type.
    Sequence(Vec<EntityId>),
}

impl IdRef {
    /// Derive the reference for one field of a response body.
    ///
    /// Arrays become [`IdRef::Sequence`], anything else is treated as a
    /// single entity. Returns `None` if any member has no usable id, since
    /// such a field could never be rebuilt from the data tier.
    pub fn derive(value: &Value, id_property: &str) -> Option<Self> {
        match value {
            Value::Array(items) => items
                .iter()
                .map(|item| EntityId::of_entity(item, id_property))
                .collect::<Option<Vec<_>>>()
                .map(Self::Sequence),
            other => EntityId::of_entity(other, id_property).map(Self::Scalar),
        }
    }

    /// All ids referenced, in order.
    pub fn ids(&self) -> &[EntityId] {
        match self {
            Self::Scalar(id) => std::slice::from_ref(id),
            Self::Sequence(ids) => ids,
        }
    }

    pub fn is_sequence(&self) -> bool {
        matches!(self, Self::Sequence(_))
    }
}

/// Mapping from entity type to the ids a response referenced.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IdShape(BTreeMap<EntityType, IdRef>);

impl IdShape {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a single-entity field.
    pub fn with_scalar(mut self, entity_type: impl Into<EntityType>, id: impl Into<EntityId>) -> Self {
        self.0.insert(entity_type.into(), IdRef::Scalar(id.into()));
        self
    }

    /// Add a list field.
    pub fn with_sequence<I>(mut self, entity_type: impl Into<EntityType>, ids: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<EntityId>,
    {
        let ids = ids.into_iter().map(Into::into).collect();
        self.0.insert(entity_type.into(), IdRef::Sequence(ids));
        self
    }

    /// Parse a shape such as `{"users": [1, 2], "owner": 7}`.
    pub fn from_value(value: Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value)
    }

    pub fn insert(&mut self, entity_type: EntityType, id_ref: IdRef) {
        self.0.insert(entity_type, id_ref);
    }

    pub fn get(&self, entity_type: &str) -> Option<&IdRef> {
        self.0.get(entity_type)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&EntityType, &IdRef)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// How the response body was laid out at its root.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BodyRoot {
    /// An object whose fields are entity types.
    #[default]
    Keyed,
    /// A bare array of entities stored under an inferred type.
    Inline { entity_type: EntityType },
}

/// Value held in the request tier for one `(request key, fingerprint)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestRecord {
    pub shape: IdShape,
    pub root: BodyRoot,
}

impl RequestRecord {
    pub fn keyed(shape: IdShape) -> Self {
        Self {
            shape,
            root: BodyRoot::Keyed,
        }
    }

    pub fn inline(entity_type: impl Into<EntityType>, id_ref: IdRef) -> Self {
        let entity_type = entity_type.into();
        let mut shape = IdShape::new();
        shape.insert(entity_type.clone(), id_ref);
        Self {
            shape,
            root: BodyRoot::Inline { entity_type },
        }
    }
}

/// Metadata slot stored beside a request record.
///
/// A missing slot means "never cached"; [`ResponseMetadata::Empty`] means
/// "cached, and the response carried no metadata".
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub enum ResponseMetadata {
    #[default]
    Empty,
    Present(Value),
}

impl ResponseMetadata {
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }

    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Self::Empty => None,
            Self::Present(value) => Some(value),
        }
    }
}

impl From<Option<Value>> for ResponseMetadata {
    fn from(value: Option<Value>) -> Self {
        match value {
            None | Some(Value::Null) => Self::Empty,
            Some(value) => Self::Present(value),
        }
    }
}

/// What a fetcher returns: a body plus optional transport metadata.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FetchResponse {
    pub body: Value,
    #[serde(default)]
    pub metadata: Option<Value>,
}

impl FetchResponse {
    pub fn new(body: Value) -> Self {
        Self {
            body,
            metadata: None,
        }
    }

    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

/// A plain value is an already-shaped body with no metadata.
impl From<Value> for FetchResponse {
    fn from(body: Value) -> Self {
        Self::new(body)
    }
}
