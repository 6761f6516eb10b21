//! Stable identifiers for vector-tile features
//!
//! Vector tiles produced by different GIS export pipelines disagree on where the
//! identifier of a feature lives. Some set the native MVT feature id, others only
//! carry it as an attribute under one of several conventional names.
//! [`get_feature_id`] hides that difference behind a fixed priority chain.

use serde_json::{Map, Number, Value};
use std::fmt;

/// Property names checked for an identifier, highest priority first
pub const ID_PROPERTY_KEYS: [&str; 5] = ["id", "gid", "objectid", "parcel_id", "parcelid"];

/// Identifier of a feature: either text or a number
#[derive(Clone, Debug)]
pub enum FeatureId {
    Text(String),
    Number(Number),
}

impl FeatureId {
    /// Identifier carried by a JSON value. Only `null` yields `None`.
    ///
    /// Falsy values such as `0`, `false` or `""` are identifiers like any other.
    /// Booleans, arrays and objects become text holding their JSON rendering.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Null => None,
            Value::String(text) => Some(Self::Text(text.clone())),
            Value::Number(number) => Some(Self::Number(number.clone())),
            other => Some(Self::Text(other.to_string())),
        }
    }
}

/// Text equals text by content and numbers equal numbers by value.
/// Text and numbers are never equal, even when `"7"` and `7` print the same.
impl PartialEq for FeatureId {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Text(a), Self::Text(b)) => a == b,
            (Self::Number(a), Self::Number(b)) => numbers_equal(a, b),
            _ => false,
        }
    }
}

fn numbers_equal(a: &Number, b: &Number) -> bool {
    if let (Some(a), Some(b)) = (a.as_u64(), b.as_u64()) {
        return a == b;
    }
    if let (Some(a), Some(b)) = (a.as_i64(), b.as_i64()) {
        return a == b;
    }
    a.as_f64() == b.as_f64()
}

impl fmt::Display for FeatureId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(text) => f.write_str(text),
            Self::Number(number) => write!(f, "{number}"),
        }
    }
}

impl From<u64> for FeatureId {
    fn from(value: u64) -> Self {
        Self::Number(value.into())
    }
}

impl From<i64> for FeatureId {
    fn from(value: i64) -> Self {
        Self::Number(value.into())
    }
}

impl From<&str> for FeatureId {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for FeatureId {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

/// Capabilities a decoded vector feature may expose.
///
/// Both accessors are optional; the defaults report them as not exposed.
pub trait VectorFeature {
    /// Format-native identifier, e.g. the MVT feature id
    fn identifier(&self) -> Option<FeatureId> {
        None
    }

    /// Attribute mapping of the feature
    fn properties(&self) -> Option<&Map<String, Value>> {
        None
    }
}

/// GeoJSON-like feature objects: `{ "id": .., "properties": { .. } }`
impl VectorFeature for Value {
    fn identifier(&self) -> Option<FeatureId> {
        self.get("id").and_then(FeatureId::from_value)
    }

    fn properties(&self) -> Option<&Map<String, Value>> {
        self.get("properties").and_then(Value::as_object)
    }
}

/// Canonical identifier of `feature`, or `None` when it has none.
///
/// The native identifier wins. Otherwise the properties are checked in the order
/// of [`ID_PROPERTY_KEYS`] and the first non-null value is returned.
pub fn get_feature_id<F: VectorFeature + ?Sized>(feature: &F) -> Option<FeatureId> {
    if let Some(id) = feature.identifier() {
        return Some(id);
    }

    let properties = feature.properties()?;
    ID_PROPERTY_KEYS
        .iter()
        .find_map(|key| properties.get(*key).and_then(FeatureId::from_value))
}
