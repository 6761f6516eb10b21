//! Tegola capabilities document and layer tile-URL lookup
//!
//! The capabilities manifest comes from a third-party tile server whose response
//! shape is not guaranteed. Every field deserializes leniently: a missing or
//! mistyped value falls back to its default, and `maps`/`layers` entries that are
//! not objects are skipped. Building a [`CapabilitiesDocument`] from JSON never fails.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Layer holding the cadastral parcels in the tile server configuration
pub const CADASTRE_LAYER_NAME: &str = "cadastral_parcels";

/// Root of the capabilities response
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CapabilitiesDocument {
    #[serde(deserialize_with = "lenient")]
    pub version: String,
    #[serde(deserialize_with = "lenient_seq")]
    pub maps: Vec<MapEntry>,
}

/// One named map of the tile server
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MapEntry {
    #[serde(deserialize_with = "lenient")]
    pub name: Option<String>,
    #[serde(deserialize_with = "lenient")]
    pub attribution: String,
    #[serde(deserialize_with = "lenient")]
    pub bounds: [f64; 4],
    #[serde(deserialize_with = "lenient")]
    pub center: [f64; 3],
    #[serde(deserialize_with = "lenient")]
    pub tiles: Vec<String>,
    #[serde(deserialize_with = "lenient")]
    pub capabilities: String,
    #[serde(deserialize_with = "lenient_seq")]
    pub layers: Vec<Layer>,
}

/// A layer of a map. Names are unique within a map, not across maps.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Layer {
    #[serde(deserialize_with = "lenient")]
    pub name: Option<String>,
    /// Tile URL templates; non-string entries keep their slot as `None`
    #[serde(deserialize_with = "lenient_items")]
    pub tiles: Vec<Option<String>>,
    #[serde(deserialize_with = "lenient")]
    pub minzoom: Option<f64>,
    #[serde(deserialize_with = "lenient")]
    pub maxzoom: Option<f64>,
}

impl CapabilitiesDocument {
    /// Interpret an arbitrary JSON value as a capabilities document
    pub fn from_value(value: Value) -> Self {
        serde_json::from_value(value).unwrap_or_else(|err| {
            tracing::debug!("Capabilities response is not an object, treating as empty: {err}");
            Self::default()
        })
    }
}

impl Layer {
    /// Canonical tile URL template, if the layer has any
    pub fn tiles_url(&self) -> Option<&str> {
        self.tiles.first().and_then(Option::as_deref)
    }
}

/// Find the first layer named `layer_name` that has at least one tile URL.
///
/// Maps are searched in declaration order. Within a map only the first layer with
/// the requested name is considered; if its `tiles` is empty the search moves on to
/// the next map.
pub fn find_layer<'a>(caps: &'a CapabilitiesDocument, layer_name: &str) -> Option<&'a Layer> {
    caps.maps
        .iter()
        .filter_map(|map| {
            map.layers
                .iter()
                .find(|layer| layer.name.as_deref() == Some(layer_name))
        })
        .find(|layer| !layer.tiles.is_empty())
}

/// Tile URL template of the first matching layer, see [`find_layer`]
pub fn find_layer_tiles_url<'a>(caps: &'a CapabilitiesDocument, layer_name: &str) -> Option<&'a str> {
    find_layer(caps, layer_name).and_then(Layer::tiles_url)
}

pub(crate) fn lenient<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    let value = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).unwrap_or_default())
}

/// Array whose elements each fall back to their default
fn lenient_items<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    let Value::Array(items) = Value::deserialize(deserializer)? else {
        return Ok(Vec::new());
    };
    Ok(items
        .into_iter()
        .map(|item| serde_json::from_value(item).unwrap_or_default())
        .collect())
}

fn lenient_seq<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let Value::Array(items) = Value::deserialize(deserializer)? else {
        return Ok(Vec::new());
    };
    Ok(items
        .into_iter()
        .filter_map(|item| serde_json::from_value(item).ok())
        .collect())
}
