//! Parcel attributes returned by the cadastre API and their popup labels

use crate::capabilities::lenient;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Shown in place of a missing attribute
pub const PLACEHOLDER: &str = "—";

/// GeoJSON feature returned by `GET /dkp/parcels/{id}/`
///
/// Parsing is lenient: a null or mistyped member falls back to its default so the
/// popup can still show whatever attributes did arrive.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Parcel {
    #[serde(rename = "type", deserialize_with = "lenient")]
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    #[serde(deserialize_with = "lenient")]
    pub geometry: Option<ParcelGeometry>,
    #[serde(deserialize_with = "lenient")]
    pub properties: ParcelProps,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParcelGeometry {
    #[serde(rename = "type", deserialize_with = "lenient")]
    pub kind: String,
    /// MultiPolygon coordinates: polygons, rings, positions, (lon, lat)
    #[serde(deserialize_with = "lenient")]
    pub coordinates: Vec<Vec<Vec<Vec<f64>>>>,
}

/// Attributes as sent by the backend; labels accept any scalar
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParcelProps {
    pub parcel_number: Option<Value>,
    #[serde(deserialize_with = "lenient")]
    pub area: Option<Area>,
    pub cadastral_municipality: Option<Value>,
}

/// Area in square meters; some exports send it as a decimal string
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Area {
    Number(f64),
    Text(String),
}

impl Area {
    /// Value to display, `None` for zero, empty or unparsable areas
    pub fn square_meters(&self) -> Option<f64> {
        match self {
            Self::Number(value) if *value != 0.0 && !value.is_nan() => Some(*value),
            Self::Number(_) => None,
            Self::Text(text) if text.is_empty() => None,
            Self::Text(text) => text.trim().parse::<f64>().ok().filter(|v| v.is_finite()),
        }
    }
}

/// Popup rows for a parcel
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParcelSummary {
    pub parcel_number: String,
    pub area: String,
    pub municipality: String,
}

/// Label text of an attribute, `None` when it is null
fn label(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(text) => Some(text.clone()),
        other => Some(other.to_string()),
    }
}

impl ParcelProps {
    pub fn summary(&self) -> ParcelSummary {
        ParcelSummary {
            parcel_number: self
                .parcel_number
                .as_ref()
                .and_then(label)
                .unwrap_or_else(|| PLACEHOLDER.to_string()),
            area: self
                .area
                .as_ref()
                .and_then(Area::square_meters)
                .map_or_else(|| PLACEHOLDER.to_string(), |m2| format!("{m2:.2} m²")),
            municipality: self
                .cadastral_municipality
                .as_ref()
                .and_then(label)
                .unwrap_or_else(|| PLACEHOLDER.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_parcel_feature() {
        let parcel: Parcel = serde_json::from_value(json!({
            "type": "Feature",
            "id": 981,
            "geometry": {
                "type": "MultiPolygon",
                "coordinates": [[[[16.41, 46.20], [16.42, 46.20], [16.42, 46.21], [16.41, 46.20]]]]
            },
            "properties": {
                "parcel_number": "1234/5",
                "area": "812.456",
                "cadastral_municipality": "Koprivnica"
            }
        }))
        .unwrap();

        assert_eq!(parcel.kind, "Feature");
        assert_eq!(parcel.id, Some(json!(981)));
        assert_eq!(parcel.geometry.as_ref().unwrap().coordinates[0][0].len(), 4);
        assert_eq!(
            parcel.properties.summary(),
            ParcelSummary {
                parcel_number: "1234/5".into(),
                area: "812.46 m²".into(),
                municipality: "Koprivnica".into(),
            }
        );
    }

    #[test]
    fn test_numeric_area() {
        let props = ParcelProps {
            area: Some(Area::Number(1500.0)),
            ..Default::default()
        };
        assert_eq!(props.summary().area, "1500.00 m²");
    }

    #[test]
    fn test_unexpected_member_types() {
        let parcel: Parcel = serde_json::from_value(json!({
            "type": "Feature",
            "geometry": { "coordinates": [] },
            "properties": null
        }))
        .unwrap();
        assert_eq!(parcel.geometry.unwrap().kind, "");
        assert_eq!(parcel.properties, ParcelProps::default());

        let parcel: Parcel = serde_json::from_value(json!({
            "geometry": "point",
            "properties": { "parcel_number": 1234, "area": true, "cadastral_municipality": null }
        }))
        .unwrap();
        assert!(parcel.geometry.is_none());
        let summary = parcel.properties.summary();
        assert_eq!(summary.parcel_number, "1234");
        assert_eq!(summary.area, PLACEHOLDER);
        assert_eq!(summary.municipality, PLACEHOLDER);
    }

    #[test]
    fn test_missing_attributes_use_placeholder() {
        let summary = ParcelProps::default().summary();
        assert_eq!(summary.parcel_number, PLACEHOLDER);
        assert_eq!(summary.area, PLACEHOLDER);
        assert_eq!(summary.municipality, PLACEHOLDER);
    }

    #[test]
    fn test_falsy_and_invalid_areas() {
        assert_eq!(Area::Number(0.0).square_meters(), None);
        assert_eq!(Area::Text(String::new()).square_meters(), None);
        assert_eq!(Area::Text("n/a".into()).square_meters(), None);
        assert_eq!(Area::Text("0".into()).square_meters(), Some(0.0));
    }

    #[test]
    fn test_properties_only_response() {
        let parcel: Parcel =
            serde_json::from_value(json!({ "properties": { "parcel_number": "7" } })).unwrap();
        assert!(parcel.geometry.is_none());
        assert_eq!(parcel.properties.summary().parcel_number, "7");
    }
}
