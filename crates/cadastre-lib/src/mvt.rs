//! Mapbox Vector Tile decoding
//!
//! Decodes the protobuf tile body into [`DecodedFeature`]s with their attribute
//! mapping resolved and polygon rings converted to WGS84 longitude/latitude.
//! Only polygon geometry is kept; other features stay in the output with empty
//! geometry so identifier lookup still works on them.

use crate::feature_id::{FeatureId, VectorFeature};
use crate::tiles::TileCoord;
use geo::{Contains, Coord, LineString, MultiPolygon, Point, Polygon};
use prost::Message;
use serde_json::{Map, Value};

const DEFAULT_EXTENT: u32 = 4096;

const CMD_MOVE_TO: u32 = 1;
const CMD_LINE_TO: u32 = 2;
const CMD_CLOSE_PATH: u32 = 7;

#[derive(Debug, thiserror::Error)]
pub enum MvtError {
    #[error("Invalid vector tile: {0}")]
    Decode(#[from] prost::DecodeError),
}

#[derive(Clone, PartialEq, Message)]
pub(crate) struct Tile {
    #[prost(message, repeated, tag = "3")]
    pub layers: Vec<TileLayer>,
}

#[derive(Clone, PartialEq, Message)]
pub(crate) struct TileLayer {
    #[prost(uint32, required, tag = "15")]
    pub version: u32,
    #[prost(string, required, tag = "1")]
    pub name: String,
    #[prost(message, repeated, tag = "2")]
    pub features: Vec<TileFeature>,
    #[prost(string, repeated, tag = "3")]
    pub keys: Vec<String>,
    #[prost(message, repeated, tag = "4")]
    pub values: Vec<TileValue>,
    #[prost(uint32, optional, tag = "5")]
    pub extent: Option<u32>,
}

#[derive(Clone, PartialEq, Message)]
pub(crate) struct TileFeature {
    #[prost(uint64, optional, tag = "1")]
    pub id: Option<u64>,
    #[prost(uint32, repeated, packed = "true", tag = "2")]
    pub tags: Vec<u32>,
    #[prost(enumeration = "GeomType", optional, tag = "3")]
    pub r#type: Option<i32>,
    #[prost(uint32, repeated, packed = "true", tag = "4")]
    pub geometry: Vec<u32>,
}

#[derive(Clone, PartialEq, Message)]
pub(crate) struct TileValue {
    #[prost(string, optional, tag = "1")]
    pub string_value: Option<String>,
    #[prost(float, optional, tag = "2")]
    pub float_value: Option<f32>,
    #[prost(double, optional, tag = "3")]
    pub double_value: Option<f64>,
    #[prost(int64, optional, tag = "4")]
    pub int_value: Option<i64>,
    #[prost(uint64, optional, tag = "5")]
    pub uint_value: Option<u64>,
    #[prost(sint64, optional, tag = "6")]
    pub sint_value: Option<i64>,
    #[prost(bool, optional, tag = "7")]
    pub bool_value: Option<bool>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Enumeration)]
#[repr(i32)]
pub(crate) enum GeomType {
    Unknown = 0,
    Point = 1,
    Linestring = 2,
    Polygon = 3,
}

/// One feature of a decoded tile
#[derive(Clone, Debug, PartialEq)]
pub struct DecodedFeature {
    /// Native MVT feature id
    pub id: Option<u64>,
    pub properties: Map<String, Value>,
    /// Polygons in (lon, lat); empty for non-polygon features
    pub polygons: MultiPolygon<f64>,
}

impl VectorFeature for DecodedFeature {
    fn identifier(&self) -> Option<FeatureId> {
        self.id.map(FeatureId::from)
    }

    fn properties(&self) -> Option<&Map<String, Value>> {
        Some(&self.properties)
    }
}

impl DecodedFeature {
    /// Whether the WGS84 point lies inside one of the feature's polygons
    pub fn contains(&self, lon: f64, lat: f64) -> bool {
        self.polygons.contains(&Point::new(lon, lat))
    }
}

/// Topmost feature under the point. Later features are drawn on top.
pub fn hit_test(features: &[DecodedFeature], lon: f64, lat: f64) -> Option<&DecodedFeature> {
    features.iter().rev().find(|feature| feature.contains(lon, lat))
}

/// Decode an MVT body fetched for `tile`
#[cfg_attr(feature = "profiling", profiling::function)]
pub fn decode_tile(bytes: &[u8], tile: TileCoord) -> Result<Vec<DecodedFeature>, MvtError> {
    let decoded = Tile::decode(bytes)?;
    let mut features = Vec::new();

    for layer in &decoded.layers {
        let extent = layer.extent.unwrap_or(DEFAULT_EXTENT);

        for feature in &layer.features {
            let is_polygon = feature
                .r#type
                .and_then(|kind| GeomType::try_from(kind).ok())
                == Some(GeomType::Polygon);

            let polygons = if is_polygon {
                decode_polygons(&feature.geometry, tile, extent)
            } else {
                MultiPolygon::new(Vec::new())
            };

            features.push(DecodedFeature {
                id: feature.id,
                properties: decode_properties(layer, feature),
                polygons,
            });
        }
    }

    tracing::trace!("Decoded {} features from tile {:?}", features.len(), tile);
    Ok(features)
}

fn decode_properties(layer: &TileLayer, feature: &TileFeature) -> Map<String, Value> {
    let mut properties = Map::new();
    for pair in feature.tags.chunks_exact(2) {
        let (Some(key), Some(value)) = (
            layer.keys.get(pair[0] as usize),
            layer.values.get(pair[1] as usize),
        ) else {
            tracing::debug!("Skipping out-of-range tag pair in layer {}", layer.name);
            continue;
        };
        properties.insert(key.clone(), tile_value_to_json(value));
    }
    properties
}

fn tile_value_to_json(value: &TileValue) -> Value {
    if let Some(v) = &value.string_value {
        return Value::String(v.clone());
    }
    if let Some(v) = value.float_value {
        return serde_json::Number::from_f64(f64::from(v)).map_or(Value::Null, Value::Number);
    }
    if let Some(v) = value.double_value {
        return serde_json::Number::from_f64(v).map_or(Value::Null, Value::Number);
    }
    if let Some(v) = value.int_value {
        return Value::from(v);
    }
    if let Some(v) = value.uint_value {
        return Value::from(v);
    }
    if let Some(v) = value.sint_value {
        return Value::from(v);
    }
    if let Some(v) = value.bool_value {
        return Value::Bool(v);
    }
    Value::Null
}

/// Decode the command stream into closed rings in tile-local coordinates
fn decode_rings(commands: &[u32]) -> Vec<Vec<(i32, i32)>> {
    let mut rings = Vec::new();
    let mut ring: Vec<(i32, i32)> = Vec::new();
    let (mut x, mut y) = (0i32, 0i32);
    let mut cursor = 0usize;

    while cursor < commands.len() {
        let command = commands[cursor];
        cursor += 1;
        let id = command & 0x7;
        let count = (command >> 3) as usize;

        match id {
            CMD_MOVE_TO | CMD_LINE_TO => {
                for _ in 0..count {
                    let (Some(dx), Some(dy)) = (commands.get(cursor), commands.get(cursor + 1))
                    else {
                        break;
                    };
                    x = x.wrapping_add(zigzag(*dx));
                    y = y.wrapping_add(zigzag(*dy));
                    cursor += 2;
                    if id == CMD_MOVE_TO && !ring.is_empty() {
                        rings.push(std::mem::take(&mut ring));
                    }
                    ring.push((x, y));
                }
            }
            CMD_CLOSE_PATH => {
                if let Some(first) = ring.first().copied() {
                    ring.push(first);
                    rings.push(std::mem::take(&mut ring));
                }
            }
            _ => break,
        }
    }

    if !ring.is_empty() {
        rings.push(ring);
    }
    rings
}

fn zigzag(value: u32) -> i32 {
    ((value >> 1) as i32) ^ -((value & 1) as i32)
}

/// Surveyor's formula in tile coordinates (y pointing down); exterior rings are positive
fn signed_area(ring: &[(i32, i32)]) -> f64 {
    ring.windows(2)
        .map(|w| {
            let (x1, y1) = (f64::from(w[0].0), f64::from(w[0].1));
            let (x2, y2) = (f64::from(w[1].0), f64::from(w[1].1));
            x1 * y2 - x2 * y1
        })
        .sum::<f64>()
        / 2.0
}

fn decode_polygons(commands: &[u32], tile: TileCoord, extent: u32) -> MultiPolygon<f64> {
    let to_line_string = |ring: &[(i32, i32)]| -> LineString<f64> {
        ring.iter()
            .map(|&(u, v)| {
                let (lon, lat) = tile.to_lon_lat(f64::from(u), f64::from(v), extent);
                Coord { x: lon, y: lat }
            })
            .collect()
    };

    let mut polygons: Vec<Polygon<f64>> = Vec::new();
    let mut exterior: Option<LineString<f64>> = None;
    let mut interiors: Vec<LineString<f64>> = Vec::new();

    for ring in decode_rings(commands) {
        if ring.len() < 4 {
            continue;
        }
        let area = signed_area(&ring);
        if area > 0.0 {
            if let Some(outer) = exterior.take() {
                polygons.push(Polygon::new(outer, std::mem::take(&mut interiors)));
            }
            exterior = Some(to_line_string(&ring));
        } else if area < 0.0 && exterior.is_some() {
            interiors.push(to_line_string(&ring));
        }
    }

    if let Some(outer) = exterior {
        polygons.push(Polygon::new(outer, interiors));
    }
    MultiPolygon::new(polygons)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use serde_json::json;

    fn command(id: u32, count: u32) -> u32 {
        (count << 3) | id
    }

    fn encode_zigzag(value: i32) -> u32 {
        ((value << 1) ^ (value >> 31)) as u32
    }

    /// Geometry commands for the closed rings of one feature, in absolute tile units.
    /// The cursor carries over from one ring to the next.
    pub(crate) fn polygon_commands(rings: &[&[(i32, i32)]]) -> Vec<u32> {
        let mut commands = Vec::new();
        let (mut cx, mut cy) = (0, 0);
        for points in rings {
            for (i, &(x, y)) in points.iter().enumerate() {
                if i == 0 {
                    commands.push(command(CMD_MOVE_TO, 1));
                } else if i == 1 {
                    commands.push(command(CMD_LINE_TO, points.len() as u32 - 1));
                }
                commands.push(encode_zigzag(x - cx));
                commands.push(encode_zigzag(y - cy));
                cx = x;
                cy = y;
            }
            commands.push(command(CMD_CLOSE_PATH, 1));
        }
        commands
    }

    fn polygon_feature(id: Option<u64>, tags: Vec<u32>, geometry: Vec<u32>) -> TileFeature {
        TileFeature {
            id,
            tags,
            r#type: Some(GeomType::Polygon as i32),
            geometry,
        }
    }

    /// Two parcels side by side in the top-left quarter of the tile
    pub(crate) fn parcel_tile_bytes() -> Vec<u8> {
        // Clockwise in y-down tile space, i.e. exterior rings
        let left = polygon_commands(&[&[(0, 0), (1024, 0), (1024, 1024), (0, 1024)]]);
        let right = polygon_commands(&[&[(1024, 0), (2048, 0), (2048, 1024), (1024, 1024)]]);

        let tile = Tile {
            layers: vec![TileLayer {
                version: 2,
                name: "cadastral_parcels".to_string(),
                features: vec![
                    polygon_feature(Some(11), vec![0, 0, 1, 1], left),
                    polygon_feature(None, vec![2, 2, 1, 3], right),
                    TileFeature {
                        id: Some(99),
                        tags: vec![],
                        r#type: Some(GeomType::Point as i32),
                        geometry: vec![command(CMD_MOVE_TO, 1), 10, 10],
                    },
                ],
                keys: vec!["parcel_number".into(), "area".into(), "gid".into()],
                values: vec![
                    TileValue {
                        string_value: Some("1234/5".into()),
                        ..Default::default()
                    },
                    TileValue {
                        double_value: Some(512.25),
                        ..Default::default()
                    },
                    TileValue {
                        int_value: Some(77),
                        ..Default::default()
                    },
                    TileValue {
                        float_value: Some(10.5),
                        ..Default::default()
                    },
                ],
                extent: Some(4096),
            }],
        };
        tile.encode_to_vec()
    }

    #[test]
    fn test_zigzag() {
        for value in [0, 1, -1, 2, -2, 4095, -4096] {
            assert_eq!(zigzag(encode_zigzag(value)), value);
        }
    }

    #[test]
    fn test_decode_parcels() {
        let tile = TileCoord::new(10, 557, 365);
        let features = decode_tile(&parcel_tile_bytes(), tile).unwrap();
        assert_eq!(features.len(), 3);

        let first = &features[0];
        assert_eq!(first.id, Some(11));
        assert_eq!(first.properties.get("parcel_number"), Some(&json!("1234/5")));
        assert_eq!(first.properties.get("area"), Some(&json!(512.25)));
        assert_eq!(first.polygons.0.len(), 1);

        let second = &features[1];
        assert_eq!(second.id, None);
        assert_eq!(second.properties.get("gid"), Some(&json!(77)));
        assert_eq!(second.properties.get("area"), Some(&json!(10.5)));

        assert!(features[2].polygons.0.is_empty());
    }

    #[test]
    fn test_identifiers_of_decoded_features() {
        use crate::feature_id::get_feature_id;

        let tile = TileCoord::new(10, 557, 365);
        let features = decode_tile(&parcel_tile_bytes(), tile).unwrap();
        assert_eq!(get_feature_id(&features[0]), Some(FeatureId::from(11u64)));
        assert_eq!(get_feature_id(&features[1]), Some(FeatureId::from(77u64)));
    }

    #[test]
    fn test_hit_test() {
        let tile = TileCoord::new(10, 557, 365);
        let features = decode_tile(&parcel_tile_bytes(), tile).unwrap();

        let (lon, lat) = tile.to_lon_lat(512.0, 512.0, 4096);
        assert_eq!(hit_test(&features, lon, lat).and_then(|f| f.id), Some(11));

        let (lon, lat) = tile.to_lon_lat(1536.0, 512.0, 4096);
        let hit = hit_test(&features, lon, lat).unwrap();
        assert_eq!(hit.properties.get("gid"), Some(&json!(77)));

        let (lon, lat) = tile.to_lon_lat(3000.0, 3000.0, 4096);
        assert!(hit_test(&features, lon, lat).is_none());
    }

    #[test]
    fn test_polygon_with_hole() {
        let geometry = polygon_commands(&[
            &[(0, 0), (3000, 0), (3000, 3000), (0, 3000)],
            // Counter-clockwise in tile space: interior ring
            &[(1000, 1000), (1000, 2000), (2000, 2000), (2000, 1000)],
        ]);

        let tile = Tile {
            layers: vec![TileLayer {
                version: 2,
                name: "cadastral_parcels".to_string(),
                features: vec![polygon_feature(Some(1), vec![], geometry)],
                keys: vec![],
                values: vec![],
                extent: None,
            }],
        };
        let coord = TileCoord::new(12, 2234, 1460);
        let features = decode_tile(&tile.encode_to_vec(), coord).unwrap();
        let feature = &features[0];
        assert_eq!(feature.polygons.0.len(), 1);
        assert_eq!(feature.polygons.0[0].interiors().len(), 1);
        let (west, north) = coord.to_lon_lat(1000.0, 1000.0, DEFAULT_EXTENT);
        let hole_start = feature.polygons.0[0].interiors()[0].0[0];
        assert!((hole_start.x - west).abs() < 1e-9 && (hole_start.y - north).abs() < 1e-9);

        let (lon, lat) = coord.to_lon_lat(500.0, 500.0, DEFAULT_EXTENT);
        assert!(feature.contains(lon, lat));
        let (lon, lat) = coord.to_lon_lat(1500.0, 1500.0, DEFAULT_EXTENT);
        assert!(!feature.contains(lon, lat));
    }

    #[test]
    fn test_invalid_bytes() {
        let result = decode_tile(&[0xff, 0xff, 0xff], TileCoord::new(0, 0, 0));
        assert!(matches!(result, Err(MvtError::Decode(_))));
    }
}
