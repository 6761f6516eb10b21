//! Cadastre Library - Core logic of the cadastral parcel viewer
//!
//! Everything here is independent of the UI so it can be tested on its own and
//! reused by the desktop and web builds of the viewer.
//!
//! # Architecture
//!
//! - **[`capabilities`]**: tile server manifest and [`find_layer_tiles_url`]
//! - **[`feature_id`]**: [`VectorFeature`] capability set and [`get_feature_id`]
//! - **[`mvt`]**: Mapbox Vector Tile decoding and point hit-testing
//! - **[`tiles`]**: slippy tile addressing and URL templates
//! - **[`api`]**: authenticated REST client for capabilities and parcels
//! - **[`parcel`]**: parcel attributes and their popup labels
//! - **[`utils`]**: coordinate conversions and the fixed view extent

pub mod api;
pub mod capabilities;
pub mod feature_id;
pub mod mvt;
pub mod parcel;
pub mod tiles;
pub mod utils;

// Public API exports
pub use api::{ApiClient, ApiError, ApiRequest};
pub use capabilities::{
    CADASTRE_LAYER_NAME, CapabilitiesDocument, Layer, MapEntry, find_layer, find_layer_tiles_url,
};
pub use feature_id::{FeatureId, VectorFeature, get_feature_id};
pub use mvt::{DecodedFeature, MvtError, decode_tile, hit_test};
pub use parcel::{Parcel, ParcelProps, ParcelSummary};
pub use tiles::{TileCoord, expand_tile_url, tiles_covering};
pub use utils::GeoExtent;

/// Error types of the library
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Mvt(#[from] MvtError),
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_public_exports() {
        let _: for<'a, 'b> fn(&'a CapabilitiesDocument, &'b str) -> Option<&'a str> =
            find_layer_tiles_url;
        let _: fn(&DecodedFeature) -> Option<FeatureId> = get_feature_id::<DecodedFeature>;
    }

    #[test]
    fn test_error_conversion() {
        let err: Error = ApiError::Status {
            status: 500,
            message: "boom".into(),
        }
        .into();
        assert_eq!(err.to_string(), "boom (HTTP 500)");
    }
}
