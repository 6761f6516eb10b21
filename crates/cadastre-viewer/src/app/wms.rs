//! CORINE land cover WMS overlay
//!
//! The overlay is owned by the app and handed to the map each frame while it is
//! visible. GetMap requests are issued per 256 px slippy tile in EPSG:3857, and
//! only for tiles touching the overlay extent.

use cadastre_lib::GeoExtent;
use cadastre_lib::utils::{EARTH_MERCATOR_MAX, mercator_to_wgs84};
use walkers::{
    HttpTiles, TileId, TilePiece, Tiles,
    sources::{Attribution, TileSource},
};

/// EEA CORINE Land Cover 2018 WMS endpoint
pub const CORINE_WMS_URL: &str =
    "https://image.discomap.eea.europa.eu/arcgis/services/Corine/CLC2018_WM/MapServer/WMSServer";

const TILE_SIZE: u32 = 256;

/// GetMap parameters of a WMS layer
#[derive(Clone, Debug, PartialEq)]
pub struct WmsSource {
    pub url: String,
    pub layers: String,
    pub format: String,
    pub version: String,
}

impl WmsSource {
    pub fn corine() -> Self {
        Self {
            url: CORINE_WMS_URL.to_string(),
            layers: "12".to_string(),
            format: "image/png".to_string(),
            version: "1.3.0".to_string(),
        }
    }

    /// GetMap URL rendering `bbox` (min_x, min_y, max_x, max_y in meters)
    pub fn get_map_url(&self, bbox: (f64, f64, f64, f64)) -> String {
        let (min_x, min_y, max_x, max_y) = bbox;
        format!(
            "{}?SERVICE=WMS&REQUEST=GetMap&VERSION={}&LAYERS={}&STYLES=&FORMAT={}&TRANSPARENT=TRUE\
             &CRS=EPSG:3857&WIDTH={TILE_SIZE}&HEIGHT={TILE_SIZE}&BBOX={min_x},{min_y},{max_x},{max_y}",
            self.url, self.version, self.layers, self.format,
        )
    }
}

/// Web Mercator bounds of a slippy tile as (min_x, min_y, max_x, max_y)
pub fn tile_bbox(tile: TileId) -> (f64, f64, f64, f64) {
    let span = 2.0 * EARTH_MERCATOR_MAX / f64::from(1u32 << u32::from(tile.zoom.min(31)));
    let min_x = -EARTH_MERCATOR_MAX + f64::from(tile.x) * span;
    let max_y = EARTH_MERCATOR_MAX - f64::from(tile.y) * span;
    (min_x, max_y - span, min_x + span, max_y)
}

/// WGS84 extent of a slippy tile
pub fn tile_extent(tile: TileId) -> GeoExtent {
    let (min_x, min_y, max_x, max_y) = tile_bbox(tile);
    let (south, west) = mercator_to_wgs84(min_x, min_y);
    let (north, east) = mercator_to_wgs84(max_x, max_y);
    GeoExtent::new(west, south, east, north)
}

impl TileSource for WmsSource {
    fn tile_url(&self, tile_id: TileId) -> String {
        self.get_map_url(tile_bbox(tile_id))
    }

    fn attribution(&self) -> Attribution {
        Attribution {
            text: "CORINE Land Cover 2018 © European Environment Agency",
            url: "https://land.copernicus.eu/en/products/corine-land-cover",
            logo_light: None,
            logo_dark: None,
        }
    }
}

/// Tile cache that neither fetches nor draws tiles outside `extent`
pub struct ClippedTiles {
    tiles: HttpTiles,
    extent: GeoExtent,
}

impl ClippedTiles {
    pub fn new(tiles: HttpTiles, extent: GeoExtent) -> Self {
        Self { tiles, extent }
    }

    pub fn covers(&self, tile: TileId) -> bool {
        self.extent.intersects(&tile_extent(tile))
    }
}

impl Tiles for ClippedTiles {
    fn at(&mut self, tile_id: TileId) -> Option<TilePiece> {
        if !self.covers(tile_id) {
            return None;
        }
        self.tiles.at(tile_id)
    }

    fn attribution(&self) -> Attribution {
        self.tiles.attribution()
    }

    fn tile_size(&self) -> u32 {
        self.tiles.tile_size()
    }
}

/// The overlay layer: clipped tile cache plus its visibility
pub struct WmsOverlay {
    tiles: ClippedTiles,
    visible: bool,
    opacity: f32,
}

impl WmsOverlay {
    pub fn new(source: WmsSource, extent: GeoExtent, ctx: &egui::Context, visible: bool) -> Self {
        Self {
            tiles: ClippedTiles::new(HttpTiles::new(source, ctx.clone()), extent),
            visible,
            opacity: 1.0,
        }
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn set_visible(&mut self, visible: bool) {
        if self.visible != visible {
            tracing::debug!("CORINE overlay {}", if visible { "shown" } else { "hidden" });
        }
        self.visible = visible;
    }

    pub fn opacity(&self) -> f32 {
        self.opacity
    }

    /// Tiles to layer on the map, `None` while hidden
    pub fn visible_tiles(&mut self) -> Option<&mut ClippedTiles> {
        self.visible.then_some(&mut self.tiles)
    }
}
