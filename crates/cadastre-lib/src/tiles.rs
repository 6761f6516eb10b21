//! Slippy-map tile addressing and URL templates

use crate::utils::{GeoExtent, MAX_LATITUDE};

/// XYZ tile address (Web Mercator, origin top-left)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TileCoord {
    pub z: u8,
    pub x: u32,
    pub y: u32,
}

impl TileCoord {
    pub const fn new(z: u8, x: u32, y: u32) -> Self {
        Self { z, x, y }
    }

    /// Tile containing the given WGS84 position at zoom `z`
    pub fn containing(lon: f64, lat: f64, z: u8) -> Self {
        let n = tile_count(z);
        let max = n as f64 - 1.0;
        let lat_rad = lat.clamp(-MAX_LATITUDE, MAX_LATITUDE).to_radians();
        let x = ((lon + 180.0) / 360.0 * n as f64).floor().clamp(0.0, max);
        let y = ((1.0 - lat_rad.tan().asinh() / std::f64::consts::PI) / 2.0 * n as f64)
            .floor()
            .clamp(0.0, max);
        Self::new(z, x as u32, y as u32)
    }

    /// Convert a point given in tile-local units (`0..extent`) to (lon, lat)
    pub fn to_lon_lat(&self, u: f64, v: f64, extent: u32) -> (f64, f64) {
        let extent = f64::from(extent.max(1));
        let n = tile_count(self.z) as f64;
        let x = f64::from(self.x) + u / extent;
        let y = f64::from(self.y) + v / extent;
        let lon = x / n * 360.0 - 180.0;
        let lat = (std::f64::consts::PI * (1.0 - 2.0 * y / n))
            .sinh()
            .atan()
            .to_degrees();
        (lon, lat)
    }

    /// Geographic extent covered by this tile
    pub fn extent(&self) -> GeoExtent {
        let (west, north) = self.to_lon_lat(0.0, 0.0, 1);
        let (east, south) = self.to_lon_lat(1.0, 1.0, 1);
        GeoExtent::new(west, south, east, north)
    }
}

fn tile_count(z: u8) -> u64 {
    1u64 << z.min(31)
}

/// Tiles covering `extent` at zoom `z`, row by row from the north-west corner
pub fn tiles_covering(extent: &GeoExtent, z: u8) -> Vec<TileCoord> {
    let top_left = TileCoord::containing(extent.west, extent.north, z);
    let bottom_right = TileCoord::containing(extent.east, extent.south, z);

    (top_left.y..=bottom_right.y)
        .flat_map(|y| (top_left.x..=bottom_right.x).map(move |x| TileCoord::new(z, x, y)))
        .collect()
}

/// Fill the `{z}`, `{x}` and `{y}` placeholders of a tile URL template
pub fn expand_tile_url(template: &str, tile: TileCoord) -> String {
    template
        .replace("{z}", &tile.z.to_string())
        .replace("{x}", &tile.x.to_string())
        .replace("{y}", &tile.y.to_string())
}
