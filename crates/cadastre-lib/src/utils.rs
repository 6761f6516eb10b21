//! Coordinate conversions and the fixed view extent of the viewer

/// Web Mercator half-width in meters (EPSG:3857)
pub const EARTH_MERCATOR_MAX: f64 = 20037508.34;

/// Maximum latitude that can be represented in Web Mercator
pub const MAX_LATITUDE: f64 = 85.05112878;

/// Initial view center as (longitude, latitude)
pub const STARTING_POSITION: (f64, f64) = (16.419, 46.209);

/// Croatia as (west, south, east, north) in WGS84 degrees
pub const CROATIA_BOUNDING_BOX: [f64; 4] = [13.0, 42.15, 19.49, 46.6];

/// Convert Web Mercator (x, y) in meters to WGS84, returned as (lat, lon)
#[inline]
pub fn mercator_to_wgs84(x: f64, y: f64) -> (f64, f64) {
    let lon = x * 180.0 / EARTH_MERCATOR_MAX;
    let lat = (2.0 * (y * std::f64::consts::PI / EARTH_MERCATOR_MAX).exp().atan()
        - std::f64::consts::FRAC_PI_2)
        .to_degrees();
    (lat, lon)
}

/// Axis-aligned geographic extent in WGS84 degrees
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GeoExtent {
    pub west: f64,
    pub south: f64,
    pub east: f64,
    pub north: f64,
}

impl GeoExtent {
    pub const fn new(west: f64, south: f64, east: f64, north: f64) -> Self {
        Self {
            west,
            south,
            east,
            north,
        }
    }

    /// Extent of the cadastral data set
    pub const fn croatia() -> Self {
        let [west, south, east, north] = CROATIA_BOUNDING_BOX;
        Self::new(west, south, east, north)
    }

    pub fn contains(&self, lon: f64, lat: f64) -> bool {
        lon >= self.west && lon <= self.east && lat >= self.south && lat <= self.north
    }

    /// Move a position to the nearest point inside the extent
    pub fn clamp(&self, lon: f64, lat: f64) -> (f64, f64) {
        (lon.clamp(self.west, self.east), lat.clamp(self.south, self.north))
    }

    pub fn intersects(&self, other: &GeoExtent) -> bool {
        self.west <= other.east
            && other.west <= self.east
            && self.south <= other.north
            && other.south <= self.north
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mercator_to_wgs84_origin() {
        let (lat, lon) = mercator_to_wgs84(0.0, 0.0);
        assert!(lat.abs() < 1e-9);
        assert!(lon.abs() < 1e-9);
    }

    #[test]
    fn test_mercator_to_wgs84_corner() {
        let (lat, lon) = mercator_to_wgs84(EARTH_MERCATOR_MAX, EARTH_MERCATOR_MAX);
        assert!((lon - 180.0).abs() < 1e-9);
        assert!((lat - MAX_LATITUDE).abs() < 1e-6);
    }

    #[test]
    fn test_mercator_to_wgs84_zagreb() {
        let (lat, lon) = mercator_to_wgs84(1_779_118.0, 5_750_900.0);
        assert!((lon - 15.982).abs() < 1e-3);
        assert!((lat - 45.815).abs() < 1e-2);
    }

    #[test]
    fn test_starting_position_inside_croatia() {
        let (lon, lat) = STARTING_POSITION;
        assert!(GeoExtent::croatia().contains(lon, lat));
    }

    #[test]
    fn test_clamp_outside_extent() {
        let extent = GeoExtent::croatia();
        assert_eq!(extent.clamp(2.35, 48.85), (13.0, 46.6));
        assert_eq!(extent.clamp(16.0, 45.0), (16.0, 45.0));
    }

    #[test]
    fn test_intersects() {
        let extent = GeoExtent::croatia();
        assert!(extent.intersects(&GeoExtent::new(19.0, 46.0, 21.0, 48.0)));
        assert!(!extent.intersects(&GeoExtent::new(20.0, 46.0, 21.0, 48.0)));
    }
}
