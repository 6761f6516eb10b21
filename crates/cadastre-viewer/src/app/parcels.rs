//! Cadastral parcel layer state
//!
//! Capabilities, vector tiles and parcel attributes are fetched by spawned tasks.
//! Their results come back over a channel and are applied once per frame in
//! [`ParcelLayer::poll`], so all state here is only touched by the UI thread.

use crate::entrypoints::runtime;
use cadastre_lib::{
    ApiClient, ApiError, CapabilitiesDocument, DecodedFeature, FeatureId, Parcel, ParcelSummary,
    TileCoord, find_layer, find_layer_tiles_url, get_feature_id,
};
use geo::{Triangle, TriangulateEarcut};
use lru::LruCache;
use std::collections::HashSet;
use std::num::NonZeroUsize;
use std::sync::Arc;
use tokio::sync::mpsc;
use walkers::Position;

/// Decoded tiles kept in memory
const TILE_CACHE_SIZE: usize = 256;

/// Zoom range assumed when the capabilities do not state one
const DEFAULT_MIN_ZOOM: u8 = 0;
const DEFAULT_MAX_ZOOM: u8 = 22;

fn zoom_level(zoom: f64) -> u8 {
    zoom.round().clamp(0.0, 30.0) as u8
}

/// Where the parcel tiles come from
#[derive(Clone, Debug, PartialEq)]
pub struct ParcelSource {
    pub template: String,
    pub min_zoom: u8,
    pub max_zoom: u8,
}

impl ParcelSource {
    /// Resolve `layer_name` in the tile server capabilities
    pub fn resolve(caps: &CapabilitiesDocument, layer_name: &str) -> Option<Self> {
        let template = find_layer_tiles_url(caps, layer_name)?.to_string();
        let layer = find_layer(caps, layer_name)?;
        let min_zoom = layer.minzoom.map_or(DEFAULT_MIN_ZOOM, zoom_level);
        let max_zoom = layer
            .maxzoom
            .map_or(DEFAULT_MAX_ZOOM, zoom_level)
            .max(min_zoom);
        Some(Self {
            template,
            min_zoom,
            max_zoom,
        })
    }

    /// Tile zoom to draw at map zoom `zoom`.
    ///
    /// `None` below the layer's minzoom. Above its maxzoom the maxzoom tiles are stretched.
    pub fn tile_zoom(&self, zoom: f64) -> Option<u8> {
        let zoom = zoom_level(zoom);
        (zoom >= self.min_zoom).then(|| zoom.min(self.max_zoom))
    }
}

/// Progress of the capabilities lookup
#[derive(Clone, Debug, PartialEq)]
pub enum SourceState {
    Pending,
    Ready(ParcelSource),
    /// The request failed or the layer does not exist; no parcels are drawn
    Unavailable,
}

/// A decoded tile ready for drawing
pub struct CachedTile {
    pub features: Vec<DecodedFeature>,
    pub ids: Vec<Option<FeatureId>>,
    /// Fill triangles per feature, in (lon, lat)
    pub triangles: Vec<Vec<Triangle<f64>>>,
}

impl CachedTile {
    pub fn new(features: Vec<DecodedFeature>) -> Self {
        let ids = features.iter().map(get_feature_id).collect();
        let triangles = features
            .iter()
            .map(|feature| {
                feature
                    .polygons
                    .iter()
                    .flat_map(|polygon| polygon.earcut_triangles())
                    .collect()
            })
            .collect();
        Self {
            features,
            ids,
            triangles,
        }
    }

    fn empty() -> Self {
        Self::new(Vec::new())
    }
}

/// The clicked parcel and where it was clicked
#[derive(Clone, Debug, PartialEq)]
pub struct Selection {
    pub id: FeatureId,
    pub position: Position,
}

/// Attribute query state of the selected parcel
#[derive(Clone, Debug, PartialEq)]
pub enum ParcelDetails {
    Loading,
    Loaded(ParcelSummary),
    /// The API answered without a parcel (`204`)
    Empty,
    Failed,
}

pub(crate) enum LayerEvent {
    Capabilities(Result<CapabilitiesDocument, ApiError>),
    Tile(TileCoord, cadastre_lib::Result<Vec<DecodedFeature>>),
    Parcel(FeatureId, Result<Option<Parcel>, ApiError>),
}

pub struct ParcelLayer {
    client: ApiClient,
    layer_name: String,
    source: SourceState,
    capabilities_requested: bool,
    tiles: LruCache<TileCoord, Arc<CachedTile>>,
    in_flight: HashSet<TileCoord>,
    selection: Option<Selection>,
    details: Option<ParcelDetails>,
    events_tx: mpsc::UnboundedSender<LayerEvent>,
    events_rx: mpsc::UnboundedReceiver<LayerEvent>,
}

impl ParcelLayer {
    pub fn new(client: ApiClient, layer_name: impl Into<String>) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            client,
            layer_name: layer_name.into(),
            source: SourceState::Pending,
            capabilities_requested: false,
            tiles: NonZeroUsize::new(TILE_CACHE_SIZE).map_or_else(LruCache::unbounded, LruCache::new),
            in_flight: HashSet::new(),
            selection: None,
            details: None,
            events_tx,
            events_rx,
        }
    }

    pub fn source(&self) -> &SourceState {
        &self.source
    }

    pub fn selection(&self) -> Option<&Selection> {
        self.selection.as_ref()
    }

    pub fn details(&self) -> Option<&ParcelDetails> {
        self.details.as_ref()
    }

    /// Start the capabilities request on first call and apply finished requests
    pub fn poll(&mut self, ctx: &egui::Context) {
        profiling::scope!("ParcelLayer::poll");

        if !self.capabilities_requested {
            self.capabilities_requested = true;
            self.request_capabilities(ctx);
        }
        while let Ok(event) = self.events_rx.try_recv() {
            self.handle_event(event);
        }
    }

    fn request_capabilities(&self, ctx: &egui::Context) {
        tracing::info!("Loading tile server capabilities from {}", self.client.base_url());
        let client = self.client.clone();
        let events = self.events_tx.clone();
        let ctx = ctx.clone();
        runtime::spawn(async move {
            let result = client.fetch_capabilities().await;
            deliver(&events, &ctx, LayerEvent::Capabilities(result));
        });
    }

    /// Request the given tiles unless they are cached or already on their way
    pub fn request_tiles(&mut self, tiles: &[TileCoord], ctx: &egui::Context) {
        let SourceState::Ready(source) = &self.source else {
            return;
        };

        for &tile in tiles {
            if self.tiles.contains(&tile) || !self.in_flight.insert(tile) {
                continue;
            }
            tracing::trace!("Requesting parcel tile {}/{}/{}", tile.z, tile.x, tile.y);
            let client = self.client.clone();
            let template = source.template.clone();
            let events = self.events_tx.clone();
            let ctx = ctx.clone();
            runtime::spawn(async move {
                let result = client.fetch_vector_tile(&template, tile).await;
                deliver(&events, &ctx, LayerEvent::Tile(tile, result));
            });
        }
    }

    /// Cached tiles among `tiles`, in the given order
    pub fn cached_tiles(&mut self, tiles: &[TileCoord]) -> Vec<(TileCoord, Arc<CachedTile>)> {
        tiles
            .iter()
            .filter_map(|tile| self.tiles.get(tile).map(|cached| (*tile, cached.clone())))
            .collect()
    }

    /// Select a parcel and load its attributes
    pub fn select(&mut self, id: FeatureId, position: Position, ctx: &egui::Context) {
        if !self.set_selection(id.clone(), position) {
            return;
        }

        let client = self.client.clone();
        let events = self.events_tx.clone();
        let ctx = ctx.clone();
        runtime::spawn(async move {
            let result = client.fetch_parcel(&id).await;
            deliver(&events, &ctx, LayerEvent::Parcel(id, result));
        });
    }

    /// Update the selection. Returns whether the attributes must be fetched.
    pub(crate) fn set_selection(&mut self, id: FeatureId, position: Position) -> bool {
        let same_parcel = self
            .selection
            .as_ref()
            .is_some_and(|selection| selection.id == id);
        if same_parcel && self.details.is_some() {
            if let Some(selection) = &mut self.selection {
                selection.position = position;
            }
            return false;
        }

        tracing::debug!("Selected parcel {id}");
        self.selection = Some(Selection { id, position });
        self.details = Some(ParcelDetails::Loading);
        true
    }

    pub fn clear_selection(&mut self) {
        if let Some(selection) = self.selection.take() {
            tracing::debug!("Cleared selection of parcel {}", selection.id);
        }
        self.details = None;
    }

    pub(crate) fn handle_event(&mut self, event: LayerEvent) {
        match event {
            LayerEvent::Capabilities(Ok(caps)) => {
                self.source = match ParcelSource::resolve(&caps, &self.layer_name) {
                    Some(source) => {
                        tracing::info!(
                            "Parcel tiles from {} (zoom {}..={})",
                            source.template,
                            source.min_zoom,
                            source.max_zoom
                        );
                        SourceState::Ready(source)
                    }
                    None => {
                        tracing::warn!(
                            "Layer {:?} not found in the tile server capabilities",
                            self.layer_name
                        );
                        SourceState::Unavailable
                    }
                };
            }
            LayerEvent::Capabilities(Err(err)) => {
                tracing::error!("Failed to load tile server capabilities: {err}");
                self.source = SourceState::Unavailable;
            }
            LayerEvent::Tile(tile, result) => {
                self.in_flight.remove(&tile);
                let cached = match result {
                    Ok(features) => CachedTile::new(features),
                    Err(err) => {
                        // Cached empty so it is not requested again every frame
                        tracing::warn!("Parcel tile {}/{}/{} failed: {err}", tile.z, tile.x, tile.y);
                        CachedTile::empty()
                    }
                };
                self.tiles.put(tile, Arc::new(cached));
            }
            LayerEvent::Parcel(id, result) => {
                let is_current = self
                    .selection
                    .as_ref()
                    .is_some_and(|selection| selection.id == id);
                if !is_current {
                    tracing::debug!("Discarding attributes of parcel {id}, no longer selected");
                    return;
                }
                self.details = Some(match result {
                    Ok(Some(parcel)) => ParcelDetails::Loaded(parcel.properties.summary()),
                    Ok(None) => ParcelDetails::Empty,
                    Err(err) => {
                        tracing::error!("Failed to load parcel {id}: {err}");
                        ParcelDetails::Failed
                    }
                });
            }
        }
    }
}

fn deliver(events: &mpsc::UnboundedSender<LayerEvent>, ctx: &egui::Context, event: LayerEvent) {
    // The receiver only goes away with the app
    if events.send(event).is_ok() {
        ctx.request_repaint();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{LineString, MultiPolygon, Polygon};
    use serde_json::json;

    fn layer() -> ParcelLayer {
        ParcelLayer::new(
            ApiClient::new("http://localhost:8000/api", None),
            "cadastral_parcels",
        )
    }

    fn capabilities() -> CapabilitiesDocument {
        CapabilitiesDocument::from_value(json!({
            "version": "0.20.0",
            "maps": [{
                "name": "dkp",
                "layers": [{
                    "name": "cadastral_parcels",
                    "tiles": ["https://tiles.example.hr/maps/dkp/cadastral_parcels/{z}/{x}/{y}.pbf"],
                    "minzoom": 12,
                    "maxzoom": 18
                }]
            }]
        }))
    }

    fn square(id: u64) -> DecodedFeature {
        let ring = LineString::from(vec![
            (16.40, 46.20),
            (16.42, 46.20),
            (16.42, 46.22),
            (16.40, 46.22),
            (16.40, 46.20),
        ]);
        DecodedFeature {
            id: Some(id),
            properties: Default::default(),
            polygons: MultiPolygon::new(vec![Polygon::new(ring, vec![])]),
        }
    }

    fn here() -> Position {
        walkers::lon_lat(16.41, 46.21)
    }

    #[test]
    fn test_resolve_source_zoom_range() {
        let source = ParcelSource::resolve(&capabilities(), "cadastral_parcels").unwrap();
        assert_eq!(
            source.template,
            "https://tiles.example.hr/maps/dkp/cadastral_parcels/{z}/{x}/{y}.pbf"
        );
        assert_eq!((source.min_zoom, source.max_zoom), (12, 18));
        assert!(ParcelSource::resolve(&capabilities(), "buildings").is_none());
    }

    #[test]
    fn test_tile_zoom_clamping() {
        let source = ParcelSource::resolve(&capabilities(), "cadastral_parcels").unwrap();
        assert_eq!(source.tile_zoom(8.0), None);
        assert_eq!(source.tile_zoom(11.6), Some(12));
        assert_eq!(source.tile_zoom(14.2), Some(14));
        assert_eq!(source.tile_zoom(20.0), Some(18));
    }

    #[test]
    fn test_capabilities_events() {
        let mut layer = layer();
        assert_eq!(layer.source(), &SourceState::Pending);

        layer.handle_event(LayerEvent::Capabilities(Ok(capabilities())));
        assert!(matches!(layer.source(), SourceState::Ready(_)));

        let mut layer = self::layer();
        layer.handle_event(LayerEvent::Capabilities(Err(ApiError::Status {
            status: 503,
            message: "Service Unavailable".into(),
        })));
        assert_eq!(layer.source(), &SourceState::Unavailable);

        let mut layer = self::layer();
        layer.handle_event(LayerEvent::Capabilities(Ok(CapabilitiesDocument::default())));
        assert_eq!(layer.source(), &SourceState::Unavailable);
    }

    #[test]
    fn test_tile_events_fill_cache() {
        let mut layer = layer();
        let tile = TileCoord::new(14, 8939, 5765);
        let failed = TileCoord::new(14, 8940, 5765);

        layer.in_flight.insert(tile);
        layer.handle_event(LayerEvent::Tile(tile, Ok(vec![square(7)])));
        layer.handle_event(LayerEvent::Tile(
            failed,
            Err(ApiError::Status {
                status: 404,
                message: "Not Found".into(),
            }
            .into()),
        ));

        assert!(layer.in_flight.is_empty());
        let cached = layer.cached_tiles(&[tile, failed, TileCoord::new(14, 0, 0)]);
        assert_eq!(cached.len(), 2);
        assert_eq!(cached[0].1.ids, vec![Some(FeatureId::from(7u64))]);
        assert_eq!(cached[0].1.triangles[0].len(), 2);
        assert!(cached[1].1.features.is_empty());
    }

    #[test]
    fn test_selection_fetches_once_per_parcel() {
        let mut layer = layer();
        assert!(layer.set_selection(FeatureId::from(7u64), here()));
        assert_eq!(layer.details(), Some(&ParcelDetails::Loading));

        let moved = walkers::lon_lat(16.415, 46.205);
        assert!(!layer.set_selection(FeatureId::from(7u64), moved));
        assert_eq!(layer.selection().unwrap().position, moved);

        assert!(layer.set_selection(FeatureId::from("HR-8"), here()));
        layer.clear_selection();
        assert!(layer.selection().is_none());
        assert!(layer.details().is_none());
    }

    #[test]
    fn test_stale_parcel_response_is_discarded() {
        let mut layer = layer();
        layer.set_selection(FeatureId::from(7u64), here());
        layer.set_selection(FeatureId::from(8u64), here());

        let parcel: Parcel = serde_json::from_value(json!({
            "type": "Feature",
            "properties": { "parcel_number": "7/1", "area": 10.5 }
        }))
        .unwrap();
        layer.handle_event(LayerEvent::Parcel(FeatureId::from(7u64), Ok(Some(parcel))));
        assert_eq!(layer.details(), Some(&ParcelDetails::Loading));

        layer.handle_event(LayerEvent::Parcel(FeatureId::from(8u64), Ok(None)));
        assert_eq!(layer.details(), Some(&ParcelDetails::Empty));
    }

    #[test]
    fn test_parcel_failure() {
        let mut layer = layer();
        layer.set_selection(FeatureId::from(7u64), here());
        layer.handle_event(LayerEvent::Parcel(
            FeatureId::from(7u64),
            Err(ApiError::Status {
                status: 500,
                message: "Internal Server Error".into(),
            }),
        ));
        assert_eq!(layer.details(), Some(&ParcelDetails::Failed));
    }
}
