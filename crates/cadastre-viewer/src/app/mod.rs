//! Application module
//!
//! A full-screen map made of:
//! - OpenStreetMap base tiles
//! - the optional CORINE land cover WMS overlay
//! - the cadastral parcel vector tiles with hover, click and a details popup

mod parcels;
mod plugin;
pub(crate) mod settings;
mod ui_panels;
mod wms;

use crate::app::parcels::ParcelLayer;
use crate::app::plugin::ParcelPlugin;
use crate::app::settings::Settings;
use crate::app::wms::{WmsOverlay, WmsSource};
use cadastre_lib::utils::STARTING_POSITION;
use cadastre_lib::{ApiClient, GeoExtent};
use eframe::egui;
use walkers::{HttpTiles, Map, MapMemory, sources::OpenStreetMap};

const PERSISTED_SETTINGS_KEY: &str = "persisted_settings";

/// Persisted settings (lightweight, restored on the next start)
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
struct PersistedSettings {
    corine_visible: bool,
    zoom: f64,
}

impl PersistedSettings {
    fn from_cli(cli_args: &Settings) -> Self {
        Self {
            corine_visible: cli_args.show_corine,
            zoom: f64::from(cli_args.starting_zoom),
        }
    }

    fn load(storage: &dyn eframe::Storage) -> Option<Self> {
        let json = storage.get_string(PERSISTED_SETTINGS_KEY)?;
        match serde_json::from_str(&json) {
            Ok(settings) => Some(settings),
            Err(err) => {
                tracing::warn!("Ignoring unreadable persisted settings: {err}");
                None
            }
        }
    }

    /// Restored settings; `--show-corine` still forces the overlay on
    fn merged_with(self, cli_args: &Settings) -> Self {
        Self {
            corine_visible: self.corine_visible || cli_args.show_corine,
            zoom: self.zoom,
        }
    }
}

/// Main application structure
pub struct CadastreViewerApp {
    /// Base map tiles (OpenStreetMap)
    tiles_osm: HttpTiles,

    /// Land cover overlay, owned here and lent to the map each frame
    corine: WmsOverlay,

    /// Parcel tiles, selection and popup state
    parcels: ParcelLayer,

    /// Map state (camera position, zoom, etc.)
    map_memory: MapMemory,

    /// The view center is kept inside this extent
    view_extent: GeoExtent,
}

impl CadastreViewerApp {
    pub fn new(cc: &eframe::CreationContext<'_>) -> Self {
        let cli_args = Settings::from_cli();

        let settings = if cli_args.ignore_persisted {
            tracing::info!("Ignoring persisted state (--ignore-persisted flag)");
            None
        } else {
            cc.storage.and_then(PersistedSettings::load)
        };
        let settings = match settings {
            Some(settings) => {
                tracing::info!("Restored settings");
                settings.merged_with(&cli_args)
            }
            None => PersistedSettings::from_cli(&cli_args),
        };

        let mut map_memory = MapMemory::default();
        if map_memory.set_zoom(settings.zoom).is_err() {
            tracing::warn!("Invalid starting zoom {}, using the default", settings.zoom);
        }

        let client = ApiClient::new(cli_args.api_url.clone(), cli_args.access_token());
        tracing::info!(
            "Using cadastre API at {} ({})",
            client.base_url(),
            if cli_args.access_token().is_some() {
                "authenticated"
            } else {
                "anonymous"
            }
        );

        Self {
            tiles_osm: HttpTiles::new(OpenStreetMap, cc.egui_ctx.clone()),
            corine: WmsOverlay::new(
                WmsSource::corine(),
                GeoExtent::croatia(),
                &cc.egui_ctx,
                settings.corine_visible,
            ),
            parcels: ParcelLayer::new(client, cli_args.layer_name),
            map_memory,
            view_extent: GeoExtent::croatia(),
        }
    }

    /// Pull a dragged-away view center back inside the view extent
    fn clamp_view_center(&mut self) {
        if let Some(center) = self.map_memory.detached() {
            let (lon, lat) = self.view_extent.clamp(center.x(), center.y());
            if (lon, lat) != (center.x(), center.y()) {
                self.map_memory.center_at(walkers::lon_lat(lon, lat));
            }
        }
    }

    fn persisted_settings(&self) -> PersistedSettings {
        PersistedSettings {
            corine_visible: self.corine.is_visible(),
            zoom: self.map_memory.zoom(),
        }
    }
}

#[profiling::all_functions]
impl eframe::App for CadastreViewerApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.parcels.poll(ctx);

        // Central panel: Map view (full screen)
        egui::CentralPanel::default()
            .frame(egui::Frame::NONE)
            .show(ctx, |ui| {
                profiling::scope!("map_panel");

                let (lon, lat) = STARTING_POSITION;
                let corine_opacity = self.corine.opacity();
                let mut map = Map::new(
                    Some(&mut self.tiles_osm),
                    &mut self.map_memory,
                    walkers::lon_lat(lon, lat),
                );
                if let Some(corine_tiles) = self.corine.visible_tiles() {
                    map = map.with_layer(corine_tiles, corine_opacity);
                }
                ui.add(map.with_plugin(ParcelPlugin::new(&mut self.parcels)));

                ui_panels::corine_toggle_button(ui, &mut self.corine);
                ui_panels::attribution(ui, self.corine.is_visible());
            });

        self.clamp_view_center();
    }

    fn save(&mut self, storage: &mut dyn eframe::Storage) {
        match serde_json::to_string(&self.persisted_settings()) {
            Ok(json) => {
                storage.set_string(PERSISTED_SETTINGS_KEY, json);
                tracing::debug!("Saved settings");
            }
            Err(err) => tracing::warn!("Failed to save settings: {err}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn cli(args: &[&str]) -> Settings {
        Settings::try_parse_from(std::iter::once("cadastre-viewer").chain(args.iter().copied()))
            .unwrap()
    }

    #[test]
    fn test_settings_from_cli() {
        let settings = PersistedSettings::from_cli(&cli(&["--starting-zoom", "12", "--show-corine"]));
        assert_eq!(
            settings,
            PersistedSettings {
                corine_visible: true,
                zoom: 12.0
            }
        );
    }

    #[test]
    fn test_restored_settings_keep_cli_overlay_flag() {
        let restored = PersistedSettings {
            corine_visible: false,
            zoom: 15.5,
        };
        let merged = restored.clone().merged_with(&cli(&["--show-corine"]));
        assert!(merged.corine_visible);
        assert_eq!(merged.zoom, 15.5);

        assert_eq!(restored.clone().merged_with(&cli(&[])), restored);
    }

    #[test]
    fn test_persisted_settings_json() {
        let settings: PersistedSettings =
            serde_json::from_str(r#"{"corine_visible":true,"zoom":10.0}"#).unwrap();
        assert!(settings.corine_visible);
        assert_eq!(settings.zoom, 10.0);
        assert!(serde_json::from_str::<PersistedSettings>(r#"{"zoom":"far"}"#).is_err());
    }
}
