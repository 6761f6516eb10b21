//! UI pieces drawn over the map

use crate::app::parcels::ParcelDetails;
use crate::app::wms::WmsOverlay;
use cadastre_lib::ParcelSummary;
use egui::{Color32, RichText, Ui};

pub const POPUP_TITLE: &str = "Parcel details";
pub const LOADING_TEXT: &str = "Loading…";
pub const FAILED_TEXT: &str = "Failed to load parcel.";

const OSM_ATTRIBUTION: &str = "© OpenStreetMap contributors";
const CORINE_ATTRIBUTION: &str = "CORINE Land Cover 2018 © EEA";

/// Label of the overlay toggle for the current visibility
pub fn corine_toggle_label(visible: bool) -> &'static str {
    if visible { "Hide CORINE" } else { "Show CORINE" }
}

/// Attribution line for the visible layers
pub fn attribution_text(corine_visible: bool) -> String {
    if corine_visible {
        format!("{OSM_ATTRIBUTION} | {CORINE_ATTRIBUTION}")
    } else {
        OSM_ATTRIBUTION.to_string()
    }
}

/// Rows of the parcel popup as (label, value)
pub fn summary_rows(summary: &ParcelSummary) -> [(&'static str, &str); 3] {
    [
        ("Parcel:", summary.parcel_number.as_str()),
        ("Area:", summary.area.as_str()),
        ("Municipality:", summary.municipality.as_str()),
    ]
}

/// Content of the parcel popup. Returns true when the close button was clicked.
pub fn parcel_popup(ui: &mut Ui, details: Option<&ParcelDetails>) -> bool {
    let mut close = false;
    ui.set_min_width(180.0);

    ui.horizontal(|ui| {
        ui.label(RichText::new(POPUP_TITLE).strong());
        ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
            if ui.small_button("✕").on_hover_text("Close").clicked() {
                close = true;
            }
        });
    });
    ui.separator();

    match details {
        None | Some(ParcelDetails::Loading) => {
            ui.horizontal(|ui| {
                ui.spinner();
                ui.label(LOADING_TEXT);
            });
        }
        Some(ParcelDetails::Empty) => {}
        Some(ParcelDetails::Failed) => {
            ui.label(RichText::new(FAILED_TEXT).color(ui.visuals().error_fg_color));
        }
        Some(ParcelDetails::Loaded(summary)) => {
            egui::Grid::new("parcel_rows")
                .num_columns(2)
                .spacing([8.0, 4.0])
                .show(ui, |ui| {
                    for (label, value) in summary_rows(summary) {
                        ui.label(RichText::new(label).strong());
                        ui.label(value);
                        ui.end_row();
                    }
                });
        }
    }

    close
}

/// Overlay toggle in the top-right corner of the map
pub fn corine_toggle_button(ui: &mut Ui, overlay: &mut WmsOverlay) {
    let button_size = egui::vec2(110.0, 32.0);
    let margin = 10.0;

    let rect = ui.max_rect();
    let button_pos = rect.right_top() + egui::vec2(-button_size.x - margin, margin);
    let button_rect = egui::Rect::from_min_size(button_pos, button_size);

    let visible = overlay.is_visible();
    let button = egui::Button::new(corine_toggle_label(visible)).selected(visible);
    if ui.put(button_rect, button).clicked() {
        overlay.set_visible(!visible);
    }
}

/// Attribution at the bottom of the map
pub fn attribution(ui: &Ui, corine_visible: bool) {
    let screen_rect = ui.max_rect();
    ui.painter().text(
        screen_rect.center_bottom() + egui::vec2(0.0, -5.0),
        egui::Align2::CENTER_BOTTOM,
        attribution_text(corine_visible),
        egui::FontId::proportional(10.0),
        Color32::from_black_alpha(180),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadastre_lib::ParcelProps;

    #[test]
    fn test_toggle_label() {
        assert_eq!(corine_toggle_label(false), "Show CORINE");
        assert_eq!(corine_toggle_label(true), "Hide CORINE");
    }

    #[test]
    fn test_attribution_text() {
        assert_eq!(attribution_text(false), "© OpenStreetMap contributors");
        assert!(attribution_text(true).ends_with("CORINE Land Cover 2018 © EEA"));
    }

    #[test]
    fn test_summary_rows() {
        let summary = ParcelProps::default().summary();
        let rows = summary_rows(&summary);
        assert_eq!(rows[0], ("Parcel:", "—"));
        assert_eq!(rows[1], ("Area:", "—"));
        assert_eq!(rows[2], ("Municipality:", "—"));
    }
}
