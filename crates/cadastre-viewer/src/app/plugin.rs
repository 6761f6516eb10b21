//! Walkers plugin drawing the cadastral parcels
//!
//! Each frame the plugin works out which vector tiles cover the viewport, asks the
//! [`ParcelLayer`] for the missing ones, draws the cached ones and handles pointer
//! interaction and the details popup.

use crate::app::parcels::{CachedTile, ParcelLayer, SourceState};
use crate::app::ui_panels;
use cadastre_lib::utils::MAX_LATITUDE;
use cadastre_lib::{GeoExtent, TileCoord, get_feature_id, hit_test, tiles_covering};
use egui::{Color32, Mesh, Pos2, Shape, Stroke};
use std::sync::Arc;
use walkers::{MapMemory, Plugin, Position, Projector, lon_lat};

/// Fill and outline of a parcel
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ParcelStyle {
    pub fill: Color32,
    pub stroke: Stroke,
}

impl ParcelStyle {
    pub fn default_style() -> Self {
        Self {
            fill: Color32::from_rgba_unmultiplied(0, 120, 255, 38),
            stroke: Stroke::new(1.0, Color32::from_rgba_unmultiplied(0, 120, 255, 230)),
        }
    }

    pub fn selected() -> Self {
        Self {
            fill: Color32::from_rgba_unmultiplied(255, 180, 0, 64),
            stroke: Stroke::new(2.0, Color32::from_rgb(255, 140, 0)),
        }
    }
}

/// Distance between the popup and the selected point
const POPUP_OFFSET: f32 = 8.0;

pub struct ParcelPlugin<'a> {
    layer: &'a mut ParcelLayer,
}

impl<'a> ParcelPlugin<'a> {
    pub fn new(layer: &'a mut ParcelLayer) -> Self {
        Self { layer }
    }
}

fn to_pos(projector: &Projector, lon: f64, lat: f64) -> Pos2 {
    let screen = projector.project(lon_lat(lon, lat));
    Pos2::new(screen.x, screen.y)
}

fn to_position(projector: &Projector, pos: Pos2) -> Position {
    projector.unproject(pos.to_vec2())
}

/// Geographic extent shown in `rect`
fn visible_extent(rect: egui::Rect, projector: &Projector) -> GeoExtent {
    let top_left = to_position(projector, rect.left_top());
    let bottom_right = to_position(projector, rect.right_bottom());
    GeoExtent::new(
        top_left.x().min(bottom_right.x()).max(-180.0),
        top_left.y().min(bottom_right.y()).max(-MAX_LATITUDE),
        top_left.x().max(bottom_right.x()).min(180.0),
        top_left.y().max(bottom_right.y()).min(MAX_LATITUDE),
    )
}

/// Screen rectangle covered by a tile
fn tile_rect(tile: TileCoord, projector: &Projector) -> egui::Rect {
    let extent = tile.extent();
    egui::Rect::from_two_pos(
        to_pos(projector, extent.west, extent.north),
        to_pos(projector, extent.east, extent.south),
    )
}

fn paint_tile(
    painter: &egui::Painter,
    projector: &Projector,
    tile: &CachedTile,
    selected: Option<&cadastre_lib::FeatureId>,
) {
    let mut fills = [Mesh::default(), Mesh::default()];
    let mut outlines = Vec::new();

    for ((feature, id), triangles) in tile.features.iter().zip(&tile.ids).zip(&tile.triangles) {
        let is_selected = selected.is_some_and(|selected| id.as_ref() == Some(selected));
        let style = if is_selected {
            ParcelStyle::selected()
        } else {
            ParcelStyle::default_style()
        };

        let mesh = &mut fills[usize::from(is_selected)];
        for triangle in triangles {
            let base = mesh.vertices.len() as u32;
            for corner in triangle.to_array() {
                mesh.colored_vertex(to_pos(projector, corner.x, corner.y), style.fill);
            }
            mesh.add_triangle(base, base + 1, base + 2);
        }

        for polygon in &feature.polygons {
            for ring in std::iter::once(polygon.exterior()).chain(polygon.interiors()) {
                let points: Vec<Pos2> = ring
                    .coords()
                    .map(|coord| to_pos(projector, coord.x, coord.y))
                    .collect();
                if points.len() >= 2 {
                    outlines.push((is_selected, Shape::closed_line(points, style.stroke)));
                }
            }
        }
    }

    let [default_fill, selected_fill] = fills;
    painter.add(Shape::mesh(default_fill));
    // Selected parcels are drawn last so their outline stays on top
    let (selected_lines, default_lines): (Vec<_>, Vec<_>) =
        outlines.into_iter().partition(|(is_selected, _)| *is_selected);
    painter.extend(default_lines.into_iter().map(|(_, shape)| shape));
    painter.add(Shape::mesh(selected_fill));
    painter.extend(selected_lines.into_iter().map(|(_, shape)| shape));
}

/// Topmost parcel under `position` across the drawn tiles
fn parcel_at<'t>(
    tiles: &'t [(TileCoord, Arc<CachedTile>)],
    position: Position,
) -> Option<&'t cadastre_lib::DecodedFeature> {
    tiles
        .iter()
        .rev()
        .filter(|(tile, _)| tile.extent().contains(position.x(), position.y()))
        .find_map(|(_, cached)| hit_test(&cached.features, position.x(), position.y()))
}

impl Plugin for ParcelPlugin<'_> {
    fn run(
        self: Box<Self>,
        ui: &mut egui::Ui,
        response: &egui::Response,
        projector: &Projector,
        map_memory: &MapMemory,
    ) {
        profiling::scope!("ParcelPlugin::run");

        let Self { layer } = *self;
        let ctx = ui.ctx().clone();
        let tiles = match layer.source() {
            SourceState::Ready(source) => match source.tile_zoom(map_memory.zoom()) {
                Some(zoom) => tiles_covering(&visible_extent(response.rect, projector), zoom),
                None => Vec::new(),
            },
            SourceState::Pending | SourceState::Unavailable => Vec::new(),
        };
        layer.request_tiles(&tiles, &ctx);
        let cached = layer.cached_tiles(&tiles);

        {
            profiling::scope!("paint_parcels");
            let selected = layer.selection().map(|selection| selection.id.clone());
            for (tile, cached_tile) in &cached {
                // Features are buffered past their tile; clip so neighbours do not overlap
                let painter = ui
                    .painter()
                    .with_clip_rect(tile_rect(*tile, projector).intersect(response.rect));
                paint_tile(&painter, projector, cached_tile, selected.as_ref());
            }
        }

        if let Some(pointer) = response.hover_pos()
            && parcel_at(&cached, to_position(projector, pointer)).is_some()
        {
            ctx.set_cursor_icon(egui::CursorIcon::PointingHand);
        }

        if response.clicked()
            && let Some(pointer) = response.interact_pointer_pos()
        {
            let position = to_position(projector, pointer);
            match parcel_at(&cached, position).and_then(get_feature_id) {
                Some(id) => layer.select(id, position, &ctx),
                None => layer.clear_selection(),
            }
        }

        let Some(selection) = layer.selection() else {
            return;
        };
        let screen = projector.project(selection.position);
        let anchor = Pos2::new(screen.x, screen.y - POPUP_OFFSET);
        let details = layer.details().cloned();

        let close = egui::Area::new(egui::Id::new("parcel_popup"))
            .order(egui::Order::Foreground)
            .pivot(egui::Align2::CENTER_BOTTOM)
            .fixed_pos(anchor)
            .constrain(false)
            .show(&ctx, |ui| {
                egui::Frame::popup(ui.style())
                    .show(ui, |ui| ui_panels::parcel_popup(ui, details.as_ref()))
                    .inner
            })
            .inner;
        if close {
            layer.clear_selection();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_styles() {
        let default = ParcelStyle::default_style();
        let selected = ParcelStyle::selected();
        assert_eq!(default.stroke.width, 1.0);
        assert_eq!(selected.stroke.width, 2.0);
        assert_eq!(selected.stroke.color, Color32::from_rgb(255, 140, 0));
        assert_ne!(default.fill, selected.fill);
    }
}
