//! Platform entry points for the desktop and web builds
//!
//! Native builds start from `main.rs` through [`native_main`]. Web builds start
//! from JavaScript through [`web::WebHandle`].

pub mod cli;
mod logging;
mod metadata;
pub mod runtime;
#[cfg(target_arch = "wasm32")]
pub mod web;

pub use logging::setup_logging;
pub use metadata::{log_version_info, short_version_info};

/// Window title and eframe application id
pub const APP_NAME: &str = "Cadastre Viewer";

/// Run the viewer in a native window. Must be awaited inside a tokio runtime.
#[cfg(not(target_arch = "wasm32"))]
pub async fn native_main() -> eframe::Result {
    setup_logging();
    log_version_info();

    let native_options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1280.0, 720.0])
            .with_title(APP_NAME),
        ..Default::default()
    };

    eframe::run_native(
        APP_NAME,
        native_options,
        Box::new(|cc| Ok(Box::new(crate::app::CadastreViewerApp::new(cc)))),
    )
}
