//! Cadastre Viewer - Application Library
//!
//! Integrates the cadastre library with egui and walkers into the map viewer
//! that runs on the desktop and in the browser.

mod app;
mod entrypoints;

pub use app::CadastreViewerApp;
pub use entrypoints::{APP_NAME, short_version_info};

#[cfg(not(target_arch = "wasm32"))]
pub use entrypoints::native_main;

#[cfg(target_arch = "wasm32")]
pub use entrypoints::web::WebHandle;
