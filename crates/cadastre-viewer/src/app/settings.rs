use crate::entrypoints::cli::parse_args;
use cadastre_lib::CADASTRE_LAYER_NAME;
use clap::Parser;

/// Zoom levels offered as starting points
pub const STARTING_ZOOM_LEVELS: [u8; 5] = [8, 10, 12, 14, 16];

/// Name of the cookie holding the API token in the browser
#[cfg_attr(not(target_arch = "wasm32"), allow(dead_code))]
pub const ACCESS_TOKEN_COOKIE: &str = "access_token";

#[derive(Parser, Debug, Clone)]
#[clap(author, version, about, long_about = None)]
/// Cadastre Viewer - Browse cadastral parcels over OpenStreetMap
pub struct Settings {
    /// Base URL of the cadastre API
    #[clap(long, env = "CADASTRE_API_URL", default_value = "http://localhost:8000/api")]
    pub api_url: String,

    /// Bearer token for the cadastre API (the browser build falls back to the `access_token` cookie)
    #[clap(long, env = "CADASTRE_ACCESS_TOKEN", hide_env_values = true)]
    pub access_token: Option<String>,

    /// Tile server layer holding the parcels
    #[clap(long, default_value = CADASTRE_LAYER_NAME)]
    pub layer_name: String,

    /// Initial zoom level (8, 10, 12, 14 or 16)
    #[clap(long, default_value = "8", value_parser = parse_starting_zoom)]
    pub starting_zoom: u8,

    /// Start with the CORINE land cover overlay visible
    #[clap(long, default_value = "false")]
    pub show_corine: bool,

    /// Ignore previously persisted state and start fresh
    #[clap(long, default_value = "false")]
    pub ignore_persisted: bool,
}

fn parse_starting_zoom(raw: &str) -> Result<u8, String> {
    let zoom: u8 = raw
        .parse()
        .map_err(|_| format!("`{raw}` is not a zoom level"))?;
    if STARTING_ZOOM_LEVELS.contains(&zoom) {
        Ok(zoom)
    } else {
        Err(format!("zoom must be one of {STARTING_ZOOM_LEVELS:?}"))
    }
}

impl Settings {
    /// Parse from the command line (native) or GET parameters (web)
    pub fn from_cli() -> Self {
        let settings = match parse_args::<Settings>() {
            Ok(args) => args,
            Err(e) => {
                #[cfg(not(target_arch = "wasm32"))]
                e.exit();
                #[cfg(target_arch = "wasm32")]
                {
                    let user_msg = format!(
                        "Error parsing CLI:\n{e}\n
    You should change the GET params, using the cli prefix.\n
    Starting anyway without args."
                    );
                    if let Some(window) = web_sys::window() {
                        window.alert_with_message(&user_msg).unwrap_or(());
                    } else {
                        tracing::error!(user_msg);
                    }
                    Settings::parse_from(["cadastre-viewer"]) // Default args on web if parsing fails
                }
            }
        };
        settings.with_cookie_token()
    }

    /// Token to send, ignoring empty values
    pub fn access_token(&self) -> Option<String> {
        self.access_token.clone().filter(|token| !token.trim().is_empty())
    }

    #[cfg(target_arch = "wasm32")]
    fn with_cookie_token(mut self) -> Self {
        use wasm_bindgen::JsCast;

        if self.access_token().is_none() {
            self.access_token = web_sys::window()
                .and_then(|w| w.document())
                .and_then(|d| d.dyn_into::<web_sys::HtmlDocument>().ok())
                .and_then(|d| d.cookie().ok())
                .and_then(|cookies| cookie_value(&cookies, ACCESS_TOKEN_COOKIE));
        }
        self
    }

    #[cfg(not(target_arch = "wasm32"))]
    fn with_cookie_token(self) -> Self {
        self
    }
}

/// Value of cookie `name` in a `document.cookie` string
#[cfg_attr(not(target_arch = "wasm32"), allow(dead_code))]
fn cookie_value(cookies: &str, name: &str) -> Option<String> {
    cookies.split(';').find_map(|pair| {
        let (key, value) = pair.trim().split_once('=')?;
        (key == name && !value.is_empty()).then(|| value.to_string())
    })
}
