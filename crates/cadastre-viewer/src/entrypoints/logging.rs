//! Tracing subscriber setup

/// Filter used when `RUST_LOG` is not set
#[cfg(not(target_arch = "wasm32"))]
const DEFAULT_FILTER: &str = if cfg!(debug_assertions) {
    "debug,eframe::native=warn,egui::context=warn,hyper_util=info,reqwest::connect=info,walkers=info"
} else {
    "info,eframe=warn,egui::context=warn"
};

/// Log to stderr, filtered by `RUST_LOG`
#[cfg(not(target_arch = "wasm32"))]
pub fn setup_logging() {
    use tracing_subscriber::EnvFilter;
    use tracing_subscriber::Layer;
    use tracing_subscriber::fmt;
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let fmt_layer = fmt::layer().with_filter(filter);
    if tracing_subscriber::registry().with(fmt_layer).try_init().is_err() {
        tracing::warn!("A global tracing subscriber was already installed");
    }
}

/// Log to the browser console, filtered by the `LOG_LEVEL` GET parameter
#[cfg(target_arch = "wasm32")]
pub fn setup_logging() {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;
    use tracing_wasm::WASMLayerConfigBuilder;

    let max_level = super::cli::get_env::<String>("LOG_LEVEL")
        .and_then(|level| parse_level(&level))
        .unwrap_or(if cfg!(debug_assertions) {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        });

    let mut builder = WASMLayerConfigBuilder::new();
    builder.set_max_level(max_level);
    let _ = tracing_subscriber::registry()
        .with(tracing_wasm::WASMLayer::new(builder.build()))
        .try_init();
}

#[cfg_attr(not(target_arch = "wasm32"), allow(dead_code))]
fn parse_level(level: &str) -> Option<tracing::Level> {
    match level.to_uppercase().as_str() {
        "TRACE" => Some(tracing::Level::TRACE),
        "DEBUG" => Some(tracing::Level::DEBUG),
        "INFO" => Some(tracing::Level::INFO),
        "WARN" => Some(tracing::Level::WARN),
        "ERROR" => Some(tracing::Level::ERROR),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_level() {
        assert_eq!(parse_level("debug"), Some(tracing::Level::DEBUG));
        assert_eq!(parse_level("WARN"), Some(tracing::Level::WARN));
        assert_eq!(parse_level("loud"), None);
    }
}
