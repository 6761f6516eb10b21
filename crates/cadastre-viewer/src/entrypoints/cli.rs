//! Command line and environment access that also works in the browser
//!
//! On web there is no argv or process environment. GET parameters stand in for
//! both: `?cliapi-url=https://..` becomes `--api-url https://..` and
//! `?envLOG_LEVEL=debug` becomes the `LOG_LEVEL` variable.

use clap::Parser;

#[cfg(target_arch = "wasm32")]
thread_local! {
    static ENV_MAP: std::cell::RefCell<std::collections::HashMap<String, String>> =
        std::cell::RefCell::new(std::collections::HashMap::new());
}

/// Split a URL query string into `cli` arguments and `env` variables
#[cfg_attr(not(target_arch = "wasm32"), allow(dead_code))]
pub(crate) fn split_query(query: &str) -> (Vec<String>, Vec<(String, String)>) {
    let mut args = Vec::new();
    let mut env = Vec::new();

    for pair in query.split('&').filter(|pair| !pair.is_empty()) {
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        if let Some(arg) = key.strip_prefix("cli") {
            if !arg.is_empty() {
                args.push(format!("--{arg}"));
            }
            if !value.is_empty() {
                args.push(value.to_string());
            }
        } else if let Some(var) = key.strip_prefix("env")
            && !var.is_empty()
        {
            env.push((var.to_string(), value.to_string()));
        }
    }

    (args, env)
}

#[cfg(target_arch = "wasm32")]
fn location_query() -> String {
    web_sys::window()
        .and_then(|w| w.location().search().ok())
        .map(|search| search.trim_start_matches('?').to_string())
        .unwrap_or_default()
}

/// Load `env`-prefixed GET parameters so [`get_env`] can see them (web only)
#[cfg_attr(not(target_arch = "wasm32"), allow(dead_code))]
pub fn parse_env() {
    #[cfg(target_arch = "wasm32")]
    {
        let (_, env) = split_query(&location_query());
        ENV_MAP.with(|map| map.borrow_mut().extend(env));
    }
}

/// Environment variable parsed to the desired type
#[cfg_attr(not(target_arch = "wasm32"), allow(dead_code))]
pub fn get_env<T: std::str::FromStr>(key: &str) -> Option<T> {
    #[cfg(target_arch = "wasm32")]
    {
        ENV_MAP.with(|map| map.borrow().get(key).and_then(|s| s.parse().ok()))
    }
    #[cfg(not(target_arch = "wasm32"))]
    {
        std::env::var(key).ok().and_then(|s| s.parse().ok())
    }
}

/// Parses from the command line arguments on native and from GET parameters on web
pub fn parse_args<T: Parser>() -> Result<T, clap::Error> {
    #[cfg(not(target_arch = "wasm32"))]
    {
        T::try_parse()
    }
    #[cfg(target_arch = "wasm32")]
    {
        let (args, _) = split_query(&location_query());
        T::try_parse_from(std::iter::once("cadastre-viewer".to_string()).chain(args))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_query() {
        let (args, env) =
            split_query("cliapi-url=https://api.example.hr&clishow-corine&envLOG_LEVEL=debug&x=1");
        assert_eq!(args, vec!["--api-url", "https://api.example.hr", "--show-corine"]);
        assert_eq!(env, vec![("LOG_LEVEL".to_string(), "debug".to_string())]);
    }

    #[test]
    fn test_split_empty_query() {
        let (args, env) = split_query("");
        assert!(args.is_empty());
        assert!(env.is_empty());
    }

    #[test]
    fn test_get_env_missing_or_unparsable() {
        parse_env();
        assert_eq!(get_env::<u32>("CADASTRE_VIEWER_UNSET_VARIABLE"), None);
        // PATH is set but is not a number
        assert_eq!(get_env::<u32>("PATH"), None);
    }
}
