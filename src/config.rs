//! Environment-style configuration.
//!
//! Every value is a pass-through default for the search contracts; the CLI
//! overrides any of them per invocation.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::browser::LaunchOptions;
use crate::query::DEFAULT_CONCURRENCY;
use crate::search::BrowserSearchConfig;
use crate::EngineKind;

/// Search settings, loadable from the environment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Comma-separated engine names, or `all`.
    #[serde(default = "default_engines")]
    pub engines: String,
    /// Default result limit.
    #[serde(default = "default_limit")]
    pub limit: usize,
    /// Navigation timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Page-visit concurrency.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// Run the browser without a window.
    #[serde(default = "default_headless")]
    pub headless: bool,
    /// Browser executable override.
    #[serde(default)]
    pub chrome: Option<PathBuf>,
    /// DevTools endpoint of an already running browser.
    #[serde(default)]
    pub ws_endpoint: Option<String>,
    /// Proxy server passed to the browser.
    #[serde(default)]
    pub proxy: Option<String>,
}

fn default_engines() -> String {
    "all".to_string()
}

fn default_limit() -> usize {
    10
}

fn default_timeout_ms() -> u64 {
    10_000
}

fn default_concurrency() -> usize {
    DEFAULT_CONCURRENCY
}

fn default_headless() -> bool {
    true
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            engines: default_engines(),
            limit: default_limit(),
            timeout_ms: default_timeout_ms(),
            concurrency: default_concurrency(),
            headless: default_headless(),
            chrome: None,
            ws_endpoint: None,
            proxy: None,
        }
    }
}

impl Settings {
    /// Reads `ENGINES`, `LIMIT`, `TIMEOUT`, `CONCURRENCY`, `HEADLESS`,
    /// `CHROME`, `BROWSER_WS_ENDPOINT` and `BROWSER_PROXY`.
    ///
    /// Unset or unparseable values keep their defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`from_env`](Self::from_env) with a custom variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut settings = Self::default();
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        if let Some(engines) = get("ENGINES") {
            settings.engines = engines;
        }
        if let Some(limit) = parse_var(&get, "LIMIT") {
            settings.limit = limit;
        }
        if let Some(timeout) = parse_var(&get, "TIMEOUT") {
            settings.timeout_ms = timeout;
        }
        if let Some(concurrency) = parse_var::<usize>(&get, "CONCURRENCY") {
            settings.concurrency = concurrency.max(1);
        }
        if let Some(headless) = get("HEADLESS") {
            match parse_bool(&headless) {
                Some(value) => settings.headless = value,
                None => warn!("Ignoring invalid HEADLESS value '{}'", headless),
            }
        }
        settings.chrome = get("CHROME").map(PathBuf::from);
        settings.ws_endpoint = get("BROWSER_WS_ENDPOINT");
        settings.proxy = get("BROWSER_PROXY");

        settings
    }

    /// Engines named by `engines`, in order.
    pub fn engine_kinds(&self) -> Vec<EngineKind> {
        engine_kinds(&self.engines)
    }

    /// Navigation timeout.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Browser launch options.
    pub fn launch_options(&self) -> LaunchOptions {
        LaunchOptions {
            headless: self.headless,
            executable_path: self.chrome.clone(),
            proxy: self.proxy.clone(),
            ..LaunchOptions::default()
        }
    }

    /// Orchestrator configuration. The default engine is the first listed.
    pub fn browser_config(&self) -> BrowserSearchConfig {
        BrowserSearchConfig {
            engine: self.engine_kinds().first().copied().unwrap_or_default(),
            launch: self.launch_options(),
            concurrency: self.concurrency,
            navigation_timeout: self.timeout(),
            ..BrowserSearchConfig::default()
        }
    }
}

/// Resolves a comma-separated engine list, `all` expanding to every engine.
/// Unknown names are skipped with a warning and duplicates dropped.
pub fn engine_kinds(list: &str) -> Vec<EngineKind> {
    let mut kinds = Vec::new();
    for parsed in EngineKind::parse_list(list) {
        match parsed {
            Ok(kind) if !kinds.contains(&kind) => kinds.push(kind),
            Ok(_) => {}
            Err(e) => warn!("Skipping engine: {}", e),
        }
    }
    kinds
}

fn parse_var<T: FromStr>(get: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    let raw = get(key)?;
    match raw.parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!("Ignoring invalid {} value '{}'", key, raw);
            None
        }
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_settings_default() {
        let settings = Settings::default();
        assert_eq!(settings.engines, "all");
        assert_eq!(settings.limit, 10);
        assert_eq!(settings.timeout_ms, 10_000);
        assert_eq!(settings.concurrency, 15);
        assert!(settings.headless);
        assert!(settings.chrome.is_none());
    }

    #[test]
    fn test_settings_from_lookup() {
        let settings = Settings::from_lookup(lookup(&[
            ("ENGINES", "google,baidu"),
            ("LIMIT", "5"),
            ("TIMEOUT", "20000"),
            ("CONCURRENCY", "4"),
            ("HEADLESS", "false"),
            ("CHROME", "/opt/chrome/chrome"),
            ("BROWSER_WS_ENDPOINT", "ws://127.0.0.1:9222/devtools/browser/abc"),
            ("BROWSER_PROXY", "socks5://127.0.0.1:1080"),
        ]));
        assert_eq!(settings.engines, "google,baidu");
        assert_eq!(settings.limit, 5);
        assert_eq!(settings.timeout(), Duration::from_secs(20));
        assert_eq!(settings.concurrency, 4);
        assert!(!settings.headless);
        assert_eq!(settings.chrome, Some(PathBuf::from("/opt/chrome/chrome")));
        assert!(settings.ws_endpoint.is_some());
        assert_eq!(settings.proxy.as_deref(), Some("socks5://127.0.0.1:1080"));
    }

    #[test]
    fn test_settings_ignore_invalid_values() {
        let settings = Settings::from_lookup(lookup(&[
            ("LIMIT", "many"),
            ("HEADLESS", "maybe"),
            ("CONCURRENCY", "0"),
            ("CHROME", "  "),
        ]));
        assert_eq!(settings.limit, 10);
        assert!(settings.headless);
        assert_eq!(settings.concurrency, 1);
        assert!(settings.chrome.is_none());
    }

    #[test]
    fn test_engine_kinds() {
        let settings = Settings {
            engines: "sogou, nope, bing, sogou".to_string(),
            ..Settings::default()
        };
        assert_eq!(settings.engine_kinds(), vec![EngineKind::Sogou, EngineKind::Bing]);
        assert_eq!(Settings::default().engine_kinds(), EngineKind::ALL.to_vec());
    }

    #[test]
    fn test_browser_config() {
        let settings = Settings {
            engines: "baidu".to_string(),
            timeout_ms: 5_000,
            headless: false,
            proxy: Some("http://proxy:8080".to_string()),
            ..Settings::default()
        };
        let config = settings.browser_config();
        assert_eq!(config.engine, EngineKind::Baidu);
        assert_eq!(config.navigation_timeout, Duration::from_secs(5));
        assert!(!config.launch.headless);
        assert_eq!(config.launch.proxy.as_deref(), Some("http://proxy:8080"));
    }

    #[test]
    fn test_settings_deserialize_partial() {
        let settings: Settings = serde_json::from_str(r#"{"limit": 3}"#).unwrap();
        assert_eq!(settings.limit, 3);
        assert_eq!(settings.engines, "all");
        assert!(settings.headless);
    }
}
