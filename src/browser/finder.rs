//! Locating an installed Chrome/Chromium and its profiles.
//!
//! Lookup order when no browser name is given:
//! 1. `CHROME` environment variable
//! 2. Known per-OS install locations (Chromium, Google Chrome, Canary)
//! 3. Well-known command names in `PATH`

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::{Result, SearchError};

/// A browser family with its per-OS install and user-data locations.
#[derive(Debug, Clone, Copy)]
struct KnownBrowser {
    name: &'static str,
    executable: &'static str,
    /// Relative to the platform's data root (`%LOCALAPPDATA%`, `~/Library/Application Support`, `~/.config`).
    user_data_dir: &'static str,
}

#[cfg(target_os = "windows")]
const KNOWN_BROWSERS: &[KnownBrowser] = &[
    KnownBrowser {
        name: "Chromium",
        executable: r"C:\Program Files\Chromium\Application\chrome.exe",
        user_data_dir: r"Chromium\User Data",
    },
    KnownBrowser {
        name: "Google Chrome",
        executable: r"C:\Program Files\Google\Chrome\Application\chrome.exe",
        user_data_dir: r"Google\Chrome\User Data",
    },
    KnownBrowser {
        name: "Google Chrome Canary",
        executable: r"C:\Program Files\Google\Chrome Canary\Application\chrome.exe",
        user_data_dir: r"Google\Chrome Canary\User Data",
    },
];

#[cfg(target_os = "macos")]
const KNOWN_BROWSERS: &[KnownBrowser] = &[
    KnownBrowser {
        name: "Chromium",
        executable: "/Applications/Chromium.app/Contents/MacOS/Chromium",
        user_data_dir: "Chromium",
    },
    KnownBrowser {
        name: "Google Chrome",
        executable: "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
        user_data_dir: "Google/Chrome",
    },
    KnownBrowser {
        name: "Google Chrome Canary",
        executable: "/Applications/Google Chrome Canary.app/Contents/MacOS/Google Chrome Canary",
        user_data_dir: "Google/Chrome Canary",
    },
];

#[cfg(not(any(target_os = "windows", target_os = "macos")))]
const KNOWN_BROWSERS: &[KnownBrowser] = &[
    KnownBrowser {
        name: "Chromium",
        executable: "/usr/bin/chromium",
        user_data_dir: "chromium",
    },
    KnownBrowser {
        name: "Google Chrome",
        executable: "/usr/bin/google-chrome",
        user_data_dir: "google-chrome",
    },
    KnownBrowser {
        name: "Google Chrome Canary",
        executable: "/usr/bin/google-chrome-canary",
        user_data_dir: "google-chrome-canary",
    },
];

/// Well-known command names to search in PATH.
const KNOWN_COMMANDS: &[&str] = &[
    "google-chrome",
    "google-chrome-stable",
    "chromium",
    "chromium-browser",
    "chrome",
];

/// A located browser installation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FoundBrowser {
    /// Browser family name, or `"custom"` for env/PATH hits.
    pub name: String,
    /// Executable path.
    pub executable: PathBuf,
    /// User data directory, when the family is known.
    pub user_data_dir: Option<PathBuf>,
}

/// A browser profile listed in the user data directory's `Local State`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrowserProfile {
    /// Name shown in the browser's profile picker.
    pub display_name: String,
    /// Absolute profile directory.
    pub path: PathBuf,
}

/// Names of the browser families this finder knows about.
pub fn known_browser_names() -> Vec<&'static str> {
    KNOWN_BROWSERS.iter().map(|b| b.name).collect()
}

fn data_root() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        std::env::var("LOCALAPPDATA").ok().map(PathBuf::from)
    }
    #[cfg(target_os = "macos")]
    {
        std::env::var("HOME")
            .ok()
            .map(|home| PathBuf::from(home).join("Library").join("Application Support"))
    }
    #[cfg(not(any(target_os = "windows", target_os = "macos")))]
    {
        std::env::var("HOME")
            .ok()
            .map(|home| PathBuf::from(home).join(".config"))
    }
}

impl KnownBrowser {
    fn locate(&self) -> Option<FoundBrowser> {
        let exe = Path::new(self.executable);
        if !exe.exists() {
            return None;
        }
        Some(FoundBrowser {
            name: self.name.to_string(),
            executable: exe.to_path_buf(),
            user_data_dir: data_root().map(|root| root.join(self.user_data_dir)),
        })
    }
}

/// Finds an installed browser.
///
/// With a `name`, only that family is considered. Without one, the `CHROME`
/// override, the known install locations and PATH are tried in that order.
pub fn find_browser(name: Option<&str>) -> Result<FoundBrowser> {
    if let Some(name) = name {
        let found = KNOWN_BROWSERS
            .iter()
            .filter(|b| b.name == name)
            .find_map(KnownBrowser::locate)
            .ok_or_else(|| SearchError::BrowserNotFound(format!("Cannot find browser: {}", name)))?;
        info!("Found browser: {}", found.name);
        return Ok(found);
    }

    if let Ok(path) = std::env::var("CHROME") {
        let p = PathBuf::from(&path);
        if p.exists() {
            debug!("Chrome found via CHROME env var: {}", path);
            return Ok(FoundBrowser {
                name: "custom".to_string(),
                executable: p,
                user_data_dir: None,
            });
        }
    }

    if let Some(found) = KNOWN_BROWSERS.iter().find_map(KnownBrowser::locate) {
        info!("Found browser: {} at {}", found.name, found.executable.display());
        return Ok(found);
    }

    for cmd in KNOWN_COMMANDS {
        if let Ok(path) = which::which(cmd) {
            debug!("Chrome found in PATH: {}", path.display());
            return Ok(FoundBrowser {
                name: "custom".to_string(),
                executable: path,
                user_data_dir: None,
            });
        }
    }

    Err(SearchError::BrowserNotFound(
        "Cannot find a supported browser on your system. Install Chrome or Chromium, or set CHROME"
            .to_string(),
    ))
}

/// Lists the profiles of a browser. Empty on any lookup or parse failure.
pub fn browser_profiles(name: Option<&str>) -> Vec<BrowserProfile> {
    let Ok(found) = find_browser(name) else {
        return Vec::new();
    };
    let Some(dir) = found.user_data_dir else {
        return Vec::new();
    };
    std::fs::read_to_string(dir.join("Local State"))
        .ok()
        .and_then(|raw| parse_profiles(&raw, &dir))
        .unwrap_or_default()
}

/// Reads `profile.info_cache` from a `Local State` document.
fn parse_profiles(local_state: &str, user_data_dir: &Path) -> Option<Vec<BrowserProfile>> {
    let state: serde_json::Value = serde_json::from_str(local_state).ok()?;
    let cache = state.get("profile")?.get("info_cache")?.as_object()?;
    Some(
        cache
            .iter()
            .map(|(dir_name, info)| BrowserProfile {
                display_name: info
                    .get("name")
                    .and_then(|n| n.as_str())
                    .unwrap_or(dir_name)
                    .to_string(),
                path: user_data_dir.join(dir_name),
            })
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_browsers_not_empty() {
        assert_eq!(
            known_browser_names(),
            vec!["Chromium", "Google Chrome", "Google Chrome Canary"]
        );
    }

    #[test]
    fn test_known_commands_not_empty() {
        assert!(!KNOWN_COMMANDS.is_empty());
    }

    #[test]
    fn test_find_browser_unknown_name() {
        let err = find_browser(Some("Netscape Navigator")).unwrap_err();
        assert!(matches!(err, SearchError::BrowserNotFound(_)));
        assert!(err.to_string().contains("Netscape Navigator"));
    }

    #[test]
    fn test_find_browser_returns_existing_path() {
        // Passes with or without a browser installed.
        if let Ok(found) = find_browser(None) {
            assert!(found.executable.exists());
        }
    }

    #[test]
    fn test_parse_profiles() {
        let raw = r#"{
            "profile": {
                "info_cache": {
                    "Default": { "name": "Person 1" },
                    "Profile 2": { "name": "Work" }
                }
            }
        }"#;
        let profiles = parse_profiles(raw, Path::new("/data")).unwrap();
        assert_eq!(profiles.len(), 2);
        assert_eq!(profiles[0].display_name, "Person 1");
        assert_eq!(profiles[0].path, Path::new("/data").join("Default"));
        assert_eq!(profiles[1].display_name, "Work");
        assert_eq!(profiles[1].path, Path::new("/data").join("Profile 2"));
    }

    #[test]
    fn test_parse_profiles_missing_name_uses_dir() {
        let raw = r#"{"profile":{"info_cache":{"Guest":{}}}}"#;
        let profiles = parse_profiles(raw, Path::new("/data")).unwrap();
        assert_eq!(profiles[0].display_name, "Guest");
    }

    #[test]
    fn test_parse_profiles_malformed() {
        assert!(parse_profiles("not json", Path::new("/data")).is_none());
        assert!(parse_profiles(r#"{"profile":{}}"#, Path::new("/data")).is_none());
    }

    #[test]
    fn test_browser_profiles_unknown_browser_is_empty() {
        assert!(browser_profiles(Some("Netscape Navigator")).is_empty());
    }
}
