//! Launching a locally installed browser.

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig, HeadlessMode};
use chromiumoxide::cdp::browser_protocol::browser::{
    SetDownloadBehaviorBehavior, SetDownloadBehaviorParams,
};
use chromiumoxide::handler::viewport::Viewport as CdpViewport;
use serde_json::Value;
use tracing::{debug, error, info, warn};

use super::finder;
use super::{remove_temp_dir, BrowserController, BrowserCore, LaunchOptions};
use crate::page::EvaluateRequest;
use crate::{Result, SearchError};

/// Extra window height for browser chrome around the viewport.
const WINDOW_CHROME_HEIGHT: u32 = 90;

/// Flags passed to every locally launched browser.
const HARDENED_ARGS: &[&str] = &[
    "--no-sandbox",
    "--mute-audio",
    "--disable-gpu",
    "--disable-http2",
    "--disable-blink-features=AutomationControlled",
    "--disable-infobars",
    "--disable-background-timer-throttling",
    "--disable-popup-blocking",
    "--disable-backgrounding-occluded-windows",
    "--disable-renderer-backgrounding",
    "--disable-window-activation",
    "--disable-focus-on-load",
    "--no-default-browser-check",
    "--disable-web-security",
    "--disable-features=IsolateOrigins,site-per-process",
    "--disable-site-isolation-trials",
];

/// Spawns an installed Chrome/Chromium and drives it over CDP.
#[derive(Default)]
pub struct LocalBrowser {
    core: BrowserCore,
}

impl LocalBrowser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shared session and page bookkeeping.
    pub fn core(&self) -> &BrowserCore {
        &self.core
    }
}

/// Command-line flags for a launch. `--enable-automation` is never passed.
pub(crate) fn launch_args(options: &LaunchOptions) -> Vec<String> {
    let mut args: Vec<String> = HARDENED_ARGS.iter().map(|a| a.to_string()).collect();
    args.push(format!(
        "--window-size={},{}",
        options.viewport.width,
        options.viewport.height + WINDOW_CHROME_HEIGHT
    ));
    if let Some(proxy) = options.proxy.as_deref().filter(|p| !p.is_empty()) {
        args.push(format!("--proxy-server={}", proxy));
    }
    if let Some(profile) = options.profile_path.as_deref().filter(|p| !p.is_empty()) {
        args.push(format!("--profile-directory={}", profile));
    }
    args
}

/// Launch counter keeping temporary profiles apart within one process.
static TEMP_PROFILE_SEQ: AtomicUsize = AtomicUsize::new(0);

/// A fresh user data directory path, unique per launch.
fn temp_user_data_dir() -> PathBuf {
    let seq = TEMP_PROFILE_SEQ.fetch_add(1, Ordering::Relaxed);
    std::env::temp_dir().join(format!(
        "a3s-browser-search-{}-{}",
        std::process::id(),
        seq
    ))
}

async fn deny_downloads(browser: &Browser) {
    let params = SetDownloadBehaviorParams::new(SetDownloadBehaviorBehavior::Deny);
    if let Err(e) = browser.execute(params).await {
        warn!("Failed to set download policy: {}", e);
    }
}

#[async_trait]
impl BrowserController for LocalBrowser {
    async fn launch(&self, options: &LaunchOptions) -> Result<()> {
        if self.core.is_launched().await {
            debug!("Browser already launched");
            return Ok(());
        }

        let (executable, user_data_dir) = match &options.executable_path {
            Some(path) => (path.clone(), None),
            None => {
                let found = finder::find_browser(None)?;
                (found.executable, found.user_data_dir)
            }
        };
        let (user_data_dir, temp_dir) = match (&options.profile_path, user_data_dir) {
            (Some(_), Some(dir)) => (dir, None),
            _ => {
                let dir = temp_user_data_dir();
                (dir.clone(), Some(dir))
            }
        };

        std::fs::create_dir_all(&user_data_dir).map_err(|e| {
            SearchError::Launch(format!(
                "Failed to create user data directory {}: {}",
                user_data_dir.display(),
                e
            ))
        })?;

        info!("Launching browser: {}", executable.display());
        debug!("Launch options: {:?}", options);

        let viewport = CdpViewport {
            width: options.viewport.width,
            height: options.viewport.height,
            ..Default::default()
        };

        let mut builder = BrowserConfig::builder()
            .chrome_executable(executable)
            .user_data_dir(user_data_dir)
            .disable_default_args()
            .args(launch_args(options))
            .viewport(viewport)
            .launch_timeout(options.timeout);

        builder = if options.headless {
            builder.headless_mode(HeadlessMode::New)
        } else {
            builder.with_head()
        };

        let launched = match builder.build() {
            Ok(config) => tokio::time::timeout(options.timeout, Browser::launch(config))
                .await
                .map_err(|_| {
                    error!("Browser launch timed out after {:?}", options.timeout);
                    SearchError::LaunchTimeout(options.timeout)
                })
                .and_then(|launched| {
                    launched.map_err(|e| {
                        error!("Failed to launch browser: {}", e);
                        SearchError::Launch(e.to_string())
                    })
                }),
            Err(e) => Err(SearchError::Launch(format!(
                "Failed to build browser config: {}",
                e
            ))),
        };
        let (browser, handler) = match launched {
            Ok(pair) => pair,
            Err(e) => {
                if let Some(dir) = &temp_dir {
                    remove_temp_dir(dir).await;
                }
                return Err(e);
            }
        };

        deny_downloads(&browser).await;
        self.core.attach(browser, handler, temp_dir).await;
        info!("Browser launched");
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.core.close().await
    }

    async fn is_launched(&self) -> bool {
        self.core.is_launched().await
    }

    async fn evaluate_on_new_page(&self, request: EvaluateRequest) -> Result<Option<Value>> {
        self.core.evaluate_on_new_page(request).await
    }
}
