//! Browser controller: one browser session, pages opened against it.
//!
//! [`BrowserController`] is the seam the orchestrator talks to. The two
//! strategies, [`LocalBrowser`] (spawns an installed Chrome/Chromium) and
//! [`RemoteBrowser`] (attaches to a running one over its debugging port),
//! share session and page bookkeeping through [`BrowserCore`].

pub mod finder;
mod local;
mod remote;

pub use local::LocalBrowser;
pub use remote::{RemoteBrowser, RemoteOptions};

use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::target::TargetId;
use chromiumoxide::{Browser, Handler, Page};
use futures::StreamExt;
use serde_json::Value;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::page::{EvaluateRequest, WaitStrategy};
use crate::{Result, SearchError};

/// Interval between selector probes.
const SELECTOR_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Browser viewport size in CSS pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 800,
        }
    }
}

/// Options for starting or attaching to a browser.
#[derive(Debug, Clone)]
pub struct LaunchOptions {
    /// Run without a visible window.
    pub headless: bool,
    /// Maximum time for the browser to come up.
    pub timeout: Duration,
    /// Default page viewport.
    pub viewport: Viewport,
    /// Executable override. Auto-detected when `None`.
    pub executable_path: Option<PathBuf>,
    /// Profile directory name inside the browser's user data directory.
    pub profile_path: Option<String>,
    /// Proxy server URL.
    pub proxy: Option<String>,
}

impl Default for LaunchOptions {
    fn default() -> Self {
        Self {
            headless: true,
            timeout: Duration::from_secs(30),
            viewport: Viewport::default(),
            executable_path: None,
            profile_path: None,
            proxy: None,
        }
    }
}

/// A browser that can be launched, closed, and asked to evaluate a script on
/// a fresh page.
#[async_trait]
pub trait BrowserController: Send + Sync {
    /// Starts or attaches to the browser. A no-op when already launched.
    async fn launch(&self, options: &LaunchOptions) -> Result<()>;

    /// Closes the browser. State is cleared only after the close succeeds.
    async fn close(&self) -> Result<()>;

    /// Whether a session is open.
    async fn is_launched(&self) -> bool;

    /// Opens a page, runs the request's hooks, navigates, evaluates the
    /// script and closes the page on every exit path.
    ///
    /// Returns `Ok(None)` when no session is open.
    async fn evaluate_on_new_page(&self, request: EvaluateRequest) -> Result<Option<Value>>;
}

struct Session {
    browser: Browser,
    handler: JoinHandle<()>,
    /// Throwaway user data directory, removed once the browser has closed.
    temp_dir: Option<PathBuf>,
}

/// Session and page bookkeeping shared by the browser strategies.
#[derive(Default)]
pub struct BrowserCore {
    session: RwLock<Option<Session>>,
    active_page: Mutex<Option<Page>>,
}

impl BrowserCore {
    /// Creates an empty core with no session.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a freshly launched or connected browser and drives its CDP
    /// handler in the background. `temp_dir` is deleted on a successful close.
    pub(crate) async fn attach(
        &self,
        browser: Browser,
        mut handler: Handler,
        temp_dir: Option<PathBuf>,
    ) {
        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    warn!("Browser CDP handler error: {}", e);
                }
            }
            debug!("Browser CDP handler exited");
        });
        *self.session.write().await = Some(Session {
            browser,
            handler,
            temp_dir,
        });
    }

    /// Whether a session is open.
    pub async fn is_launched(&self) -> bool {
        self.session.read().await.is_some()
    }

    /// Opens a blank page and makes it the active page.
    pub async fn create_page(&self) -> Result<Page> {
        let guard = self.session.read().await;
        let session = guard.as_ref().ok_or(SearchError::BrowserNotLaunched)?;
        let page = session
            .browser
            .new_page("about:blank")
            .await
            .map_err(|e| SearchError::Browser(format!("Failed to open tab: {}", e)))?;
        *self.active_page.lock().await = Some(page.clone());
        Ok(page)
    }

    /// Returns the cached active page if it still responds, else the newest
    /// responding page, else a new page.
    pub async fn active_page(&self) -> Result<Page> {
        let cached = self.active_page.lock().await.clone();
        if let Some(page) = cached {
            if is_alive(&page).await {
                return Ok(page);
            }
            warn!("Active page no longer available");
            *self.active_page.lock().await = None;
        }

        let pages = {
            let guard = self.session.read().await;
            let session = guard.as_ref().ok_or(SearchError::BrowserNotLaunched)?;
            session
                .browser
                .pages()
                .await
                .map_err(|e| SearchError::Browser(format!("Failed to list pages: {}", e)))?
        };

        if pages.is_empty() {
            return self.create_page().await;
        }

        for page in pages.into_iter().rev() {
            if is_alive(&page).await {
                *self.active_page.lock().await = Some(page.clone());
                return Ok(page);
            }
        }

        Err(SearchError::Browser("No active page found".to_string()))
    }

    /// See [`BrowserController::evaluate_on_new_page`].
    pub async fn evaluate_on_new_page(&self, request: EvaluateRequest) -> Result<Option<Value>> {
        if !self.is_launched().await {
            return Ok(None);
        }

        let page = self.create_page().await?;
        let target = page.target_id().clone();
        let outcome = run_on_page(&page, &request).await;
        self.release_page(page, &target).await;

        outcome.map(Some)
    }

    async fn release_page(&self, page: Page, target: &TargetId) {
        {
            let mut active = self.active_page.lock().await;
            if active.as_ref().is_some_and(|p| p.target_id() == target) {
                *active = None;
            }
        }
        if let Err(e) = page.close().await {
            warn!("Failed to close browser tab: {}", e);
        }
    }

    /// Closes the browser. A no-op when no session is open.
    pub async fn close(&self) -> Result<()> {
        let mut guard = self.session.write().await;
        let Some(session) = guard.as_mut() else {
            return Ok(());
        };

        if let Err(e) = session.browser.close().await {
            error!("Failed to close browser: {}", e);
            return Err(SearchError::Browser(format!("Failed to close browser: {}", e)));
        }
        if let Err(e) = session.browser.wait().await {
            debug!("Browser process wait failed: {}", e);
        }

        if let Some(session) = guard.take() {
            session.handler.abort();
            if let Some(dir) = &session.temp_dir {
                remove_temp_dir(dir).await;
            }
        }
        *self.active_page.lock().await = None;
        info!("Browser closed");
        Ok(())
    }
}

/// Deletes a throwaway user data directory. Failures are only logged.
pub(crate) async fn remove_temp_dir(dir: &Path) {
    match tokio::fs::remove_dir_all(dir).await {
        Ok(()) => debug!("Removed user data directory {}", dir.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(
            "Failed to remove user data directory {}: {}",
            dir.display(),
            e
        ),
    }
}

async fn is_alive(page: &Page) -> bool {
    page.evaluate("document.readyState").await.is_ok()
}

async fn run_on_page(page: &Page, request: &EvaluateRequest) -> Result<Value> {
    for hook in &request.hooks {
        hook.before_page_load(page).await?;
    }

    navigate(page, &request.url, request.timeout).await?;
    apply_wait(page, &request.wait).await?;

    for hook in &request.hooks {
        hook.after_page_load(page).await?;
    }

    let evaluation = async {
        let mut result: Value = page
            .evaluate(request.expression())
            .await
            .map_err(|e| SearchError::Browser(format!("Page evaluation failed: {}", e)))?
            .into_value()
            .map_err(|e| SearchError::Browser(format!("Unreadable evaluation result: {}", e)))?;

        for hook in &request.hooks {
            hook.before_send_result(page, &mut result).await?;
        }
        Ok(result)
    };

    bounded(request.timeout, &format!("evaluation on {}", request.url), evaluation).await
}

/// Runs `task`, failing with [`SearchError::Timeout`] after `timeout`.
async fn bounded<T, F>(timeout: Duration, what: &str, task: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    tokio::time::timeout(timeout, task).await.map_err(|_| {
        SearchError::Timeout(format!("{} exceeded {}ms", what, timeout.as_millis()))
    })?
}

async fn navigate(page: &Page, url: &str, timeout: Duration) -> Result<()> {
    debug!("Navigating to {}", url);
    match tokio::time::timeout(timeout, page.goto(url)).await {
        Ok(Ok(_)) => Ok(()),
        Ok(Err(e)) => Err(SearchError::Navigation {
            url: url.to_string(),
            reason: e.to_string(),
        }),
        Err(_) => Err(SearchError::Timeout(format!(
            "navigation to {} exceeded {}ms",
            url,
            timeout.as_millis()
        ))),
    }
}

async fn apply_wait(page: &Page, wait: &WaitStrategy) -> Result<()> {
    match wait {
        WaitStrategy::Load => Ok(()),
        WaitStrategy::NetworkIdle { idle_ms } => {
            tokio::time::sleep(Duration::from_millis(*idle_ms)).await;
            Ok(())
        }
        WaitStrategy::Selector { css, timeout_ms } => {
            wait_for_selector(page, css, Duration::from_millis(*timeout_ms)).await
        }
        WaitStrategy::Delay { ms } => {
            tokio::time::sleep(Duration::from_millis(*ms)).await;
            Ok(())
        }
    }
}

/// Polls until `css` matches an element, failing with
/// [`SearchError::Timeout`] after `timeout`.
pub async fn wait_for_selector(page: &Page, css: &str, timeout: Duration) -> Result<()> {
    let probe = async {
        loop {
            if page.find_element(css).await.is_ok() {
                return;
            }
            tokio::time::sleep(SELECTOR_POLL_INTERVAL).await;
        }
    };
    tokio::time::timeout(timeout, probe).await.map_err(|_| {
        SearchError::Timeout(format!(
            "selector '{}' not found within {}ms",
            css,
            timeout.as_millis()
        ))
    })
}
