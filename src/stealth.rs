//! Fingerprint patches, request filtering and result-landmark waiting.

use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::fetch::{
    ContinueRequestParams, EnableParams, EventRequestPaused, FailRequestParams,
};
use chromiumoxide::cdp::browser_protocol::network::{
    ErrorReason, ResourceType, SetUserAgentOverrideParams,
};
use chromiumoxide::cdp::browser_protocol::page::{
    AddScriptToEvaluateOnNewDocumentParams, SetBypassCspParams,
};
use chromiumoxide::Page;
use futures::StreamExt;
use rand::seq::IndexedRandom;
use tracing::{debug, warn};

use crate::browser::wait_for_selector;
use crate::page::PageHook;
use crate::{Result, SearchError};

/// Desktop user agents picked from at random per page.
const DESKTOP_USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/130.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36 Edg/131.0.0.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.6 Safari/605.1.15",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
];

/// Patches installed before any page script runs.
const STEALTH_SCRIPT: &str = r#"(() => {
  Object.defineProperty(navigator, 'webdriver', { get: () => undefined });
  Object.defineProperty(navigator, 'languages', { get: () => ['en-US', 'en'] });
  Object.defineProperty(navigator, 'plugins', { get: () => [{}, {}, {}, {}, {}] });
  Object.defineProperty(navigator, 'headless', { get: () => false });
  const originalQuery = window.navigator.permissions && window.navigator.permissions.query;
  if (originalQuery) {
    window.navigator.permissions.query = (parameters) =>
      parameters.name === 'notifications'
        ? Promise.resolve({ state: Notification.permission })
        : originalQuery.call(window.navigator.permissions, parameters);
  }
})();"#;

/// Picks a desktop user agent at random.
pub fn random_user_agent() -> &'static str {
    DESKTOP_USER_AGENTS
        .choose(&mut rand::rng())
        .copied()
        .unwrap_or(DESKTOP_USER_AGENTS[0])
}

/// Hides automation fingerprints and lets only the main document load.
///
/// Every other request (images, scripts, stylesheets, XHR, fonts, media,
/// subframes) is failed as blocked by the client.
#[derive(Debug, Clone, Copy, Default)]
pub struct StealthFilter;

impl StealthFilter {
    pub fn new() -> Self {
        Self
    }

    async fn apply_stealth(&self, page: &Page) -> Result<()> {
        let user_agent = random_user_agent();
        debug!("Using user agent: {}", user_agent);

        page.set_user_agent(SetUserAgentOverrideParams::new(user_agent))
            .await
            .map_err(|e| SearchError::Browser(format!("Failed to set user agent: {}", e)))?;
        page.execute(SetBypassCspParams::new(true))
            .await
            .map_err(|e| SearchError::Browser(format!("Failed to bypass CSP: {}", e)))?;
        page.evaluate_on_new_document(AddScriptToEvaluateOnNewDocumentParams::new(STEALTH_SCRIPT))
            .await
            .map_err(|e| SearchError::Browser(format!("Failed to install stealth script: {}", e)))?;
        Ok(())
    }

    async fn intercept_requests(&self, page: &Page) -> Result<()> {
        let mut paused = page
            .event_listener::<EventRequestPaused>()
            .await
            .map_err(|e| SearchError::Browser(format!("Failed to listen for requests: {}", e)))?;
        let main_frame = page
            .mainframe()
            .await
            .map_err(|e| SearchError::Browser(format!("Failed to resolve main frame: {}", e)))?;

        let page_handle = page.clone();
        tokio::spawn(async move {
            while let Some(event) = paused.next().await {
                let is_main_document = event.resource_type == ResourceType::Document
                    && main_frame.as_ref().map_or(true, |frame| *frame == event.frame_id);
                let outcome = if is_main_document {
                    page_handle
                        .execute(ContinueRequestParams::new(event.request_id.clone()))
                        .await
                        .map(|_| ())
                } else {
                    page_handle
                        .execute(FailRequestParams::new(
                            event.request_id.clone(),
                            ErrorReason::BlockedByClient,
                        ))
                        .await
                        .map(|_| ())
                };
                if let Err(e) = outcome {
                    debug!("Request interception reply failed: {}", e);
                }
            }
        });

        page.execute(EnableParams::default())
            .await
            .map_err(|e| SearchError::Browser(format!("Failed to enable interception: {}", e)))?;
        Ok(())
    }
}

#[async_trait]
impl PageHook for StealthFilter {
    async fn before_page_load(&self, page: &Page) -> Result<()> {
        self.apply_stealth(page).await?;
        self.intercept_requests(page).await
    }
}

/// Waits for an engine's results landmark after navigation.
#[derive(Debug, Clone)]
pub struct WaitForSelector {
    css: String,
    timeout: Duration,
}

impl WaitForSelector {
    pub fn new(css: impl Into<String>, timeout: Duration) -> Self {
        Self {
            css: css.into(),
            timeout,
        }
    }

    pub fn css(&self) -> &str {
        &self.css
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

#[async_trait]
impl PageHook for WaitForSelector {
    async fn after_page_load(&self, page: &Page) -> Result<()> {
        let result = wait_for_selector(page, &self.css, self.timeout).await;
        if let Err(ref e) = result {
            warn!("Results landmark missing: {}", e);
        }
        result
    }
}
