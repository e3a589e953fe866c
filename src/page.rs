//! Page-evaluation primitives shared by every browser strategy.
//!
//! A page visit is described by an [`EvaluateRequest`]: the URL, the script
//! evaluated inside the page with its JSON parameters, hooks that run around
//! navigation, and the wait condition. Scripts never close over host state;
//! everything they need travels in `params` and everything they return comes
//! back as a structured-clone-safe value.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::Page;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::Result;

/// Nodes removed from a page before its HTML is captured for content
/// extraction. JSON-LD blocks survive so article metadata can still be read.
pub const CLUTTER_SELECTOR: &str = "script:not([type=\"application/ld+json\"]),noscript,style,link,svg,img,video,iframe,canvas,.reflist";

/// Default navigation timeout.
pub const DEFAULT_NAVIGATION_TIMEOUT: Duration = Duration::from_secs(30);

const SNAPSHOT_SCRIPT: &str = r#"(selector) => {
  if (selector) {
    document.querySelectorAll(selector).forEach((el) => el.remove());
  }
  return {
    url: window.location.href,
    title: document.title || '',
    html: document.documentElement ? document.documentElement.outerHTML : '',
  };
}"#;

/// A self-contained JavaScript function evaluated inside a page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageScript {
    source: String,
}

impl PageScript {
    /// Wraps the source of a JavaScript function expression.
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
        }
    }

    /// Script returning a [`PageSnapshot`]. Takes one parameter: a CSS
    /// selector whose matches are removed first (empty for none).
    pub fn snapshot() -> Self {
        Self::new(SNAPSHOT_SCRIPT)
    }

    /// Returns the function source.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Builds the call expression `(source)(arg0, arg1, ...)`.
    pub fn call_expression(&self, params: &[Value]) -> String {
        let args = params
            .iter()
            .map(Value::to_string)
            .collect::<Vec<_>>()
            .join(", ");
        format!("({})({})", self.source, args)
    }
}

/// Serialized page state returned by [`PageScript::snapshot`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageSnapshot {
    /// Final URL after redirects.
    pub url: String,
    /// `document.title`.
    pub title: String,
    /// `document.documentElement.outerHTML`.
    pub html: String,
}

impl PageSnapshot {
    /// Decodes a snapshot from an evaluation result.
    pub fn from_value(value: Value) -> Result<Self> {
        Ok(serde_json::from_value(value)?)
    }
}

/// Strategy for waiting until a page is considered fully loaded.
#[derive(Debug, Clone, Default)]
pub enum WaitStrategy {
    /// Wait for the page load event only.
    #[default]
    Load,
    /// Wait until network activity settles for the given duration.
    NetworkIdle {
        /// Milliseconds of network inactivity to wait for.
        idle_ms: u64,
    },
    /// Wait until a CSS selector matches an element on the page.
    Selector {
        /// CSS selector to wait for.
        css: String,
        /// Maximum time to wait in milliseconds before timing out.
        timeout_ms: u64,
    },
    /// Wait a fixed delay after the page load event.
    Delay {
        /// Milliseconds to wait after page load.
        ms: u64,
    },
}

/// Callbacks run around a page visit.
///
/// `before_page_load` runs on a blank page before navigation, which is where
/// fingerprint patches and request interception go. `after_page_load` runs
/// once navigation settles. `before_send_result` may rewrite the evaluation
/// result. Any error aborts the visit; the page is still closed.
#[async_trait]
pub trait PageHook: Send + Sync {
    async fn before_page_load(&self, _page: &Page) -> Result<()> {
        Ok(())
    }

    async fn after_page_load(&self, _page: &Page) -> Result<()> {
        Ok(())
    }

    async fn before_send_result(&self, _page: &Page, _result: &mut Value) -> Result<()> {
        Ok(())
    }
}

/// Everything needed for one "open, navigate, evaluate, close" cycle.
#[derive(Clone)]
pub struct EvaluateRequest {
    /// URL to navigate to.
    pub url: String,
    /// Function evaluated inside the page.
    pub script: PageScript,
    /// Arguments passed to `script`.
    pub params: Vec<Value>,
    /// Hooks, run in order.
    pub hooks: Vec<Arc<dyn PageHook>>,
    /// Wait condition applied after navigation.
    pub wait: WaitStrategy,
    /// Navigation timeout.
    pub timeout: Duration,
}

impl EvaluateRequest {
    /// Creates a request with no parameters or hooks.
    pub fn new(url: impl Into<String>, script: PageScript) -> Self {
        Self {
            url: url.into(),
            script,
            params: Vec::new(),
            hooks: Vec::new(),
            wait: WaitStrategy::default(),
            timeout: DEFAULT_NAVIGATION_TIMEOUT,
        }
    }

    /// Request for a page snapshot, stripping `strip_selector` first.
    pub fn snapshot(url: impl Into<String>, strip_selector: &str) -> Self {
        Self::new(url, PageScript::snapshot()).with_params(vec![Value::from(strip_selector)])
    }

    /// Sets the script arguments.
    pub fn with_params(mut self, params: Vec<Value>) -> Self {
        self.params = params;
        self
    }

    /// Appends a hook.
    pub fn with_hook(mut self, hook: Arc<dyn PageHook>) -> Self {
        self.hooks.push(hook);
        self
    }

    /// Sets the wait strategy.
    pub fn with_wait(mut self, wait: WaitStrategy) -> Self {
        self.wait = wait;
        self
    }

    /// Sets the navigation timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Call expression evaluated in the page.
    pub fn expression(&self) -> String {
        self.script.call_expression(&self.params)
    }
}

impl fmt::Debug for EvaluateRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EvaluateRequest")
            .field("url", &self.url)
            .field("params", &self.params)
            .field("hooks", &self.hooks.len())
            .field("wait", &self.wait)
            .field("timeout", &self.timeout)
            .finish()
    }
}
