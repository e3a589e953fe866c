//! Search orchestration and the page-visit pipeline.
//!
//! [`BrowserSearch`] owns one browser session. A call runs every query
//! concurrently against one engine, shares a visited-URL set across them,
//! and optionally fans the surviving results out to a bounded queue that
//! visits each page, extracts its main content and renders it as Markdown.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use futures::future::join_all;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, error, info, warn};

use crate::browser::{BrowserController, LaunchOptions, LocalBrowser, RemoteBrowser, RemoteOptions};
use crate::engine::SearchUrlOptions;
use crate::markdown::to_markdown;
use crate::page::{EvaluateRequest, PageSnapshot, WaitStrategy, CLUTTER_SELECTOR, DEFAULT_NAVIGATION_TIMEOUT};
use crate::readability::{Readability, ReadabilityOptions};
use crate::stealth::{StealthFilter, WaitForSelector};
use crate::{EngineKind, Result, SearchError, SearchOptions, SearchResult, TaskQueue};

/// Hosts never visited: they block automation or have no readable content.
pub const SKIP_DOMAINS: &[&str] = &[
    "reddit.com",
    "www.reddit.com",
    "x.com",
    "twitter.com",
    "www.twitter.com",
    "youtube.com",
    "www.youtube.com",
];

/// Default time allowed for an engine's results landmark to appear.
pub const DEFAULT_RESULTS_TIMEOUT: Duration = Duration::from_secs(10);

/// Network quiet period awaited after navigation.
const NETWORK_IDLE_MS: u64 = 500;

/// Orchestrator configuration.
#[derive(Debug, Clone)]
pub struct BrowserSearchConfig {
    /// Engine used when a call names none.
    pub engine: EngineKind,
    /// Options used to launch or attach the browser.
    pub launch: LaunchOptions,
    /// Page-visit concurrency used when a call names none.
    pub concurrency: usize,
    /// Per-page navigation timeout.
    pub navigation_timeout: Duration,
    /// Time allowed for the results landmark.
    pub results_timeout: Duration,
    /// Wait applied after navigating to a results page.
    pub search_wait: WaitStrategy,
    /// Wait applied after navigating to a result page.
    pub visit_wait: WaitStrategy,
    /// Content extraction tuning.
    pub readability: ReadabilityOptions,
}

impl Default for BrowserSearchConfig {
    fn default() -> Self {
        Self {
            engine: EngineKind::default(),
            launch: LaunchOptions::default(),
            concurrency: crate::query::DEFAULT_CONCURRENCY,
            navigation_timeout: DEFAULT_NAVIGATION_TIMEOUT,
            results_timeout: DEFAULT_RESULTS_TIMEOUT,
            search_wait: WaitStrategy::NetworkIdle {
                idle_ms: NETWORK_IDLE_MS,
            },
            visit_wait: WaitStrategy::NetworkIdle {
                idle_ms: NETWORK_IDLE_MS,
            },
            readability: ReadabilityOptions::default(),
        }
    }
}

/// Browser-driven search across public engines.
///
/// # Example
///
/// ```rust,no_run
/// use a3s_browser_search::{BrowserSearch, EngineKind, SearchOptions};
///
/// #[tokio::main]
/// async fn main() {
///     let search = BrowserSearch::local();
///     let options = SearchOptions::new("rust ownership model")
///         .with_engine(EngineKind::Bing)
///         .with_count(5)
///         .with_visit(true)
///         .with_truncate(2000);
///
///     for result in search.perform(options).await {
///         println!("{} - {}", result.title, result.url);
///     }
/// }
/// ```
pub struct BrowserSearch {
    browser: Arc<dyn BrowserController>,
    config: Arc<BrowserSearchConfig>,
    launch_lock: AsyncMutex<()>,
}

impl BrowserSearch {
    /// Creates an orchestrator over `browser` with default configuration.
    pub fn new(browser: Arc<dyn BrowserController>) -> Self {
        Self::with_config(browser, BrowserSearchConfig::default())
    }

    /// Creates an orchestrator over `browser`.
    pub fn with_config(browser: Arc<dyn BrowserController>, config: BrowserSearchConfig) -> Self {
        Self {
            browser,
            config: Arc::new(config),
            launch_lock: AsyncMutex::new(()),
        }
    }

    /// Orchestrator that launches a locally installed browser.
    pub fn local() -> Self {
        Self::new(Arc::new(LocalBrowser::new()))
    }

    /// Orchestrator attached to a running browser's debugging endpoint.
    pub fn remote(options: RemoteOptions) -> Self {
        Self::new(Arc::new(RemoteBrowser::new(options)))
    }

    /// Returns the configuration.
    pub fn config(&self) -> &BrowserSearchConfig {
        &self.config
    }

    /// Runs a search, returning no results on any failure.
    pub async fn perform(&self, options: SearchOptions) -> Vec<SearchResult> {
        match self.try_perform(options).await {
            Ok(results) => results,
            Err(e) => {
                error!("Search failed: {}", e);
                Vec::new()
            }
        }
    }

    /// Runs a search.
    ///
    /// Fails when the browser cannot be launched or no query is given.
    /// Failures of a single query or page visit only drop those results.
    /// The browser is closed afterwards unless `keep_browser_open` is set.
    pub async fn try_perform(&self, options: SearchOptions) -> Result<Vec<SearchResult>> {
        let outcome = self.run(&options).await;

        if !options.keep_browser_open {
            if let Err(e) = self.close_browser().await {
                warn!("Failed to close browser after search: {}", e);
            }
        }

        outcome
    }

    /// Closes the browser session. A no-op when none is open.
    pub async fn close_browser(&self) -> Result<()> {
        self.browser.close().await
    }

    /// Visits one URL and returns its main content as Markdown.
    ///
    /// Leaves the browser open; call [`close_browser`](Self::close_browser)
    /// when done.
    pub async fn visit_url(&self, url: &str) -> Result<SearchResult> {
        url::Url::parse(url)?;
        self.ensure_browser().await?;
        visit_link(
            Arc::clone(&self.browser),
            Arc::clone(&self.config),
            SearchResult::new("", url, ""),
        )
        .await
    }

    async fn ensure_browser(&self) -> Result<()> {
        let _guard = self.launch_lock.lock().await;
        if !self.browser.is_launched().await {
            self.browser.launch(&self.config.launch).await?;
        }
        Ok(())
    }

    async fn run(&self, options: &SearchOptions) -> Result<Vec<SearchResult>> {
        let queries = options.normalized_queries();
        if queries.is_empty() {
            return Err(SearchError::InvalidQuery("Query cannot be empty".into()));
        }

        self.ensure_browser().await?;

        let engine = options.engine.unwrap_or(self.config.engine);
        let concurrency = options
            .concurrency
            .filter(|&c| c > 0)
            .unwrap_or(self.config.concurrency);
        let visited = Mutex::new(HashSet::new());
        let queue = TaskQueue::new(concurrency);

        debug!(
            "Running {} queries on {} (visit: {})",
            queries.len(),
            engine,
            options.need_visited_urls
        );

        let futures = queries
            .iter()
            .map(|query| self.search_query(query, engine, options, &visited, &queue));
        let mut results: Vec<SearchResult> = join_all(futures).await.into_iter().flatten().collect();

        if let Some(max_chars) = options.truncate {
            for result in &mut results {
                result.truncate_content(max_chars);
            }
        }

        info!("Search returned {} results", results.len());
        Ok(results)
    }

    /// One query's pipeline. Never fails: errors drop the query's results.
    async fn search_query(
        &self,
        query: &str,
        engine: EngineKind,
        options: &SearchOptions,
        visited: &Mutex<HashSet<String>>,
        queue: &TaskQueue<SearchResult>,
    ) -> Vec<SearchResult> {
        let stubs = match self.fetch_stubs(query, engine, options).await {
            Ok(stubs) => stubs,
            Err(e) => {
                warn!("Query '{}' on {} failed: {}", query, engine, e);
                return Vec::new();
            }
        };

        let fresh = claim_unvisited(stubs, visited);
        debug!("Query '{}' kept {} new results", query, fresh.len());

        if !options.need_visited_urls {
            return fresh;
        }

        let handles: Vec<_> = fresh
            .into_iter()
            .map(|stub| {
                queue.add(visit_link(
                    Arc::clone(&self.browser),
                    Arc::clone(&self.config),
                    stub,
                ))
            })
            .collect();

        join_all(handles)
            .await
            .into_iter()
            .filter_map(|outcome| match outcome {
                Ok(result) => Some(result),
                Err(e) => {
                    warn!("Dropping result: {}", e);
                    None
                }
            })
            .collect()
    }

    async fn fetch_stubs(
        &self,
        query: &str,
        engine: EngineKind,
        options: &SearchOptions,
    ) -> Result<Vec<SearchResult>> {
        let adapter = engine.adapter();
        let url = adapter.search_url(
            query,
            &SearchUrlOptions {
                count: options.per_query_count(),
                exclude_domains: options.exclude_domains.clone(),
            },
        );

        let mut request = EvaluateRequest::snapshot(&url, "")
            .with_hook(Arc::new(StealthFilter::new()))
            .with_wait(self.config.search_wait.clone())
            .with_timeout(self.config.navigation_timeout);
        if let Some(css) = adapter.ready_selector() {
            request = request.with_hook(Arc::new(WaitForSelector::new(
                css,
                self.config.results_timeout,
            )));
        }

        let snapshot = evaluate_snapshot(self.browser.as_ref(), request).await?;
        adapter.extract_results(&snapshot.html)
    }
}

async fn evaluate_snapshot(
    browser: &dyn BrowserController,
    request: EvaluateRequest,
) -> Result<PageSnapshot> {
    let value = browser
        .evaluate_on_new_page(request)
        .await?
        .ok_or(SearchError::BrowserNotLaunched)?;
    PageSnapshot::from_value(value)
}

/// Loads `stub.url`, extracts its main content and returns the enriched
/// result.
async fn visit_link(
    browser: Arc<dyn BrowserController>,
    config: Arc<BrowserSearchConfig>,
    stub: SearchResult,
) -> Result<SearchResult> {
    let request = EvaluateRequest::snapshot(&stub.url, CLUTTER_SELECTOR)
        .with_hook(Arc::new(StealthFilter::new()))
        .with_wait(config.visit_wait.clone())
        .with_timeout(config.navigation_timeout);

    let snapshot = evaluate_snapshot(browser.as_ref(), request).await?;
    let (title, content) = extract_markdown(&snapshot, &stub.url, &config.readability)?;
    debug!("Extracted {} chars from {}", content.chars().count(), stub.url);

    Ok(SearchResult {
        title: if title.is_empty() { stub.title } else { title },
        content,
        ..stub
    })
}

/// Runs readability on a snapshot and renders the article as Markdown.
///
/// Returns the article title (or the page title) and the Markdown.
fn extract_markdown(
    snapshot: &PageSnapshot,
    fallback_url: &str,
    options: &ReadabilityOptions,
) -> Result<(String, String)> {
    let url = if url::Url::parse(&snapshot.url).is_ok() {
        snapshot.url.as_str()
    } else {
        fallback_url
    };

    let article = Readability::new(snapshot.html.as_str(), url)
        .with_options(options.clone())
        .parse()?
        .ok_or_else(|| SearchError::Extraction(format!("no readable content at {}", url)))?;

    let markdown = to_markdown(&article.content)?;
    if markdown.is_empty() {
        return Err(SearchError::Extraction(format!("empty content at {}", url)));
    }

    let title = if article.title.is_empty() {
        snapshot.title.trim().to_string()
    } else {
        article.title
    };
    Ok((title, markdown))
}

/// Whether `url`'s host is on the skip list.
pub fn is_skipped_domain(url: &str) -> bool {
    url::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_ascii_lowercase))
        .is_some_and(|host| SKIP_DOMAINS.contains(&host.as_str()))
}

/// Keeps results whose normalized URL nobody has claimed yet, claiming them.
///
/// Skip-listed URLs are claimed too but never returned.
fn claim_unvisited(stubs: Vec<SearchResult>, visited: &Mutex<HashSet<String>>) -> Vec<SearchResult> {
    let mut visited = visited.lock().unwrap_or_else(PoisonError::into_inner);
    stubs
        .into_iter()
        .filter(|stub| visited.insert(stub.normalized_url()) && !is_skipped_domain(&stub.url))
        .collect()
}
