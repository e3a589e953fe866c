//! Tool-call boundary.
//!
//! A [`SearchProvider`] turns a [`SearchRequest`] into a [`SearchResponse`]
//! and never fails: errors become `success: false`. [`LocalSearch`] is the
//! browser-driven provider.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::browser::{BrowserController, LocalBrowser, RemoteBrowser, RemoteOptions};
use crate::config::{engine_kinds, Settings};
use crate::{BrowserSearch, Result, SearchError, SearchOptions, SearchResponse, SearchResult};

/// A search request as received from a tool call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchRequest {
    pub query: String,
    /// Maximum number of results.
    #[serde(default)]
    pub limit: Option<usize>,
    /// Comma-separated engine names or `all`.
    #[serde(default)]
    pub engines: Option<String>,
    /// Visit result pages and return their content.
    #[serde(default)]
    pub visit: bool,
    /// Maximum characters of content per result.
    #[serde(default)]
    pub truncate: Option<usize>,
}

impl SearchRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Default::default()
        }
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_engines(mut self, engines: impl Into<String>) -> Self {
        self.engines = Some(engines.into());
        self
    }

    pub fn with_visit(mut self, visit: bool) -> Self {
        self.visit = visit;
        self
    }

    pub fn with_truncate(mut self, max_chars: usize) -> Self {
        self.truncate = Some(max_chars);
        self
    }
}

/// A search backend behind the tool-call boundary.
#[async_trait]
pub trait SearchProvider: Send + Sync {
    /// Provider name.
    fn name(&self) -> &str;

    /// Runs the request. Failures are reported through `success`.
    async fn search(&self, request: &SearchRequest) -> SearchResponse;
}

/// Browser-driven provider with multi-engine fallback.
///
/// Engines are tried in order; the first returning any result wins.
pub struct LocalSearch {
    search: BrowserSearch,
    settings: Settings,
}

impl LocalSearch {
    /// Creates a provider from settings, attaching to
    /// `ws_endpoint` when set and launching a local browser otherwise.
    pub fn new(settings: Settings) -> Self {
        let browser: Arc<dyn BrowserController> = match &settings.ws_endpoint {
            Some(endpoint) => Arc::new(RemoteBrowser::new(RemoteOptions::with_ws_endpoint(
                endpoint.clone(),
            ))),
            None => Arc::new(LocalBrowser::new()),
        };
        Self::with_browser(browser, settings)
    }

    /// Creates a provider over an existing browser controller.
    pub fn with_browser(browser: Arc<dyn BrowserController>, settings: Settings) -> Self {
        let search = BrowserSearch::with_config(browser, settings.browser_config());
        Self { search, settings }
    }

    /// Returns the settings.
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    async fn try_search(&self, request: &SearchRequest) -> Result<Vec<SearchResult>> {
        let list = request.engines.as_deref().unwrap_or(&self.settings.engines);
        let engines = engine_kinds(list);
        if engines.is_empty() {
            return Err(SearchError::NoEngines);
        }

        let limit = request.limit.filter(|&l| l > 0).unwrap_or(self.settings.limit);

        for engine in engines {
            let mut options = SearchOptions::new(request.query.as_str())
                .with_engine(engine)
                .with_count(limit)
                .with_visit(request.visit)
                .with_keep_browser_open(true);
            if let Some(max_chars) = request.truncate {
                options = options.with_truncate(max_chars);
            }

            let mut results = self.search.try_perform(options).await?;
            if results.is_empty() {
                debug!("{} returned no results, trying next engine", engine);
                continue;
            }

            results.truncate(limit);
            info!("{} returned {} results", engine, results.len());
            return Ok(results);
        }

        Ok(Vec::new())
    }
}

#[async_trait]
impl SearchProvider for LocalSearch {
    fn name(&self) -> &str {
        "local"
    }

    async fn search(&self, request: &SearchRequest) -> SearchResponse {
        let outcome = self.try_search(request).await;

        if let Err(e) = self.search.close_browser().await {
            warn!("Failed to close browser: {}", e);
        }

        match outcome {
            Ok(results) => SearchResponse::ok(results),
            Err(e) => {
                error!("Local search failed: {}", e);
                SearchResponse::failed()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_request_builder() {
        let request = SearchRequest::new("rust")
            .with_limit(3)
            .with_engines("bing,google")
            .with_visit(true)
            .with_truncate(500);
        assert_eq!(request.query, "rust");
        assert_eq!(request.limit, Some(3));
        assert_eq!(request.engines.as_deref(), Some("bing,google"));
        assert!(request.visit);
        assert_eq!(request.truncate, Some(500));
    }

    #[test]
    fn test_search_request_deserialize_minimal() {
        let request: SearchRequest = serde_json::from_str(r#"{"query": "golang"}"#).unwrap();
        assert_eq!(request, SearchRequest::new("golang"));
    }

    #[tokio::test]
    async fn test_unknown_engines_fail_without_launching() {
        let provider = LocalSearch::with_browser(Arc::new(LocalBrowser::new()), Settings::default());
        let response = provider
            .search(&SearchRequest::new("rust").with_engines("altavista"))
            .await;
        assert!(!response.success);
        assert!(response.results.is_empty());
        assert_eq!(provider.name(), "local");
    }
}
