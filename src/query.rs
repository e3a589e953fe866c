//! Search options for one orchestration call.

use serde::{Deserialize, Serialize};

use crate::engine::EngineKind;

/// Minimum number of results requested per query when a total count is split.
pub const MIN_PER_QUERY_COUNT: usize = 3;

/// Default number of concurrent page visits.
pub const DEFAULT_CONCURRENCY: usize = 15;

/// Options for [`BrowserSearch::perform`](crate::BrowserSearch::perform).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchOptions {
    /// One or more query strings. All run concurrently.
    pub queries: Vec<String>,
    /// Total result budget across all queries.
    pub count: Option<usize>,
    /// Maximum concurrent page visits.
    pub concurrency: Option<usize>,
    /// Domains excluded via `-site:` operators.
    pub exclude_domains: Vec<String>,
    /// Maximum characters of content kept per visited result.
    pub truncate: Option<usize>,
    /// Leave the browser session open after the call.
    pub keep_browser_open: bool,
    /// Engine override. Falls back to the orchestrator's default engine.
    pub engine: Option<EngineKind>,
    /// Visit each result page and extract its content.
    pub need_visited_urls: bool,
}

impl SearchOptions {
    /// Creates options for a single query.
    pub fn new(query: impl Into<String>) -> Self {
        Self::with_queries(vec![query.into()])
    }

    /// Creates options for several queries.
    pub fn with_queries(queries: Vec<String>) -> Self {
        Self {
            queries,
            count: None,
            concurrency: None,
            exclude_domains: Vec::new(),
            truncate: None,
            keep_browser_open: false,
            engine: None,
            need_visited_urls: false,
        }
    }

    /// Sets the total result budget.
    pub fn with_count(mut self, count: usize) -> Self {
        self.count = Some(count);
        self
    }

    /// Sets the page-visit concurrency.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = Some(concurrency);
        self
    }

    /// Sets the excluded domains.
    pub fn with_exclude_domains(mut self, domains: Vec<String>) -> Self {
        self.exclude_domains = domains;
        self
    }

    /// Caps visited content at `max_chars` characters.
    pub fn with_truncate(mut self, max_chars: usize) -> Self {
        self.truncate = Some(max_chars);
        self
    }

    /// Keeps the browser open after the call returns.
    pub fn with_keep_browser_open(mut self, keep: bool) -> Self {
        self.keep_browser_open = keep;
        self
    }

    /// Selects the engine.
    pub fn with_engine(mut self, engine: EngineKind) -> Self {
        self.engine = Some(engine);
        self
    }

    /// Enables page visits and content extraction.
    pub fn with_visit(mut self, visit: bool) -> Self {
        self.need_visited_urls = visit;
        self
    }

    /// Per-query result budget: the total split evenly, never below three.
    ///
    /// `None` lets each engine use its own default.
    pub fn per_query_count(&self) -> Option<usize> {
        let n = self.queries.len().max(1);
        self.count
            .filter(|&c| c > 0)
            .map(|c| (c / n).max(MIN_PER_QUERY_COUNT))
    }

    /// Effective page-visit concurrency.
    pub fn effective_concurrency(&self) -> usize {
        self.concurrency
            .filter(|&c| c > 0)
            .unwrap_or(DEFAULT_CONCURRENCY)
    }

    /// Queries with surrounding whitespace removed, blanks dropped.
    pub fn normalized_queries(&self) -> Vec<String> {
        self.queries
            .iter()
            .map(|q| q.trim())
            .filter(|q| !q.is_empty())
            .map(str::to_string)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_options_new() {
        let opts = SearchOptions::new("rust ownership");
        assert_eq!(opts.queries, vec!["rust ownership"]);
        assert!(opts.count.is_none());
        assert!(opts.concurrency.is_none());
        assert!(opts.exclude_domains.is_empty());
        assert!(opts.truncate.is_none());
        assert!(!opts.keep_browser_open);
        assert!(opts.engine.is_none());
        assert!(!opts.need_visited_urls);
    }

    #[test]
    fn test_search_options_builder_chain() {
        let opts = SearchOptions::new("golang")
            .with_count(5)
            .with_concurrency(2)
            .with_exclude_domains(vec!["wikipedia.org".to_string()])
            .with_truncate(1000)
            .with_keep_browser_open(true)
            .with_engine(EngineKind::Baidu)
            .with_visit(true);
        assert_eq!(opts.count, Some(5));
        assert_eq!(opts.concurrency, Some(2));
        assert_eq!(opts.exclude_domains, vec!["wikipedia.org"]);
        assert_eq!(opts.truncate, Some(1000));
        assert!(opts.keep_browser_open);
        assert_eq!(opts.engine, Some(EngineKind::Baidu));
        assert!(opts.need_visited_urls);
    }

    #[test]
    fn test_per_query_count_single_query() {
        let opts = SearchOptions::new("q").with_count(10);
        assert_eq!(opts.per_query_count(), Some(10));
    }

    #[test]
    fn test_per_query_count_split_evenly() {
        let opts =
            SearchOptions::with_queries(vec!["a".into(), "b".into()]).with_count(10);
        assert_eq!(opts.per_query_count(), Some(5));
    }

    #[test]
    fn test_per_query_count_floor_of_three() {
        let opts = SearchOptions::with_queries(vec!["a".into(), "b".into(), "c".into()])
            .with_count(4);
        assert_eq!(opts.per_query_count(), Some(3));
    }

    #[test]
    fn test_per_query_count_unset() {
        let opts = SearchOptions::new("q");
        assert_eq!(opts.per_query_count(), None);
    }

    #[test]
    fn test_effective_concurrency_default() {
        assert_eq!(SearchOptions::new("q").effective_concurrency(), 15);
        assert_eq!(
            SearchOptions::new("q").with_concurrency(0).effective_concurrency(),
            15
        );
        assert_eq!(
            SearchOptions::new("q").with_concurrency(4).effective_concurrency(),
            4
        );
    }

    #[test]
    fn test_normalized_queries_drops_blanks() {
        let opts = SearchOptions::with_queries(vec![" rust ".into(), "  ".into(), "go".into()]);
        assert_eq!(opts.normalized_queries(), vec!["rust", "go"]);
    }
}
