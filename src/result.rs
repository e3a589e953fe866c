//! Search result types.

use serde::{Deserialize, Serialize};

/// A single search result.
///
/// Engine adapters produce unvisited results (stubs) whose `content` is
/// empty. After a page visit `content` holds the page's main content
/// rendered as Markdown.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResult {
    /// Result title.
    pub title: String,
    /// Absolute result URL.
    pub url: String,
    /// Snippet shown on the engine's results page.
    pub snippet: String,
    /// Main page content as Markdown. Empty until the page is visited.
    pub content: String,
    /// Hostname of `url`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    /// Engine that surfaced this result.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub engine: Option<String>,
}

impl SearchResult {
    /// Creates a new unvisited result.
    pub fn new(title: impl Into<String>, url: impl Into<String>, snippet: impl Into<String>) -> Self {
        let url = url.into();
        let source = url::Url::parse(&url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string));
        Self {
            title: title.into(),
            url,
            snippet: snippet.into(),
            content: String::new(),
            source,
            engine: None,
        }
    }

    /// Records the engine that produced this result.
    pub fn with_engine(mut self, engine: impl Into<String>) -> Self {
        self.engine = Some(engine.into());
        self
    }

    /// Sets the Markdown content.
    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = content.into();
        self
    }

    /// Whether the result has been enriched with page content.
    pub fn is_visited(&self) -> bool {
        !self.content.is_empty()
    }

    /// Caps `content` at `max_chars` characters. Not word-aware.
    pub fn truncate_content(&mut self, max_chars: usize) {
        if let Some((idx, _)) = self.content.char_indices().nth(max_chars) {
            self.content.truncate(idx);
        }
    }

    /// Returns a normalized URL for deduplication. See [`normalize_url`].
    pub fn normalized_url(&self) -> String {
        normalize_url(&self.url)
    }
}

/// Normalizes a URL for deduplication.
///
/// The scheme, a leading `www.`, the fragment and a trailing slash are
/// dropped and the host is lowercased. Path and query keep their case.
/// Unparseable input is only trimmed.
pub fn normalize_url(url: &str) -> String {
    let url = url.trim();
    let Ok(parsed) = url::Url::parse(url) else {
        return url.to_string();
    };
    let Some(host) = parsed.host_str() else {
        return url.to_string();
    };

    let mut key = host.strip_prefix("www.").unwrap_or(host).to_string();
    if let Some(port) = parsed.port() {
        key.push_str(&format!(":{}", port));
    }
    key.push_str(parsed.path().trim_end_matches('/'));
    if let Some(query) = parsed.query() {
        key.push('?');
        key.push_str(query);
    }
    key
}

/// Response shape returned across the tool-call boundary.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchResponse {
    /// Results, visited or not.
    pub results: Vec<SearchResult>,
    /// Whether the search ran. A failed search always has no results.
    pub success: bool,
}

impl SearchResponse {
    /// A successful response.
    pub fn ok(results: Vec<SearchResult>) -> Self {
        Self {
            results,
            success: true,
        }
    }

    /// A failed response with no results.
    pub fn failed() -> Self {
        Self {
            results: Vec::new(),
            success: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_result_new() {
        let result = SearchResult::new("Title", "https://example.com/page", "Snippet");
        assert_eq!(result.title, "Title");
        assert_eq!(result.url, "https://example.com/page");
        assert_eq!(result.snippet, "Snippet");
        assert!(result.content.is_empty());
        assert_eq!(result.source.as_deref(), Some("example.com"));
        assert!(result.engine.is_none());
        assert!(!result.is_visited());
    }

    #[test]
    fn test_search_result_invalid_url_has_no_source() {
        let result = SearchResult::new("Title", "not a url", "");
        assert!(result.source.is_none());
    }

    #[test]
    fn test_search_result_with_engine_and_content() {
        let result = SearchResult::new("t", "https://a.com", "s")
            .with_engine("bing")
            .with_content("# Heading");
        assert_eq!(result.engine.as_deref(), Some("bing"));
        assert!(result.is_visited());
    }

    #[test]
    fn test_truncate_content_by_chars() {
        let mut result = SearchResult::new("t", "https://a.com", "").with_content("héllo wörld");
        result.truncate_content(5);
        assert_eq!(result.content, "héllo");
    }

    #[test]
    fn test_truncate_content_shorter_than_limit() {
        let mut result = SearchResult::new("t", "https://a.com", "").with_content("short");
        result.truncate_content(100);
        assert_eq!(result.content, "short");
    }

    #[test]
    fn test_truncate_content_cjk() {
        let mut result = SearchResult::new("t", "https://a.com", "").with_content("搜索引擎结果");
        result.truncate_content(2);
        assert_eq!(result.content, "搜索");
    }

    #[test]
    fn test_normalized_url_lowercases_host_only() {
        let result = SearchResult::new("t", "https://Example.COM/Path/", "");
        assert_eq!(result.normalized_url(), "example.com/Path");
    }

    #[test]
    fn test_normalized_url_http_matches_https() {
        assert_eq!(
            normalize_url("http://example.com/a"),
            normalize_url("https://example.com/a/")
        );
    }

    #[test]
    fn test_normalized_url_drops_www_and_fragment() {
        assert_eq!(normalize_url("https://www.example.com/a#x"), "example.com/a");
        assert_eq!(normalize_url("https://example.com/"), "example.com");
    }

    #[test]
    fn test_normalized_url_keeps_path_and_query_case() {
        assert_ne!(
            normalize_url("https://example.com/Item?id=AbC"),
            normalize_url("https://example.com/item?id=abc")
        );
        assert_eq!(
            normalize_url("https://example.com:8080/s?q=Rust"),
            "example.com:8080/s?q=Rust"
        );
    }

    #[test]
    fn test_normalized_url_unparseable_is_trimmed() {
        assert_eq!(normalize_url("  not a url "), "not a url");
    }

    #[test]
    fn test_search_result_serialization_skips_empty_options() {
        let mut result = SearchResult::new("Title", "not a url", "Snippet");
        result.source = None;
        let json = serde_json::to_string(&result).unwrap();
        assert!(json.contains("\"title\":\"Title\""));
        assert!(!json.contains("source"));
        assert!(!json.contains("engine"));
    }

    #[test]
    fn test_search_response_failed() {
        let response = SearchResponse::failed();
        assert!(!response.success);
        assert!(response.results.is_empty());
        let json = serde_json::to_string(&response).unwrap();
        assert_eq!(json, r#"{"results":[],"success":false}"#);
    }

    #[test]
    fn test_search_response_ok() {
        let response = SearchResponse::ok(vec![SearchResult::new("t", "https://a.com", "")]);
        assert!(response.success);
        assert_eq!(response.results.len(), 1);
    }
}
