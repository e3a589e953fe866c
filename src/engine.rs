//! Search engine adapter trait and shared extraction helpers.

use std::fmt;
use std::str::FromStr;

use scraper::{ElementRef, Selector};
use serde::{Deserialize, Serialize};

use crate::engines::{Baidu, Bing, Google, Sogou};
use crate::{Result, SearchError, SearchResult};

/// Default number of results requested from an engine.
pub const DEFAULT_RESULT_COUNT: usize = 10;

/// The supported engines.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineKind {
    #[default]
    Bing,
    Google,
    Baidu,
    Sogou,
}

impl EngineKind {
    /// Every engine, in fallback order.
    pub const ALL: [EngineKind; 4] = [
        EngineKind::Bing,
        EngineKind::Google,
        EngineKind::Baidu,
        EngineKind::Sogou,
    ];

    /// Lowercase identifier.
    pub fn as_str(&self) -> &'static str {
        match self {
            EngineKind::Bing => "bing",
            EngineKind::Google => "google",
            EngineKind::Baidu => "baidu",
            EngineKind::Sogou => "sogou",
        }
    }

    /// Returns the adapter for this engine.
    pub fn adapter(&self) -> Box<dyn Engine> {
        match self {
            EngineKind::Bing => Box::new(Bing::new()),
            EngineKind::Google => Box::new(Google::new()),
            EngineKind::Baidu => Box::new(Baidu::new()),
            EngineKind::Sogou => Box::new(Sogou::new()),
        }
    }

    /// Parses a comma-separated engine list. `all` expands to every engine.
    /// Unknown names are reported as errors.
    pub fn parse_list(list: &str) -> Vec<std::result::Result<EngineKind, SearchError>> {
        let mut out = Vec::new();
        for name in list.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            if name.eq_ignore_ascii_case("all") {
                out.extend(EngineKind::ALL.iter().copied().map(Ok));
            } else {
                out.push(name.parse());
            }
        }
        out
    }
}

impl fmt::Display for EngineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EngineKind {
    type Err = SearchError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "bing" => Ok(EngineKind::Bing),
            "google" => Ok(EngineKind::Google),
            "baidu" => Ok(EngineKind::Baidu),
            "sogou" => Ok(EngineKind::Sogou),
            _ => Err(SearchError::UnknownEngine(s.to_string())),
        }
    }
}

/// Static description of an engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Display name of the engine.
    pub name: String,
    /// Base URL of the results page.
    pub base_url: String,
    /// Query-string parameter carrying the query.
    pub query_param: String,
    /// Query-string parameter carrying the result count.
    pub count_param: String,
}

/// Options applied when building a search URL.
#[derive(Debug, Clone, Default)]
pub struct SearchUrlOptions {
    /// Results to request. Engine default when `None`.
    pub count: Option<usize>,
    /// Domains excluded with `-site:` operators.
    pub exclude_domains: Vec<String>,
}

/// A search engine adapter: builds result-page URLs and reads result stubs
/// out of result-page HTML.
pub trait Engine: Send + Sync {
    /// Returns the engine configuration.
    fn config(&self) -> &EngineConfig;

    /// Which engine this is.
    fn kind(&self) -> EngineKind;

    /// Extracts result stubs from a results page, in document order.
    ///
    /// Records without a title or with an unparseable URL are skipped.
    fn extract_results(&self, html: &str) -> Result<Vec<SearchResult>>;

    /// CSS selector present once the results DOM is final.
    fn ready_selector(&self) -> Option<&str> {
        None
    }

    /// Builds the results-page URL.
    fn search_url(&self, query: &str, options: &SearchUrlOptions) -> String {
        let config = self.config();
        let count = options.count.unwrap_or(DEFAULT_RESULT_COUNT).to_string();
        let params = url::form_urlencoded::Serializer::new(String::new())
            .append_pair(
                &config.query_param,
                &query_with_exclusions(query, &options.exclude_domains),
            )
            .append_pair(&config.count_param, &count)
            .finish();
        format!("{}?{}", config.base_url, params)
    }

    /// Returns the engine name.
    fn name(&self) -> &str {
        &self.config().name
    }
}

/// Prefixes `-site:` tokens for each excluded domain.
pub fn query_with_exclusions(query: &str, exclude_domains: &[String]) -> String {
    let exclusions = exclude_domains
        .iter()
        .map(|d| d.trim())
        .filter(|d| !d.is_empty())
        .map(|d| format!("-site:{}", d))
        .collect::<Vec<_>>()
        .join(" ");
    if exclusions.is_empty() {
        query.to_string()
    } else {
        format!("{} {}", exclusions, query)
    }
}

/// Whether `url` parses as an absolute URL.
pub fn is_valid_url(url: &str) -> bool {
    url::Url::parse(url).is_ok()
}

/// Parses a CSS selector.
pub(crate) fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| SearchError::Parse(format!("Failed to parse selector: {:?}", e)))
}

/// Collapses runs of whitespace to single spaces and trims.
pub(crate) fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Every element under `root` matching one of `selectors`.
pub(crate) fn excluded_nodes<'a>(root: ElementRef<'a>, selectors: &[&Selector]) -> Vec<ElementRef<'a>> {
    selectors
        .iter()
        .flat_map(|sel| root.select(sel))
        .collect()
}

fn collect_text<'a>(element: ElementRef<'a>, excluded: &[ElementRef<'a>], out: &mut String) {
    for child in element.children() {
        if let Some(text) = child.value().as_text() {
            out.push_str(text);
        } else if let Some(el) = ElementRef::wrap(child) {
            if !excluded.contains(&el) {
                collect_text(el, excluded, out);
            }
        }
    }
}

/// Text content of `element`, skipping excluded subtrees.
pub(crate) fn visible_text<'a>(element: ElementRef<'a>, excluded: &[ElementRef<'a>]) -> String {
    let mut out = String::new();
    if !excluded.contains(&element) {
        collect_text(element, excluded, &mut out);
    }
    out
}

fn collect_elements<'a>(
    element: ElementRef<'a>,
    excluded: &[ElementRef<'a>],
    out: &mut Vec<ElementRef<'a>>,
) {
    for child in element.children() {
        if let Some(el) = ElementRef::wrap(child) {
            if excluded.contains(&el) {
                continue;
            }
            out.push(el);
            collect_elements(el, excluded, out);
        }
    }
}

/// Builds a snippet from every descendant element's text, skipping
/// fragments that contain or are contained in one already taken.
pub(crate) fn dedup_snippet<'a>(root: ElementRef<'a>, excluded: &[ElementRef<'a>]) -> String {
    let mut elements = Vec::new();
    collect_elements(root, excluded, &mut elements);

    let mut parts: Vec<String> = Vec::new();
    for element in elements {
        let text = visible_text(element, excluded);
        let text = text.trim();
        if text.is_empty() {
            continue;
        }
        if parts
            .iter()
            .any(|p| p.contains(text) || text.contains(p.as_str()))
        {
            continue;
        }
        parts.push(text.to_string());
    }
    collapse_whitespace(&parts.join(" "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use scraper::Html;

    #[test]
    fn test_engine_kind_from_str() {
        assert_eq!("bing".parse::<EngineKind>().unwrap(), EngineKind::Bing);
        assert_eq!("Google".parse::<EngineKind>().unwrap(), EngineKind::Google);
        assert_eq!(" baidu ".parse::<EngineKind>().unwrap(), EngineKind::Baidu);
        assert_eq!("SOGOU".parse::<EngineKind>().unwrap(), EngineKind::Sogou);
        let err = "yahoo".parse::<EngineKind>().unwrap_err();
        assert!(matches!(err, SearchError::UnknownEngine(_)));
    }

    #[test]
    fn test_engine_kind_default_is_bing() {
        assert_eq!(EngineKind::default(), EngineKind::Bing);
    }

    #[test]
    fn test_engine_kind_display_roundtrip() {
        for kind in EngineKind::ALL {
            assert_eq!(kind.to_string().parse::<EngineKind>().unwrap(), kind);
            assert_eq!(kind.adapter().kind(), kind);
        }
    }

    #[test]
    fn test_engine_kind_serde() {
        let json = serde_json::to_string(&EngineKind::Sogou).unwrap();
        assert_eq!(json, "\"sogou\"");
    }

    #[test]
    fn test_parse_list_all() {
        let kinds: Vec<_> = EngineKind::parse_list("all")
            .into_iter()
            .map(|r| r.unwrap())
            .collect();
        assert_eq!(kinds, EngineKind::ALL.to_vec());
    }

    #[test]
    fn test_parse_list_mixed() {
        let parsed = EngineKind::parse_list("google, nope,,baidu");
        assert_eq!(parsed.len(), 3);
        assert_eq!(*parsed[0].as_ref().unwrap(), EngineKind::Google);
        assert!(parsed[1].is_err());
        assert_eq!(*parsed[2].as_ref().unwrap(), EngineKind::Baidu);
    }

    #[test]
    fn test_query_with_exclusions() {
        assert_eq!(query_with_exclusions("golang", &[]), "golang");
        assert_eq!(
            query_with_exclusions(
                "golang",
                &["wikipedia.org".to_string(), "example.com".to_string()]
            ),
            "-site:wikipedia.org -site:example.com golang"
        );
    }

    #[test]
    fn test_is_valid_url() {
        assert!(is_valid_url("https://example.com/a?b=c"));
        assert!(!is_valid_url("/relative/path"));
        assert!(!is_valid_url("not a url"));
        assert!(!is_valid_url(""));
    }

    #[test]
    fn test_collapse_whitespace() {
        assert_eq!(collapse_whitespace("  a \n\t b  c "), "a b c");
    }

    #[test]
    fn test_dedup_snippet_skips_nested_duplicates() {
        let html = Html::parse_fragment(
            r#"<div id="r"><h2>Title</h2><div class="cap"><p>Alpha beta</p></div><span>Gamma</span><cite>x.com</cite></div>"#,
        );
        let root = html.select(&selector("#r").unwrap()).next().unwrap();
        let h2 = selector("h2").unwrap();
        let cite = selector("cite").unwrap();
        let excluded = excluded_nodes(root, &[&h2, &cite]);
        assert_eq!(dedup_snippet(root, &excluded), "Alpha beta Gamma");
    }

    #[test]
    fn test_visible_text_skips_excluded() {
        let html = Html::parse_fragment(r#"<div id="r">keep <b class="ad">drop</b> this</div>"#);
        let root = html.select(&selector("#r").unwrap()).next().unwrap();
        let ad = selector(".ad").unwrap();
        let excluded = excluded_nodes(root, &[&ad]);
        assert_eq!(collapse_whitespace(&visible_text(root, &excluded)), "keep this");
    }
}
