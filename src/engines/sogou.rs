//! Sogou search engine adapter.

use scraper::Html;

use crate::engine::{collapse_whitespace, excluded_nodes, is_valid_url, selector, visible_text};
use crate::{Engine, EngineConfig, EngineKind, Result, SearchResult};

const ORIGIN: &str = "https://www.sogou.com";

/// Snippet sources, concatenated in this order.
const SNIPPET_SELECTORS: &[&str] = &[".star-wiki", ".fz-mid", ".attribute-centent"];

/// Operator and advertisement nodes dropped before reading snippets.
const SNIPPET_EXCLUDED: &[&str] = &[".text-lightgray", ".zan-box", ".tag-website"];

/// Sogou search engine (搜狗).
pub struct Sogou {
    config: EngineConfig,
}

impl Sogou {
    /// Creates a new Sogou engine.
    pub fn new() -> Self {
        Self {
            config: EngineConfig {
                name: "Sogou".to_string(),
                base_url: format!("{}/web", ORIGIN),
                query_param: "query".to_string(),
                count_param: "num".to_string(),
            },
        }
    }

    fn parse_results(&self, html: &str) -> Result<Vec<SearchResult>> {
        let document = Html::parse_document(html);

        let result_selector = selector(".results .vrwrap")?;
        let title_selector = selector(".vr-title")?;
        let link_selector = selector(".vr-title > a")?;
        let snippet_selectors = SNIPPET_SELECTORS
            .iter()
            .map(|css| selector(css))
            .collect::<Result<Vec<_>>>()?;
        let excluded_selectors = SNIPPET_EXCLUDED
            .iter()
            .map(|css| selector(css))
            .collect::<Result<Vec<_>>>()?;
        let excluded_refs: Vec<_> = excluded_selectors.iter().collect();

        let mut results = Vec::new();

        for element in document.select(&result_selector) {
            let title = element
                .select(&title_selector)
                .next()
                .map(|el| collapse_whitespace(&el.text().collect::<String>()))
                .unwrap_or_default();

            let href = element
                .select(&link_selector)
                .next()
                .and_then(|el| el.value().attr("href"))
                .unwrap_or_default()
                .trim();
            if href.is_empty() {
                continue;
            }
            let url = absolutize(href);
            if !is_valid_url(&url) || title.is_empty() {
                continue;
            }

            let excluded = excluded_nodes(element, &excluded_refs);
            let snippet = snippet_selectors
                .iter()
                .filter_map(|sel| element.select(sel).next())
                .map(|el| visible_text(el, &excluded).trim().to_string())
                .collect::<String>();

            results.push(SearchResult::new(title, url, snippet).with_engine(self.kind().as_str()));
        }

        Ok(results)
    }
}

/// Sogou emits relative result links; they are rebased onto its origin.
fn absolutize(href: &str) -> String {
    if href.contains("http") {
        href.to_string()
    } else {
        format!("{}{}", ORIGIN, href)
    }
}

impl Default for Sogou {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine for Sogou {
    fn config(&self) -> &EngineConfig {
        &self.config
    }

    fn kind(&self) -> EngineKind {
        EngineKind::Sogou
    }

    fn extract_results(&self, html: &str) -> Result<Vec<SearchResult>> {
        self.parse_results(html)
    }

    fn ready_selector(&self) -> Option<&str> {
        Some("#pagebar_container")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::SearchUrlOptions;

    #[test]
    fn test_sogou_new() {
        let engine = Sogou::new();
        assert_eq!(engine.name(), "Sogou");
        assert_eq!(engine.kind(), EngineKind::Sogou);
        assert_eq!(engine.ready_selector(), Some("#pagebar_container"));
    }

    #[test]
    fn test_sogou_search_url() {
        let url = Sogou::new().search_url(
            "golang",
            &SearchUrlOptions {
                count: Some(3),
                exclude_domains: vec!["wikipedia.org".to_string()],
            },
        );
        assert_eq!(
            url,
            "https://www.sogou.com/web?query=-site%3Awikipedia.org+golang&num=3"
        );
    }

    #[test]
    fn test_absolutize() {
        assert_eq!(
            absolutize("/link?url=abc"),
            "https://www.sogou.com/link?url=abc"
        );
        assert_eq!(absolutize("https://example.com/"), "https://example.com/");
    }

    #[test]
    fn test_parse_results_empty() {
        let results = Sogou::new()
            .extract_results("<html><body></body></html>")
            .unwrap();
        assert!(results.is_empty());
    }

    #[test]
    fn test_parse_results_rebases_and_strips_operators() {
        let html = r#"
            <html><body>
            <div class="results">
                <div class="vrwrap">
                    <h3 class="vr-title"><a href="/link?url=abc">搜狗百科：Go 语言</a></h3>
                    <div class="star-wiki">Go 是一种静态强类型语言。<span class="text-lightgray">2024-01-01</span></div>
                    <p class="fz-mid">由 Google 开发。<span class="zan-box">赞 12</span></p>
                    <div class="tag-website">广告</div>
                </div>
                <div class="vrwrap">
                    <h3 class="vr-title"><a href="https://go.dev/">The Go Programming Language</a></h3>
                    <div class="attribute-centent">Build simple, secure, scalable systems.</div>
                </div>
                <div class="vrwrap">
                    <h3 class="vr-title"><a href="https://no-title.example.com/"> </a></h3>
                </div>
                <div class="vrwrap">
                    <h3 class="vr-title">No link</h3>
                </div>
            </div>
            <div id="pagebar_container"></div>
            </body></html>
        "#;
        let results = Sogou::new().extract_results(html).unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].title, "搜狗百科：Go 语言");
        assert_eq!(results[0].url, "https://www.sogou.com/link?url=abc");
        assert_eq!(results[0].snippet, "Go 是一种静态强类型语言。由 Google 开发。");
        assert_eq!(results[1].url, "https://go.dev/");
        assert_eq!(results[1].snippet, "Build simple, secure, scalable systems.");
    }
}
