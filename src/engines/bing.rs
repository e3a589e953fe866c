//! Bing search engine adapter.

use scraper::Html;

use crate::engine::{dedup_snippet, excluded_nodes, is_valid_url, selector};
use crate::{Engine, EngineConfig, EngineKind, Result, SearchResult};

/// Bing web search.
pub struct Bing {
    config: EngineConfig,
}

impl Bing {
    /// Creates a new Bing engine.
    pub fn new() -> Self {
        Self {
            config: EngineConfig {
                name: "Bing".to_string(),
                base_url: "https://www.bing.com/search".to_string(),
                query_param: "q".to_string(),
                count_param: "count".to_string(),
            },
        }
    }

    fn parse_results(&self, html: &str) -> Result<Vec<SearchResult>> {
        let document = Html::parse_document(html);

        let container_selector = selector(".b_algo")?;
        let title_selector = selector("h2")?;
        let link_selector = selector("h2 a")?;
        let attribution_selector = selector(".b_attribution")?;
        let script_selector = selector("script, style")?;

        let mut results = Vec::new();

        for element in document.select(&container_selector) {
            let title = element
                .select(&title_selector)
                .next()
                .map(|el| el.text().collect::<String>().trim().to_string())
                .unwrap_or_default();

            let url = match element
                .select(&link_selector)
                .next()
                .and_then(|el| el.value().attr("href"))
            {
                Some(href) if is_valid_url(href) => href.to_string(),
                _ => continue,
            };

            if title.is_empty() {
                continue;
            }

            let excluded = excluded_nodes(
                element,
                &[&title_selector, &attribution_selector, &script_selector],
            );
            let snippet = dedup_snippet(element, &excluded);

            results.push(SearchResult::new(title, url, snippet).with_engine(self.kind().as_str()));
        }

        Ok(results)
    }
}

impl Default for Bing {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine for Bing {
    fn config(&self) -> &EngineConfig {
        &self.config
    }

    fn kind(&self) -> EngineKind {
        EngineKind::Bing
    }

    fn extract_results(&self, html: &str) -> Result<Vec<SearchResult>> {
        self.parse_results(html)
    }

    fn ready_selector(&self) -> Option<&str> {
        Some("#b_results")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::SearchUrlOptions;

    fn result_block(n: usize) -> String {
        format!(
            r#"<li class="b_algo">
                <h2><a href="https://example.com/rust/{n}">Rust ownership {n}</a></h2>
                <div class="b_caption">
                    <div class="b_attribution"><cite>example.com/rust/{n}</cite></div>
                    <p>Ownership is a set of rules that govern memory, part {n}.</p>
                </div>
                <script>var tracking = {n};</script>
            </li>"#
        )
    }

    #[test]
    fn test_bing_new() {
        let engine = Bing::new();
        assert_eq!(engine.name(), "Bing");
        assert_eq!(engine.kind(), EngineKind::Bing);
        assert_eq!(engine.ready_selector(), Some("#b_results"));
    }

    #[test]
    fn test_bing_search_url() {
        let engine = Bing::new();
        let url = engine.search_url(
            "rust ownership model",
            &SearchUrlOptions {
                count: Some(5),
                exclude_domains: Vec::new(),
            },
        );
        assert_eq!(url, "https://www.bing.com/search?q=rust+ownership+model&count=5");
    }

    #[test]
    fn test_bing_search_url_default_count() {
        let url = Bing::new().search_url("rust", &SearchUrlOptions::default());
        assert_eq!(url, "https://www.bing.com/search?q=rust&count=10");
    }

    #[test]
    fn test_bing_search_url_excludes_domains() {
        let url = Bing::new().search_url(
            "golang",
            &SearchUrlOptions {
                count: None,
                exclude_domains: vec!["wikipedia.org".to_string()],
            },
        );
        let parsed = url::Url::parse(&url).unwrap();
        let q = parsed
            .query_pairs()
            .find(|(k, _)| k == "q")
            .map(|(_, v)| v.into_owned())
            .unwrap();
        assert!(q.starts_with("-site:wikipedia.org golang"));
    }

    #[test]
    fn test_parse_results_empty_html() {
        let results = Bing::new()
            .extract_results("<html><body></body></html>")
            .unwrap();
        assert!(results.is_empty());
    }

    #[test]
    fn test_parse_results_five_in_dom_order() {
        let blocks: String = (1..=5).map(result_block).collect();
        let html = format!(
            r#"<html><body><ol id="b_results">{}</ol></body></html>"#,
            blocks
        );
        let results = Bing::new().extract_results(&html).unwrap();
        assert_eq!(results.len(), 5);
        for (i, result) in results.iter().enumerate() {
            let n = i + 1;
            assert_eq!(result.title, format!("Rust ownership {}", n));
            assert_eq!(result.url, format!("https://example.com/rust/{}", n));
            assert_eq!(
                result.snippet,
                format!("Ownership is a set of rules that govern memory, part {}.", n)
            );
            assert!(result.content.is_empty());
            assert_eq!(result.engine.as_deref(), Some("bing"));
        }
    }

    #[test]
    fn test_parse_results_drops_missing_title_and_bad_href() {
        let html = r#"
            <html><body><ol id="b_results">
                <li class="b_algo">
                    <h2><a href="https://good.example.com/">Good result</a></h2>
                    <p>Kept.</p>
                </li>
                <li class="b_algo">
                    <h2><a href="https://untitled.example.com/"></a></h2>
                    <p>No title.</p>
                </li>
                <li class="b_algo">
                    <h2><a href="/relative/only">Relative link</a></h2>
                    <p>Bad href.</p>
                </li>
                <li class="b_algo">
                    <h2><a href="not a url">Malformed</a></h2>
                </li>
                <li class="b_algo">
                    <h2>No link at all</h2>
                </li>
            </ol></body></html>
        "#;
        let results = Bing::new().extract_results(html).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].title, "Good result");
        assert_eq!(results[0].url, "https://good.example.com/");
        assert_eq!(results[0].snippet, "Kept.");
    }
}
