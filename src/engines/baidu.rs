//! Baidu search engine adapter.

use scraper::Html;

use crate::engine::{collapse_whitespace, is_valid_url, selector};
use crate::{Engine, EngineConfig, EngineKind, Result, SearchResult};

/// Baidu search engine (百度).
pub struct Baidu {
    config: EngineConfig,
}

impl Baidu {
    /// Creates a new Baidu engine.
    pub fn new() -> Self {
        Self {
            config: EngineConfig {
                name: "Baidu".to_string(),
                base_url: "https://www.baidu.com/s".to_string(),
                query_param: "wd".to_string(),
                count_param: "rn".to_string(),
            },
        }
    }

    fn parse_results(&self, html: &str) -> Result<Vec<SearchResult>> {
        let document = Html::parse_document(html);

        let result_selector = selector(".result")?;
        let title_selector = selector(".t a")?;
        let snippet_selector = selector(".c-span-last .content-right_2s-H4")?;

        let mut results = Vec::new();

        for element in document.select(&result_selector) {
            let Some(title_elem) = element.select(&title_selector).next() else {
                continue;
            };

            let title = collapse_whitespace(&title_elem.text().collect::<String>());
            // Baidu links are redirects through baidu.com/link; they are kept as-is.
            let url = title_elem.value().attr("href").unwrap_or_default().trim();

            if title.is_empty() || !is_valid_url(url) {
                continue;
            }

            let snippet = element
                .select(&snippet_selector)
                .next()
                .map(|el| collapse_whitespace(&el.text().collect::<String>()))
                .unwrap_or_default();

            results.push(SearchResult::new(title, url, snippet).with_engine(self.kind().as_str()));
        }

        Ok(results)
    }
}

impl Default for Baidu {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine for Baidu {
    fn config(&self) -> &EngineConfig {
        &self.config
    }

    fn kind(&self) -> EngineKind {
        EngineKind::Baidu
    }

    fn extract_results(&self, html: &str) -> Result<Vec<SearchResult>> {
        self.parse_results(html)
    }

    fn ready_selector(&self) -> Option<&str> {
        Some("#page")
    }
}
