//! Google search engine adapter.

use scraper::Html;

use crate::engine::{dedup_snippet, excluded_nodes, is_valid_url, selector};
use crate::{Engine, EngineConfig, EngineKind, Result, SearchResult};

/// Google web search.
pub struct Google {
    config: EngineConfig,
}

impl Google {
    /// Creates a new Google engine.
    pub fn new() -> Self {
        Self {
            config: EngineConfig {
                name: "Google".to_string(),
                base_url: "https://www.google.com/search".to_string(),
                query_param: "q".to_string(),
                count_param: "num".to_string(),
            },
        }
    }

    fn parse_results(&self, html: &str) -> Result<Vec<SearchResult>> {
        let document = Html::parse_document(html);

        let container_selector = selector("div.g")?;
        let title_selector = selector("h3")?;
        let link_selector = selector("a[href]")?;
        let cite_selector = selector("cite")?;
        let script_selector = selector("script, style")?;

        let mut results = Vec::new();

        for element in document.select(&container_selector) {
            let title = match element.select(&title_selector).next() {
                Some(el) => el.text().collect::<String>().trim().to_string(),
                None => continue,
            };

            let url = match element
                .select(&link_selector)
                .next()
                .and_then(|el| el.value().attr("href"))
                .and_then(resolve_href)
            {
                Some(url) => url,
                None => continue,
            };

            if title.is_empty() {
                continue;
            }

            let excluded = excluded_nodes(
                element,
                &[&title_selector, &cite_selector, &script_selector],
            );
            let snippet = dedup_snippet(element, &excluded);

            results.push(SearchResult::new(title, url, snippet).with_engine(self.kind().as_str()));
        }

        Ok(results)
    }
}

/// Unwraps `/url?q=` redirects and rejects Google's internal links.
fn resolve_href(href: &str) -> Option<String> {
    let target = if let Some(rest) = href.strip_prefix("/url?q=") {
        let encoded = rest.split('&').next().unwrap_or(rest);
        urlencoding::decode(encoded).ok()?.into_owned()
    } else {
        href.to_string()
    };
    is_valid_url(&target).then_some(target)
}

impl Default for Google {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine for Google {
    fn config(&self) -> &EngineConfig {
        &self.config
    }

    fn kind(&self) -> EngineKind {
        EngineKind::Google
    }

    fn extract_results(&self, html: &str) -> Result<Vec<SearchResult>> {
        self.parse_results(html)
    }

    fn ready_selector(&self) -> Option<&str> {
        Some("#search")
    }
}
