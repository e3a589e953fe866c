//! # a3s-browser-search
//!
//! Local, browser-driven web search with readable content extraction.
//!
//! This library drives a stealth-configured headless Chrome/Chromium to query
//! public search engines without any API key, with support for:
//!
//! - Per-engine result-page adapters (Bing, Google, Baidu, Sogou)
//! - Concurrent queries with cross-query URL deduplication
//! - Bounded-concurrency page visits
//! - Readability-style main-content extraction
//! - HTML to Markdown conversion
//!
//! ## Example
//!
//! ```rust,no_run
//! use a3s_browser_search::{BrowserSearch, SearchOptions};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let search = BrowserSearch::local();
//!
//!     let options = SearchOptions::new("rust programming").with_count(5);
//!     let results = search.try_perform(options).await?;
//!
//!     for result in &results {
//!         println!("{}: {}", result.title, result.url);
//!     }
//!     Ok(())
//! }
//! ```

mod engine;
mod error;
mod query;
mod queue;
mod result;
mod search;

pub mod browser;
pub mod config;
pub mod engines;
pub mod markdown;
pub mod page;
pub mod provider;
pub mod readability;
pub mod stealth;

pub use browser::{BrowserController, LaunchOptions, LocalBrowser, RemoteBrowser, RemoteOptions};
pub use config::Settings;
pub use engine::{Engine, EngineConfig, EngineKind, SearchUrlOptions};
pub use error::{Result, SearchError};
pub use markdown::to_markdown;
pub use page::{EvaluateRequest, PageSnapshot};
pub use provider::{LocalSearch, SearchProvider, SearchRequest};
pub use query::SearchOptions;
pub use queue::{TaskHandle, TaskQueue};
pub use readability::{Article, Readability, ReadabilityOptions};
pub use result::{normalize_url, SearchResponse, SearchResult};
pub use search::{is_skipped_domain, BrowserSearch, BrowserSearchConfig, SKIP_DOMAINS};
