//! Error types for the browser search library.

use std::time::Duration;

use thiserror::Error;

/// Result type alias for search operations.
pub type Result<T> = std::result::Result<T, SearchError>;

/// Errors that can occur during search operations.
#[derive(Error, Debug)]
pub enum SearchError {
    /// HTTP request failed.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON (de)serialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Failed to parse a page or selector.
    #[error("Failed to parse response: {0}")]
    Parse(String),

    /// No browser executable could be located.
    #[error("Browser not found: {0}")]
    BrowserNotFound(String),

    /// The browser process did not come up in time.
    #[error("Browser launch timed out after {0:?}")]
    LaunchTimeout(Duration),

    /// The browser process failed to start or connect.
    #[error("Failed to launch browser: {0}")]
    Launch(String),

    /// An operation needed a browser session but none is open.
    #[error("Browser not launched")]
    BrowserNotLaunched,

    /// Browser protocol error.
    #[error("Browser error: {0}")]
    Browser(String),

    /// Page navigation failed.
    #[error("Navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },

    /// A navigation or wait exceeded its deadline.
    #[error("Timed out: {0}")]
    Timeout(String),

    /// Readable content could not be extracted.
    #[error("Extraction failed: {0}")]
    Extraction(String),

    /// No engines configured.
    #[error("No search engines configured")]
    NoEngines,

    /// Engine name not recognised.
    #[error("Unknown search engine: {0}")]
    UnknownEngine(String),

    /// Invalid query.
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    /// URL parsing error.
    #[error("URL parsing error: {0}")]
    UrlParse(#[from] url::ParseError),

    /// Generic error.
    #[error("{0}")]
    Other(String),
}

impl SearchError {
    /// Returns true for errors that mean the subsystem cannot work at all,
    /// as opposed to a single page or query failing.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            SearchError::BrowserNotFound(_)
                | SearchError::LaunchTimeout(_)
                | SearchError::Launch(_)
                | SearchError::NoEngines
                | SearchError::InvalidQuery(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_parse() {
        let err = SearchError::Parse("invalid selector".to_string());
        assert_eq!(err.to_string(), "Failed to parse response: invalid selector");
    }

    #[test]
    fn test_error_display_launch_timeout() {
        let err = SearchError::LaunchTimeout(Duration::from_secs(3));
        assert_eq!(err.to_string(), "Browser launch timed out after 3s");
    }

    #[test]
    fn test_error_display_navigation() {
        let err = SearchError::Navigation {
            url: "https://example.com".to_string(),
            reason: "net::ERR_NAME_NOT_RESOLVED".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Navigation to https://example.com failed: net::ERR_NAME_NOT_RESOLVED"
        );
    }

    #[test]
    fn test_error_display_no_engines() {
        let err = SearchError::NoEngines;
        assert_eq!(err.to_string(), "No search engines configured");
    }

    #[test]
    fn test_error_display_unknown_engine() {
        let err = SearchError::UnknownEngine("altavista".to_string());
        assert_eq!(err.to_string(), "Unknown search engine: altavista");
    }

    #[test]
    fn test_error_display_other() {
        let err = SearchError::Other("something went wrong".to_string());
        assert_eq!(err.to_string(), "something went wrong");
    }

    #[test]
    fn test_error_from_url_parse() {
        let err: SearchError = url::Url::parse("not a url").unwrap_err().into();
        assert!(matches!(err, SearchError::UrlParse(_)));
    }

    #[test]
    fn test_is_fatal() {
        assert!(SearchError::BrowserNotFound("none".into()).is_fatal());
        assert!(SearchError::NoEngines.is_fatal());
        assert!(SearchError::Launch("boom".into()).is_fatal());
        assert!(!SearchError::Timeout("page".into()).is_fatal());
        assert!(!SearchError::Extraction("empty".into()).is_fatal());
        assert!(!SearchError::BrowserNotLaunched.is_fatal());
    }
}
