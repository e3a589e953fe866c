//! Attaching to an already running browser over its debugging endpoint.

use async_trait::async_trait;
use chromiumoxide::browser::Browser;
use chromiumoxide::handler::viewport::Viewport as CdpViewport;
use chromiumoxide::handler::HandlerConfig;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, error, info};

use super::{BrowserController, BrowserCore, LaunchOptions};
use crate::page::EvaluateRequest;
use crate::{Result, SearchError};

/// Where to find the remote browser.
#[derive(Debug, Clone)]
pub struct RemoteOptions {
    /// Explicit DevTools WebSocket URL. Skips discovery when set.
    pub ws_endpoint: Option<String>,
    /// Debugging host used for discovery.
    pub host: String,
    /// Debugging port used for discovery.
    pub port: u16,
}

impl Default for RemoteOptions {
    fn default() -> Self {
        Self {
            ws_endpoint: None,
            host: "localhost".to_string(),
            port: 9222,
        }
    }
}

impl RemoteOptions {
    /// Options for a known WebSocket endpoint.
    pub fn with_ws_endpoint(endpoint: impl Into<String>) -> Self {
        Self {
            ws_endpoint: Some(endpoint.into()),
            ..Default::default()
        }
    }

    /// The `/json/version` metadata URL.
    pub fn version_url(&self) -> String {
        format!("http://{}:{}/json/version", self.host, self.port)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VersionInfo {
    web_socket_debugger_url: String,
}

/// Drives a browser started elsewhere, e.g. `chrome --remote-debugging-port=9222`.
pub struct RemoteBrowser {
    core: BrowserCore,
    options: RemoteOptions,
    client: reqwest::Client,
}

impl RemoteBrowser {
    pub fn new(options: RemoteOptions) -> Self {
        Self {
            core: BrowserCore::new(),
            options,
            client: reqwest::Client::new(),
        }
    }

    /// Shared session and page bookkeeping.
    pub fn core(&self) -> &BrowserCore {
        &self.core
    }

    /// Resolves the WebSocket endpoint, asking the metadata endpoint if none
    /// was configured.
    pub async fn resolve_endpoint(&self) -> Result<String> {
        if let Some(ws) = self.options.ws_endpoint.as_deref().filter(|s| !s.is_empty()) {
            return Ok(ws.to_string());
        }

        let url = self.options.version_url();
        debug!("Discovering browser endpoint via {}", url);
        let info: VersionInfo = self
            .client
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(info.web_socket_debugger_url)
    }
}

#[async_trait]
impl BrowserController for RemoteBrowser {
    async fn launch(&self, options: &LaunchOptions) -> Result<()> {
        if self.core.is_launched().await {
            debug!("Browser already connected");
            return Ok(());
        }

        let endpoint = tokio::time::timeout(options.timeout, self.resolve_endpoint())
            .await
            .map_err(|_| SearchError::LaunchTimeout(options.timeout))?
            .map_err(|e| SearchError::Launch(format!("Endpoint discovery failed: {}", e)))?;
        info!("Using WebSocket endpoint: {}", endpoint);

        let config = HandlerConfig {
            viewport: Some(CdpViewport {
                width: options.viewport.width,
                height: options.viewport.height,
                ..Default::default()
            }),
            ..Default::default()
        };

        let (browser, handler) = tokio::time::timeout(
            options.timeout,
            Browser::connect_with_config(endpoint, config),
        )
        .await
        .map_err(|_| SearchError::LaunchTimeout(options.timeout))?
        .map_err(|e| {
            error!("Failed to connect to remote browser: {}", e);
            SearchError::Launch(e.to_string())
        })?;

        self.core.attach(browser, handler, None).await;
        info!("Connected to remote browser");
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.core.close().await
    }

    async fn is_launched(&self) -> bool {
        self.core.is_launched().await
    }

    async fn evaluate_on_new_page(&self, request: EvaluateRequest) -> Result<Option<Value>> {
        self.core.evaluate_on_new_page(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    #[test]
    fn test_remote_options_default() {
        let options = RemoteOptions::default();
        assert!(options.ws_endpoint.is_none());
        assert_eq!(options.version_url(), "http://localhost:9222/json/version");
    }

    #[tokio::test]
    async fn test_resolve_explicit_endpoint() {
        let browser = RemoteBrowser::new(RemoteOptions::with_ws_endpoint(
            "ws://127.0.0.1:9222/devtools/browser/abc",
        ));
        let endpoint = browser.resolve_endpoint().await.unwrap();
        assert_eq!(endpoint, "ws://127.0.0.1:9222/devtools/browser/abc");
    }

    #[tokio::test]
    async fn test_resolve_endpoint_via_version_url() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 1024];
            let _ = socket.read(&mut buf).await.unwrap();
            let body = r#"{"Browser":"Chrome/131.0","webSocketDebuggerUrl":"ws://127.0.0.1:9222/devtools/browser/xyz"}"#;
            let response = format!(
                "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                body.len(),
                body
            );
            socket.write_all(response.as_bytes()).await.unwrap();
        });

        let browser = RemoteBrowser::new(RemoteOptions {
            ws_endpoint: None,
            host: "127.0.0.1".to_string(),
            port,
        });
        let endpoint = browser.resolve_endpoint().await.unwrap();
        assert_eq!(endpoint, "ws://127.0.0.1:9222/devtools/browser/xyz");
    }

    #[tokio::test]
    async fn test_launch_unreachable_endpoint_fails() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let browser = RemoteBrowser::new(RemoteOptions {
            ws_endpoint: None,
            host: "127.0.0.1".to_string(),
            port,
        });
        let options = LaunchOptions {
            timeout: std::time::Duration::from_secs(5),
            ..Default::default()
        };
        let err = browser.launch(&options).await.unwrap_err();
        assert!(matches!(err, SearchError::Launch(_)));
        assert!(!browser.is_launched().await);
    }
}
