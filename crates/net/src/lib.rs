//! Fragment content fetching.

use std::fmt;
use std::time::{Duration, Instant};

const LOG_TARGET: &str = "net";

/// Browser-like user agent sent when no other is configured.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) \
AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.114 Safari/537.36";
pub const DEFAULT_TIMEOUT_MS: u64 = 10_000;

#[derive(Debug)]
pub enum FetchError {
    /// The HTTP client could not be built.
    Client(String),
    /// Connection, TLS or timeout failure.
    Transport { url: String, message: String },
    /// The server answered with a non-2xx status.
    Status { url: String, status: u16 },
    /// The response body could not be read as text.
    Body { url: String, message: String },
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchError::Client(message) => write!(f, "client build error: {message}"),
            FetchError::Transport { url, message } => write!(f, "request to {url} failed: {message}"),
            FetchError::Status { url, status } => write!(f, "{url} answered HTTP {status}"),
            FetchError::Body { url, message } => write!(f, "reading body of {url} failed: {message}"),
        }
    }
}

impl std::error::Error for FetchError {}

/// Fetches the text of a URL. Shared across fetch threads.
pub trait ContentFetcher: Send + Sync {
    fn fetch_text(&self, url: &str) -> Result<String, FetchError>;
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FetchConfig {
    pub user_agent: String,
    pub timeout_ms: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        FetchConfig {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout_ms: DEFAULT_TIMEOUT_MS,
        }
    }
}

/// Blocking `reqwest` fetcher. One client, reused for every request.
pub struct HttpFetcher {
    client: reqwest::blocking::Client,
}

impl HttpFetcher {
    pub fn new(config: &FetchConfig) -> Result<Self, FetchError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .user_agent(config.user_agent.as_str())
            .build()
            .map_err(|e| FetchError::Client(e.to_string()))?;
        Ok(HttpFetcher { client })
    }
}

impl ContentFetcher for HttpFetcher {
    fn fetch_text(&self, url: &str) -> Result<String, FetchError> {
        let start = Instant::now();
        let resp = self
            .client
            .get(url)
            .send()
            .map_err(|e| FetchError::Transport {
                url: url.to_string(),
                message: e.to_string(),
            })?;

        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let body = resp.text().map_err(|e| FetchError::Body {
            url: url.to_string(),
            message: e.to_string(),
        })?;
        log::debug!(
            target: LOG_TARGET,
            "fetched {url}: {} bytes in {}ms",
            body.len(),
            start.elapsed().as_millis()
        );
        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_looks_like_a_browser() {
        let config = FetchConfig::default();
        assert!(config.user_agent.starts_with("Mozilla/5.0"));
        assert_eq!(config.timeout_ms, 10_000);
        assert!(HttpFetcher::new(&config).is_ok());
    }

    #[test]
    fn errors_name_the_url() {
        let err = FetchError::Status {
            url: "https://x.test/f".to_string(),
            status: 404,
        };
        assert_eq!(err.to_string(), "https://x.test/f answered HTTP 404");
    }

    #[test]
    fn unreachable_hosts_are_transport_errors() {
        let fetcher = HttpFetcher::new(&FetchConfig {
            timeout_ms: 200,
            ..FetchConfig::default()
        })
        .unwrap();
        let err = fetcher.fetch_text("http://127.0.0.1:9/fragment").unwrap_err();
        assert!(matches!(err, FetchError::Transport { .. }), "got: {err:?}");
    }
}
