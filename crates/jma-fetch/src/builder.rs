//! # Builder for FetcherConfig
//!
//! Fluent construction of [`FetcherConfig`] values.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use jma_fetch::FetcherConfig;
//!
//! let config = FetcherConfig::builder()
//!     .with_cache_root("/tmp/jma-cache")
//!     .with_dispatch_interval(Duration::from_millis(250))
//!     .with_request_timeout(Duration::from_secs(20))
//!     .with_retries(2, Duration::from_secs(1))
//!     .with_user_agent("MyApp/1.0")
//!     .with_header("X-Api-Key", "my-secret-key")
//!     .build();
//!
//! assert_eq!(config.max_retries, 2);
//! ```

use std::path::PathBuf;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue};

use crate::FetcherConfig;

/// Builder for creating FetcherConfig instances with a fluent API
#[derive(Debug, Clone)]
pub struct FetcherConfigBuilder {
    config: FetcherConfig,
}

impl FetcherConfigBuilder {
    /// Create a new builder with default configuration
    pub fn new() -> Self {
        Self {
            config: FetcherConfig::default(),
        }
    }

    /// Set the cache root directory
    pub fn with_cache_root(mut self, cache_root: impl Into<PathBuf>) -> Self {
        self.config.cache_root = cache_root.into();
        self
    }

    /// Set the pause between dispatch cycles
    pub fn with_dispatch_interval(mut self, interval: Duration) -> Self {
        self.config.dispatch_interval = interval;
        self
    }

    /// Set a deadline for each individual GET
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.config.request_timeout = Some(timeout);
        self
    }

    /// Retry retryable transport failures `max_retries` times, backing off from `delay`
    pub fn with_retries(mut self, max_retries: u32, delay: Duration) -> Self {
        self.config.max_retries = max_retries;
        self.config.retry_delay = delay;
        self
    }

    /// Whether the query string takes part in the cache file name
    pub fn with_query_in_cache_key(mut self, enabled: bool) -> Self {
        self.config.query_in_cache_key = enabled;
        self
    }

    /// Set the overall timeout of the HTTP client
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Set the connection timeout (time to establish initial connection)
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = timeout;
        self
    }

    /// Set whether to follow redirects
    pub fn with_follow_redirects(mut self, follow: bool) -> Self {
        self.config.follow_redirects = follow;
        self
    }

    /// Set the user agent string
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.config.user_agent = user_agent.into();
        self
    }

    /// Add a custom HTTP header. Invalid names or values are ignored.
    pub fn with_header(mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> Self {
        if let (Ok(name), Ok(value)) = (
            name.as_ref().parse::<reqwest::header::HeaderName>(),
            HeaderValue::from_str(value.as_ref()),
        ) {
            self.config.headers.insert(name, value);
        }
        self
    }

    /// Set all HTTP headers, replacing any existing headers
    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.config.headers = headers;
        self
    }

    pub fn build(self) -> FetcherConfig {
        self.config
    }
}

impl Default for FetcherConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults() {
        let config = FetcherConfigBuilder::new().build();
        assert_eq!(config.cache_root, PathBuf::from("cache"));
        assert_eq!(config.dispatch_interval, Duration::from_millis(500));
        assert!(config.request_timeout.is_none());
        assert_eq!(config.max_retries, 0);
        assert!(config.query_in_cache_key);
        assert!(config.follow_redirects);
    }

    #[test]
    fn test_builder_customization() {
        let config = FetcherConfigBuilder::new()
            .with_cache_root("/var/cache/jma")
            .with_dispatch_interval(Duration::from_millis(50))
            .with_request_timeout(Duration::from_secs(5))
            .with_retries(3, Duration::from_millis(10))
            .with_query_in_cache_key(false)
            .with_follow_redirects(false)
            .with_user_agent("CustomUserAgent/1.0")
            .with_header("X-Custom-Header", "CustomValue")
            .build();

        assert_eq!(config.cache_root, PathBuf::from("/var/cache/jma"));
        assert_eq!(config.dispatch_interval, Duration::from_millis(50));
        assert_eq!(config.request_timeout, Some(Duration::from_secs(5)));
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.retry_delay, Duration::from_millis(10));
        assert!(!config.query_in_cache_key);
        assert!(!config.follow_redirects);
        assert_eq!(config.user_agent, "CustomUserAgent/1.0");

        let header_value = config.headers.get("X-Custom-Header").unwrap();
        assert_eq!(header_value.to_str().unwrap(), "CustomValue");
        // defaults survive a custom header
        assert!(config.headers.contains_key(reqwest::header::ACCEPT));
    }

    #[test]
    fn test_invalid_header_is_ignored() {
        let config = FetcherConfigBuilder::new()
            .with_header("bad header", "value")
            .build();
        assert_eq!(
            config.headers.len(),
            FetcherConfig::get_default_headers().len()
        );
    }
}
