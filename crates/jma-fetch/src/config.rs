use std::path::PathBuf;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue};

const DEFAULT_USER_AGENT: &str = concat!("jma-fetch/", env!("CARGO_PKG_VERSION"));

/// Configurable options for [`HttpGetter`](crate::HttpGetter)
#[derive(Debug, Clone)]
pub struct FetcherConfig {
    /// Root directory of the per-URL disk cache
    pub cache_root: PathBuf,

    /// Minimum pause between the end of one dispatch cycle and the next
    pub dispatch_interval: Duration,

    /// Deadline for a single GET, on top of whatever the HTTP client enforces
    pub request_timeout: Option<Duration>,

    /// Additional attempts for retryable transport failures (0 = no retry)
    pub max_retries: u32,

    /// Base delay of the exponential backoff between attempts
    pub retry_delay: Duration,

    /// Fold the query string into the cache file name
    pub query_in_cache_key: bool,

    /// Overall timeout for the HTTP client (zero disables it)
    pub timeout: Duration,

    /// Connection timeout (time to establish initial connection)
    pub connect_timeout: Duration,

    /// Whether to follow redirects
    pub follow_redirects: bool,

    /// User agent string
    pub user_agent: String,

    /// Custom HTTP headers for requests
    pub headers: HeaderMap,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            cache_root: PathBuf::from("cache"),
            dispatch_interval: Duration::from_millis(500),
            request_timeout: None,
            max_retries: 0,
            retry_delay: Duration::from_millis(500),
            query_in_cache_key: true,
            timeout: Duration::ZERO,
            connect_timeout: Duration::from_secs(10),
            follow_redirects: true,
            user_agent: DEFAULT_USER_AGENT.to_owned(),
            headers: FetcherConfig::get_default_headers(),
        }
    }
}

impl FetcherConfig {
    pub fn builder() -> crate::builder::FetcherConfigBuilder {
        crate::builder::FetcherConfigBuilder::new()
    }

    pub fn get_default_headers() -> HeaderMap {
        let mut default_headers = HeaderMap::new();

        default_headers.insert(
            reqwest::header::ACCEPT_ENCODING,
            HeaderValue::from_static("gzip, deflate"),
        );

        default_headers.insert(
            reqwest::header::ACCEPT,
            HeaderValue::from_static("application/json,*/*;q=0.8"),
        );

        default_headers.insert(
            reqwest::header::ACCEPT_LANGUAGE,
            HeaderValue::from_static("ja,en-US;q=0.7,en;q=0.5"),
        );
        default_headers
    }

    /// Delay before retry number `attempt` (1-based)
    pub(crate) fn backoff(&self, attempt: u32) -> Duration {
        self.retry_delay
            .saturating_mul(2_u32.saturating_pow(attempt.saturating_sub(1)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_doubles() {
        let config = FetcherConfig {
            retry_delay: Duration::from_millis(100),
            ..Default::default()
        };
        assert_eq!(config.backoff(1), Duration::from_millis(100));
        assert_eq!(config.backoff(2), Duration::from_millis(200));
        assert_eq!(config.backoff(4), Duration::from_millis(800));
    }
}
