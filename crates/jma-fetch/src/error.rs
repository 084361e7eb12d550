use std::sync::Arc;
use std::time::Duration;

use reqwest::StatusCode;

/// Failure of a single network GET.
///
/// Cloneable so one failed dispatch can be handed to every caller
/// waiting on the same URL.
#[derive(Debug, thiserror::Error, Clone)]
pub enum TransportError {
    #[error("Network error: {source}")]
    Network {
        #[from]
        source: Arc<reqwest::Error>,
    },

    #[error("Server returned status code {status} for {url}")]
    Status { url: String, status: StatusCode },

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Transport error: {0}")]
    Other(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        TransportError::Network {
            source: Arc::new(err),
        }
    }
}

impl TransportError {
    /// Connection failures, timeouts and 5xx responses are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            TransportError::Network { source } => {
                source.is_connect() || source.is_timeout() || source.is_request()
            }
            TransportError::Status { status, .. } => status.is_server_error(),
            TransportError::Timeout(_) => true,
            TransportError::Other(_) => false,
        }
    }
}

// Error type returned by `HttpGetter`
#[derive(Debug, thiserror::Error, Clone)]
pub enum FetchError {
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("Invalid JSON from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: Arc<serde_json::Error>,
    },

    #[error("Fetcher has been shut down")]
    Shutdown,
}

impl FetchError {
    pub(crate) fn decode(url: impl Into<String>, err: serde_json::Error) -> Self {
        FetchError::Decode {
            url: url.into(),
            source: Arc::new(err),
        }
    }

    pub fn is_transport(&self) -> bool {
        matches!(self, FetchError::Transport(_))
    }

    pub fn is_decode(&self) -> bool {
        matches!(self, FetchError::Decode { .. })
    }
}
