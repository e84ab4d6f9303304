//! Error types for the transport module.

use std::sync::Arc;

use thiserror::Error;

/// Longest response body excerpt kept in a [`FetchError::Status`].
const BODY_EXCERPT_LIMIT: usize = 512;

/// Errors produced by a single HTTP exchange.
///
/// Cloneable so that one failure can be handed to every coalesced waiter.
#[derive(Debug, Clone, Error)]
pub enum FetchError {
    /// The server answered with a non-success status.
    #[error("HTTP {status} from {method} {url}")]
    Status {
        /// Request method.
        method: &'static str,
        /// Final URL of the response.
        url: String,
        /// HTTP status code.
        status: u16,
        /// Leading part of the response body, for diagnostics.
        body: String,
    },

    /// Network-level failure (DNS, connect, TLS, broken body stream).
    #[error("network error requesting {url}: {source}")]
    Network {
        /// The URL that failed.
        url: String,
        /// The underlying client error.
        #[source]
        source: Arc<reqwest::Error>,
    },

    /// Request timed out before completion.
    #[error("timeout requesting {url}")]
    Timeout {
        /// The URL that timed out.
        url: String,
    },

    /// The request URL could not be built.
    #[error("invalid URL: {url}")]
    InvalidUrl {
        /// The offending URL or path.
        url: String,
    },

    /// The HTTP client could not be constructed.
    #[error("HTTP client initialization failed: {0}")]
    ClientInit(String),
}

impl FetchError {
    /// Creates a status error, truncating the body excerpt.
    pub fn status(method: &'static str, url: impl Into<String>, status: u16, body: &str) -> Self {
        let body = match body.char_indices().nth(BODY_EXCERPT_LIMIT) {
            Some((cut, _)) => format!("{}...", &body[..cut]),
            None => body.to_string(),
        };
        Self::Status {
            method,
            url: url.into(),
            status,
            body,
        }
    }

    /// Creates a network error from a reqwest error, classifying timeouts.
    pub fn network(url: impl Into<String>, source: reqwest::Error) -> Self {
        let url = url.into();
        if source.is_timeout() {
            Self::Timeout { url }
        } else {
            Self::Network {
                url,
                source: Arc::new(source),
            }
        }
    }

    /// Creates an invalid URL error.
    pub fn invalid_url(url: impl Into<String>) -> Self {
        Self::InvalidUrl { url: url.into() }
    }

    /// Returns the HTTP status when the server answered.
    #[must_use]
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}
