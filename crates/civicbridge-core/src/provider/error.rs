//! Provider failure taxonomy.

use crate::retry::Transient;

/// Errors from a single provider attempt.
///
/// Transient variants (`Network`, `Timeout`, `Server`) are retried by the
/// provider's [`RetryPolicy`](crate::RetryPolicy); every other variant fails
/// the provider immediately and the router moves on.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProviderError {
    #[error("admission rejected by rate limiter for {0}")]
    AdmissionRejected(String),

    #[error("provider {0} is disabled")]
    Disabled(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("timeout")]
    Timeout,

    #[error("server error: {status}: {message}")]
    Server { status: u16, message: String },

    #[error("rate limited by remote: retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("authentication failed (check API key): {0}")]
    Auth(String),

    #[error("request rejected: {status}: {message}")]
    Rejected { status: u16, message: String },

    #[error("malformed response: {0}")]
    MalformedResponse(String),
}

impl ProviderError {
    /// Classify a non-success HTTP status.
    pub fn from_status(status: u16, body: String, retry_after_secs: Option<u64>) -> Self {
        match status {
            401 | 403 => ProviderError::Auth(body),
            429 => ProviderError::RateLimited {
                retry_after_secs: retry_after_secs.unwrap_or(60),
            },
            500..=599 => ProviderError::Server {
                status,
                message: body,
            },
            _ => ProviderError::Rejected {
                status,
                message: body,
            },
        }
    }

    /// Classify a transport-level failure.
    pub fn from_reqwest(error: &reqwest::Error) -> Self {
        if error.is_timeout() {
            ProviderError::Timeout
        } else if error.is_decode() {
            ProviderError::MalformedResponse(error.to_string())
        } else {
            ProviderError::Network(error.to_string())
        }
    }
}

impl Transient for ProviderError {
    fn is_transient(&self) -> bool {
        matches!(
            self,
            ProviderError::Network(_) | ProviderError::Timeout | ProviderError::Server { .. }
        )
    }
}

/// Parse a `Retry-After` header given in whole seconds.
pub(crate) fn retry_after(headers: &reqwest::header::HeaderMap) -> Option<u64> {
    headers
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_status_classification() {
        assert!(ProviderError::from_status(500, String::new(), None).is_transient());
        assert!(ProviderError::from_status(503, String::new(), None).is_transient());
        assert!(!ProviderError::from_status(400, String::new(), None).is_transient());
        assert_eq!(
            ProviderError::from_status(429, String::new(), Some(5)),
            ProviderError::RateLimited { retry_after_secs: 5 }
        );
        assert_eq!(
            ProviderError::from_status(403, "nope".to_string(), None),
            ProviderError::Auth("nope".to_string())
        );
    }

    #[test]
    fn test_only_transport_and_server_errors_are_transient() {
        assert!(ProviderError::Network("reset".to_string()).is_transient());
        assert!(ProviderError::Timeout.is_transient());
        assert!(!ProviderError::AdmissionRejected("Gemini".to_string()).is_transient());
        assert!(!ProviderError::Disabled("Gemini".to_string()).is_transient());
        assert!(!ProviderError::MalformedResponse("empty".to_string()).is_transient());
        assert!(!ProviderError::RateLimited { retry_after_secs: 1 }.is_transient());
    }

    #[test]
    fn test_display() {
        let err = ProviderError::Server {
            status: 502,
            message: "bad gateway".to_string(),
        };
        assert_eq!(err.to_string(), "server error: 502: bad gateway");
    }
}
