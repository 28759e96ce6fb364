#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON parse failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{provider} search failed (status {status})")]
    Status { provider: String, status: u16 },

    #[error("{provider} returned an error: {message}")]
    Provider { provider: String, message: String },

    #[error("{0} requires an API key")]
    MissingApiKey(String),

    #[error("invalid search URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("search timed out after {seconds}s")]
    Timeout { seconds: u64 },

    #[error("{0}")]
    Other(String),
}

impl SearchError {
    /// Whether a retry of the same query can reasonably succeed.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            Self::Status { status, .. } => *status == 429 || *status >= 500,
            Self::Timeout { .. } => true,
            Self::Json(_)
            | Self::Provider { .. }
            | Self::MissingApiKey(_)
            | Self::Url(_)
            | Self::Other(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_classification() {
        assert!(SearchError::Timeout { seconds: 10 }.is_transient());
        assert!(
            SearchError::Status {
                provider: "serpapi".into(),
                status: 429
            }
            .is_transient()
        );
        assert!(
            !SearchError::Status {
                provider: "serpapi".into(),
                status: 401
            }
            .is_transient()
        );
        assert!(!SearchError::MissingApiKey("serpapi".into()).is_transient());
    }
}
