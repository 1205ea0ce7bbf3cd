use thiserror::Error;

/// Error taxonomy for the integration engine.
///
/// Transient errors (`SourceUnavailable`, `SourceRateLimited`) are retried
/// inside the resilience layer and never surface past it. `SourceExhausted`
/// is terminal for a single (condition, source) pair and is recorded in the
/// report rather than raised. `NoDataAvailable` is the only run-level
/// failure, returned when every unit exhausted.
// The upstream name is `source_name`, not `source`: thiserror reserves a
// field named `source` for the error cause chain.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("source {source_name} unavailable: {reason}")]
    SourceUnavailable { source_name: String, reason: String },

    #[error("source {source_name} rate limited")]
    SourceRateLimited { source_name: String },

    #[error("source {source_name} exhausted for '{condition}': {reason}")]
    SourceExhausted {
        condition: String,
        source_name: String,
        reason: String,
    },

    #[error("malformed record from {source_name}: {reason}")]
    MalformedRecord { source_name: String, reason: String },

    #[error("no data available: every (condition, source) unit failed")]
    NoDataAvailable,

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Network guard rejected request: {0}")]
    Guard(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl SourceError {
    /// Whether the resilience layer should retry after this error.
    /// Transport-level failures count as transient unavailability.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SourceError::SourceUnavailable { .. }
                | SourceError::SourceRateLimited { .. }
                | SourceError::Http(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, SourceError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_errors_are_retryable() {
        let e = SourceError::SourceUnavailable {
            source_name: "literature".into(),
            reason: "HTTP 503".into(),
        };
        assert!(e.is_retryable());
        let e = SourceError::SourceRateLimited {
            source_name: "trial".into(),
        };
        assert!(e.is_retryable());
    }

    #[test]
    fn test_terminal_errors_are_not_retryable() {
        let e = SourceError::SourceExhausted {
            condition: "diabetes".into(),
            source_name: "trial".into(),
            reason: "max wait exceeded".into(),
        };
        assert!(!e.is_retryable());
        assert!(!SourceError::NoDataAvailable.is_retryable());
    }

    #[test]
    fn test_upstream_name_is_not_a_cause_chain() {
        use std::error::Error;

        let e = SourceError::SourceUnavailable {
            source_name: "literature".into(),
            reason: "HTTP 503".into(),
        };
        assert_eq!(e.to_string(), "source literature unavailable: HTTP 503");
        assert!(e.source().is_none());

        let e = SourceError::MalformedRecord {
            source_name: "trial".into(),
            reason: "no fields".into(),
        };
        assert!(e.source().is_none());
    }
}
