//! Source adapter clients.
//!
//! One adapter per upstream source: literature (PubMed E-utilities),
//! gene associations (NCBI Gene), clinical trials (ClinicalTrials.gov v2).
//! Concrete fetch/parse mechanics stay behind this trait so the normalizer,
//! deduplicator and aggregator never see a source shape.

pub mod genes;
pub mod literature;
pub mod trials;

use async_trait::async_trait;

use medrecon_common::entities::{Condition, SourceType};
use medrecon_common::error::SourceError;

use crate::models::{PartialRecord, RawRecord, TrialStatus};

/// Per-fetch parameters handed down from the pipeline configuration.
#[derive(Debug, Clone)]
pub struct FetchParams {
    pub max_results: usize,
    /// Optional recruitment status filter, honored by the trial adapter.
    pub status_filter: Option<TrialStatus>,
    /// Optional NCBI API key for higher rate limits.
    pub api_key: Option<String>,
}

impl Default for FetchParams {
    fn default() -> Self {
        Self {
            max_results: 50,
            status_filter: None,
            api_key: None,
        }
    }
}

/// Common interface for all source adapters.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    fn source_type(&self) -> SourceType;

    /// Fetch raw records for a condition. The sequence is finite and
    /// restartable; upstream sources are live, so a re-invocation may
    /// return a fresh but not identical result.
    ///
    /// Fails with `SourceUnavailable` or `SourceRateLimited`; retrying
    /// is the resilience layer's job, not the adapter's.
    async fn fetch(
        &self,
        condition: &Condition,
        params: &FetchParams,
    ) -> Result<Vec<RawRecord>, SourceError>;

    /// Parse a raw record into the partially-typed intermediate.
    /// Never fails at record granularity: missing or malformed fields
    /// surface as absent in the `PartialRecord`.
    fn parse(&self, raw: &RawRecord) -> PartialRecord;
}

/// Map an HTTP status into the transient error taxonomy.
/// Returns `None` for success statuses.
pub(crate) fn classify_status(
    source: SourceType,
    status: reqwest::StatusCode,
) -> Option<SourceError> {
    if status.is_success() {
        None
    } else if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        Some(SourceError::SourceRateLimited {
            source_name: source.as_str().to_string(),
        })
    } else {
        Some(SourceError::SourceUnavailable {
            source_name: source.as_str().to_string(),
            reason: format!("HTTP {}", status),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_429_as_rate_limited() {
        let e = classify_status(SourceType::Trial, reqwest::StatusCode::TOO_MANY_REQUESTS);
        assert!(matches!(e, Some(SourceError::SourceRateLimited { .. })));
    }

    #[test]
    fn test_classify_5xx_as_unavailable() {
        let e = classify_status(SourceType::Literature, reqwest::StatusCode::BAD_GATEWAY);
        assert!(matches!(e, Some(SourceError::SourceUnavailable { .. })));
    }

    #[test]
    fn test_classify_success_as_none() {
        assert!(classify_status(SourceType::Literature, reqwest::StatusCode::OK).is_none());
    }
}
