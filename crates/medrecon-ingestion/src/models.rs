//! Data models for the integration pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use uuid::Uuid;

use medrecon_common::entities::{Condition, RecordType, SourceType};

/// Overall status of a clinical trial, parsed leniently from source strings.
/// Unknown statuses are retained in `Other` rather than dropped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TrialStatus {
    Recruiting,
    Completed,
    Other(String),
}

impl TrialStatus {
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "recruiting" => TrialStatus::Recruiting,
            "completed"  => TrialStatus::Completed,
            _            => TrialStatus::Other(s.trim().to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            TrialStatus::Recruiting => "Recruiting",
            TrialStatus::Completed  => "Completed",
            TrialStatus::Other(s)   => s,
        }
    }
}

impl From<String> for TrialStatus {
    fn from(s: String) -> Self {
        TrialStatus::parse(&s)
    }
}

impl From<TrialStatus> for String {
    fn from(s: TrialStatus) -> Self {
        s.as_str().to_string()
    }
}

impl fmt::Display for TrialStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An opaque per-source payload plus provenance metadata. Immutable once
/// created; owned by the adapter that produced it until handed to the
/// normalizer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawRecord {
    pub source_type: SourceType,
    /// Source-local identifier (PMID, gene UID, NCT id); may be absent.
    pub source_id: Option<String>,
    pub fetched_at: DateTime<Utc>,
    /// Source-shaped data; only the owning adapter knows its layout.
    pub payload: serde_json::Value,
}

impl RawRecord {
    pub fn new(
        source_type: SourceType,
        source_id: Option<String>,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            source_type,
            source_id,
            fetched_at: Utc::now(),
            payload,
        }
    }
}

/// Partially-typed intermediate produced by `SourceAdapter::parse`.
/// Every field is optional: a malformed field surfaces as absent rather
/// than failing the record.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PartialRecord {
    pub title: Option<String>,
    pub year: Option<i32>,
    pub status: Option<TrialStatus>,
    pub genes: Vec<String>,
    pub trial_id: Option<String>,
    pub abstract_text: Option<String>,
}

impl PartialRecord {
    /// An entirely unparseable record: nothing to key or name it by.
    pub fn is_unusable(&self) -> bool {
        self.title.as_deref().map_or(true, |t| t.trim().is_empty())
            && self.genes.is_empty()
            && self.trial_id.is_none()
    }
}

/// The canonical unit all sources normalize into.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MedicalRecord {
    pub condition: Condition,
    pub record_type: RecordType,
    /// Deterministic key identifying one real-world entity within the
    /// (condition, record_type) bucket.
    pub canonical_key: String,
    pub source_type: SourceType,
    pub source_id: Option<String>,
    pub title_or_name: String,
    pub year: Option<i32>,
    pub status: Option<TrialStatus>,
    pub associated_genes: BTreeSet<String>,
    pub trend_terms: Vec<String>,
    pub fetched_at: DateTime<Utc>,
    /// Audit pointer back to the originating raw record; never ownership.
    pub raw_ref: Option<String>,
}

/// Per-condition statistics, rebuilt from scratch every run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConditionStats {
    pub condition: Condition,
    pub literature_count: usize,
    /// Mean of present publication years; absent when no record has a year.
    pub avg_publication_year: Option<f64>,
    /// Ranked (term, count), count descending, first-seen tie-break.
    pub top_trend_terms: Vec<(String, usize)>,
    pub gene_mentions: BTreeMap<String, usize>,
    pub recruiting_trials: usize,
    pub completed_trials: usize,
    /// Trials whose status is neither recruiting nor completed
    /// (includes trials with no status at all).
    pub other_trials: usize,
}

/// One failed (condition, source) pair, recorded in the report.
#[derive(Debug, Clone, Serialize)]
pub struct SourceFailure {
    pub condition: Condition,
    pub source: SourceType,
    pub error: String,
}

/// Sole output artifact of a pipeline run. Handed to report writers
/// as a read-only snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct IntegrationReport {
    pub run_id: Uuid,
    pub generated_at: DateTime<Utc>,
    pub conditions: BTreeMap<String, ConditionStats>,
    pub record_counts_by_source: BTreeMap<String, usize>,
    pub errors: Vec<SourceFailure>,
    pub duration_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trial_status_lenient_parse() {
        assert_eq!(TrialStatus::parse("RECRUITING"), TrialStatus::Recruiting);
        assert_eq!(TrialStatus::parse(" completed "), TrialStatus::Completed);
        assert_eq!(
            TrialStatus::parse("Terminated"),
            TrialStatus::Other("Terminated".to_string())
        );
    }

    #[test]
    fn test_unusable_partial() {
        assert!(PartialRecord::default().is_unusable());
        let p = PartialRecord {
            title: Some("  ".to_string()),
            ..Default::default()
        };
        assert!(p.is_unusable());
        let p = PartialRecord {
            trial_id: Some("NCT00000001".to_string()),
            ..Default::default()
        };
        assert!(!p.is_unusable());
    }
}
