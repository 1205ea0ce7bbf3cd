//! Core enumerations shared by the configuration surface and the pipeline:
//! conditions under study, source kinds, and canonical record categories.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A medical condition under study — the primary aggregation key.
///
/// The named variants cover the standard investigation set; `Custom` keeps
/// the set extensible from configuration without code changes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Condition {
    BreastCancer,
    Diabetes,
    Alzheimers,
    Custom(String),
}

impl Condition {
    /// Human-readable condition name, also used as the search term
    /// sent to the upstream sources.
    pub fn name(&self) -> &str {
        match self {
            Condition::BreastCancer => "breast cancer",
            Condition::Diabetes     => "diabetes",
            Condition::Alzheimers   => "alzheimer's disease",
            Condition::Custom(s)    => s,
        }
    }
}

impl From<String> for Condition {
    fn from(s: String) -> Self {
        match s.trim().to_lowercase().as_str() {
            "breast cancer"                       => Condition::BreastCancer,
            "diabetes"                            => Condition::Diabetes,
            "alzheimer's disease" | "alzheimers"  => Condition::Alzheimers,
            _ => Condition::Custom(s.trim().to_string()),
        }
    }
}

impl From<Condition> for String {
    fn from(c: Condition) -> Self {
        c.name().to_string()
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Which upstream source a record came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    Literature,
    GeneAssociation,
    Trial,
}

impl SourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceType::Literature      => "literature",
            SourceType::GeneAssociation => "gene_association",
            SourceType::Trial           => "trial",
        }
    }

    /// Canonical record category this source produces.
    pub fn record_type(&self) -> RecordType {
        match self {
            SourceType::Literature      => RecordType::Literature,
            SourceType::GeneAssociation => RecordType::GeneAssociation,
            SourceType::Trial           => RecordType::Trial,
        }
    }
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Canonical record category. Canonical keys are unique within a
/// `(condition, record_type)` bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordType {
    Literature,
    GeneAssociation,
    Trial,
}

impl RecordType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordType::Literature      => "literature",
            RecordType::GeneAssociation => "gene_association",
            RecordType::Trial           => "trial",
        }
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_condition_roundtrip_known() {
        let c: Condition = "Breast Cancer".to_string().into();
        assert_eq!(c, Condition::BreastCancer);
        assert_eq!(c.name(), "breast cancer");
    }

    #[test]
    fn test_condition_custom_preserved() {
        let c: Condition = "parkinson's disease".to_string().into();
        assert_eq!(c, Condition::Custom("parkinson's disease".to_string()));
        assert_eq!(c.name(), "parkinson's disease");
    }

    #[test]
    fn test_source_maps_to_record_type() {
        assert_eq!(SourceType::Trial.record_type(), RecordType::Trial);
        assert_eq!(SourceType::Literature.record_type(), RecordType::Literature);
    }
}
