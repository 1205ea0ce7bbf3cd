//! Pipeline configuration.
//!
//! Users can define an integration run via YAML/JSON config files.
//! Defaults reproduce the standard investigation set (breast cancer,
//! diabetes, alzheimer's across all three sources).

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::entities::{Condition, SourceType};
use crate::error::SourceError;

/// Complete configuration for one integration run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntegrationConfig {
    /// Conditions to investigate
    pub conditions: Vec<Condition>,

    /// Sources to query
    pub sources: Vec<SourceType>,

    /// Maximum records fetched per (condition, source) pair
    #[serde(default = "default_max_results")]
    pub max_results_per_source: usize,

    /// Maximum fetch attempts per unit before giving up
    #[serde(default = "default_max_retries")]
    pub max_retries: usize,

    /// Per-source request budgets (requests per minute)
    #[serde(default)]
    pub rate_limits: RateLimits,

    /// Run-level deadline in seconds; unfinished units are recorded as exhausted
    #[serde(default = "default_run_timeout")]
    pub run_timeout_secs: u64,

    /// How many trend terms to keep per condition
    #[serde(default = "default_top_k")]
    pub top_k_trend_terms: usize,

    /// Worker pool bound; defaults to the number of configured sources
    #[serde(default)]
    pub max_concurrency: Option<usize>,

    /// Optional NCBI API key for higher rate limits
    #[serde(default)]
    pub api_key: Option<String>,

    /// Optional recruitment status filter for trial fetches
    /// (e.g. "Recruiting", "Completed")
    #[serde(default)]
    pub trial_status_filter: Option<String>,
}

fn default_max_results() -> usize { 50 }
fn default_max_retries() -> usize { 3 }
fn default_run_timeout() -> u64 { 300 }
fn default_top_k() -> usize { 5 }

impl Default for IntegrationConfig {
    fn default() -> Self {
        Self {
            conditions: vec![
                Condition::BreastCancer,
                Condition::Diabetes,
                Condition::Alzheimers,
            ],
            sources: vec![
                SourceType::Literature,
                SourceType::GeneAssociation,
                SourceType::Trial,
            ],
            max_results_per_source: default_max_results(),
            max_retries: default_max_retries(),
            rate_limits: RateLimits::default(),
            run_timeout_secs: default_run_timeout(),
            top_k_trend_terms: default_top_k(),
            max_concurrency: None,
            api_key: None,
            trial_status_filter: None,
        }
    }
}

/// Per-source request budgets, requests per minute.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimits {
    #[serde(default = "default_literature_rpm")]
    pub literature_rpm: u32,

    #[serde(default = "default_gene_rpm")]
    pub gene_rpm: u32,

    #[serde(default = "default_trial_rpm")]
    pub trial_rpm: u32,
}

// NCBI permits 3 req/s without an API key; CT.gov is more permissive.
fn default_literature_rpm() -> u32 { 180 }
fn default_gene_rpm() -> u32 { 60 }
fn default_trial_rpm() -> u32 { 120 }

impl Default for RateLimits {
    fn default() -> Self {
        Self {
            literature_rpm: default_literature_rpm(),
            gene_rpm: default_gene_rpm(),
            trial_rpm: default_trial_rpm(),
        }
    }
}

impl RateLimits {
    pub fn for_source(&self, source: SourceType) -> u32 {
        match source {
            SourceType::Literature      => self.literature_rpm,
            SourceType::GeneAssociation => self.gene_rpm,
            SourceType::Trial           => self.trial_rpm,
        }
    }
}

impl IntegrationConfig {
    /// Load from YAML file
    pub fn from_yaml(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Load from JSON file
    pub fn from_json(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), SourceError> {
        if self.conditions.is_empty() {
            return Err(SourceError::Config("no conditions configured".into()));
        }
        if self.sources.is_empty() {
            return Err(SourceError::Config("no sources configured".into()));
        }
        if self.top_k_trend_terms == 0 {
            return Err(SourceError::Config("top_k_trend_terms must be > 0".into()));
        }
        if self.run_timeout_secs == 0 {
            return Err(SourceError::Config("run_timeout_secs must be > 0".into()));
        }
        for source in &self.sources {
            if self.rate_limits.for_source(*source) == 0 {
                return Err(SourceError::Config(format!(
                    "rate limit for {} must be > 0 rpm",
                    source
                )));
            }
        }
        Ok(())
    }

    pub fn run_timeout(&self) -> Duration {
        Duration::from_secs(self.run_timeout_secs)
    }

    /// Worker pool bound: configured value, or one worker per source.
    pub fn effective_concurrency(&self) -> usize {
        self.max_concurrency.unwrap_or_else(|| self.sources.len().max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = IntegrationConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.conditions.len(), 3);
        assert_eq!(config.effective_concurrency(), 3);
    }

    #[test]
    fn test_empty_conditions_rejected() {
        let config = IntegrationConfig {
            conditions: vec![],
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_rate_limit_rejected() {
        let config = IntegrationConfig {
            rate_limits: RateLimits {
                trial_rpm: 0,
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_yaml_roundtrip() {
        let config = IntegrationConfig::default();
        let yaml = serde_yaml::to_string(&config).unwrap();
        let parsed: IntegrationConfig = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed.conditions, config.conditions);
        assert_eq!(parsed.rate_limits.gene_rpm, config.rate_limits.gene_rpm);
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let yaml = "conditions: [\"diabetes\"]\nsources: [\"trial\"]\n";
        let config: IntegrationConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.conditions, vec![Condition::Diabetes]);
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.top_k_trend_terms, 5);
        assert_eq!(config.effective_concurrency(), 1);
    }
}
