//! End-to-end integration pipeline.
//!
//! Orchestrates the full flow for one run:
//!   1. Build the (condition, source) unit grid
//!   2. Execute fetch+parse+normalize units on a bounded worker pool,
//!      each wrapped in the resilience layer and the run deadline
//!   3. Accumulate canonical records into (condition, record_type) buckets
//!      in enqueue order, so tie-breaks are reproducible regardless of
//!      arrival order
//!   4. Deduplicate each bucket, aggregate each condition
//!   5. Assemble the `IntegrationReport`
//!
//! A failed unit is recorded in the report's error list and never blocks
//! the other units. The run itself fails only with `NoDataAvailable`,
//! when every unit failed.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use futures::stream::{self, StreamExt};
use tokio::time::{timeout_at, Instant};
use tracing::{info, warn};
use uuid::Uuid;

use medrecon_common::config::IntegrationConfig;
use medrecon_common::entities::{Condition, RecordType, SourceType};
use medrecon_common::error::SourceError;
use medrecon_common::guard::GuardedClient;

use crate::aggregate::aggregate;
use crate::dedup::dedup_records;
use crate::models::{IntegrationReport, MedicalRecord, SourceFailure, TrialStatus};
use crate::normalize::normalize;
use crate::resilience::{fetch_with_resilience, RateLimiter, RetryPolicy};
use crate::sources::genes::GeneAssociationAdapter;
use crate::sources::literature::LiteratureAdapter;
use crate::sources::trials::TrialAdapter;
use crate::sources::{FetchParams, SourceAdapter};

/// Build the live adapter set for the configured sources, all sharing one
/// guarded HTTP client.
pub fn default_adapters(
    config: &IntegrationConfig,
) -> Result<Vec<Arc<dyn SourceAdapter>>, SourceError> {
    let client = GuardedClient::new()?;
    Ok(config
        .sources
        .iter()
        .map(|source| -> Arc<dyn SourceAdapter> {
            match source {
                SourceType::Literature => Arc::new(LiteratureAdapter::new(client.clone())),
                SourceType::GeneAssociation => {
                    Arc::new(GeneAssociationAdapter::new(client.clone()))
                }
                SourceType::Trial => Arc::new(TrialAdapter::new(client.clone())),
            }
        })
        .collect())
}

/// Outcome of one (condition, source) unit of work.
struct UnitOutcome {
    enqueue_idx: usize,
    condition: Condition,
    source: SourceType,
    result: Result<Vec<MedicalRecord>, SourceError>,
    dropped: usize,
}

/// Run the full integration for the configured conditions and sources.
///
/// Returns the report plus its embedded non-fatal error list; callers
/// decide pass/fail policy. Fails only with `NoDataAvailable` when every
/// unit exhausted.
pub async fn run_integration(
    config: &IntegrationConfig,
    adapters: &[Arc<dyn SourceAdapter>],
) -> Result<IntegrationReport, SourceError> {
    config.validate()?;

    let run_id = Uuid::new_v4();
    let t0 = std::time::Instant::now();
    info!(
        run_id = %run_id,
        conditions = config.conditions.len(),
        sources = config.sources.len(),
        "starting integration run"
    );

    let policy = RetryPolicy::with_max_attempts(config.max_retries.max(1));
    let limiters: BTreeMap<SourceType, Arc<RateLimiter>> = config
        .sources
        .iter()
        .map(|s| {
            (
                *s,
                Arc::new(RateLimiter::per_minute(config.rate_limits.for_source(*s))),
            )
        })
        .collect();

    let params = FetchParams {
        max_results: config.max_results_per_source,
        status_filter: config
            .trial_status_filter
            .as_deref()
            .map(TrialStatus::parse),
        api_key: config.api_key.clone(),
    };

    let deadline = Instant::now() + config.run_timeout();

    // Unit grid with stable enqueue indices
    let mut units: Vec<(usize, Condition, Arc<dyn SourceAdapter>)> = Vec::new();
    for condition in &config.conditions {
        for adapter in adapters {
            if config.sources.contains(&adapter.source_type()) {
                units.push((units.len(), condition.clone(), Arc::clone(adapter)));
            }
        }
    }

    let mut outcomes: Vec<UnitOutcome> = stream::iter(units.into_iter().map(
        |(enqueue_idx, condition, adapter)| {
            let policy = policy.clone();
            let limiter = limiters
                .get(&adapter.source_type())
                .cloned()
                .unwrap_or_else(|| Arc::new(RateLimiter::per_minute(60)));
            let params = params.clone();
            async move {
                run_unit(enqueue_idx, condition, adapter, policy, limiter, params, deadline).await
            }
        },
    ))
    .buffer_unordered(config.effective_concurrency())
    .collect()
    .await;

    // Replay in enqueue order: reproducible first-seen tie-breaks
    outcomes.sort_by_key(|o| o.enqueue_idx);

    let mut buckets: BTreeMap<(Condition, RecordType), Vec<MedicalRecord>> = BTreeMap::new();
    let mut record_counts_by_source: BTreeMap<String, usize> = BTreeMap::new();
    let mut errors: Vec<SourceFailure> = Vec::new();
    let mut any_success = false;
    let mut total_dropped = 0usize;

    for outcome in outcomes {
        total_dropped += outcome.dropped;
        match outcome.result {
            Ok(records) => {
                any_success = true;
                *record_counts_by_source
                    .entry(outcome.source.as_str().to_string())
                    .or_insert(0) += records.len();
                buckets
                    .entry((outcome.condition.clone(), outcome.source.record_type()))
                    .or_default()
                    .extend(records);
            }
            Err(e) => {
                warn!(
                    condition = %outcome.condition,
                    source = %outcome.source,
                    error = %e,
                    "unit failed, recording in report"
                );
                errors.push(SourceFailure {
                    condition: outcome.condition,
                    source: outcome.source,
                    error: e.to_string(),
                });
            }
        }
    }

    if !any_success {
        warn!(run_id = %run_id, "every (condition, source) unit failed");
        return Err(SourceError::NoDataAvailable);
    }

    // Dedup per bucket, then gather per condition for aggregation
    let mut per_condition: BTreeMap<Condition, Vec<MedicalRecord>> = BTreeMap::new();
    for ((condition, _record_type), records) in buckets {
        let deduped = dedup_records(records);
        per_condition.entry(condition).or_default().extend(deduped);
    }

    let mut conditions = BTreeMap::new();
    for condition in &config.conditions {
        let records = per_condition
            .get(condition)
            .map(Vec::as_slice)
            .unwrap_or(&[]);
        let stats = aggregate(condition, records, config.top_k_trend_terms);
        conditions.insert(condition.name().to_string(), stats);
    }

    let report = IntegrationReport {
        run_id,
        generated_at: Utc::now(),
        conditions,
        record_counts_by_source,
        errors,
        duration_ms: t0.elapsed().as_millis() as u64,
    };

    info!(
        run_id = %run_id,
        records = report.record_counts_by_source.values().sum::<usize>(),
        dropped = total_dropped,
        failed_units = report.errors.len(),
        duration_ms = report.duration_ms,
        "integration run complete"
    );

    Ok(report)
}

/// Execute one (condition, source) unit: resilient fetch, then parse and
/// normalize every raw record. Malformed records are dropped, not fatal.
async fn run_unit(
    enqueue_idx: usize,
    condition: Condition,
    adapter: Arc<dyn SourceAdapter>,
    policy: RetryPolicy,
    limiter: Arc<RateLimiter>,
    params: FetchParams,
    deadline: Instant,
) -> UnitOutcome {
    let source = adapter.source_type();

    let fetch = fetch_with_resilience(&policy, &limiter, &condition, source, || {
        adapter.fetch(&condition, &params)
    });

    let fetched = match timeout_at(deadline, fetch).await {
        Ok(result) => result,
        Err(_elapsed) => Err(SourceError::SourceExhausted {
            condition: condition.name().to_string(),
            source_name: source.as_str().to_string(),
            reason: "run timeout".to_string(),
        }),
    };

    match fetched {
        Ok(raws) => {
            let mut records = Vec::with_capacity(raws.len());
            let mut dropped = 0usize;
            for raw in &raws {
                let partial = adapter.parse(raw);
                match normalize(&condition, raw, partial) {
                    Ok(record) => records.push(record),
                    Err(e) => {
                        dropped += 1;
                        warn!(
                            condition = %condition,
                            source = %source,
                            error = %e,
                            "dropping malformed record"
                        );
                    }
                }
            }
            UnitOutcome {
                enqueue_idx,
                condition,
                source,
                result: Ok(records),
                dropped,
            }
        }
        Err(e) => UnitOutcome {
            enqueue_idx,
            condition,
            source,
            result: Err(e),
            dropped: 0,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;

    use crate::models::{PartialRecord, RawRecord};

    /// Stub adapter returning canned trial payloads, or failing outright.
    struct StubTrials {
        fail: bool,
    }

    #[async_trait]
    impl SourceAdapter for StubTrials {
        fn source_type(&self) -> SourceType {
            SourceType::Trial
        }

        async fn fetch(
            &self,
            _condition: &Condition,
            _params: &FetchParams,
        ) -> Result<Vec<RawRecord>, SourceError> {
            if self.fail {
                return Err(SourceError::SourceUnavailable {
                    source_name: "trial".to_string(),
                    reason: "HTTP 503".to_string(),
                });
            }
            Ok(vec![
                RawRecord::new(
                    SourceType::Trial,
                    Some("NCT1".to_string()),
                    json!({ "id": "NCT1", "status": "Recruiting" }),
                ),
                RawRecord::new(
                    SourceType::Trial,
                    Some("NCT1".to_string()),
                    json!({ "id": "NCT1", "status": "Recruiting" }),
                ),
                RawRecord::new(SourceType::Trial, None, json!({})),
            ])
        }

        fn parse(&self, raw: &RawRecord) -> PartialRecord {
            PartialRecord {
                title: raw.payload["id"].as_str().map(String::from),
                trial_id: raw.payload["id"].as_str().map(String::from),
                status: raw.payload["status"].as_str().map(TrialStatus::parse),
                ..Default::default()
            }
        }
    }

    fn config() -> IntegrationConfig {
        IntegrationConfig {
            conditions: vec![Condition::Diabetes],
            sources: vec![SourceType::Trial],
            max_retries: 1,
            run_timeout_secs: 5,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_run_dedups_and_counts() {
        let adapters: Vec<Arc<dyn SourceAdapter>> = vec![Arc::new(StubTrials { fail: false })];
        let report = run_integration(&config(), &adapters).await.unwrap();

        // Duplicate NCT1 collapses; empty payload record is dropped
        let stats = &report.conditions["diabetes"];
        assert_eq!(stats.recruiting_trials, 1);
        assert_eq!(report.record_counts_by_source["trial"], 2);
        assert!(report.errors.is_empty());
    }

    #[tokio::test]
    async fn test_all_units_failing_is_no_data() {
        let adapters: Vec<Arc<dyn SourceAdapter>> = vec![Arc::new(StubTrials { fail: true })];
        let result = run_integration(&config(), &adapters).await;
        assert!(matches!(result, Err(SourceError::NoDataAvailable)));
    }

    #[tokio::test]
    async fn test_invalid_config_rejected() {
        let bad = IntegrationConfig {
            conditions: vec![],
            ..Default::default()
        };
        let result = run_integration(&bad, &[]).await;
        assert!(matches!(result, Err(SourceError::Config(_))));
    }
}
