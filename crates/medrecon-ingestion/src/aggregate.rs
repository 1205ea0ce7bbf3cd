//! Per-condition aggregation over a deduplicated record set.
//!
//! Pure function of its input: no mutation, no hidden state, always
//! recomputed from the full record set per run. The reference policies are:
//! - `avg_publication_year` is the arithmetic mean of *present* years among
//!   literature records; absent when no record has a year (never 0 or NaN).
//! - `top_trend_terms` ranks term frequencies across literature records,
//!   count descending, ties broken by order of first occurrence, truncated
//!   to top-k.

use std::collections::{BTreeMap, HashMap};

use medrecon_common::entities::{Condition, RecordType};

use crate::models::{ConditionStats, MedicalRecord, TrialStatus};

/// Compute `ConditionStats` for one condition's deduplicated records.
pub fn aggregate(
    condition: &Condition,
    records: &[MedicalRecord],
    top_k: usize,
) -> ConditionStats {
    let mut literature_count = 0usize;
    let mut year_sum = 0i64;
    let mut year_n = 0usize;
    let mut term_counts: HashMap<&str, usize> = HashMap::new();
    let mut term_order: Vec<&str> = Vec::new();
    let mut gene_mentions: BTreeMap<String, usize> = BTreeMap::new();
    let mut recruiting_trials = 0usize;
    let mut completed_trials = 0usize;
    let mut other_trials = 0usize;

    for record in records {
        match record.record_type {
            RecordType::Literature => {
                literature_count += 1;
                if let Some(year) = record.year {
                    year_sum += year as i64;
                    year_n += 1;
                }
                for term in &record.trend_terms {
                    let count = term_counts.entry(term.as_str()).or_insert(0);
                    if *count == 0 {
                        term_order.push(term.as_str());
                    }
                    *count += 1;
                }
            }
            RecordType::GeneAssociation => {
                for gene in &record.associated_genes {
                    *gene_mentions.entry(gene.clone()).or_insert(0) += 1;
                }
            }
            RecordType::Trial => match record.status {
                Some(TrialStatus::Recruiting) => recruiting_trials += 1,
                Some(TrialStatus::Completed) => completed_trials += 1,
                // Neither counter; the record itself stays in the set
                Some(TrialStatus::Other(_)) | None => other_trials += 1,
            },
        }
    }

    let avg_publication_year = if year_n > 0 {
        Some(year_sum as f64 / year_n as f64)
    } else {
        None
    };

    // Rank by count descending; first-occurrence order breaks ties because
    // the sort is stable over `term_order`.
    let mut ranked: Vec<(String, usize)> = term_order
        .iter()
        .map(|t| (t.to_string(), term_counts[*t]))
        .collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1));
    ranked.truncate(top_k);

    ConditionStats {
        condition: condition.clone(),
        literature_count,
        avg_publication_year,
        top_trend_terms: ranked,
        gene_mentions,
        recruiting_trials,
        completed_trials,
        other_trials,
    }
}
