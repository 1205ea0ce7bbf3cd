//! Deduplication of canonical records within one (condition, record_type)
//! bucket.
//!
//! Records are grouped by canonical key in enqueue order; groups with more
//! than one member merge into a single record. The merge is commutative
//! except for one documented rule: when two members carry conflicting
//! present values for `year` or `status`, the first-seen value (enqueue
//! order) wins and the conflict is logged. The loser is not silently lost —
//! it remains reachable through the pre-merge member's audit `raw_ref`.

use std::collections::HashMap;
use tracing::{debug, warn};

use crate::models::MedicalRecord;

/// Collapse duplicate records in one bucket. Output preserves first-seen
/// order, its size never exceeds the input's, and every canonical key
/// appears exactly once.
pub fn dedup_records(records: Vec<MedicalRecord>) -> Vec<MedicalRecord> {
    let input_len = records.len();
    let mut order: Vec<String> = Vec::new();
    let mut groups: HashMap<String, MedicalRecord> = HashMap::new();

    for record in records {
        match groups.entry(record.canonical_key.clone()) {
            std::collections::hash_map::Entry::Occupied(mut entry) => {
                merge_into(entry.get_mut(), record);
            }
            std::collections::hash_map::Entry::Vacant(entry) => {
                order.push(record.canonical_key.clone());
                entry.insert(record);
            }
        }
    }

    let merged: Vec<MedicalRecord> = order
        .into_iter()
        .filter_map(|key| groups.remove(&key))
        .collect();

    if merged.len() < input_len {
        debug!(
            input = input_len,
            output = merged.len(),
            "duplicates collapsed"
        );
    }
    merged
}

/// Merge a later-seen duplicate into the first-seen record.
fn merge_into(primary: &mut MedicalRecord, other: MedicalRecord) {
    // Earliest fetch wins as the primary observation time
    if other.fetched_at < primary.fetched_at {
        primary.fetched_at = other.fetched_at;
    }

    primary.associated_genes.extend(other.associated_genes);

    // Union trend terms, preserving first-seen order without repeats
    // across members (repeats within one member are kept as parsed)
    for term in other.trend_terms {
        if !primary.trend_terms.contains(&term) {
            primary.trend_terms.push(term);
        }
    }

    match (&primary.year, other.year) {
        (None, Some(y)) => primary.year = Some(y),
        (Some(a), Some(b)) if *a != b => {
            warn!(
                key = %primary.canonical_key,
                kept = *a,
                discarded = b,
                "merge conflict on year, keeping first-seen"
            );
        }
        _ => {}
    }

    match (&primary.status, other.status) {
        (None, Some(s)) => primary.status = Some(s),
        (Some(a), Some(b)) if *a != b => {
            warn!(
                key = %primary.canonical_key,
                kept = %a,
                discarded = %b,
                "merge conflict on status, keeping first-seen"
            );
        }
        _ => {}
    }

    if primary.source_id.is_none() {
        primary.source_id = other.source_id;
    }
    if primary.raw_ref.is_none() {
        primary.raw_ref = other.raw_ref;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TrialStatus;
    use chrono::{TimeZone, Utc};
    use medrecon_common::entities::{Condition, RecordType, SourceType};
    use std::collections::BTreeSet;

    fn record(key: &str, year: Option<i32>, day: u32) -> MedicalRecord {
        MedicalRecord {
            condition: Condition::BreastCancer,
            record_type: RecordType::Literature,
            canonical_key: key.to_string(),
            source_type: SourceType::Literature,
            source_id: None,
            title_or_name: key.to_string(),
            year,
            status: None,
            associated_genes: BTreeSet::new(),
            trend_terms: vec![],
            fetched_at: Utc.with_ymd_and_hms(2026, 1, day, 0, 0, 0).unwrap(),
            raw_ref: None,
        }
    }

    #[test]
    fn test_output_never_larger_and_keys_unique() {
        let input = vec![
            record("a", Some(2020), 1),
            record("b", None, 2),
            record("a", Some(2021), 3),
            record("a", None, 4),
        ];
        let out = dedup_records(input);
        assert_eq!(out.len(), 2);
        let mut keys: Vec<&str> = out.iter().map(|r| r.canonical_key.as_str()).collect();
        keys.sort();
        keys.dedup();
        assert_eq!(keys.len(), out.len());
    }

    #[test]
    fn test_first_seen_wins_on_conflict() {
        let out = dedup_records(vec![
            record("a", Some(2020), 5),
            record("a", Some(2021), 1),
        ]);
        assert_eq!(out.len(), 1);
        // Conflicting year keeps the first-seen value
        assert_eq!(out[0].year, Some(2020));
        // Earliest fetch time survives regardless of order
        assert_eq!(
            out[0].fetched_at,
            Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_absent_fields_filled_from_later_members() {
        let mut later = record("a", Some(2022), 2);
        later.status = Some(TrialStatus::Completed);
        later.associated_genes.insert("TP53".to_string());
        later.trend_terms = vec!["therapy".to_string(), "marker".to_string()];

        let mut first = record("a", None, 1);
        first.trend_terms = vec!["therapy".to_string()];

        let out = dedup_records(vec![first, later]);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].year, Some(2022));
        assert_eq!(out[0].status, Some(TrialStatus::Completed));
        assert!(out[0].associated_genes.contains("TP53"));
        assert_eq!(
            out[0].trend_terms,
            vec!["therapy".to_string(), "marker".to_string()]
        );
    }

    #[test]
    fn test_merge_is_permutation_invariant_on_sets() {
        // Same member set in two enqueue orders: same keys, same unions.
        // (Enqueue order is the documented tie-break for conflicting
        // scalars, so those use the same first element here.)
        let a = record("x", Some(2020), 1);
        let mut b = record("x", None, 2);
        b.associated_genes.insert("BRCA1".to_string());
        let c = record("y", None, 3);

        let out1 = dedup_records(vec![a.clone(), b.clone(), c.clone()]);
        let out2 = dedup_records(vec![a, c, b]);

        assert_eq!(out1.len(), out2.len());
        let find = |out: &[MedicalRecord], key: &str| {
            out.iter()
                .find(|r| r.canonical_key == key)
                .cloned()
                .unwrap()
        };
        assert_eq!(find(&out1, "x").year, find(&out2, "x").year);
        assert_eq!(
            find(&out1, "x").associated_genes,
            find(&out2, "x").associated_genes
        );
    }

    #[test]
    fn test_empty_input() {
        assert!(dedup_records(vec![]).is_empty());
    }
}
