//! Normalization of per-source intermediates into the canonical
//! `MedicalRecord` schema, including deterministic canonical-key derivation.
//!
//! Keys must be deterministic so the same entity re-extracted in a later
//! run (or duplicated across paginated fetches) collapses to the same key:
//! - Literature: normalized lowercase title, plus year when present
//! - Gene association: uppercased gene symbol + condition
//! - Trial: the source trial id if present, else normalized title + status
//!
//! The normalizer never fabricates values; absent stays absent. Only an
//! entirely unparseable record is rejected (`MalformedRecord`).

use lazy_static::lazy_static;
use regex::Regex;
use tracing::debug;

use medrecon_common::entities::Condition;
use medrecon_common::error::SourceError;

use crate::models::{MedicalRecord, PartialRecord, RawRecord};

lazy_static! {
    static ref NON_ALNUM: Regex = Regex::new(r"[^a-z0-9\s]+").expect("static regex");
    static ref WHITESPACE: Regex = Regex::new(r"\s+").expect("static regex");
    static ref WORD: Regex = Regex::new(r"[a-z][a-z0-9-]{2,}").expect("static regex");
}

/// Stop words excluded from trend-term extraction.
const STOP_WORDS: &[&str] = &[
    "the", "a", "an", "and", "or", "in", "of", "to", "is", "was",
    "for", "on", "with", "this", "that", "are", "were", "be", "been",
    "by", "from", "we", "our", "their", "which", "also", "not", "its",
    "has", "have", "had", "after", "among", "between", "during",
];

/// Normalize a title for keying: lowercase, strip punctuation,
/// collapse whitespace.
pub fn normalize_title(title: &str) -> String {
    let lower = title.to_lowercase();
    let stripped = NON_ALNUM.replace_all(&lower, " ");
    WHITESPACE.replace_all(stripped.trim(), " ").to_string()
}

/// Extract trend terms from a title and optional abstract: lowercase word
/// tokens, stop words removed, order (and repeats) preserved so downstream
/// frequency counts stay meaningful.
pub fn trend_terms(title: &str, abstract_text: Option<&str>) -> Vec<String> {
    let mut text = title.to_lowercase();
    if let Some(a) = abstract_text {
        text.push(' ');
        text.push_str(&a.to_lowercase());
    }

    WORD.find_iter(&text)
        .map(|m| m.as_str().to_string())
        .filter(|w| !STOP_WORDS.contains(&w.as_str()))
        .collect()
}

/// Map a `(RawRecord, PartialRecord)` pair into the canonical schema.
pub fn normalize(
    condition: &Condition,
    raw: &RawRecord,
    partial: PartialRecord,
) -> Result<MedicalRecord, SourceError> {
    if partial.is_unusable() {
        return Err(SourceError::MalformedRecord {
            source_name: raw.source_type.as_str().to_string(),
            reason: "record has no title, gene symbol, or trial id".to_string(),
        });
    }

    let record_type = raw.source_type.record_type();

    let genes: std::collections::BTreeSet<String> = partial
        .genes
        .iter()
        .map(|g| g.trim().to_uppercase())
        .filter(|g| !g.is_empty())
        .collect();

    let canonical_key = match record_type {
        medrecon_common::entities::RecordType::Literature => {
            // `is_unusable` guarantees a non-empty title for literature
            let title = partial.title.as_deref().unwrap_or_default();
            match partial.year {
                Some(year) => format!("{}:{}", normalize_title(title), year),
                None => normalize_title(title),
            }
        }
        medrecon_common::entities::RecordType::GeneAssociation => {
            // A symbol-less association has no identity; an empty symbol
            // would collapse every such record into one key
            let symbol = genes.iter().next().cloned().ok_or_else(|| {
                SourceError::MalformedRecord {
                    source_name: raw.source_type.as_str().to_string(),
                    reason: "gene association record has no gene symbol".to_string(),
                }
            })?;
            format!("GENE:{}:{}", symbol, condition.name())
        }
        medrecon_common::entities::RecordType::Trial => match &partial.trial_id {
            Some(id) => id.trim().to_uppercase(),
            None => {
                let title = partial.title.as_deref().unwrap_or_default();
                let status = partial
                    .status
                    .as_ref()
                    .map(|s| s.as_str().to_lowercase())
                    .unwrap_or_else(|| "unknown".to_string());
                format!("{}:{}", normalize_title(title), status)
            }
        },
    };

    let title_or_name = partial
        .title
        .clone()
        .or_else(|| genes.iter().next().cloned())
        .or_else(|| partial.trial_id.clone())
        .unwrap_or_default();

    let terms = match record_type {
        medrecon_common::entities::RecordType::Literature => trend_terms(
            partial.title.as_deref().unwrap_or_default(),
            partial.abstract_text.as_deref(),
        ),
        _ => Vec::new(),
    };

    debug!(
        source = %raw.source_type,
        key = %canonical_key,
        "record normalized"
    );

    Ok(MedicalRecord {
        condition: condition.clone(),
        record_type,
        canonical_key,
        source_type: raw.source_type,
        source_id: raw.source_id.clone(),
        title_or_name,
        year: partial.year,
        status: partial.status,
        associated_genes: genes,
        trend_terms: terms,
        fetched_at: raw.fetched_at,
        raw_ref: raw.source_id.clone(),
    })
}
