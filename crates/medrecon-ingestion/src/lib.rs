//! medrecon-ingestion — Medical research integration engine.
//! - Source adapters (literature, gene associations, clinical trials)
//! - Resilience layer (retry/backoff/rate limiting)
//! - Normalization into the canonical record schema
//! - Deduplication by canonical key
//! - Per-condition aggregation
//! - Pipeline orchestration

pub mod aggregate;
pub mod dedup;
pub mod models;
pub mod normalize;
pub mod pipeline;
pub mod resilience;
pub mod sources;
