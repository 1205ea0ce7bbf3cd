//! medrecon-common — Shared types, errors, and configuration used across all Medrecon crates.

pub mod config;
pub mod entities;
pub mod error;
pub mod guard;

// Re-export commonly used types
pub use config::{IntegrationConfig, RateLimits};
pub use entities::{Condition, RecordType, SourceType};
pub use error::SourceError;
