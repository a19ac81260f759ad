//! Error kinds for the sentinel engine.
//!
//! Per-transaction failures never escape `analyze_pending`/`analyze_trace` —
//! they degrade to a Risk Signal instead (see `engine.rs`). `SentinelError`
//! is reserved for the two startup-fatal conditions (artifact missing or
//! dimension mismatch) and for fallible constructors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SentinelError {
    #[error("scoring artifact not found or unreadable: {0}")]
    ArtifactUnavailable(String),

    #[error("scoring artifact expects {expected} features, got {actual}")]
    ArtifactDimensionMismatch { expected: usize, actual: usize },

    #[error("scoring artifact failed to deserialize: {0}")]
    ArtifactDecode(String),

    #[error("config load error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, SentinelError>;
