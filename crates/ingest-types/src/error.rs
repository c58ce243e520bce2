//! Domain error type shared across the ingestion fabric.
//!
//! Grounded on the teacher's `RiptideError`: a single `thiserror` enum with
//! classification helpers, rather than per-crate error zoos. `classify`
//! (spec §7/§9) lives in `ingest-reliability` and matches on this enum.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, IngestError>;

#[derive(Error, Debug)]
pub enum IngestError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("unsupported event class: {0}")]
    UnsupportedEvent(String),

    #[error("transport unavailable: {0}")]
    Transport(String),

    #[error("sink temporarily unavailable: {0}")]
    TransientSink(String),

    #[error("sink rejected write: {0}")]
    PermanentSink(String),

    #[error("event already processed (idempotent hit)")]
    AlreadyProcessed,

    #[error("missing subscription for {service}/{topic}")]
    UnknownSubscription { service: String, topic: String },

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("store error: {0}")]
    Store(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("other: {0}")]
    Other(#[from] anyhow::Error),
}
