//! Versioned domain event schemas (spec §3, §4.A).
//!
//! `events` defines the envelope-plus-payload union and the nine domain
//! payload kinds (ten counting document fragments); `time` implements the
//! flexible timestamp parsing spec §4.A requires; `version` carries the
//! schema-version/adapter pattern for forward-compatible evolution;
//! `parse` implements `parse`/`serialize` and their round-trip guarantee.

pub mod events;
pub mod parse;
pub mod time;
pub mod version;

pub use events::{DomainEvent, DomainEventPayload, Operation};
pub use parse::{parse, serialize, ValidationError};
pub use version::SchemaVersion;
