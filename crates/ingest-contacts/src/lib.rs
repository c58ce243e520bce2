//! Cross-source contact-discovery pipeline (spec §4.F).

pub mod event_builder;
pub mod extraction;
pub mod pipeline;
pub mod scoring;

pub use event_builder::contact_update_event;
pub use extraction::{extract_tuples, ContactEventType, ContactTuple};
pub use pipeline::discover_contacts;
pub use scoring::relevance_score;
