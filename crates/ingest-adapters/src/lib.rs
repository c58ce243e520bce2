//! `PubSubTransport` port implementations (spec §6): an in-memory queue for
//! tests and single-process runs, and a GCP Pub/Sub REST client for the
//! emulator and production.

pub mod gcp;
pub mod memory;

pub use gcp::GcpPubSubTransport;
pub use memory::InMemoryTransport;
