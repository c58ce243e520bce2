//! Port interfaces for dependency inversion. Concrete implementations live
//! in the infrastructure crates (`ingest-idempotency`, `ingest-search`,
//! `ingest-persistence`, `ingest-adapters`); this crate only defines the
//! seams.

pub mod contact_store;
pub mod idempotency;
pub mod search_writer;
pub mod transport;

pub use contact_store::ContactStore;
pub use idempotency::{IdempotencyStore, IdempotencyToken};
pub use search_writer::SearchWriter;
pub use transport::{PubSubTransport, PulledMessage};
