//! Postgres adapters: `ContactStore` (spec §4.H) and the transactional
//! outbox that republishes `ContactEvent(operation=update)` updates (spec
//! §4.F) onto the real transport.

pub mod outbox;
pub mod postgres_contact_store;

pub use outbox::{OutboxPublisher, PostgresOutbox};
pub use postgres_contact_store::PostgresContactStore;
