//! Idempotency kernel (spec §4.C): key derivation, dedupe store
//! implementations, and the `process`/`process_batch` wrapper.

pub mod kernel;
pub mod keys;
pub mod redis_store;
pub mod store;

pub use kernel::{derive_key, BatchOutcome, IdempotencyKernel, IdempotencyRecord, ProcessOutcome, ProcessingStatus, TtlClass};
pub use redis_store::RedisIdempotencyStore;
pub use store::InMemoryIdempotencyStore;
