//! Idempotency store port (spec §4.C). Grounded on the teacher's
//! `riptide-types::ports::idempotency` trait: a lock-acquisition token with
//! an expiry, plus default methods for the optional result-caching path.

use crate::error::Result;
use async_trait::async_trait;
use std::time::{Duration, SystemTime};

/// A claim on an idempotency key. Holding a token means the caller won the
/// race to process the associated event; it must be released (or allowed to
/// expire) once processing finishes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdempotencyToken {
    pub key: String,
    pub acquired_at: SystemTime,
    pub expires_at: SystemTime,
}

impl IdempotencyToken {
    pub fn new(key: impl Into<String>, ttl: Duration) -> Self {
        let acquired_at = SystemTime::now();
        Self {
            key: key.into(),
            acquired_at,
            expires_at: acquired_at + ttl,
        }
    }

    pub fn is_expired(&self) -> bool {
        SystemTime::now() >= self.expires_at
    }

    pub fn remaining_ttl(&self) -> Option<Duration> {
        self.expires_at.duration_since(SystemTime::now()).ok()
    }
}

/// Backend-agnostic idempotency store: atomic claim, release, and an
/// optional result cache keyed by the same fingerprint.
#[async_trait]
pub trait IdempotencyStore: Send + Sync {
    /// Atomically claim `key` for `ttl`. Fails (does not block) if another
    /// caller already holds an unexpired claim.
    async fn try_acquire(&self, key: &str, ttl: Duration) -> Result<IdempotencyToken>;

    /// Release a claim, making the key available again immediately. A no-op
    /// if the token has already expired.
    async fn release(&self, token: IdempotencyToken) -> Result<()>;

    /// Whether an unexpired claim exists for `key`.
    async fn exists(&self, key: &str) -> Result<bool>;

    /// Remaining TTL for `key`, if any.
    async fn ttl(&self, key: &str) -> Result<Option<Duration>> {
        let _ = key;
        Ok(None)
    }

    /// Persist a cached result for `key` with its own TTL.
    async fn store_result(&self, key: &str, result: Vec<u8>, ttl: Duration) -> Result<()> {
        let _ = (key, result, ttl);
        Ok(())
    }

    /// Retrieve a previously cached result for `key`, if present.
    async fn get_result(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let _ = key;
        Ok(None)
    }

    /// Best-effort cleanup of expired entries. Backends with native TTL
    /// support (Redis) can leave this a no-op.
    async fn cleanup_expired(&self) -> Result<u64> {
        Ok(0)
    }
}
