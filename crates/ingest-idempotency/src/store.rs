//! In-memory `IdempotencyStore`, grounded on the teacher's
//! `InMemoryIdempotencyStore`: a `DashMap` of entries plus a background
//! cleanup task, used for tests and single-instance deployments. Production
//! deployments use `redis_store::RedisIdempotencyStore` instead.

use async_trait::async_trait;
use dashmap::DashMap;
use ingest_types::error::{IngestError, Result};
use ingest_types::ports::idempotency::{IdempotencyStore, IdempotencyToken};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;

#[derive(Debug, Clone)]
struct Entry {
    expires_at: Instant,
    result: Option<Vec<u8>>,
    result_expires_at: Option<Instant>,
}

impl Entry {
    fn new(ttl: Duration) -> Self {
        Self {
            expires_at: Instant::now() + ttl,
            result: None,
            result_expires_at: None,
        }
    }

    fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }
}

#[derive(Clone)]
pub struct InMemoryIdempotencyStore {
    entries: Arc<DashMap<String, Entry>>,
    shutdown: Arc<AtomicBool>,
    _cleanup: Arc<JoinHandle<()>>,
}

impl InMemoryIdempotencyStore {
    pub fn new() -> Self {
        Self::with_cleanup_interval(Duration::from_secs(60))
    }

    pub fn with_cleanup_interval(cleanup_interval: Duration) -> Self {
        let entries = Arc::new(DashMap::new());
        let shutdown = Arc::new(AtomicBool::new(false));

        let entries_bg = entries.clone();
        let shutdown_bg = shutdown.clone();
        let handle = tokio::spawn(async move {
            loop {
                tokio::time::sleep(cleanup_interval).await;
                if shutdown_bg.load(Ordering::Relaxed) {
                    break;
                }
                entries_bg.retain(|_, entry: &mut Entry| !entry.is_expired());
            }
        });

        Self {
            entries,
            shutdown,
            _cleanup: Arc::new(handle),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for InMemoryIdempotencyStore {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for InMemoryIdempotencyStore {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
    }
}

#[async_trait]
impl IdempotencyStore for InMemoryIdempotencyStore {
    async fn try_acquire(&self, key: &str, ttl: Duration) -> Result<IdempotencyToken> {
        if let Some(existing) = self.entries.get(key) {
            if !existing.is_expired() {
                return Err(IngestError::AlreadyProcessed);
            }
        }
        self.entries.insert(key.to_string(), Entry::new(ttl));
        Ok(IdempotencyToken::new(key, ttl))
    }

    async fn release(&self, token: IdempotencyToken) -> Result<()> {
        if !token.is_expired() {
            self.entries.remove(&token.key);
        }
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        Ok(self
            .entries
            .get(key)
            .map(|e| !e.is_expired())
            .unwrap_or(false))
    }

    async fn ttl(&self, key: &str) -> Result<Option<Duration>> {
        Ok(self.entries.get(key).and_then(|e| {
            let now = Instant::now();
            (now < e.expires_at).then(|| e.expires_at - now)
        }))
    }

    async fn store_result(&self, key: &str, result: Vec<u8>, ttl: Duration) -> Result<()> {
        if let Some(mut entry) = self.entries.get_mut(key) {
            entry.result = Some(result);
            entry.result_expires_at = Some(Instant::now() + ttl);
        }
        Ok(())
    }

    async fn get_result(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.entries.get(key).and_then(|e| {
            let fresh = e
                .result_expires_at
                .map(|exp| Instant::now() < exp)
                .unwrap_or(false);
            fresh.then(|| e.result.clone()).flatten()
        }))
    }

    async fn cleanup_expired(&self) -> Result<u64> {
        let before = self.entries.len();
        self.entries.retain(|_, e| !e.is_expired());
        Ok((before - self.entries.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn second_acquire_of_same_key_is_rejected() {
        let store = InMemoryIdempotencyStore::new();
        let token = store.try_acquire("k1", Duration::from_secs(60)).await.unwrap();
        assert!(store.try_acquire("k1", Duration::from_secs(60)).await.is_err());
        store.release(token).await.unwrap();
        assert!(store.try_acquire("k1", Duration::from_secs(60)).await.is_ok());
    }

    #[tokio::test]
    async fn result_cache_round_trips() {
        let store = InMemoryIdempotencyStore::new();
        store
            .store_result("k1", b"done".to_vec(), Duration::from_secs(60))
            .await
            .unwrap();
        assert_eq!(store.get_result("k1").await.unwrap(), Some(b"done".to_vec()));
    }
}
