//! The idempotency kernel (spec §4.C): `process`/`process_batch` wrap a
//! processor closure with atomic claim-and-record semantics over an
//! `IdempotencyStore`.

use crate::keys::{key_for_batch, key_for_create, key_for_mutable};
use chrono::{DateTime, Utc};
use ingest_schemas::events::{DomainEvent, Operation};
use ingest_types::error::{IngestError, Result};
use ingest_types::ports::idempotency::IdempotencyStore;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// TTL class for idempotency keys and the payload references they guard
/// (spec §5: "idempotency keys 24h, office payload references 7d, email
/// references 30d").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TtlClass {
    IdempotencyKey,
    OfficePayload,
    EmailPayload,
}

impl TtlClass {
    pub fn duration(self) -> Duration {
        match self {
            TtlClass::IdempotencyKey => Duration::from_secs(24 * 3600),
            TtlClass::OfficePayload => Duration::from_secs(7 * 24 * 3600),
            TtlClass::EmailPayload => Duration::from_secs(30 * 24 * 3600),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingStatus {
    Processing,
    Completed,
    Error,
}

/// Persisted idempotency state value schema (spec §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdempotencyRecord {
    pub event_type: String,
    pub user_id: String,
    pub operation: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batch_id: Option<String>,
    pub stored_at: DateTime<Utc>,
    pub status: ProcessingStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processing_time_seconds: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_type: Option<String>,
}

/// Outcome of routing a single event through the kernel.
#[derive(Debug, Clone, PartialEq)]
pub enum ProcessOutcome {
    /// `fn` ran and produced a result.
    Processed(Value),
    /// The key was already `completed`; `fn` was not invoked.
    IdempotentHit(Value),
}

/// Derive the per-event idempotency key using the create/mutable rules
/// (spec §4.C). Batch aggregation uses a separate key via `key_for_batch`.
pub fn derive_key(event: &DomainEvent) -> String {
    let entity_id = event.payload.entity_id();
    match event.operation {
        Operation::Create => key_for_create(&event.provider, entity_id, &event.user_id),
        Operation::Update | Operation::Delete => {
            key_for_mutable(&event.provider, entity_id, &event.user_id, event.last_updated)
        }
    }
}

pub struct IdempotencyKernel {
    store: Arc<dyn IdempotencyStore>,
    ttl: Duration,
}

impl IdempotencyKernel {
    pub fn new(store: Arc<dyn IdempotencyStore>) -> Self {
        Self {
            store,
            ttl: TtlClass::IdempotencyKey.duration(),
        }
    }

    pub fn with_ttl(store: Arc<dyn IdempotencyStore>, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    /// Process one event under its idempotency key. `f` runs at most once
    /// per key across arbitrarily many redeliveries within the TTL (P4).
    pub async fn process<F, Fut>(&self, event: &DomainEvent, f: F) -> Result<ProcessOutcome>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Value>>,
    {
        let key = derive_key(event);
        self.process_with_key(&key, event, f).await
    }

    async fn process_with_key<F, Fut>(
        &self,
        key: &str,
        event: &DomainEvent,
        f: F,
    ) -> Result<ProcessOutcome>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Value>>,
    {
        // The claim is intentionally never released on the happy path: the
        // entry (and its eventual `completed` status) must survive for the
        // full TTL so a redelivery observes the prior attempt instead of
        // re-running `f` (spec §4.C, P4). `release` exists as a primitive
        // for callers that want to shorten that window explicitly.
        match self.store.try_acquire(key, self.ttl).await {
            Ok(_token) => {}
            Err(IngestError::AlreadyProcessed) => {
                let cached = self.store.get_result(key).await?.unwrap_or_default();
                let value: Value = if cached.is_empty() {
                    Value::Null
                } else {
                    serde_json::from_slice(&cached)?
                };
                return Ok(ProcessOutcome::IdempotentHit(value));
            }
            Err(e) => return Err(e),
        };

        let started = std::time::Instant::now();
        let outcome = f().await;
        let elapsed = started.elapsed().as_secs_f64();

        let record = match &outcome {
            Ok(value) => IdempotencyRecord {
                event_type: event.payload.type_name().to_string(),
                user_id: event.user_id.clone(),
                operation: format!("{:?}", event.operation).to_lowercase(),
                batch_id: event.batch_id.clone(),
                stored_at: Utc::now(),
                status: ProcessingStatus::Completed,
                processed_at: Some(Utc::now()),
                processing_time_seconds: Some(elapsed),
                result: Some(value.clone()),
                error: None,
                error_type: None,
            },
            Err(e) => IdempotencyRecord {
                event_type: event.payload.type_name().to_string(),
                user_id: event.user_id.clone(),
                operation: format!("{:?}", event.operation).to_lowercase(),
                batch_id: event.batch_id.clone(),
                stored_at: Utc::now(),
                status: ProcessingStatus::Error,
                processed_at: Some(Utc::now()),
                processing_time_seconds: Some(elapsed),
                result: None,
                error: Some(e.to_string()),
                error_type: Some(error_kind(e)),
            },
        };

        let encoded = serde_json::to_vec(&record)?;
        self.store.store_result(key, encoded, self.ttl).await?;

        match outcome {
            Ok(value) => Ok(ProcessOutcome::Processed(value)),
            Err(e) => Err(e),
        }
    }

    /// Process a batch: each child event is processed under its own key;
    /// the batch key records aggregate success/error counts.
    pub async fn process_batch<F, Fut>(
        &self,
        batch_id: &str,
        correlation_id: Option<&str>,
        events: &[DomainEvent],
        mut f: F,
    ) -> Result<BatchOutcome>
    where
        F: FnMut(&DomainEvent) -> Fut,
        Fut: Future<Output = Result<Value>>,
    {
        let batch_key = key_for_batch(batch_id, correlation_id);
        let mut success_count = 0u32;
        let mut error_count = 0u32;

        for event in events {
            let fut = f(event);
            match self.process_with_key(&derive_key(event), event, || fut).await {
                Ok(_) => success_count += 1,
                Err(_) => error_count += 1,
            }
        }

        let record = IdempotencyRecord {
            event_type: "batch".to_string(),
            user_id: events.first().map(|e| e.user_id.clone()).unwrap_or_default(),
            operation: "batch".to_string(),
            batch_id: Some(batch_id.to_string()),
            stored_at: Utc::now(),
            status: if error_count == 0 {
                ProcessingStatus::Completed
            } else {
                ProcessingStatus::Error
            },
            processed_at: Some(Utc::now()),
            processing_time_seconds: None,
            result: Some(serde_json::json!({
                "success_count": success_count,
                "error_count": error_count,
            })),
            error: None,
            error_type: None,
        };
        let encoded = serde_json::to_vec(&record)?;
        self.store
            .store_result(&batch_key, encoded, self.ttl)
            .await?;

        Ok(BatchOutcome {
            success_count,
            error_count,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchOutcome {
    pub success_count: u32,
    pub error_count: u32,
}

fn error_kind(e: &IngestError) -> String {
    match e {
        IngestError::Validation(_) => "validation",
        IngestError::UnsupportedEvent(_) => "unsupported_event",
        IngestError::Transport(_) => "transient_transport",
        IngestError::TransientSink(_) => "transient_sink",
        IngestError::PermanentSink(_) => "permanent_sink",
        IngestError::AlreadyProcessed => "idempotent_hit",
        IngestError::UnknownSubscription { .. } => "fatal_configuration",
        IngestError::Configuration(_) => "fatal_configuration",
        IngestError::Serialization(_) => "validation",
        IngestError::Store(_) => "permanent_sink",
        IngestError::NotFound(_) => "not_found",
        IngestError::Other(_) => "other",
    }
    .to_string()
}
