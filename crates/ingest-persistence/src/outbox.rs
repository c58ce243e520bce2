//! Transactional outbox (spec §4.F republish path): `ContactEvent` updates
//! built by the contact-discovery pipeline are enqueued in the same
//! Postgres transaction as the `contacts` upsert, then a background
//! publisher drains the table onto the real transport. Grounded on the
//! teacher's `adapters/outbox_publisher.rs` (poll/backoff/retry-count loop)
//! and `adapters/outbox_event_bus.rs` (enqueue-in-transaction write path).
//!
//! # Table schema
//!
//! ```sql
//! CREATE TABLE event_outbox (
//!     id             UUID PRIMARY KEY DEFAULT gen_random_uuid(),
//!     topic          TEXT NOT NULL,
//!     payload        BYTEA NOT NULL,
//!     created_at     TIMESTAMPTZ NOT NULL DEFAULT NOW(),
//!     published_at   TIMESTAMPTZ,
//!     retry_count    INTEGER NOT NULL DEFAULT 0,
//!     last_retry_at  TIMESTAMPTZ,
//!     last_error     TEXT
//! );
//! CREATE INDEX idx_outbox_unpublished ON event_outbox (created_at) WHERE published_at IS NULL;
//! ```

use ingest_schemas::events::DomainEvent;
use ingest_types::error::{IngestError, Result};
use ingest_types::ports::transport::PubSubTransport;
use sqlx::{PgPool, Row};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Enqueues outbound events under the store's write transaction.
pub struct PostgresOutbox {
    pool: PgPool,
}

impl PostgresOutbox {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn enqueue(&self, topic: &str, event: &DomainEvent) -> Result<()> {
        let payload = ingest_schemas::serialize(event);
        sqlx::query("INSERT INTO event_outbox (topic, payload) VALUES ($1, $2)")
            .bind(topic)
            .bind(payload)
            .execute(&self.pool)
            .await
            .map_err(|e| IngestError::Store(e.to_string()))?;
        Ok(())
    }
}

/// Background worker draining `event_outbox` onto the real transport.
pub struct OutboxPublisher {
    pool: PgPool,
    transport: Arc<dyn PubSubTransport>,
    poll_interval: Duration,
    batch_size: i64,
    max_retries: i32,
    min_backoff: Duration,
    max_backoff: Duration,
    backoff_multiplier: f64,
}

impl OutboxPublisher {
    pub fn new(pool: PgPool, transport: Arc<dyn PubSubTransport>) -> Self {
        Self {
            pool,
            transport,
            poll_interval: Duration::from_secs(5),
            batch_size: 100,
            max_retries: 5,
            min_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(300),
            backoff_multiplier: 2.0,
        }
    }

    /// Runs until `running` is cleared. Mirrors `TopicConsumer::run`'s
    /// cooperative shutdown flag rather than a `CancellationToken`, to stay
    /// consistent with the rest of the fabric's runtime shape.
    pub async fn run(&self, running: Arc<AtomicBool>) {
        info!(poll_interval = ?self.poll_interval, batch_size = self.batch_size, "starting outbox publisher");
        let mut ticker = tokio::time::interval(self.poll_interval);
        while running.load(Ordering::SeqCst) {
            ticker.tick().await;
            if let Err(e) = self.poll_and_publish().await {
                error!(error = %e, "error polling outbox");
            }
        }
        info!("outbox publisher stopped");
    }

    async fn poll_and_publish(&self) -> Result<()> {
        debug!("polling outbox for unpublished events");

        let rows = sqlx::query(
            "SELECT id, topic, payload
             FROM event_outbox
             WHERE published_at IS NULL
               AND retry_count < $1
               AND (last_retry_at IS NULL OR last_retry_at < NOW() - make_interval(secs => $2))
             ORDER BY created_at ASC
             LIMIT $3
             FOR UPDATE SKIP LOCKED",
        )
        .bind(self.max_retries)
        .bind(self.min_backoff.as_secs_f64())
        .bind(self.batch_size)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| IngestError::Store(e.to_string()))?;

        if rows.is_empty() {
            return Ok(());
        }

        info!(event_count = rows.len(), "publishing events from outbox");

        for row in rows {
            let id: Uuid = row.try_get("id").map_err(|e| IngestError::Store(e.to_string()))?;
            let topic: String = row.try_get("topic").map_err(|e| IngestError::Store(e.to_string()))?;
            let payload: Vec<u8> = row.try_get("payload").map_err(|e| IngestError::Store(e.to_string()))?;

            match self.transport.publish(&topic, payload, BTreeMap::new()).await {
                Ok(()) => self.mark_published(id).await?,
                Err(e) => {
                    warn!(event_id = %id, topic = %topic, error = %e, "failed to publish outbox event");
                    self.mark_retry(id, &e.to_string()).await?;
                }
            }
        }

        Ok(())
    }

    fn calculate_backoff(&self, retry_count: i32) -> Duration {
        let secs = self.min_backoff.as_secs_f64() * self.backoff_multiplier.powi(retry_count);
        let backoff = Duration::from_secs_f64(secs);
        backoff.min(self.max_backoff)
    }

    async fn mark_published(&self, id: Uuid) -> Result<()> {
        sqlx::query("UPDATE event_outbox SET published_at = NOW() WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| IngestError::Store(e.to_string()))?;
        Ok(())
    }

    async fn mark_retry(&self, id: Uuid, error: &str) -> Result<()> {
        sqlx::query(
            "UPDATE event_outbox SET retry_count = retry_count + 1, last_retry_at = NOW(), last_error = $2 WHERE id = $1",
        )
        .bind(id)
        .bind(error)
        .execute(&self.pool)
        .await
        .map_err(|e| IngestError::Store(e.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use ingest_types::ports::transport::{FlowControl, PulledMessage};

    struct UnreachableTransport;

    #[async_trait]
    impl PubSubTransport for UnreachableTransport {
        async fn publish(&self, _topic: &str, _data: Vec<u8>, _attributes: BTreeMap<String, String>) -> Result<()> {
            unreachable!("not exercised by the backoff test")
        }
        async fn ensure_subscription(
            &self,
            _topic: &str,
            _subscription: &str,
            _ack_deadline: Duration,
            _retain_acked: bool,
            _dead_letter_topic: Option<&str>,
            _max_delivery_attempts: Option<u32>,
        ) -> Result<()> {
            unreachable!()
        }
        async fn pull(&self, _subscription: &str, _flow_control: FlowControl) -> Result<Vec<PulledMessage>> {
            unreachable!()
        }
        async fn ack(&self, _subscription: &str, _ack_id: &str) -> Result<()> {
            unreachable!()
        }
        async fn nack(&self, _subscription: &str, _ack_id: &str) -> Result<()> {
            unreachable!()
        }
    }

    fn publisher() -> OutboxPublisher {
        let pool = PgPool::connect_lazy("postgres://localhost/ingest").unwrap();
        OutboxPublisher::new(pool, Arc::new(UnreachableTransport))
    }

    #[test]
    fn backoff_grows_exponentially_and_is_capped() {
        let p = publisher();
        assert_eq!(p.calculate_backoff(0), Duration::from_secs(1));
        assert_eq!(p.calculate_backoff(1), Duration::from_secs(2));
        assert_eq!(p.calculate_backoff(2), Duration::from_secs(4));
        assert_eq!(p.calculate_backoff(20), p.max_backoff);
    }
}
