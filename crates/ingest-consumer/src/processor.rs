//! The seam a service plugs its own business logic into: given a parsed
//! event, do the work and return a JSON result to persist in the
//! idempotency record.

use async_trait::async_trait;
use ingest_schemas::events::DomainEvent;
use ingest_types::error::Result;
use serde_json::Value;

#[async_trait]
pub trait EventProcessor: Send + Sync {
    async fn process(&self, event: &DomainEvent) -> Result<Value>;

    /// Identifies the processor in logs and metrics.
    fn name(&self) -> &str;
}
