//! Pub/Sub transport port (spec §6): publish, streaming pull with flow
//! control, per-message ack/nack, dead-letter routing. The transport's own
//! wire protocol is out of scope; this crate only names the operations the
//! consumer runtime depends on.

use crate::error::Result;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::time::Duration;

/// A message pulled from a subscription, not yet decoded.
#[derive(Debug, Clone)]
pub struct PulledMessage {
    pub ack_id: String,
    pub data: Vec<u8>,
    pub attributes: BTreeMap<String, String>,
}

/// Per-pull flow control (spec §4.E: `max_messages`, `max_bytes`).
#[derive(Debug, Clone, Copy)]
pub struct FlowControl {
    pub max_messages: usize,
    pub max_bytes: usize,
}

impl Default for FlowControl {
    fn default() -> Self {
        Self {
            max_messages: 50,
            max_bytes: 1024 * 1024,
        }
    }
}

#[async_trait]
pub trait PubSubTransport: Send + Sync {
    /// Publish raw bytes with attributes to a topic.
    async fn publish(
        &self,
        topic: &str,
        data: Vec<u8>,
        attributes: BTreeMap<String, String>,
    ) -> Result<()>;

    /// Ensure a durable subscription exists, creating it with the given ack
    /// deadline if absent. `dead_letter_topic`/`max_delivery_attempts`, when
    /// both given, are handed to the transport's own dead-letter policy at
    /// creation time — the transport redelivers a nacked message until that
    /// attempt count is exhausted, then routes it to `dead_letter_topic`
    /// itself; the consumer runtime never decides this locally.
    async fn ensure_subscription(
        &self,
        topic: &str,
        subscription: &str,
        ack_deadline: Duration,
        retain_acked: bool,
        dead_letter_topic: Option<&str>,
        max_delivery_attempts: Option<u32>,
    ) -> Result<()>;

    /// Pull up to `flow_control.max_messages` / `max_bytes` from a
    /// subscription. Returns immediately with whatever is available.
    async fn pull(
        &self,
        subscription: &str,
        flow_control: FlowControl,
    ) -> Result<Vec<PulledMessage>>;

    async fn ack(&self, subscription: &str, ack_id: &str) -> Result<()>;

    /// Nack for redelivery. Whether this message ultimately comes back or
    /// gets dead-lettered is governed by the dead-letter policy configured
    /// in `ensure_subscription`, not by this call.
    async fn nack(&self, subscription: &str, ack_id: &str) -> Result<()>;
}
