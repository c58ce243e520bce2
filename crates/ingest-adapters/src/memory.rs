//! In-memory `PubSubTransport`: a per-subscription queue behind a
//! `DashMap`, useful for tests and for running the fabric without a live
//! broker. Grounded on the same `DashMap`-per-key idiom as
//! `ingest_search::InMemorySearchWriter`.

use async_trait::async_trait;
use dashmap::DashMap;
use ingest_types::error::{IngestError, Result};
use ingest_types::ports::transport::{FlowControl, PubSubTransport, PulledMessage};
use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tracing::warn;

struct QueuedMessage {
    data: Vec<u8>,
    attributes: BTreeMap<String, String>,
    delivery_attempts: u32,
}

/// A subscription's dead-letter policy, mirroring what
/// `GcpPubSubTransport::ensure_subscription` hands to the real Pub/Sub API.
struct DeadLetterPolicy {
    topic: String,
    max_delivery_attempts: u32,
}

#[derive(Default)]
pub struct InMemoryTransport {
    /// subscription_name -> queue of not-yet-pulled messages
    queues: DashMap<String, Mutex<VecDeque<QueuedMessage>>>,
    /// topic -> subscriptions bound to it
    bindings: DashMap<String, Vec<String>>,
    /// ack_id -> (subscription_name, message), pulled but not yet acked/nacked
    in_flight: DashMap<String, (String, QueuedMessage)>,
    /// subscription_name -> dead-letter policy, if one was configured
    dead_letter_policies: DashMap<String, DeadLetterPolicy>,
    next_ack_id: AtomicU64,
}

impl InMemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PubSubTransport for InMemoryTransport {
    async fn publish(&self, topic: &str, data: Vec<u8>, attributes: BTreeMap<String, String>) -> Result<()> {
        let Some(subscriptions) = self.bindings.get(topic).map(|b| b.clone()) else {
            return Ok(());
        };
        for subscription in subscriptions {
            if let Some(queue) = self.queues.get(&subscription) {
                queue.lock().unwrap().push_back(QueuedMessage {
                    data: data.clone(),
                    attributes: attributes.clone(),
                    delivery_attempts: 0,
                });
            }
        }
        Ok(())
    }

    async fn ensure_subscription(
        &self,
        topic: &str,
        subscription: &str,
        _ack_deadline: Duration,
        _retain_acked: bool,
        dead_letter_topic: Option<&str>,
        max_delivery_attempts: Option<u32>,
    ) -> Result<()> {
        self.queues.entry(subscription.to_string()).or_insert_with(|| Mutex::new(VecDeque::new()));
        let mut subscriptions = self.bindings.entry(topic.to_string()).or_default();
        if !subscriptions.contains(&subscription.to_string()) {
            subscriptions.push(subscription.to_string());
        }
        if let (Some(topic), Some(max_delivery_attempts)) = (dead_letter_topic, max_delivery_attempts) {
            self.dead_letter_policies.insert(
                subscription.to_string(),
                DeadLetterPolicy { topic: topic.to_string(), max_delivery_attempts },
            );
        }
        Ok(())
    }

    async fn pull(&self, subscription: &str, flow_control: FlowControl) -> Result<Vec<PulledMessage>> {
        let Some(queue) = self.queues.get(subscription) else {
            return Err(IngestError::UnknownSubscription {
                service: String::new(),
                topic: subscription.to_string(),
            });
        };

        let mut queue = queue.lock().unwrap();
        let mut pulled = Vec::new();
        let mut bytes = 0usize;
        while pulled.len() < flow_control.max_messages {
            let Some(message) = queue.pop_front() else { break };
            bytes += message.data.len();
            if bytes > flow_control.max_bytes && !pulled.is_empty() {
                queue.push_front(message);
                break;
            }
            let ack_id = self.next_ack_id.fetch_add(1, Ordering::SeqCst).to_string();
            let attributes = message.attributes.clone();
            let data = message.data.clone();
            self.in_flight.insert(ack_id.clone(), (subscription.to_string(), message));
            pulled.push(PulledMessage { ack_id, data, attributes });
        }
        Ok(pulled)
    }

    async fn ack(&self, _subscription: &str, ack_id: &str) -> Result<()> {
        if self.in_flight.remove(ack_id).is_none() {
            warn!(ack_id, "ack of unknown or already-resolved message");
        }
        Ok(())
    }

    /// Redelivers up to the subscription's configured
    /// `max_delivery_attempts`; once exhausted, routes to the dead-letter
    /// topic instead of requeueing, mirroring GCP Pub/Sub's own dead-letter
    /// policy rather than leaving retry exhaustion undecided.
    async fn nack(&self, _subscription: &str, ack_id: &str) -> Result<()> {
        let Some((_, (subscription, mut message))) = self.in_flight.remove(ack_id) else {
            warn!(ack_id, "nack of unknown or already-resolved message");
            return Ok(());
        };

        message.delivery_attempts += 1;
        let policy = self.dead_letter_policies.get(&subscription);
        let exhausted = policy
            .as_ref()
            .map(|p| message.delivery_attempts >= p.max_delivery_attempts)
            .unwrap_or(false);

        if exhausted {
            let dlq_topic = policy.unwrap().topic.clone();
            drop(policy);
            self.publish(&dlq_topic, message.data, message.attributes).await?;
        } else {
            drop(policy);
            if let Some(queue) = self.queues.get(&subscription) {
                queue.lock().unwrap().push_front(message);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn published_message_is_pulled_from_bound_subscription() {
        let transport = InMemoryTransport::new();
        transport.ensure_subscription("emails", "sub-a", Duration::from_secs(60), false, None, None).await.unwrap();
        transport.publish("emails", b"hello".to_vec(), BTreeMap::new()).await.unwrap();

        let pulled = transport.pull("sub-a", FlowControl::default()).await.unwrap();
        assert_eq!(pulled.len(), 1);
        assert_eq!(pulled[0].data, b"hello");
    }

    #[tokio::test]
    async fn nacked_message_is_redelivered() {
        let transport = InMemoryTransport::new();
        transport.ensure_subscription("emails", "sub-a", Duration::from_secs(60), false, None, None).await.unwrap();
        transport.publish("emails", b"hello".to_vec(), BTreeMap::new()).await.unwrap();

        let pulled = transport.pull("sub-a", FlowControl::default()).await.unwrap();
        transport.nack("sub-a", &pulled[0].ack_id).await.unwrap();

        let redelivered = transport.pull("sub-a", FlowControl::default()).await.unwrap();
        assert_eq!(redelivered.len(), 1);
    }

    #[tokio::test]
    async fn acked_message_is_not_redelivered() {
        let transport = InMemoryTransport::new();
        transport.ensure_subscription("emails", "sub-a", Duration::from_secs(60), false, None, None).await.unwrap();
        transport.publish("emails", b"hello".to_vec(), BTreeMap::new()).await.unwrap();

        let pulled = transport.pull("sub-a", FlowControl::default()).await.unwrap();
        transport.ack("sub-a", &pulled[0].ack_id).await.unwrap();

        let next = transport.pull("sub-a", FlowControl::default()).await.unwrap();
        assert!(next.is_empty());
    }

    #[tokio::test]
    async fn message_is_dead_lettered_after_max_delivery_attempts() {
        let transport = InMemoryTransport::new();
        transport
            .ensure_subscription("emails", "sub-a", Duration::from_secs(60), false, Some("emails-dlq"), Some(2))
            .await
            .unwrap();
        transport
            .ensure_subscription("emails-dlq", "sub-a-dlq", Duration::from_secs(60), false, None, None)
            .await
            .unwrap();
        transport.publish("emails", b"hello".to_vec(), BTreeMap::new()).await.unwrap();

        for _ in 0..2 {
            let pulled = transport.pull("sub-a", FlowControl::default()).await.unwrap();
            assert_eq!(pulled.len(), 1);
            transport.nack("sub-a", &pulled[0].ack_id).await.unwrap();
        }

        assert!(transport.pull("sub-a", FlowControl::default()).await.unwrap().is_empty());
        let dead_lettered = transport.pull("sub-a-dlq", FlowControl::default()).await.unwrap();
        assert_eq!(dead_lettered.len(), 1);
        assert_eq!(dead_lettered[0].data, b"hello");
    }
}
