//! The typed consumer runtime (spec §4.E): pull a batch from one topic's
//! subscription, dispatch each message concurrently under a semaphore,
//! idempotency-wrap the processor call, ack/nack, and route failures the
//! runtime already knows are permanent straight to the subscription's
//! dead-letter topic. Retryable failures are nacked and left to the
//! subscription's own dead-letter policy (`max_retry_attempts`, wired in at
//! `ensure_subscription` time) to redeliver-then-dead-letter.
//!
//! State machine per message: received -> parsed -> buffered -> dispatched
//! -> {acked | nacked}, grounded on the teacher's `Worker`/`WorkerPool`
//! job-polling loop, generalized from job leasing to streaming-pull batches.

use crate::metrics::ConsumerMetrics;
use crate::processor::EventProcessor;
use ingest_idempotency::{IdempotencyKernel, ProcessOutcome};
use ingest_registry::SubscriptionConfig;
use ingest_reliability::classify;
use ingest_schemas::parse::parse;
use ingest_types::error::Result;
use ingest_types::ports::transport::{FlowControl, PubSubTransport};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone)]
pub struct ConsumerConfig {
    /// Maximum concurrently-dispatched messages per topic.
    pub max_concurrency: usize,
    /// Idle sleep when a pull returns nothing.
    pub empty_poll_backoff: Duration,
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        Self {
            max_concurrency: num_cpus::get().max(2),
            empty_poll_backoff: Duration::from_millis(500),
        }
    }
}

/// Runs the pull/dispatch loop for one `(service, topic)` subscription.
pub struct TopicConsumer {
    service: String,
    topic: String,
    subscription: SubscriptionConfig,
    transport: Arc<dyn PubSubTransport>,
    processor: Arc<dyn EventProcessor>,
    kernel: Arc<IdempotencyKernel>,
    metrics: Arc<ConsumerMetrics>,
    config: ConsumerConfig,
    semaphore: Arc<Semaphore>,
    running: Arc<AtomicBool>,
}

impl TopicConsumer {
    pub fn new(
        service: impl Into<String>,
        topic: impl Into<String>,
        transport: Arc<dyn PubSubTransport>,
        processor: Arc<dyn EventProcessor>,
        kernel: Arc<IdempotencyKernel>,
        metrics: Arc<ConsumerMetrics>,
        config: ConsumerConfig,
    ) -> Self {
        let service = service.into();
        let topic = topic.into();
        let subscription = ingest_registry::config(&service, &topic);
        let semaphore = Arc::new(Semaphore::new(config.max_concurrency));
        Self {
            service,
            topic,
            subscription,
            transport,
            processor,
            kernel,
            metrics,
            config,
            semaphore,
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::Relaxed);
    }

    /// Ensure the subscription exists, then pull/dispatch in a loop until
    /// `stop` is called.
    pub async fn run(&self) -> Result<()> {
        ingest_registry::validate(&self.service, &self.topic)?;

        self.transport
            .ensure_subscription(
                &self.topic,
                &self.subscription.subscription_name,
                self.subscription.ack_deadline(),
                self.subscription.retain_acked,
                self.subscription.dead_letter_topic.as_deref(),
                self.subscription.dead_letter_topic.as_ref().map(|_| self.subscription.max_retry_attempts),
            )
            .await?;

        self.running.store(true, Ordering::Relaxed);
        info!(
            service = %self.service,
            topic = %self.topic,
            subscription = %self.subscription.subscription_name,
            "consumer starting"
        );

        while self.running.load(Ordering::Relaxed) {
            let flow_control = FlowControl {
                max_messages: self.subscription.batch_size,
                ..FlowControl::default()
            };
            let messages = self
                .transport
                .pull(&self.subscription.subscription_name, flow_control)
                .await?;

            if messages.is_empty() {
                self.metrics.set_buffer_depth(&self.topic, 0);
                tokio::time::sleep(self.config.empty_poll_backoff).await;
                continue;
            }

            self.metrics.set_buffer_depth(&self.topic, messages.len() as u64);
            debug!(topic = %self.topic, count = messages.len(), "buffered batch");

            let mut handles = Vec::with_capacity(messages.len());
            for message in messages {
                let permit = self.semaphore.clone().acquire_owned().await.expect("semaphore closed");
                let this = self.dispatch_ctx();
                handles.push(tokio::spawn(async move {
                    let _permit = permit;
                    this.dispatch_one(message).await;
                }));
            }
            futures::future::join_all(handles).await;
        }

        info!(service = %self.service, topic = %self.topic, "consumer stopped");
        Ok(())
    }

    fn dispatch_ctx(&self) -> DispatchCtx {
        DispatchCtx {
            topic: self.topic.clone(),
            subscription_name: self.subscription.subscription_name.clone(),
            dead_letter_topic: self.subscription.dead_letter_topic.clone(),
            transport: self.transport.clone(),
            processor: self.processor.clone(),
            kernel: self.kernel.clone(),
            metrics: self.metrics.clone(),
        }
    }
}

/// Cloneable per-message dispatch state, split out of `TopicConsumer` so a
/// single message can be handled inside a spawned task.
struct DispatchCtx {
    topic: String,
    subscription_name: String,
    dead_letter_topic: Option<String>,
    transport: Arc<dyn PubSubTransport>,
    processor: Arc<dyn EventProcessor>,
    kernel: Arc<IdempotencyKernel>,
    metrics: Arc<ConsumerMetrics>,
}

impl DispatchCtx {
    async fn dispatch_one(&self, message: ingest_types::ports::transport::PulledMessage) {
        // received -> parsed
        let event = match parse(&self.topic, &message.data) {
            Ok(event) => event,
            Err(e) => {
                warn!(topic = %self.topic, error = %e, "dropping unparseable message");
                self.metrics.record_error();
                self.route_permanent_failure(&message.ack_id, &message.data).await;
                return;
            }
        };

        // buffered -> dispatched
        let processor = self.processor.clone();
        let outcome = self
            .kernel
            .process(&event, || {
                let processor = processor.clone();
                let event = event.clone();
                async move { processor.process(&event).await }
            })
            .await;

        match outcome {
            Ok(ProcessOutcome::Processed(_)) => {
                self.metrics.record_processed();
                self.ack(&message.ack_id).await;
            }
            Ok(ProcessOutcome::IdempotentHit(_)) => {
                self.metrics.record_idempotent_hit();
                self.ack(&message.ack_id).await;
            }
            Err(e) => {
                self.metrics.record_error();
                if classify(&e).is_retryable() {
                    debug!(topic = %self.topic, error = %e, "nacking for redelivery");
                    self.nack(&message.ack_id).await;
                } else {
                    error!(topic = %self.topic, error = %e, "permanent failure");
                    self.route_permanent_failure(&message.ack_id, &message.data).await;
                }
            }
        }
    }

    /// Routes a message the runtime already knows is hopeless (parse
    /// failure, permanent sink rejection) straight to the dead-letter
    /// topic rather than waiting on the transport's delivery-attempt
    /// policy to give up on it. Retryable failures never reach here: they
    /// are nacked instead, and it is the subscription's own dead-letter
    /// policy (configured in `ensure_subscription`) that eventually routes
    /// a persistently-failing retryable message here for us.
    async fn route_permanent_failure(&self, ack_id: &str, data: &[u8]) {
        if let Some(dlq) = &self.dead_letter_topic {
            if let Err(e) = self
                .transport
                .publish(dlq, data.to_vec(), BTreeMap::new())
                .await
            {
                error!(topic = %self.topic, dead_letter_topic = %dlq, error = %e, "failed to publish to dead letter topic");
            } else {
                self.metrics.record_dead_lettered();
            }
        }
        self.ack(ack_id).await;
    }

    async fn ack(&self, ack_id: &str) {
        if let Err(e) = self.transport.ack(&self.subscription_name, ack_id).await {
            error!(topic = %self.topic, error = %e, "ack failed");
        }
    }

    async fn nack(&self, ack_id: &str) {
        if let Err(e) = self.transport.nack(&self.subscription_name, ack_id).await {
            error!(topic = %self.topic, error = %e, "nack failed");
        }
    }
}
