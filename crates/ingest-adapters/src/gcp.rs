//! GCP Pub/Sub `PubSubTransport`, talking to the Pub/Sub REST API directly
//! (spec §6: `pubsub.googleapis.com`, or the emulator via
//! `PUBSUB_EMULATOR_HOST`), in the same thin-`reqwest`-client idiom as
//! `ingest_search::HttpSearchWriter` / the teacher's `SerperProvider`.

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use ingest_types::error::{IngestError, Result};
use ingest_types::ports::transport::{FlowControl, PubSubTransport, PulledMessage};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, warn};

pub struct GcpPubSubTransport {
    client: reqwest::Client,
    base_url: String,
    project_id: String,
    /// Bearer token for `pubsub.googleapis.com`; unused against the
    /// unauthenticated local emulator.
    access_token: Option<String>,
}

impl GcpPubSubTransport {
    /// Talks to the local emulator at `emulator_host` (host:port), unauthenticated.
    pub fn emulator(project_id: impl Into<String>, emulator_host: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: format!("http://{emulator_host}/v1"),
            project_id: project_id.into(),
            access_token: None,
        }
    }

    /// Talks to the real `pubsub.googleapis.com`, bearer-authenticated.
    pub fn production(project_id: impl Into<String>, access_token: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: "https://pubsub.googleapis.com/v1".to_string(),
            project_id: project_id.into(),
            access_token: Some(access_token.into()),
        }
    }

    fn request(&self, method: reqwest::Method, url: String) -> reqwest::RequestBuilder {
        let request = self.client.request(method, url);
        match &self.access_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    fn topic_path(&self, topic: &str) -> String {
        format!("{}/projects/{}/topics/{}", self.base_url, self.project_id, topic)
    }

    fn subscription_path(&self, subscription: &str) -> String {
        format!("{}/projects/{}/subscriptions/{}", self.base_url, self.project_id, subscription)
    }

    fn transient(e: reqwest::Error) -> IngestError {
        IngestError::Transport(e.to_string())
    }
}

#[derive(Serialize)]
struct PublishRequest {
    messages: Vec<PubsubMessage>,
}

#[derive(Serialize, Deserialize)]
struct PubsubMessage {
    data: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    attributes: BTreeMap<String, String>,
}

#[derive(Serialize)]
struct PullRequest {
    #[serde(rename = "maxMessages")]
    max_messages: usize,
}

#[derive(Deserialize)]
struct PullResponse {
    #[serde(default, rename = "receivedMessages")]
    received_messages: Vec<ReceivedMessage>,
}

#[derive(Deserialize)]
struct ReceivedMessage {
    #[serde(rename = "ackId")]
    ack_id: String,
    message: PubsubMessage,
}

#[derive(Serialize)]
struct AckRequest {
    #[serde(rename = "ackIds")]
    ack_ids: Vec<String>,
}

#[derive(Serialize)]
struct ModifyAckDeadlineRequest {
    #[serde(rename = "ackIds")]
    ack_ids: Vec<String>,
    #[serde(rename = "ackDeadlineSeconds")]
    ack_deadline_seconds: i32,
}

#[async_trait]
impl PubSubTransport for GcpPubSubTransport {
    async fn publish(&self, topic: &str, data: Vec<u8>, attributes: BTreeMap<String, String>) -> Result<()> {
        let body = PublishRequest {
            messages: vec![PubsubMessage { data: BASE64.encode(data), attributes }],
        };

        let response = self
            .request(reqwest::Method::POST, format!("{}:publish", self.topic_path(topic)))
            .json(&body)
            .send()
            .await
            .map_err(Self::transient)?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            warn!(topic, %status, %text, "pubsub publish failed");
            return Err(if status.is_client_error() {
                IngestError::PermanentSink(format!("pubsub rejected publish: {status}"))
            } else {
                IngestError::TransientSink(format!("pubsub publish error: {status}"))
            });
        }
        Ok(())
    }

    async fn ensure_subscription(
        &self,
        topic: &str,
        subscription: &str,
        ack_deadline: Duration,
        retain_acked: bool,
        dead_letter_topic: Option<&str>,
        max_delivery_attempts: Option<u32>,
    ) -> Result<()> {
        #[derive(Serialize)]
        struct DeadLetterPolicy {
            #[serde(rename = "deadLetterTopic")]
            dead_letter_topic: String,
            #[serde(rename = "maxDeliveryAttempts")]
            max_delivery_attempts: i32,
        }

        #[derive(Serialize)]
        struct CreateSubscription {
            topic: String,
            #[serde(rename = "ackDeadlineSeconds")]
            ack_deadline_seconds: i32,
            #[serde(rename = "retainAckedMessages")]
            retain_acked_messages: bool,
            #[serde(rename = "deadLetterPolicy", skip_serializing_if = "Option::is_none")]
            dead_letter_policy: Option<DeadLetterPolicy>,
        }

        let dead_letter_policy = match (dead_letter_topic, max_delivery_attempts) {
            (Some(dlq_topic), Some(max_delivery_attempts)) => Some(DeadLetterPolicy {
                dead_letter_topic: format!("projects/{}/topics/{}", self.project_id, dlq_topic),
                max_delivery_attempts: max_delivery_attempts as i32,
            }),
            _ => None,
        };

        let response = self
            .request(reqwest::Method::PUT, self.subscription_path(subscription))
            .json(&CreateSubscription {
                topic: format!("projects/{}/topics/{}", self.project_id, topic),
                ack_deadline_seconds: ack_deadline.as_secs() as i32,
                retain_acked_messages: retain_acked,
                dead_letter_policy,
            })
            .send()
            .await
            .map_err(Self::transient)?;

        // ALREADY_EXISTS is a success for ensure-semantics.
        if response.status().is_success() || response.status() == reqwest::StatusCode::CONFLICT {
            debug!(subscription, "subscription ensured");
            return Ok(());
        }
        Err(IngestError::TransientSink(format!(
            "failed to ensure subscription {subscription}: {}",
            response.status()
        )))
    }

    async fn pull(&self, subscription: &str, flow_control: FlowControl) -> Result<Vec<PulledMessage>> {
        let response = self
            .request(reqwest::Method::POST, format!("{}:pull", self.subscription_path(subscription)))
            .json(&PullRequest { max_messages: flow_control.max_messages })
            .send()
            .await
            .map_err(Self::transient)?;

        if !response.status().is_success() {
            return Err(IngestError::TransientSink(format!("pubsub pull error: {}", response.status())));
        }

        let body: PullResponse = response.json().await.map_err(Self::transient)?;
        let mut pulled = Vec::with_capacity(body.received_messages.len());
        for received in body.received_messages {
            let data = BASE64
                .decode(received.message.data)
                .map_err(|e| IngestError::Other(anyhow::anyhow!(e)))?;
            pulled.push(PulledMessage {
                ack_id: received.ack_id,
                data,
                attributes: received.message.attributes,
            });
        }
        Ok(pulled)
    }

    async fn ack(&self, subscription: &str, ack_id: &str) -> Result<()> {
        let response = self
            .request(reqwest::Method::POST, format!("{}:acknowledge", self.subscription_path(subscription)))
            .json(&AckRequest { ack_ids: vec![ack_id.to_string()] })
            .send()
            .await
            .map_err(Self::transient)?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(IngestError::TransientSink(format!("pubsub ack error: {}", response.status())))
        }
    }

    async fn nack(&self, subscription: &str, ack_id: &str) -> Result<()> {
        // Pub/Sub has no direct "nack"; setting the ack deadline to 0 makes
        // the message immediately eligible for redelivery.
        let response = self
            .request(reqwest::Method::POST, format!("{}:modifyAckDeadline", self.subscription_path(subscription)))
            .json(&ModifyAckDeadlineRequest {
                ack_ids: vec![ack_id.to_string()],
                ack_deadline_seconds: 0,
            })
            .send()
            .await
            .map_err(Self::transient)?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(IngestError::TransientSink(format!("pubsub nack error: {}", response.status())))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn publish_encodes_data_as_base64_and_posts_to_topic_path() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/projects/proj/topics/emails:publish"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"messageIds": ["1"]})))
            .mount(&server)
            .await;

        let transport = GcpPubSubTransport {
            client: reqwest::Client::new(),
            base_url: format!("{}/v1", server.uri()),
            project_id: "proj".to_string(),
            access_token: None,
        };

        transport.publish("emails", b"hi".to_vec(), BTreeMap::new()).await.unwrap();
    }

    #[tokio::test]
    async fn pull_decodes_base64_payload() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/projects/proj/subscriptions/sub-a:pull"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "receivedMessages": [{"ackId": "a1", "message": {"data": BASE64.encode(b"hi")}}]
            })))
            .mount(&server)
            .await;

        let transport = GcpPubSubTransport {
            client: reqwest::Client::new(),
            base_url: format!("{}/v1", server.uri()),
            project_id: "proj".to_string(),
            access_token: None,
        };

        let pulled = transport.pull("sub-a", FlowControl::default()).await.unwrap();
        assert_eq!(pulled.len(), 1);
        assert_eq!(pulled[0].data, b"hi");
        assert_eq!(pulled[0].ack_id, "a1");
    }
}
