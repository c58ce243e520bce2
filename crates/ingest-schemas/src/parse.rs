//! `parse`/`serialize` (spec §4.A): never partially construct on failure,
//! round-trip stable (P1).

use crate::events::DomainEvent;
use thiserror::Error;

#[derive(Debug, Error)]
#[error("validation error on topic '{topic}': {reason}")]
pub struct ValidationError {
    pub topic: String,
    pub reason: String,
}

/// Decode an event from a topic's message bytes. Fails atomically: a
/// malformed or incomplete payload never yields a partially built event.
pub fn parse(topic: &str, bytes: &[u8]) -> Result<DomainEvent, ValidationError> {
    serde_json::from_slice::<DomainEvent>(bytes).map_err(|e| ValidationError {
        topic: topic.to_string(),
        reason: e.to_string(),
    })
}

/// Encode an event as the UTF-8 JSON wire format (spec §6).
pub fn serialize(event: &DomainEvent) -> Vec<u8> {
    serde_json::to_vec(event).expect("DomainEvent serialization is infallible")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{DomainEventPayload, EmailPayload, Operation};
    use chrono::Utc;
    use ingest_types::envelope::EventMetadata;

    fn sample() -> DomainEvent {
        DomainEvent {
            metadata: EventMetadata::new("office_service", "1.0.0"),
            user_id: "u1".into(),
            operation: Operation::Create,
            provider: "gmail".into(),
            last_updated: Utc::now(),
            sync_timestamp: Utc::now(),
            batch_id: None,
            raw_provider_id: None,
            payload: DomainEventPayload::Email(EmailPayload {
                id: "e1".into(),
                subject: "Hello".into(),
                body: "Hi".into(),
                from_address: "a@x.com".into(),
                to_addresses: vec!["b@y.com".into()],
                provider_message_id: "gmail-e1".into(),
                ..Default::default()
            }),
        }
    }

    #[test]
    fn round_trip_is_stable() {
        let event = sample();
        let bytes = serialize(&event);
        let parsed = parse("emails", &bytes).unwrap();
        assert_eq!(parsed.user_id, event.user_id);
        assert_eq!(serialize(&parsed), bytes);
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!(parse("emails", b"not json").is_err());
    }

    #[test]
    fn parse_rejects_missing_required_field() {
        let bytes = br#"{"event_id":"00000000-0000-0000-0000-000000000000"}"#;
        assert!(parse("emails", bytes).is_err());
    }
}
