//! Document factory (spec §4.D): a pure dispatcher over the closed event
//! union that produces a canonical search-backend document. No I/O, no
//! mutation of its input — `build_document` is just a big pattern match,
//! so "unrecognized event class" is a compile-time impossibility rather
//! than a runtime branch (spec §9 redesign note on duck-typed unions).

use chrono::Utc;
use ingest_schemas::events::{DomainEvent, DomainEventPayload, Operation};
use ingest_types::ports::search_writer::SearchDocument;
use serde_json::{json, Value};
use std::collections::BTreeMap;

fn base_metadata(event: &DomainEvent) -> BTreeMap<String, Value> {
    let mut metadata = BTreeMap::new();
    metadata.insert(
        "operation".to_string(),
        json!(format!("{:?}", event.operation).to_lowercase()),
    );
    metadata.insert("provider".to_string(), json!(event.provider));
    metadata.insert("sync_timestamp".to_string(), json!(event.sync_timestamp));
    if let Some(batch_id) = &event.batch_id {
        metadata.insert("batch_id".to_string(), json!(batch_id));
    }
    metadata
}

/// Build the canonical search document for one event. Total over all ten
/// payload variants (spec §4.D field-mapping table).
pub fn build_document(event: &DomainEvent) -> SearchDocument {
    let mut metadata = base_metadata(event);
    let source_type = event.payload.type_name().to_string();
    let doc_id = event.payload.entity_id().to_string();

    let (title, content, sender, recipients, folder, parent_doc_id, fragment_sequence) =
        match &event.payload {
            DomainEventPayload::Email(e) => {
                metadata.insert("thread_id".to_string(), json!(e.thread_id));
                metadata.insert("is_read".to_string(), json!(e.is_read));
                metadata.insert("is_starred".to_string(), json!(e.is_starred));
                metadata.insert("has_attachments".to_string(), json!(e.has_attachments));
                metadata.insert("labels".to_string(), json!(e.labels));
                (
                    Some(e.subject.clone()),
                    Some(e.body.clone()),
                    Some(e.from_address.clone()),
                    e.to_addresses.clone(),
                    None,
                    None,
                    None,
                )
            }
            DomainEventPayload::Calendar(e) => {
                metadata.insert("status".to_string(), json!(e.status));
                metadata.insert("all_day".to_string(), json!(e.all_day));
                let attendees = e.attendees.iter().map(|a| a.email.clone()).collect();
                (
                    Some(e.title.clone()),
                    e.description.clone(),
                    Some(e.organizer.clone()),
                    attendees,
                    Some(e.calendar_id.clone()),
                    None,
                    None,
                )
            }
            DomainEventPayload::Contact(e) => (
                e.display_name.clone(),
                e.notes.clone(),
                None,
                e.email_addresses.clone(),
                None,
                None,
                None,
            ),
            DomainEventPayload::Document(e) => {
                metadata.insert("content_type".to_string(), json!(e.content_type));
                metadata.insert("word_count".to_string(), json!(e.word_count));
                metadata.insert("page_count".to_string(), json!(e.page_count));
                metadata.insert("row_count".to_string(), json!(e.row_count));
                metadata.insert("column_count".to_string(), json!(e.column_count));
                metadata.insert("sheet_count".to_string(), json!(e.sheet_count));
                metadata.insert("slide_count".to_string(), json!(e.slide_count));
                (
                    Some(e.title.clone()),
                    Some(e.content.clone()),
                    Some(e.owner_email.clone()),
                    Vec::new(),
                    None,
                    None,
                    None,
                )
            }
            DomainEventPayload::DocumentFragment(e) => {
                metadata.insert("fragment_type".to_string(), json!(e.fragment_type));
                (
                    None,
                    Some(e.content.clone()),
                    None,
                    Vec::new(),
                    None,
                    Some(e.parent_doc_id.clone()),
                    Some(e.sequence_number),
                )
            }
            DomainEventPayload::Todo(e) => {
                metadata.insert("status".to_string(), json!(e.status));
                metadata.insert("priority".to_string(), json!(e.priority));
                metadata.insert("shared_with".to_string(), json!(e.shared_with));
                let recipients = e.assignee_email.clone().into_iter().collect();
                (
                    Some(e.title.clone()),
                    e.description.clone(),
                    e.creator_email.clone(),
                    recipients,
                    Some(e.list_id.clone()),
                    None,
                    None,
                )
            }
            DomainEventPayload::LlmChatMessage(e) => (
                None,
                Some(e.content.clone()),
                e.sender_email.clone(),
                Vec::new(),
                Some(e.chat_id.clone()),
                None,
                None,
            ),
            DomainEventPayload::ShipmentEvent(e) => {
                metadata.insert("tracking_number".to_string(), json!(e.tracking_number));
                metadata.insert("carrier".to_string(), json!(e.carrier));
                (None, Some(e.description.clone()), None, Vec::new(), None, None, None)
            }
            DomainEventPayload::MeetingPoll(e) => {
                metadata.insert("options".to_string(), json!(e.options));
                metadata.insert("responses".to_string(), json!(e.responses));
                (
                    None,
                    Some(e.question.clone()),
                    None,
                    Vec::new(),
                    Some(e.meeting_id.clone()),
                    None,
                    None,
                )
            }
            DomainEventPayload::Booking(e) => (
                None,
                Some(e.purpose.clone()),
                None,
                Vec::new(),
                Some(e.resource_id.clone()),
                None,
                None,
            ),
        };

    SearchDocument {
        doc_id,
        source_type,
        user_id: event.user_id.clone(),
        provider: event.provider.clone(),
        title,
        content,
        sender,
        recipients,
        thread_id: None,
        folder,
        created_at: match event.operation {
            Operation::Create => event.last_updated,
            _ => event.metadata.timestamp.min(event.last_updated),
        },
        updated_at: event.last_updated,
        metadata,
        parent_doc_id,
        fragment_sequence,
    }
}

/// `updated_at` comparison gate (spec S3): an update whose `last_updated`
/// does not exceed the stored document's is rejected.
pub fn is_newer(incoming: &SearchDocument, stored: &SearchDocument) -> bool {
    incoming.updated_at > stored.updated_at
}

pub fn now_iso() -> chrono::DateTime<Utc> {
    Utc::now()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ingest_schemas::events::EmailPayload;
    use ingest_types::envelope::EventMetadata;

    fn email_event() -> DomainEvent {
        DomainEvent {
            metadata: EventMetadata::new("office_service", "1.0.0"),
            user_id: "u1".into(),
            operation: Operation::Create,
            provider: "gmail".into(),
            last_updated: chrono::DateTime::parse_from_rfc3339("2024-01-01T10:00:00Z")
                .unwrap()
                .with_timezone(&Utc),
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
    fn email_maps_per_spec_table() {
        let doc = build_document(&email_event());
        assert_eq!(doc.doc_id, "e1");
        assert_eq!(doc.source_type, "email");
        assert_eq!(doc.title.as_deref(), Some("Hello"));
        assert_eq!(doc.content.as_deref(), Some("Hi"));
        assert_eq!(doc.sender.as_deref(), Some("a@x.com"));
        assert_eq!(doc.recipients, vec!["b@y.com".to_string()]);
    }

    #[test]
    fn factory_is_total_over_all_variants() {
        // Compiles only if every DomainEventPayload arm is handled; this
        // test exists to keep a regression signal when a variant is added.
        let _ = build_document(&email_event());
    }
}
