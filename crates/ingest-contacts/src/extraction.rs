//! Cross-source entity extraction (spec §4.F): pull `(email, name,
//! event_type, timestamp, source_service)` tuples out of each event kind
//! that can mention a person.

use chrono::{DateTime, Utc};
use ingest_schemas::events::{DomainEvent, DomainEventPayload, TodoPayload};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContactEventType {
    Email,
    Calendar,
    Document,
    TodoAssignee,
    TodoCreator,
    TodoShared,
}

impl ContactEventType {
    pub fn as_str(self) -> &'static str {
        match self {
            ContactEventType::Email => "email",
            ContactEventType::Calendar => "calendar",
            ContactEventType::Document => "document",
            ContactEventType::TodoAssignee => "todo_assignee",
            ContactEventType::TodoCreator => "todo_creator",
            ContactEventType::TodoShared => "todo_shared",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ContactTuple {
    pub email: String,
    pub name: Option<String>,
    pub event_type: ContactEventType,
    pub timestamp: DateTime<Utc>,
    pub source_service: String,
}

pub(crate) fn normalize_email(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || !trimmed.contains('@') {
        return None;
    }
    Some(trimmed.to_lowercase())
}

fn push_tuple(
    out: &mut Vec<ContactTuple>,
    email: &str,
    name: Option<String>,
    event_type: ContactEventType,
    timestamp: DateTime<Utc>,
    source_service: &str,
) {
    if let Some(email) = normalize_email(email) {
        out.push(ContactTuple {
            email,
            name,
            event_type,
            timestamp,
            source_service: source_service.to_string(),
        });
    }
}

/// Structural gate for todo events (spec §4.F): required fields present.
/// `operation` being one of create/update/delete is guaranteed by
/// `Operation`'s closed variant set, so only field presence is checked here.
pub fn validate_todo_structure(todo: &TodoPayload) -> bool {
    !todo.id.is_empty() && !todo.title.is_empty() && !todo.list_id.is_empty()
}

/// Extract contact tuples from one event. `Contact` events are excluded:
/// they update existing entries directly (see `pipeline::apply_contact_event`)
/// rather than synthesising new tuples (spec §4.F).
pub fn extract_tuples(event: &DomainEvent) -> Vec<ContactTuple> {
    let mut tuples = Vec::new();
    let timestamp = event.last_updated;

    match &event.payload {
        DomainEventPayload::Email(email) => {
            push_tuple(&mut tuples, &email.from_address, None, ContactEventType::Email, timestamp, "email_sync");
            for addr in email
                .to_addresses
                .iter()
                .chain(email.cc_addresses.iter())
                .chain(email.bcc_addresses.iter())
            {
                push_tuple(&mut tuples, addr, None, ContactEventType::Email, timestamp, "email_sync");
            }
        }
        DomainEventPayload::Calendar(calendar) => {
            push_tuple(&mut tuples, &calendar.organizer, None, ContactEventType::Calendar, timestamp, "calendar_sync");
            for attendee in &calendar.attendees {
                push_tuple(
                    &mut tuples,
                    &attendee.email,
                    attendee.display_name.clone(),
                    ContactEventType::Calendar,
                    timestamp,
                    "calendar_sync",
                );
            }
        }
        DomainEventPayload::Document(document) => {
            push_tuple(&mut tuples, &document.owner_email, None, ContactEventType::Document, timestamp, "document_sync");
        }
        DomainEventPayload::Todo(todo) => {
            if !validate_todo_structure(todo) {
                return tuples;
            }
            if let Some(assignee) = &todo.assignee_email {
                push_tuple(&mut tuples, assignee, None, ContactEventType::TodoAssignee, timestamp, "todo_sync");
            }
            if let Some(creator) = &todo.creator_email {
                if todo.assignee_email.as_deref() != Some(creator.as_str()) {
                    push_tuple(&mut tuples, creator, None, ContactEventType::TodoCreator, timestamp, "todo_sync");
                }
            }
            for shared in &todo.shared_with {
                push_tuple(&mut tuples, shared, None, ContactEventType::TodoShared, timestamp, "todo_sync");
            }
        }
        DomainEventPayload::Contact(_) => {}
        _ => {}
    }

    tuples
}

#[cfg(test)]
mod tests {
    use super::*;
    use ingest_schemas::events::{DomainEvent, EmailPayload, Operation, TodoStatus};
    use ingest_types::envelope::EventMetadata;

    fn base_event(payload: DomainEventPayload) -> DomainEvent {
        DomainEvent {
            metadata: EventMetadata::new("office_service", "1.0.0"),
            user_id: "u1".into(),
            operation: Operation::Create,
            provider: "gmail".into(),
            last_updated: Utc::now(),
            sync_timestamp: Utc::now(),
            batch_id: None,
            raw_provider_id: None,
            payload,
        }
    }

    #[test]
    fn email_extracts_sender_and_all_recipients() {
        let event = base_event(DomainEventPayload::Email(EmailPayload {
            id: "e1".into(),
            from_address: "A@X.com".into(),
            to_addresses: vec!["b@y.com".into()],
            cc_addresses: vec!["c@y.com".into()],
            bcc_addresses: vec!["INVALID".into()],
            ..Default::default()
        }));
        let tuples = extract_tuples(&event);
        let emails: Vec<&str> = tuples.iter().map(|t| t.email.as_str()).collect();
        assert_eq!(emails, vec!["a@x.com", "b@y.com", "c@y.com"]);
    }

    #[test]
    fn todo_skips_extraction_when_structurally_invalid() {
        let event = base_event(DomainEventPayload::Todo(TodoPayload {
            id: String::new(),
            title: "".into(),
            description: None,
            status: TodoStatus::Open,
            priority: None,
            due_date: None,
            completed_date: None,
            assignee_email: Some("a@x.com".into()),
            creator_email: None,
            parent_id: None,
            subtask_ids: vec![],
            list_id: "l1".into(),
            tags: vec![],
            shared_with: vec![],
        }));
        assert!(extract_tuples(&event).is_empty());
    }

    #[test]
    fn todo_creator_dropped_when_same_as_assignee() {
        let event = base_event(DomainEventPayload::Todo(TodoPayload {
            id: "t1".into(),
            title: "t".into(),
            description: None,
            status: TodoStatus::Open,
            priority: None,
            due_date: None,
            completed_date: None,
            assignee_email: Some("a@x.com".into()),
            creator_email: Some("a@x.com".into()),
            parent_id: None,
            subtask_ids: vec![],
            list_id: "l1".into(),
            tags: vec![],
            shared_with: vec!["c@x.com".into()],
        }));
        let tuples = extract_tuples(&event);
        assert_eq!(tuples.len(), 2); // assignee + shared, no duplicate creator
    }
}
