//! The domain event union (spec §3). Ten payload kinds: the nine listed in
//! §3 plus document fragments, which the factory (spec §4.D) treats as a
//! tenth row of the same closed union rather than a nested type.

use chrono::{DateTime, Utc};
use ingest_types::envelope::EventMetadata;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Create,
    Update,
    Delete,
}

/// Envelope-plus-payload: every domain event carries this common header
/// (spec §3) in addition to the event metadata (ingest_types::EventMetadata)
/// and a payload variant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainEvent {
    #[serde(flatten)]
    pub metadata: EventMetadata,
    pub user_id: String,
    pub operation: Operation,
    pub provider: String,
    #[serde(with = "crate::time::flexible")]
    pub last_updated: DateTime<Utc>,
    #[serde(with = "crate::time::flexible")]
    pub sync_timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batch_id: Option<String>,
    /// Debug passthrough from the originating provider record; never part
    /// of an invariant key, dropped by the document factory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_provider_id: Option<String>,
    pub payload: DomainEventPayload,
}

impl DomainEvent {
    /// The topic this event belongs on, derived from its payload kind
    /// (spec §6 topic list). Fragment payloads resolve to their parent
    /// content type's fragment topic.
    pub fn topic(&self) -> &'static str {
        match &self.payload {
            DomainEventPayload::Email(_) => "emails",
            DomainEventPayload::Calendar(_) => "calendars",
            DomainEventPayload::Contact(_) => "contacts",
            DomainEventPayload::Document(d) => match d.content_type {
                DocumentContentType::Word => "word_documents",
                DocumentContentType::Sheet => "sheet_documents",
                DocumentContentType::Presentation => "presentation_documents",
                DocumentContentType::Task => "task_documents",
            },
            DomainEventPayload::DocumentFragment(f) => match f.fragment_type {
                DocumentContentType::Word => "word_fragments",
                DocumentContentType::Sheet => "sheet_fragments",
                DocumentContentType::Presentation => "presentation_fragments",
                DocumentContentType::Task => "task_documents",
            },
            DomainEventPayload::Todo(_) => "todos",
            DomainEventPayload::LlmChatMessage(_) => "llm_chats",
            DomainEventPayload::ShipmentEvent(_) => "shipment_events",
            DomainEventPayload::MeetingPoll(_) => "meeting_polls",
            DomainEventPayload::Booking(_) => "bookings",
        }
    }
}

impl DomainEventPayload {
    /// The entity identifier used by idempotency-key derivation (spec
    /// §4.C) and the document factory's `doc_id` (spec §4.D).
    pub fn entity_id(&self) -> &str {
        match self {
            DomainEventPayload::Email(e) => &e.id,
            DomainEventPayload::Calendar(e) => &e.id,
            DomainEventPayload::Contact(e) => &e.id,
            DomainEventPayload::Document(e) => &e.id,
            DomainEventPayload::DocumentFragment(e) => &e.id,
            DomainEventPayload::Todo(e) => &e.id,
            DomainEventPayload::LlmChatMessage(e) => &e.id,
            DomainEventPayload::ShipmentEvent(e) => &e.id,
            DomainEventPayload::MeetingPoll(e) => &e.id,
            DomainEventPayload::Booking(e) => &e.id,
        }
    }

    /// The `event_type` tag used in idempotency records and metrics.
    pub fn type_name(&self) -> &'static str {
        match self {
            DomainEventPayload::Email(_) => "email",
            DomainEventPayload::Calendar(_) => "calendar",
            DomainEventPayload::Contact(_) => "contact",
            DomainEventPayload::Document(_) => "document",
            DomainEventPayload::DocumentFragment(_) => "document_fragment",
            DomainEventPayload::Todo(_) => "todo",
            DomainEventPayload::LlmChatMessage(_) => "llm_chat_message",
            DomainEventPayload::ShipmentEvent(_) => "shipment_event",
            DomainEventPayload::MeetingPoll(_) => "meeting_poll",
            DomainEventPayload::Booking(_) => "booking",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event_class", rename_all = "snake_case")]
pub enum DomainEventPayload {
    Email(EmailPayload),
    Calendar(CalendarPayload),
    Contact(ContactPayload),
    Document(DocumentPayload),
    DocumentFragment(DocumentFragmentPayload),
    Todo(TodoPayload),
    LlmChatMessage(LlmChatMessagePayload),
    ShipmentEvent(ShipmentEventPayload),
    MeetingPoll(MeetingPollPayload),
    Booking(BookingPayload),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailPayload {
    pub id: String,
    pub thread_id: Option<String>,
    pub subject: String,
    pub body: String,
    pub from_address: String,
    #[serde(default)]
    pub to_addresses: Vec<String>,
    #[serde(default)]
    pub cc_addresses: Vec<String>,
    #[serde(default)]
    pub bcc_addresses: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub received_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sent_date: Option<String>,
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default)]
    pub is_read: bool,
    #[serde(default)]
    pub is_starred: bool,
    #[serde(default)]
    pub has_attachments: bool,
    pub provider_message_id: String,
    #[serde(default)]
    pub size_bytes: Option<u64>,
    #[serde(default)]
    pub mime_type: Option<String>,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarAttendee {
    pub email: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub response_status: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarPayload {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub start: String,
    pub end: String,
    #[serde(default)]
    pub all_day: bool,
    pub organizer: String,
    #[serde(default)]
    pub attendees: Vec<CalendarAttendee>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub visibility: Option<String>,
    #[serde(default)]
    pub recurrence: Option<String>,
    #[serde(default)]
    pub reminders: Vec<String>,
    #[serde(default)]
    pub attachments: Vec<String>,
    pub provider_event_id: String,
    pub calendar_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactPayload {
    pub id: String,
    pub display_name: Option<String>,
    #[serde(default)]
    pub given_name: Option<String>,
    #[serde(default)]
    pub family_name: Option<String>,
    #[serde(default)]
    pub email_addresses: Vec<String>,
    #[serde(default)]
    pub phone_numbers: Vec<String>,
    #[serde(default)]
    pub addresses: Vec<String>,
    #[serde(default)]
    pub organizations: Vec<String>,
    #[serde(default)]
    pub birthdays: Vec<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub photos: Vec<String>,
    #[serde(default)]
    pub groups: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub provider_contact_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentContentType {
    Word,
    Sheet,
    Presentation,
    Task,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentPayload {
    pub id: String,
    pub title: String,
    pub content: String,
    pub content_type: DocumentContentType,
    pub owner_email: String,
    #[serde(default)]
    pub permissions: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub provider_document_id: String,
    #[serde(default)]
    pub word_count: Option<u64>,
    #[serde(default)]
    pub page_count: Option<u64>,
    #[serde(default)]
    pub row_count: Option<u64>,
    #[serde(default)]
    pub column_count: Option<u64>,
    #[serde(default)]
    pub sheet_count: Option<u64>,
    #[serde(default)]
    pub slide_count: Option<u64>,
}

/// A fragment is a child record of a `Document` (spec I3): its
/// `parent_doc_id` must refer to a document owned by the same `user_id`,
/// and `sequence_number` is unique and contiguous within that parent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentFragmentPayload {
    pub id: String,
    pub parent_doc_id: String,
    pub content: String,
    pub fragment_type: DocumentContentType,
    pub sequence_number: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TodoStatus {
    Open,
    InProgress,
    Completed,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TodoPayload {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub status: TodoStatus,
    #[serde(default)]
    pub priority: Option<String>,
    #[serde(default)]
    pub due_date: Option<String>,
    #[serde(default)]
    pub completed_date: Option<String>,
    pub assignee_email: Option<String>,
    pub creator_email: Option<String>,
    #[serde(default)]
    pub parent_id: Option<String>,
    #[serde(default)]
    pub subtask_ids: Vec<String>,
    pub list_id: String,
    #[serde(default)]
    pub tags: Vec<String>,
    /// Emails the todo has been explicitly shared with (spec §4.F:
    /// `todo_shared` tuples).
    #[serde(default)]
    pub shared_with: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LlmChatMessagePayload {
    pub id: String,
    pub chat_id: String,
    pub content: String,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub sender_email: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShipmentEventPayload {
    pub id: String,
    pub description: String,
    #[serde(default)]
    pub tracking_number: Option<String>,
    #[serde(default)]
    pub carrier: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub order_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeetingPollPayload {
    pub id: String,
    pub question: String,
    pub meeting_id: String,
    #[serde(default)]
    pub options: Vec<String>,
    #[serde(default)]
    pub responses: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingPayload {
    pub id: String,
    pub purpose: String,
    pub resource_id: String,
    #[serde(default)]
    pub start: Option<String>,
    #[serde(default)]
    pub end: Option<String>,
    #[serde(default)]
    pub attendees: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use ingest_types::envelope::EventMetadata;

    fn sample_email_event() -> DomainEvent {
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
    fn topic_routes_by_payload() {
        assert_eq!(sample_email_event().topic(), "emails");
    }
}
