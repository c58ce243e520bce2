//! Builds the `ContactEvent(operation=update)` the pipeline re-publishes
//! onto the contacts topic after a successful merge (spec §4.F), so the
//! search backend picks up the refreshed contact.

use chrono::Utc;
use ingest_schemas::events::{ContactPayload, DomainEvent, DomainEventPayload, Operation};
use ingest_types::envelope::EventMetadata;
use ingest_types::ports::contact_store::Contact;

pub fn contact_update_event(contact: &Contact, source_service: &str, source_version: &str) -> DomainEvent {
    let display_name = match (&contact.given_name, &contact.family_name) {
        (Some(g), Some(f)) => Some(format!("{g} {f}")),
        (Some(g), None) => Some(g.clone()),
        (None, Some(f)) => Some(f.clone()),
        (None, None) => None,
    };

    DomainEvent {
        metadata: EventMetadata::new(source_service, source_version),
        user_id: contact.user_id.clone(),
        operation: Operation::Update,
        provider: "contact_discovery".to_string(),
        last_updated: contact.last_seen,
        sync_timestamp: Utc::now(),
        batch_id: None,
        raw_provider_id: None,
        payload: DomainEventPayload::Contact(ContactPayload {
            id: contact.email.clone(),
            display_name,
            given_name: contact.given_name.clone(),
            family_name: contact.family_name.clone(),
            email_addresses: vec![contact.email.clone()],
            provider_contact_id: contact.email.clone(),
            ..Default::default()
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_update_event_with_merged_name() {
        let mut contact = Contact::new("u1", "a@x.com", Utc::now());
        contact.given_name = Some("Ada".into());
        contact.family_name = Some("Lovelace".into());

        let event = contact_update_event(&contact, "contact_discovery", "1.0.0");
        assert_eq!(event.operation, Operation::Update);
        match event.payload {
            DomainEventPayload::Contact(payload) => {
                assert_eq!(payload.display_name.as_deref(), Some("Ada Lovelace"));
            }
            _ => panic!("expected contact payload"),
        }
    }
}
