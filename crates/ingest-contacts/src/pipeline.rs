//! Lookup/create/merge pipeline (spec §4.F): for each extracted tuple,
//! find-or-create the contact, merge in the new sighting, recompute
//! relevance, and persist transactionally via the `ContactStore` port.

use crate::extraction::{extract_tuples, normalize_email, ContactTuple};
use crate::scoring::relevance_score;
use chrono::Utc;
use ingest_schemas::events::{ContactPayload, DomainEvent, DomainEventPayload};
use ingest_types::error::Result;
use ingest_types::ports::contact_store::{Contact, ContactStore};

fn split_display_name(display_name: &str) -> (Option<String>, Option<String>) {
    let mut parts = display_name.split_whitespace();
    let given = parts.next().map(str::to_string);
    let family = {
        let rest: Vec<&str> = parts.collect();
        if rest.is_empty() {
            None
        } else {
            Some(rest.join(" "))
        }
    };
    (given, family)
}

fn merge_tuple(contact: &mut Contact, tuple: &ContactTuple) {
    if contact.given_name.is_none() || contact.family_name.is_none() {
        if let Some(name) = &tuple.name {
            let (given, family) = split_display_name(name);
            contact.given_name = contact.given_name.take().or(given);
            contact.family_name = contact.family_name.take().or(family);
        }
    }
    if !contact.source_services.contains(&tuple.source_service) {
        contact.source_services.push(tuple.source_service.clone());
    }
    *contact.event_counts.entry(tuple.event_type.as_str().to_string()).or_insert(0) += 1;
    contact.total_event_count += 1;
    if tuple.timestamp > contact.last_seen {
        contact.last_seen = tuple.timestamp;
    }
}

/// Apply one tuple against the store: create on first sighting, merge on
/// subsequent ones. Returns the persisted contact.
async fn apply_tuple(store: &dyn ContactStore, user_id: &str, tuple: &ContactTuple) -> Result<Contact> {
    let mut contact = match store.find(user_id, &tuple.email).await? {
        Some(existing) => existing,
        None => {
            let mut created = Contact::new(user_id, &tuple.email, tuple.timestamp);
            if let Some(name) = &tuple.name {
                let (given, family) = split_display_name(name);
                created.given_name = given;
                created.family_name = family;
            }
            created
        }
    };

    merge_tuple(&mut contact, tuple);
    contact.relevance_score = relevance_score(&contact, Utc::now());
    store.upsert(contact.clone()).await?;
    Ok(contact)
}

/// Apply a provider `Contact` record directly to the matching stored
/// contacts (one per address in `email_addresses`): unlike a mention tuple,
/// the payload's name fields are authoritative and overwrite rather than
/// fill-if-absent (spec §4.F). A `Contact` event never synthesises a new
/// entry — an address with no existing contact is skipped, not created.
async fn apply_contact_event(
    store: &dyn ContactStore,
    user_id: &str,
    contact_payload: &ContactPayload,
    timestamp: chrono::DateTime<Utc>,
) -> Result<Vec<Contact>> {
    let mut touched = Vec::with_capacity(contact_payload.email_addresses.len());
    for raw_email in &contact_payload.email_addresses {
        let Some(email) = normalize_email(raw_email) else { continue };

        let Some(mut contact) = store.find(user_id, &email).await? else {
            continue;
        };

        if contact_payload.given_name.is_some() || contact_payload.family_name.is_some() {
            contact.given_name = contact_payload.given_name.clone();
            contact.family_name = contact_payload.family_name.clone();
        } else if let Some(display_name) = &contact_payload.display_name {
            let (given, family) = split_display_name(display_name);
            contact.given_name = given;
            contact.family_name = family;
        }

        if !contact.source_services.contains(&"contacts".to_string()) {
            contact.source_services.push("contacts".to_string());
        }
        *contact.event_counts.entry("contact".to_string()).or_insert(0) += 1;
        contact.total_event_count += 1;
        if timestamp > contact.last_seen {
            contact.last_seen = timestamp;
        }

        contact.relevance_score = relevance_score(&contact, Utc::now());
        store.upsert(contact.clone()).await?;
        touched.push(contact);
    }
    Ok(touched)
}

/// Run the full pipeline for one event: extract tuples (or, for `Contact`
/// events, apply the record directly), merge each into the store, return
/// every contact touched (for the caller to publish `ContactEvent(operation=update)`
/// updates from, per spec §4.F).
pub async fn discover_contacts(event: &DomainEvent, store: &dyn ContactStore) -> Result<Vec<Contact>> {
    if let DomainEventPayload::Contact(contact_payload) = &event.payload {
        return apply_contact_event(store, &event.user_id, contact_payload, event.last_updated).await;
    }

    let tuples = extract_tuples(event);
    let mut touched = Vec::with_capacity(tuples.len());
    for tuple in &tuples {
        touched.push(apply_tuple(store, &event.user_id, tuple).await?);
    }
    Ok(touched)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use ingest_schemas::events::{DomainEventPayload, EmailPayload, Operation};
    use ingest_types::envelope::EventMetadata;
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeStore {
        contacts: Mutex<Vec<Contact>>,
    }

    #[async_trait]
    impl ContactStore for FakeStore {
        async fn find(&self, user_id: &str, email: &str) -> Result<Option<Contact>> {
            Ok(self
                .contacts
                .lock()
                .unwrap()
                .iter()
                .find(|c| c.user_id == user_id && c.email == email)
                .cloned())
        }

        async fn upsert(&self, contact: Contact) -> Result<()> {
            let mut contacts = self.contacts.lock().unwrap();
            if let Some(existing) = contacts
                .iter_mut()
                .find(|c| c.user_id == contact.user_id && c.email == contact.email)
            {
                *existing = contact;
            } else {
                contacts.push(contact);
            }
            Ok(())
        }

        async fn list_by_relevance(&self, user_id: &str, limit: usize) -> Result<Vec<Contact>> {
            let mut contacts: Vec<Contact> = self
                .contacts
                .lock()
                .unwrap()
                .iter()
                .filter(|c| c.user_id == user_id)
                .cloned()
                .collect();
            contacts.sort_by(|a, b| b.relevance_score.partial_cmp(&a.relevance_score).unwrap());
            contacts.truncate(limit);
            Ok(contacts)
        }

        async fn search(&self, user_id: &str, query: &str, limit: usize) -> Result<Vec<Contact>> {
            let query = query.to_lowercase();
            let mut contacts: Vec<Contact> = self
                .contacts
                .lock()
                .unwrap()
                .iter()
                .filter(|c| c.user_id == user_id && c.email.contains(&query))
                .cloned()
                .collect();
            contacts.truncate(limit);
            Ok(contacts)
        }
    }

    fn email_event(from: &str, to: Vec<&str>) -> DomainEvent {
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
                from_address: from.into(),
                to_addresses: to.into_iter().map(String::from).collect(),
                ..Default::default()
            }),
        }
    }

    #[tokio::test]
    async fn first_sighting_creates_contact() {
        let store = FakeStore::default();
        let contacts = discover_contacts(&email_event("a@x.com", vec!["b@y.com"]), &store)
            .await
            .unwrap();
        assert_eq!(contacts.len(), 2);
        assert_eq!(contacts[0].total_event_count, 1);
    }

    #[tokio::test]
    async fn repeated_sighting_merges_and_increments_counts() {
        let store = FakeStore::default();
        discover_contacts(&email_event("a@x.com", vec![]), &store).await.unwrap();
        let contacts = discover_contacts(&email_event("a@x.com", vec![]), &store).await.unwrap();
        assert_eq!(contacts[0].total_event_count, 2);
        assert_eq!(contacts[0].event_counts.get("email"), Some(&2));
    }

    fn contact_event(email_addresses: Vec<&str>, given: Option<&str>, family: Option<&str>) -> DomainEvent {
        DomainEvent {
            metadata: EventMetadata::new("office_service", "1.0.0"),
            user_id: "u1".into(),
            operation: Operation::Update,
            provider: "google".into(),
            last_updated: Utc::now(),
            sync_timestamp: Utc::now(),
            batch_id: None,
            raw_provider_id: None,
            payload: DomainEventPayload::Contact(ContactPayload {
                id: "c1".into(),
                display_name: None,
                given_name: given.map(String::from),
                family_name: family.map(String::from),
                email_addresses: email_addresses.into_iter().map(String::from).collect(),
                provider_contact_id: "google-c1".into(),
                ..Default::default()
            }),
        }
    }

    #[tokio::test]
    async fn contact_event_updates_existing_entry_directly() {
        let store = FakeStore::default();
        discover_contacts(&email_event("a@x.com", vec![]), &store).await.unwrap();

        let contacts = discover_contacts(
            &contact_event(vec!["A@x.com"], Some("Ada"), Some("Lovelace")),
            &store,
        )
        .await
        .unwrap();

        assert_eq!(contacts.len(), 1);
        assert_eq!(contacts[0].given_name.as_deref(), Some("Ada"));
        assert_eq!(contacts[0].family_name.as_deref(), Some("Lovelace"));
        assert_eq!(contacts[0].event_counts.get("contact"), Some(&1));
        assert!(contacts[0].source_services.contains(&"contacts".to_string()));
    }

    #[tokio::test]
    async fn contact_event_skips_entries_with_no_existing_contact() {
        let store = FakeStore::default();
        let contacts = discover_contacts(&contact_event(vec!["new@x.com"], Some("N"), None), &store)
            .await
            .unwrap();
        assert!(contacts.is_empty());
        assert!(store.find("u1", "new@x.com").await.unwrap().is_none());
    }
}
