//! Relevance scoring (spec §4.F): "a weighted combination of recency of
//! `last_seen`, total event frequency, diversity across event types, name
//! completeness." The spec leaves weights and curves as an Open Question;
//! the choice made here (and why) is recorded in DESIGN.md.

use chrono::{DateTime, Utc};
use ingest_types::ports::contact_store::Contact;

const WEIGHT_RECENCY: f64 = 0.4;
const WEIGHT_FREQUENCY: f64 = 0.3;
const WEIGHT_DIVERSITY: f64 = 0.2;
const WEIGHT_COMPLETENESS: f64 = 0.1;

/// Total distinct event-type buckets a contact can appear under
/// (`ContactEventType` has 6 variants).
const KNOWN_EVENT_TYPES: f64 = 6.0;

/// Linear decay to zero over a year of silence.
const RECENCY_HORIZON_DAYS: f64 = 365.0;

/// Frequency saturates at this many total sightings.
const FREQUENCY_SATURATION: f64 = 50.0;

fn recency_component(last_seen: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    let days = (now - last_seen).num_seconds() as f64 / 86_400.0;
    (1.0 - (days.max(0.0) / RECENCY_HORIZON_DAYS)).clamp(0.0, 1.0)
}

fn frequency_component(total_event_count: u64) -> f64 {
    (total_event_count as f64 / FREQUENCY_SATURATION).min(1.0)
}

fn diversity_component(event_type_count: usize) -> f64 {
    (event_type_count as f64 / KNOWN_EVENT_TYPES).min(1.0)
}

fn completeness_component(given_name: &Option<String>, family_name: &Option<String>) -> f64 {
    match (given_name.is_some(), family_name.is_some()) {
        (true, true) => 1.0,
        (true, false) | (false, true) => 0.5,
        (false, false) => 0.0,
    }
}

/// Recompute a contact's relevance score against the current time.
pub fn relevance_score(contact: &Contact, now: DateTime<Utc>) -> f64 {
    WEIGHT_RECENCY * recency_component(contact.last_seen, now)
        + WEIGHT_FREQUENCY * frequency_component(contact.total_event_count)
        + WEIGHT_DIVERSITY * diversity_component(contact.event_counts.len())
        + WEIGHT_COMPLETENESS * completeness_component(&contact.given_name, &contact.family_name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn contact_at(last_seen: DateTime<Utc>) -> Contact {
        Contact::new("u1", "a@x.com", last_seen)
    }

    #[test]
    fn fresh_contact_with_no_signal_scores_low() {
        let now = Utc::now();
        let contact = contact_at(now);
        assert!(relevance_score(&contact, now) < 0.5);
    }

    #[test]
    fn stale_contact_scores_lower_than_fresh() {
        let now = Utc::now();
        let mut fresh = contact_at(now);
        fresh.total_event_count = 10;
        fresh.event_counts.insert("email".into(), 10);

        let mut stale = fresh.clone();
        stale.last_seen = now - Duration::days(400);

        assert!(relevance_score(&fresh, now) > relevance_score(&stale, now));
    }

    #[test]
    fn full_name_scores_higher_than_no_name() {
        let now = Utc::now();
        let mut named = contact_at(now);
        named.given_name = Some("Ada".into());
        named.family_name = Some("Lovelace".into());
        let bare = contact_at(now);
        assert!(relevance_score(&named, now) > relevance_score(&bare, now));
    }
}
