//! Subscription registry (spec §4.B): the sole place subscription names are
//! constructed, and the authoritative source for which consumer receives
//! which stream. A compile-time table keyed by `(service_name, topic_name)`,
//! in the teacher's declarative-config-table idiom (c.f. its
//! `subscription_config`-style static maps), rather than something
//! assembled at runtime from scattered call sites.

use ingest_types::error::{IngestError, Result};
use once_cell::sync::Lazy;
use std::time::Duration;

pub const DEFAULT_ACK_DEADLINE_SECS: u64 = 60;
pub const DEFAULT_MAX_RETRY_ATTEMPTS: u32 = 5;
pub const DEFAULT_BATCH_SIZE: usize = 50;
pub const DEFAULT_BATCH_TIMEOUT: Duration = Duration::from_secs(5);

/// Resolved subscription configuration for one `(service, topic)` pair,
/// with defaults already merged in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionConfig {
    pub subscription_name: String,
    pub batch_size: usize,
    pub ack_deadline_secs: u64,
    pub retain_acked: bool,
    pub exactly_once: bool,
    pub filter: Option<String>,
    pub dead_letter_topic: Option<String>,
    pub max_retry_attempts: u32,
}

impl SubscriptionConfig {
    pub fn ack_deadline(&self) -> Duration {
        Duration::from_secs(self.ack_deadline_secs)
    }
}

/// A single registry row. `None` fields fall back to the package defaults.
#[derive(Debug, Clone)]
struct RegistryEntry {
    service: &'static str,
    topic: &'static str,
    subscription_name: Option<&'static str>,
    batch_size: Option<usize>,
    ack_deadline_secs: Option<u64>,
    retain_acked: Option<bool>,
    exactly_once: Option<bool>,
    filter: Option<&'static str>,
    dead_letter_topic: Option<&'static str>,
    max_retry_attempts: Option<u32>,
}

const fn entry(service: &'static str, topic: &'static str) -> RegistryEntry {
    RegistryEntry {
        service,
        topic,
        subscription_name: None,
        batch_size: None,
        ack_deadline_secs: None,
        retain_acked: None,
        exactly_once: None,
        filter: None,
        dead_letter_topic: None,
        max_retry_attempts: None,
    }
}

/// The subscription table (spec §6 exemplar rows, extended to cover every
/// topic each consumer service actually needs).
static TABLE: Lazy<Vec<RegistryEntry>> = Lazy::new(|| {
    vec![
        RegistryEntry {
            batch_size: Some(50),
            ack_deadline_secs: Some(120),
            ..entry("vespa_loader", "emails")
        },
        RegistryEntry {
            batch_size: Some(10),
            ack_deadline_secs: Some(180),
            ..entry("vespa_loader", "word_documents")
        },
        RegistryEntry {
            batch_size: Some(10),
            ack_deadline_secs: Some(180),
            ..entry("vespa_loader", "word_fragments")
        },
        RegistryEntry {
            batch_size: Some(10),
            ack_deadline_secs: Some(180),
            ..entry("vespa_loader", "sheet_documents")
        },
        RegistryEntry {
            batch_size: Some(10),
            ack_deadline_secs: Some(180),
            ..entry("vespa_loader", "sheet_fragments")
        },
        RegistryEntry {
            batch_size: Some(10),
            ack_deadline_secs: Some(180),
            ..entry("vespa_loader", "presentation_documents")
        },
        RegistryEntry {
            batch_size: Some(10),
            ack_deadline_secs: Some(180),
            ..entry("vespa_loader", "presentation_fragments")
        },
        RegistryEntry {
            batch_size: Some(10),
            ack_deadline_secs: Some(180),
            ..entry("vespa_loader", "task_documents")
        },
        RegistryEntry {
            batch_size: Some(20),
            ..entry("vespa_loader", "calendars")
        },
        RegistryEntry {
            batch_size: Some(50),
            ..entry("vespa_loader", "todos")
        },
        RegistryEntry {
            batch_size: Some(30),
            ..entry("vespa_loader", "contacts")
        },
        RegistryEntry {
            batch_size: Some(50),
            ..entry("vespa_loader", "llm_chats")
        },
        RegistryEntry {
            batch_size: Some(50),
            ..entry("vespa_loader", "shipment_events")
        },
        RegistryEntry {
            batch_size: Some(20),
            ..entry("vespa_loader", "meeting_polls")
        },
        RegistryEntry {
            batch_size: Some(20),
            ..entry("vespa_loader", "bookings")
        },
        RegistryEntry {
            batch_size: Some(100),
            ack_deadline_secs: Some(60),
            ..entry("contact_discovery", "emails")
        },
        RegistryEntry {
            batch_size: Some(100),
            ..entry("contact_discovery", "calendars")
        },
        RegistryEntry {
            batch_size: Some(100),
            ..entry("contact_discovery", "documents")
        },
        RegistryEntry {
            batch_size: Some(100),
            ..entry("contact_discovery", "todos")
        },
        RegistryEntry {
            batch_size: Some(100),
            ..entry("contact_discovery", "contacts")
        },
        RegistryEntry {
            batch_size: Some(20),
            ack_deadline_secs: Some(60),
            ..entry("meetings", "calendars")
        },
        RegistryEntry {
            batch_size: Some(50),
            ack_deadline_secs: Some(60),
            ..entry("shipments", "emails")
        },
        RegistryEntry {
            batch_size: Some(10),
            ack_deadline_secs: Some(30),
            ..entry("frontend_sse", "emails")
        },
    ]
});

fn find(service: &str, topic: &str) -> Option<&'static RegistryEntry> {
    TABLE.iter().find(|e| e.service == service && e.topic == topic)
}

/// Resolve the durable subscription name for `(service, topic)`, falling
/// back to `service-topic` if no explicit override is registered (P8).
pub fn subscription_name(service: &str, topic: &str) -> String {
    find(service, topic)
        .and_then(|e| e.subscription_name)
        .map(str::to_string)
        .unwrap_or_else(|| format!("{service}-{topic}"))
}

/// Merge defaults with any override for `(service, topic)`. Total on the
/// configured set and on any unconfigured pair (P8): an absent row still
/// yields a usable config with package defaults and a derived name.
pub fn config(service: &str, topic: &str) -> SubscriptionConfig {
    let row = find(service, topic);
    SubscriptionConfig {
        subscription_name: subscription_name(service, topic),
        batch_size: row.and_then(|e| e.batch_size).unwrap_or(DEFAULT_BATCH_SIZE),
        ack_deadline_secs: row
            .and_then(|e| e.ack_deadline_secs)
            .unwrap_or(DEFAULT_ACK_DEADLINE_SECS),
        retain_acked: row.and_then(|e| e.retain_acked).unwrap_or(false),
        exactly_once: row.and_then(|e| e.exactly_once).unwrap_or(false),
        filter: row.and_then(|e| e.filter).map(str::to_string),
        dead_letter_topic: row.and_then(|e| e.dead_letter_topic).map(str::to_string),
        max_retry_attempts: row
            .and_then(|e| e.max_retry_attempts)
            .unwrap_or(DEFAULT_MAX_RETRY_ATTEMPTS),
    }
}

/// All topics `service` is registered against.
pub fn topics_for(service: &str) -> Vec<&'static str> {
    TABLE
        .iter()
        .filter(|e| e.service == service)
        .map(|e| e.topic)
        .collect()
}

/// All services subscribed to `topic`.
pub fn subscribers_of(topic: &str) -> Vec<&'static str> {
    TABLE
        .iter()
        .filter(|e| e.topic == topic)
        .map(|e| e.service)
        .collect()
}

/// Fatal-configuration check (spec §7): a consumer must not start against
/// an unregistered `(service, topic)` pair.
pub fn validate(service: &str, topic: &str) -> Result<()> {
    if find(service, topic).is_some() {
        Ok(())
    } else {
        Err(IngestError::UnknownSubscription {
            service: service.to_string(),
            topic: topic.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_registered_pair() {
        let name = subscription_name("vespa_loader", "emails");
        assert_eq!(name, "vespa_loader-emails");
    }

    #[test]
    fn falls_back_to_service_topic_for_unregistered_pair() {
        let name = subscription_name("no_such_service", "emails");
        assert_eq!(name, "no_such_service-emails");
    }

    #[test]
    fn config_merges_defaults() {
        let cfg = config("meetings", "calendars");
        assert_eq!(cfg.ack_deadline_secs, DEFAULT_ACK_DEADLINE_SECS);
        assert_eq!(cfg.batch_size, 20);
        assert_eq!(cfg.max_retry_attempts, DEFAULT_MAX_RETRY_ATTEMPTS);
    }

    #[test]
    fn validate_rejects_unknown_pair() {
        assert!(validate("ghost_service", "ghost_topic").is_err());
    }

    #[test]
    fn validate_accepts_known_pair() {
        assert!(validate("vespa_loader", "emails").is_ok());
    }

    #[test]
    fn topics_for_lists_all_rows_for_service() {
        let topics = topics_for("vespa_loader");
        assert!(topics.contains(&"emails"));
        assert!(topics.contains(&"todos"));
    }

    #[test]
    fn subscribers_of_lists_all_services_for_topic() {
        let subs = subscribers_of("emails");
        assert!(subs.contains(&"vespa_loader"));
        assert!(subs.contains(&"contact_discovery"));
        assert!(subs.contains(&"shipments"));
    }
}
