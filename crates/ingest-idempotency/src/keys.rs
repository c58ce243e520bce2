//! Fingerprinting rules (spec §4.C): a 32-character lowercase hex digest
//! per event class, derived from stable event fields — never from `now()`
//! (spec §9 time-coupling note), so a redelivered message always recomputes
//! the same key.

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};

/// Hash `parts` joined with `:` and truncate to the first 16 bytes (32 hex
/// characters) of the SHA-256 digest.
fn fingerprint(parts: &[&str]) -> String {
    let joined = parts.join(":");
    let digest = Sha256::digest(joined.as_bytes());
    hex::encode(&digest[..16])
}

/// Immutable operations: `create` on any domain event (spec §4.C).
pub fn key_for_create(provider: &str, entity_id: &str, user_id: &str) -> String {
    fingerprint(&[provider, entity_id, user_id])
}

/// Mutable operations: `update`/`delete`, keyed down to the second of
/// `last_updated` so redeliveries of the identical version collide and
/// genuinely newer versions do not (P2).
pub fn key_for_mutable(
    provider: &str,
    entity_id: &str,
    user_id: &str,
    last_updated: DateTime<Utc>,
) -> String {
    let floored = last_updated.timestamp().to_string();
    fingerprint(&[provider, entity_id, user_id, &floored])
}

/// Batch operations, optionally narrowed by a correlation id.
pub fn key_for_batch(batch_id: &str, correlation_id: Option<&str>) -> String {
    match correlation_id {
        Some(cid) => fingerprint(&["batch", batch_id, cid]),
        None => fingerprint(&["batch", batch_id]),
    }
}

/// Fallback for event classes the mutable/immutable rules don't cover.
pub fn key_fallback(
    event_type: &str,
    entity_id: &str,
    user_id: &str,
    last_updated: Option<DateTime<Utc>>,
    batch_id: Option<&str>,
) -> String {
    let mut parts = vec![event_type.to_string(), entity_id.to_string(), user_id.to_string()];
    if let Some(lu) = last_updated {
        parts.push(lu.timestamp().to_string());
    }
    if let Some(bid) = batch_id {
        parts.push(bid.to_string());
    }
    let refs: Vec<&str> = parts.iter().map(String::as_str).collect();
    fingerprint(&refs)
}

/// `key` is a valid idempotency fingerprint: exactly 32 lowercase hex
/// characters (P3).
pub fn is_valid_key(key: &str) -> bool {
    key.len() == 32 && key.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_key_is_32_hex_chars() {
        let key = key_for_create("gmail", "e1", "u1");
        assert!(is_valid_key(&key), "key was {key}");
    }

    #[test]
    fn same_fields_produce_same_key() {
        let a = key_for_create("gmail", "e1", "u1");
        let b = key_for_create("gmail", "e1", "u1");
        assert_eq!(a, b);
    }

    #[test]
    fn differing_provider_changes_key() {
        let a = key_for_create("gmail", "e1", "u1");
        let b = key_for_create("microsoft", "e1", "u1");
        assert_ne!(a, b);
    }

    #[test]
    fn mutable_key_differs_by_last_updated() {
        let t1 = DateTime::parse_from_rfc3339("2024-01-01T10:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let t2 = DateTime::parse_from_rfc3339("2024-01-01T11:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let a = key_for_mutable("gmail", "e1", "u1", t1);
        let b = key_for_mutable("gmail", "e1", "u1", t2);
        assert_ne!(a, b);
    }

    #[test]
    fn mutable_key_same_within_same_second() {
        let t1 = DateTime::parse_from_rfc3339("2024-01-01T10:00:00.100Z")
            .unwrap()
            .with_timezone(&Utc);
        let t2 = DateTime::parse_from_rfc3339("2024-01-01T10:00:00.900Z")
            .unwrap()
            .with_timezone(&Utc);
        let a = key_for_mutable("gmail", "e1", "u1", t1);
        let b = key_for_mutable("gmail", "e1", "u1", t2);
        assert_eq!(a, b);
    }

    #[test]
    fn batch_key_incorporates_correlation_id() {
        let a = key_for_batch("bx", None);
        let b = key_for_batch("bx", Some("c1"));
        assert_ne!(a, b);
    }
}
