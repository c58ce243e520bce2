//! Contact store port (spec §4.F, §4.H): per-user scoped persistence with
//! the lookup patterns contact-discovery needs.

use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contact {
    pub user_id: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub given_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub family_name: Option<String>,
    pub source_services: Vec<String>,
    pub event_counts: BTreeMap<String, u64>,
    pub total_event_count: u64,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    pub relevance_score: f64,
}

impl Contact {
    pub fn new(user_id: impl Into<String>, email: impl Into<String>, seen_at: DateTime<Utc>) -> Self {
        Self {
            user_id: user_id.into(),
            email: email.into(),
            given_name: None,
            family_name: None,
            source_services: Vec::new(),
            event_counts: BTreeMap::new(),
            total_event_count: 0,
            first_seen: seen_at,
            last_seen: seen_at,
            relevance_score: 0.0,
        }
    }
}

/// Relational contact persistence, scoped per `user_id` (no cross-tenant
/// reads, per spec §3 Ownership).
#[async_trait]
pub trait ContactStore: Send + Sync {
    async fn find(&self, user_id: &str, email: &str) -> Result<Option<Contact>>;

    /// Insert-or-replace the full contact record, under the store's own
    /// transaction discipline (read-modify-write with rollback on failure).
    async fn upsert(&self, contact: Contact) -> Result<()>;

    /// Ranked listing by relevance, for one tenant.
    async fn list_by_relevance(&self, user_id: &str, limit: usize) -> Result<Vec<Contact>>;

    /// Substring search over email/name fields, for one tenant.
    async fn search(&self, user_id: &str, query: &str, limit: usize) -> Result<Vec<Contact>>;
}
