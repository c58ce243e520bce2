//! Search-backend writer port (spec §4.H). The fabric only speaks this
//! trait; the storage engine and query language are out of scope.

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Canonical search-backend document produced by the document factory
/// (spec §4.D).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchDocument {
    pub doc_id: String,
    pub source_type: String,
    pub user_id: String,
    pub provider: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender: Option<String>,
    #[serde(default)]
    pub recipients: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub folder: Option<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
    #[serde(default)]
    pub metadata: BTreeMap<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_doc_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fragment_sequence: Option<u32>,
}

/// Idempotent upsert/delete writer keyed by `doc_id` (spec §4.H).
#[async_trait]
pub trait SearchWriter: Send + Sync {
    /// Upsert a document. Must be idempotent for repeated identical writes,
    /// and must reject (no-op) an update whose `updated_at` is not newer
    /// than the stored value (spec S3).
    async fn upsert(&self, doc: SearchDocument) -> Result<()>;

    /// Delete by primary key.
    async fn delete(&self, doc_id: &str) -> Result<()>;

    /// Fetch a document by primary key, for tests and for S3-style
    /// update-ordering checks.
    async fn get(&self, doc_id: &str) -> Result<Option<SearchDocument>>;
}
