//! In-memory `SearchWriter`: a `DashMap` keyed by `doc_id`, useful for
//! tests and for running the fabric without a live search backend.

use async_trait::async_trait;
use dashmap::DashMap;
use ingest_documents::is_newer;
use ingest_types::error::Result;
use ingest_types::ports::search_writer::{SearchDocument, SearchWriter};

#[derive(Default)]
pub struct InMemorySearchWriter {
    docs: DashMap<String, SearchDocument>,
}

impl InMemorySearchWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }
}

#[async_trait]
impl SearchWriter for InMemorySearchWriter {
    async fn upsert(&self, doc: SearchDocument) -> Result<()> {
        let existing = self.docs.get(&doc.doc_id).map(|d| d.clone());
        match existing {
            // Out-of-order update: stored document wins (spec S3).
            Some(existing) if !is_newer(&doc, &existing) => {}
            _ => {
                self.docs.insert(doc.doc_id.clone(), doc);
            }
        }
        Ok(())
    }

    async fn delete(&self, doc_id: &str) -> Result<()> {
        self.docs.remove(doc_id);
        Ok(())
    }

    async fn get(&self, doc_id: &str) -> Result<Option<SearchDocument>> {
        Ok(self.docs.get(doc_id).map(|d| d.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn doc(doc_id: &str, updated_at: chrono::DateTime<Utc>) -> SearchDocument {
        SearchDocument {
            doc_id: doc_id.to_string(),
            source_type: "email".into(),
            user_id: "u1".into(),
            provider: "gmail".into(),
            title: None,
            content: None,
            sender: None,
            recipients: vec![],
            thread_id: None,
            folder: None,
            created_at: updated_at,
            updated_at,
            metadata: Default::default(),
            parent_doc_id: None,
            fragment_sequence: None,
        }
    }

    #[tokio::test]
    async fn upsert_then_get_round_trips() {
        let writer = InMemorySearchWriter::new();
        let now = Utc::now();
        writer.upsert(doc("d1", now)).await.unwrap();
        let fetched = writer.get("d1").await.unwrap().unwrap();
        assert_eq!(fetched.doc_id, "d1");
    }

    #[tokio::test]
    async fn stale_update_does_not_overwrite_newer_stored_doc() {
        let writer = InMemorySearchWriter::new();
        let now = Utc::now();
        writer.upsert(doc("d1", now)).await.unwrap();
        writer.upsert(doc("d1", now - Duration::hours(1))).await.unwrap();
        let fetched = writer.get("d1").await.unwrap().unwrap();
        assert_eq!(fetched.updated_at, now);
    }

    #[tokio::test]
    async fn delete_removes_document() {
        let writer = InMemorySearchWriter::new();
        writer.upsert(doc("d1", Utc::now())).await.unwrap();
        writer.delete("d1").await.unwrap();
        assert!(writer.get("d1").await.unwrap().is_none());
    }
}
