//! The two `EventProcessor`s this daemon runs (spec §4.D, §4.F, §4.H):
//! one maps events onto the search backend, the other runs cross-source
//! contact discovery and republishes touched contacts through the outbox.

use async_trait::async_trait;
use ingest_consumer::EventProcessor;
use ingest_contacts::{contact_update_event, discover_contacts};
use ingest_documents::chunking::ChunkingRule;
use ingest_documents::{build_document, chunk_document};
use ingest_persistence::PostgresOutbox;
use ingest_schemas::events::{DocumentContentType, DomainEvent, DomainEventPayload, Operation};
use ingest_types::error::Result;
use ingest_types::ports::contact_store::ContactStore;
use ingest_types::ports::search_writer::{SearchDocument, SearchWriter};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::debug;

/// Maps a `DomainEvent` to one or more `SearchDocument`s and upserts them
/// (spec §4.D field-mapping table, §4.G chunking for `Document` payloads).
pub struct VespaLoaderProcessor {
    writer: Arc<dyn SearchWriter>,
}

impl VespaLoaderProcessor {
    pub fn new(writer: Arc<dyn SearchWriter>) -> Self {
        Self { writer }
    }

    fn chunking_rule(content_type: DocumentContentType) -> ChunkingRule {
        match content_type {
            DocumentContentType::Word => ChunkingRule::word_default(),
            DocumentContentType::Sheet => ChunkingRule::sheet_default(),
            DocumentContentType::Presentation => ChunkingRule::presentation_default(),
            DocumentContentType::Task => ChunkingRule::word_default(),
        }
    }

    fn fragment_document(parent: &SearchDocument, chunk: &ingest_documents::DocumentChunk) -> SearchDocument {
        SearchDocument {
            doc_id: format!("{}-fragment-{}", parent.doc_id, chunk.sequence_number),
            source_type: "document_fragment".to_string(),
            user_id: parent.user_id.clone(),
            provider: parent.provider.clone(),
            title: None,
            content: Some(chunk.content.clone()),
            sender: None,
            recipients: Vec::new(),
            thread_id: None,
            folder: None,
            created_at: parent.created_at,
            updated_at: parent.updated_at,
            metadata: Default::default(),
            parent_doc_id: Some(parent.doc_id.clone()),
            fragment_sequence: Some(chunk.sequence_number),
        }
    }
}

#[async_trait]
impl EventProcessor for VespaLoaderProcessor {
    async fn process(&self, event: &DomainEvent) -> Result<Value> {
        if event.operation == Operation::Delete {
            let doc_id = event.payload.entity_id().to_string();
            self.writer.delete(&doc_id).await?;
            return Ok(json!({"deleted": doc_id}));
        }

        let doc = build_document(event);
        self.writer.upsert(doc.clone()).await?;

        let mut fragment_count = 0usize;
        if let DomainEventPayload::Document(payload) = &event.payload {
            let rule = Self::chunking_rule(payload.content_type);
            let result = chunk_document(&payload.content, &doc.doc_id, &rule);
            for chunk in &result.chunks {
                self.writer.upsert(Self::fragment_document(&doc, chunk)).await?;
                fragment_count += 1;
            }
        }

        debug!(doc_id = %doc.doc_id, fragments = fragment_count, "indexed document");
        Ok(json!({"doc_id": doc.doc_id, "fragments": fragment_count}))
    }

    fn name(&self) -> &str {
        "vespa_loader"
    }
}

/// Runs cross-source contact discovery and republishes every touched
/// contact as a `ContactEvent(operation=update)` through the transactional
/// outbox (spec §4.F), so the search backend's `contacts` index stays in
/// sync without a second round trip through the transport.
pub struct ContactDiscoveryProcessor {
    store: Arc<dyn ContactStore>,
    outbox: Arc<PostgresOutbox>,
    source_service: String,
    source_version: String,
}

impl ContactDiscoveryProcessor {
    pub fn new(store: Arc<dyn ContactStore>, outbox: Arc<PostgresOutbox>) -> Self {
        Self {
            store,
            outbox,
            source_service: "contact_discovery".to_string(),
            source_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

#[async_trait]
impl EventProcessor for ContactDiscoveryProcessor {
    async fn process(&self, event: &DomainEvent) -> Result<Value> {
        let touched = discover_contacts(event, self.store.as_ref()).await?;
        for contact in &touched {
            let update = contact_update_event(contact, &self.source_service, &self.source_version);
            self.outbox.enqueue("contacts", &update).await?;
        }
        Ok(json!({"contacts_touched": touched.len()}))
    }

    fn name(&self) -> &str {
        "contact_discovery"
    }
}
