//! HTTP-backed `SearchWriter`: upsert/delete/get against a document-store
//! style search backend (PUT/DELETE/GET per `doc_id`), grounded on the
//! teacher's `SerperProvider`-style thin REST client over `reqwest`.

use async_trait::async_trait;
use ingest_types::error::{IngestError, Result};
use ingest_types::ports::search_writer::{SearchDocument, SearchWriter};
use reqwest::StatusCode;
use tracing::{debug, warn};

pub struct HttpSearchWriter {
    client: reqwest::Client,
    base_url: String,
}

impl HttpSearchWriter {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }

    fn doc_url(&self, doc_id: &str) -> String {
        format!("{}/documents/{}", self.base_url.trim_end_matches('/'), doc_id)
    }

    fn classify_status(status: StatusCode) -> Option<IngestError> {
        if status.is_success() {
            None
        } else if status.is_client_error() {
            Some(IngestError::PermanentSink(format!("search backend rejected request: {status}")))
        } else {
            Some(IngestError::TransientSink(format!("search backend error: {status}")))
        }
    }
}

#[async_trait]
impl SearchWriter for HttpSearchWriter {
    async fn upsert(&self, doc: SearchDocument) -> Result<()> {
        let response = self
            .client
            .put(self.doc_url(&doc.doc_id))
            .json(&doc)
            .send()
            .await
            .map_err(|e| IngestError::TransientSink(e.to_string()))?;

        if let Some(err) = Self::classify_status(response.status()) {
            warn!(doc_id = %doc.doc_id, status = %response.status(), "search upsert failed");
            return Err(err);
        }
        debug!(doc_id = %doc.doc_id, "search upsert ok");
        Ok(())
    }

    async fn delete(&self, doc_id: &str) -> Result<()> {
        let response = self
            .client
            .delete(self.doc_url(doc_id))
            .send()
            .await
            .map_err(|e| IngestError::TransientSink(e.to_string()))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(());
        }
        if let Some(err) = Self::classify_status(response.status()) {
            return Err(err);
        }
        Ok(())
    }

    async fn get(&self, doc_id: &str) -> Result<Option<SearchDocument>> {
        let response = self
            .client
            .get(self.doc_url(doc_id))
            .send()
            .await
            .map_err(|e| IngestError::TransientSink(e.to_string()))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if let Some(err) = Self::classify_status(response.status()) {
            return Err(err);
        }
        let doc = response
            .json::<SearchDocument>()
            .await
            .map_err(|e| IngestError::Other(anyhow::anyhow!(e)))?;
        Ok(Some(doc))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn doc() -> SearchDocument {
        SearchDocument {
            doc_id: "d1".into(),
            source_type: "email".into(),
            user_id: "u1".into(),
            provider: "gmail".into(),
            title: None,
            content: None,
            sender: None,
            recipients: vec![],
            thread_id: None,
            folder: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            metadata: Default::default(),
            parent_doc_id: None,
            fragment_sequence: None,
        }
    }

    #[tokio::test]
    async fn upsert_sends_put_and_succeeds_on_2xx() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/documents/d1"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let writer = HttpSearchWriter::new(server.uri());
        writer.upsert(doc()).await.unwrap();
    }

    #[tokio::test]
    async fn upsert_maps_5xx_to_transient_sink_error() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/documents/d1"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let writer = HttpSearchWriter::new(server.uri());
        let err = writer.upsert(doc()).await.unwrap_err();
        assert!(matches!(err, IngestError::TransientSink(_)));
    }

    #[tokio::test]
    async fn delete_of_missing_document_is_not_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/documents/ghost"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let writer = HttpSearchWriter::new(server.uri());
        writer.delete("ghost").await.unwrap();
    }
}
