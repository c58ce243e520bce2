//! Postgres-backed `ContactStore` (spec §4.F, §4.H): per-user scoped
//! relational persistence, grounded on the teacher's
//! `PostgresRepository<T>` JSONB-anti-corruption-layer pattern, specialised
//! for `Contact` so the indexed columns the port's lookup patterns need
//! (`user_id`, `email`, `relevance_score`) aren't buried inside a blob.
//!
//! # Table schema
//!
//! ```sql
//! CREATE TABLE contacts (
//!     user_id         TEXT NOT NULL,
//!     email           TEXT NOT NULL,
//!     given_name      TEXT,
//!     family_name     TEXT,
//!     relevance_score DOUBLE PRECISION NOT NULL DEFAULT 0,
//!     data            JSONB NOT NULL,
//!     updated_at      TIMESTAMPTZ NOT NULL DEFAULT NOW(),
//!     PRIMARY KEY (user_id, email)
//! );
//! CREATE INDEX idx_contacts_relevance ON contacts (user_id, relevance_score DESC);
//! CREATE INDEX idx_contacts_search ON contacts (user_id, email, given_name, family_name);
//! ```

use async_trait::async_trait;
use ingest_types::error::{IngestError, Result};
use ingest_types::ports::contact_store::{Contact, ContactStore};
use sqlx::PgPool;

#[derive(sqlx::FromRow)]
struct ContactRow {
    data: serde_json::Value,
}

fn contact_to_row(contact: &Contact) -> Result<serde_json::Value> {
    serde_json::to_value(contact).map_err(|e| IngestError::Serialization(e))
}

fn row_to_contact(row: ContactRow) -> Result<Contact> {
    serde_json::from_value(row.data).map_err(|e| IngestError::Serialization(e))
}

pub struct PostgresContactStore {
    pool: PgPool,
}

impl PostgresContactStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ContactStore for PostgresContactStore {
    async fn find(&self, user_id: &str, email: &str) -> Result<Option<Contact>> {
        let row: Option<ContactRow> = sqlx::query_as(
            "SELECT data FROM contacts WHERE user_id = $1 AND email = $2",
        )
        .bind(user_id)
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| IngestError::Store(e.to_string()))?;

        row.map(row_to_contact).transpose()
    }

    async fn upsert(&self, contact: Contact) -> Result<()> {
        let data = contact_to_row(&contact)?;

        sqlx::query(
            "INSERT INTO contacts (user_id, email, given_name, family_name, relevance_score, data, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, NOW())
             ON CONFLICT (user_id, email) DO UPDATE SET
                given_name = EXCLUDED.given_name,
                family_name = EXCLUDED.family_name,
                relevance_score = EXCLUDED.relevance_score,
                data = EXCLUDED.data,
                updated_at = NOW()",
        )
        .bind(&contact.user_id)
        .bind(&contact.email)
        .bind(&contact.given_name)
        .bind(&contact.family_name)
        .bind(contact.relevance_score)
        .bind(data)
        .execute(&self.pool)
        .await
        .map_err(|e| IngestError::Store(e.to_string()))?;

        Ok(())
    }

    async fn list_by_relevance(&self, user_id: &str, limit: usize) -> Result<Vec<Contact>> {
        let rows: Vec<ContactRow> = sqlx::query_as(
            "SELECT data FROM contacts WHERE user_id = $1 ORDER BY relevance_score DESC LIMIT $2",
        )
        .bind(user_id)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| IngestError::Store(e.to_string()))?;

        rows.into_iter().map(row_to_contact).collect()
    }

    async fn search(&self, user_id: &str, query: &str, limit: usize) -> Result<Vec<Contact>> {
        let pattern = format!("%{}%", query.to_lowercase());
        let rows: Vec<ContactRow> = sqlx::query_as(
            "SELECT data FROM contacts
             WHERE user_id = $1
               AND (LOWER(email) LIKE $2 OR LOWER(given_name) LIKE $2 OR LOWER(family_name) LIKE $2)
             ORDER BY relevance_score DESC
             LIMIT $3",
        )
        .bind(user_id)
        .bind(pattern)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| IngestError::Store(e.to_string()))?;

        rows.into_iter().map(row_to_contact).collect()
    }
}
