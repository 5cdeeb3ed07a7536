use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use sqlx::{types::Json, FromRow, PgPool};
use tokio::sync::RwLock;
use tracing::{info, warn};

use super::document::{merge_fields, Document};
use super::manager::{DatabaseError, DatabaseManager};
use super::store::{DocumentStore, Page, PatchGuard};
use crate::config::is_safe_collection_name;

#[derive(Debug, FromRow)]
struct DocumentRow {
    id: i64,
    created_at: DateTime<Utc>,
    data: Value,
}

impl DocumentRow {
    fn into_document(self, collection: &str) -> Result<Document, DatabaseError> {
        match self.data {
            Value::Object(body) => Ok(Document { id: self.id, created_at: self.created_at, body }),
            _ => Err(DatabaseError::CorruptDocument { collection: collection.to_string(), id: self.id }),
        }
    }
}

/// DDL for one collection table. `table` must already be quoted.
pub fn create_table_sql(table: &str) -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS {} (\n    \
            id BIGSERIAL PRIMARY KEY,\n    \
            created_at TIMESTAMPTZ NOT NULL DEFAULT now(),\n    \
            data JSONB NOT NULL\n\
        )",
        table
    )
}

/// PostgreSQL backend. Bodies live in a JSONB column; identifiers come from a
/// BIGSERIAL sequence and are never reused.
pub struct PgDocumentStore {
    pool: PgPool,
    /// collection name -> quoted table identifier, filled by `provision`
    tables: RwLock<HashMap<String, String>>,
}

impl PgDocumentStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool, tables: RwLock::new(HashMap::new()) }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn table(&self, collection: &str) -> Result<String, DatabaseError> {
        self.tables
            .read()
            .await
            .get(collection)
            .cloned()
            .ok_or_else(|| DatabaseError::UnknownCollection(collection.to_string()))
    }
}

#[async_trait]
impl DocumentStore for PgDocumentStore {
    fn backend(&self) -> &'static str {
        "postgres"
    }

    async fn provision(&self, collections: &[String]) -> Result<(), DatabaseError> {
        for name in collections {
            if !is_safe_collection_name(name) {
                return Err(DatabaseError::InvalidCollectionName(name.clone()));
            }
            let table = DatabaseManager::quote_identifier(name);
            sqlx::query(&create_table_sql(&table)).execute(&self.pool).await?;
            self.tables.write().await.insert(name.clone(), table);
            info!("Provisioned table for collection: {}", name);
        }
        Ok(())
    }

    async fn create(&self, collection: &str, body: &Map<String, Value>) -> Result<i64, DatabaseError> {
        let table = self.table(collection).await?;
        let sql = format!("INSERT INTO {} (data) VALUES ($1) RETURNING id", table);
        let id = sqlx::query_scalar::<_, i64>(&sql)
            .bind(Json(body))
            .fetch_one(&self.pool)
            .await?;
        Ok(id)
    }

    async fn fetch(&self, collection: &str, id: i64) -> Result<Document, DatabaseError> {
        let table = self.table(collection).await?;
        let sql = format!("SELECT id, created_at, data FROM {} WHERE id = $1", table);
        let row = sqlx::query_as::<_, DocumentRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DatabaseError::NotFound(format!("document {} not found in {}", id, collection)))?;
        row.into_document(collection)
    }

    async fn list(&self, collection: &str, page: Page) -> Result<Vec<Document>, DatabaseError> {
        let table = self.table(collection).await?;
        let sql = format!(
            "SELECT id, created_at, data FROM {} ORDER BY id LIMIT $1 OFFSET $2",
            table
        );
        let rows = sqlx::query(&sql)
            .bind(page.limit)
            .bind(page.skip)
            .fetch_all(&self.pool)
            .await?;

        // Decode row by row so one bad payload does not sink the page
        let mut documents = Vec::with_capacity(rows.len());
        for row in rows {
            match DocumentRow::from_row(&row)
                .map_err(DatabaseError::from)
                .and_then(|r| r.into_document(collection))
            {
                Ok(doc) => documents.push(doc),
                Err(e) => warn!("Skipping undecodable row in {}: {}", collection, e),
            }
        }
        Ok(documents)
    }

    async fn replace(&self, collection: &str, id: i64, body: &Map<String, Value>) -> Result<(), DatabaseError> {
        let table = self.table(collection).await?;
        let sql = format!("UPDATE {} SET data = $1 WHERE id = $2", table);
        let result = sqlx::query(&sql)
            .bind(Json(body))
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(DatabaseError::NotFound(format!("document {} not found in {}", id, collection)));
        }
        Ok(())
    }

    async fn patch(
        &self,
        collection: &str,
        id: i64,
        fields: Map<String, Value>,
        guard: PatchGuard<'_>,
    ) -> Result<Document, DatabaseError> {
        let table = self.table(collection).await?;
        let select = format!("SELECT id, created_at, data FROM {} WHERE id = $1 FOR UPDATE", table);
        let update = format!("UPDATE {} SET data = $1 WHERE id = $2", table);

        // Row lock held until commit; concurrent patches on the same id queue up here
        let mut tx = self.pool.begin().await?;
        let mut current = sqlx::query_as::<_, DocumentRow>(&select)
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| DatabaseError::NotFound(format!("document {} not found in {}", id, collection)))?
            .into_document(collection)?;

        merge_fields(&mut current.body, fields);
        let merged = Value::Object(std::mem::take(&mut current.body));
        guard(&merged).map_err(DatabaseError::Rejected)?;

        sqlx::query(&update)
            .bind(Json(&merged))
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        if let Value::Object(body) = merged {
            current.body = body;
        }
        Ok(current)
    }

    async fn remove(&self, collection: &str, id: i64) -> Result<(), DatabaseError> {
        let table = self.table(collection).await?;
        let sql = format!("DELETE FROM {} WHERE id = $1", table);
        sqlx::query(&sql).bind(id).execute(&self.pool).await?;
        Ok(())
    }

    async fn health_check(&self) -> Result<(), DatabaseError> {
        DatabaseManager::health_check(&self.pool).await
    }
}
