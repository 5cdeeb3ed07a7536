//! Process-local backend for ephemeral runs and tests.
//!
//! Bodies are kept as encoded JSON bytes so the create/fetch path goes through
//! the same serialize/deserialize steps as a real table.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use tokio::sync::RwLock;
use tracing::{info, warn};

use super::document::{merge_fields, Document};
use super::manager::DatabaseError;
use super::store::{DocumentStore, Page, PatchGuard};
use crate::config::is_safe_collection_name;

#[derive(Debug, Default)]
struct MemoryTable {
    /// Highest identifier ever handed out; survives deletes
    last_id: i64,
    rows: BTreeMap<i64, StoredRow>,
}

#[derive(Debug)]
struct StoredRow {
    created_at: DateTime<Utc>,
    data: Vec<u8>,
}

impl StoredRow {
    fn decode(&self, collection: &str, id: i64) -> Result<Document, DatabaseError> {
        match serde_json::from_slice::<Value>(&self.data)? {
            Value::Object(body) => Ok(Document { id, created_at: self.created_at, body }),
            _ => Err(DatabaseError::CorruptDocument { collection: collection.to_string(), id }),
        }
    }
}

#[derive(Debug, Default)]
pub struct MemoryDocumentStore {
    tables: RwLock<HashMap<String, MemoryTable>>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Write raw bytes as a row, bypassing encoding. Lets tests plant payloads
    /// that cannot be decoded.
    #[cfg(test)]
    pub(crate) async fn insert_raw(&self, collection: &str, data: Vec<u8>) -> Result<i64, DatabaseError> {
        let mut tables = self.tables.write().await;
        let table = table_mut(&mut tables, collection)?;
        table.last_id += 1;
        table.rows.insert(table.last_id, StoredRow { created_at: Utc::now(), data });
        Ok(table.last_id)
    }
}

fn table_mut<'a>(
    tables: &'a mut HashMap<String, MemoryTable>,
    collection: &str,
) -> Result<&'a mut MemoryTable, DatabaseError> {
    tables
        .get_mut(collection)
        .ok_or_else(|| DatabaseError::UnknownCollection(collection.to_string()))
}

fn not_found(collection: &str, id: i64) -> DatabaseError {
    DatabaseError::NotFound(format!("document {} not found in {}", id, collection))
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn provision(&self, collections: &[String]) -> Result<(), DatabaseError> {
        let mut tables = self.tables.write().await;
        for name in collections {
            if !is_safe_collection_name(name) {
                return Err(DatabaseError::InvalidCollectionName(name.clone()));
            }
            if !tables.contains_key(name) {
                tables.insert(name.clone(), MemoryTable::default());
                info!("Provisioned in-memory table for collection: {}", name);
            }
        }
        Ok(())
    }

    async fn create(&self, collection: &str, body: &Map<String, Value>) -> Result<i64, DatabaseError> {
        let data = serde_json::to_vec(body)?;
        let mut tables = self.tables.write().await;
        let table = table_mut(&mut tables, collection)?;
        table.last_id += 1;
        table.rows.insert(table.last_id, StoredRow { created_at: Utc::now(), data });
        Ok(table.last_id)
    }

    async fn fetch(&self, collection: &str, id: i64) -> Result<Document, DatabaseError> {
        let tables = self.tables.read().await;
        let table = tables
            .get(collection)
            .ok_or_else(|| DatabaseError::UnknownCollection(collection.to_string()))?;
        table
            .rows
            .get(&id)
            .ok_or_else(|| not_found(collection, id))?
            .decode(collection, id)
    }

    async fn list(&self, collection: &str, page: Page) -> Result<Vec<Document>, DatabaseError> {
        let tables = self.tables.read().await;
        let table = tables
            .get(collection)
            .ok_or_else(|| DatabaseError::UnknownCollection(collection.to_string()))?;

        let mut documents = Vec::new();
        for (id, row) in table
            .rows
            .iter()
            .skip(page.skip as usize)
            .take(page.limit as usize)
        {
            match row.decode(collection, *id) {
                Ok(doc) => documents.push(doc),
                Err(e) => warn!("Skipping undecodable row in {}: {}", collection, e),
            }
        }
        Ok(documents)
    }

    async fn replace(&self, collection: &str, id: i64, body: &Map<String, Value>) -> Result<(), DatabaseError> {
        let data = serde_json::to_vec(body)?;
        let mut tables = self.tables.write().await;
        let row = table_mut(&mut tables, collection)?
            .rows
            .get_mut(&id)
            .ok_or_else(|| not_found(collection, id))?;
        row.data = data;
        Ok(())
    }

    async fn patch(
        &self,
        collection: &str,
        id: i64,
        fields: Map<String, Value>,
        guard: PatchGuard<'_>,
    ) -> Result<Document, DatabaseError> {
        // Write lock spans read, merge and write
        let mut tables = self.tables.write().await;
        let row = table_mut(&mut tables, collection)?
            .rows
            .get_mut(&id)
            .ok_or_else(|| not_found(collection, id))?;

        let mut current = row.decode(collection, id)?;
        merge_fields(&mut current.body, fields);
        let merged = Value::Object(std::mem::take(&mut current.body));
        guard(&merged).map_err(DatabaseError::Rejected)?;

        row.data = serde_json::to_vec(&merged)?;
        if let Value::Object(body) = merged {
            current.body = body;
        }
        Ok(current)
    }

    async fn remove(&self, collection: &str, id: i64) -> Result<(), DatabaseError> {
        let mut tables = self.tables.write().await;
        table_mut(&mut tables, collection)?.rows.remove(&id);
        Ok(())
    }

    async fn health_check(&self) -> Result<(), DatabaseError> {
        Ok(())
    }
}
