use async_trait::async_trait;
use serde_json::{Map, Value};

use super::document::Document;
use super::manager::DatabaseError;

/// Approves a merged patch body before it is written, or returns the reasons it cannot be
pub type PatchGuard<'a> = &'a (dyn Fn(&Value) -> Result<(), Vec<String>> + Send + Sync);

/// One page of an unfiltered scan in identifier order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub skip: i64,
    pub limit: i64,
}

impl Page {
    /// Missing or negative `skip` becomes 0; `limit` falls back to `default`
    /// and is clamped to `1..=max`.
    pub fn clamped(skip: Option<i64>, limit: Option<i64>, default: i64, max: i64) -> Self {
        Self {
            skip: skip.unwrap_or(0).max(0),
            limit: limit.unwrap_or(default).clamp(1, max.max(1)),
        }
    }
}

/// One physical table per collection holding schemaless JSON bodies.
///
/// Every operation except `provision` and `health_check` fails with
/// `DatabaseError::UnknownCollection` for a collection that was never provisioned.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Short backend label for logs and health output
    fn backend(&self) -> &'static str;

    /// Ensure a table exists for every collection. Idempotent, never truncates.
    async fn provision(&self, collections: &[String]) -> Result<(), DatabaseError>;

    /// Insert a new row and return its identifier
    async fn create(&self, collection: &str, body: &Map<String, Value>) -> Result<i64, DatabaseError>;

    async fn fetch(&self, collection: &str, id: i64) -> Result<Document, DatabaseError>;

    /// Rows that cannot be decoded are skipped, not reported
    async fn list(&self, collection: &str, page: Page) -> Result<Vec<Document>, DatabaseError>;

    /// Overwrite the body, keeping identifier and creation time
    async fn replace(&self, collection: &str, id: i64, body: &Map<String, Value>) -> Result<(), DatabaseError>;

    /// Read, shallow-merge `fields`, check with `guard`, write. Runs as one
    /// atomic step per identifier. Returns the merged document.
    async fn patch(
        &self,
        collection: &str,
        id: i64,
        fields: Map<String, Value>,
        guard: PatchGuard<'_>,
    ) -> Result<Document, DatabaseError>;

    /// Physical delete. A missing identifier is not an error.
    async fn remove(&self, collection: &str, id: i64) -> Result<(), DatabaseError>;

    async fn health_check(&self) -> Result<(), DatabaseError>;
}
