use std::sync::Arc;

use serde_json::{Map, Value};
use thiserror::Error;
use tracing::debug;

use crate::auth::AuthorizationIndex;
use crate::config::{ConfigError, StoreConfig};
use crate::database::{DatabaseError, Document, DocumentStore, Page};
use crate::schema::SchemaIndex;
use crate::types::Action;

/// Per-request outcomes other than success
#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("Collection not found: {0}")]
    CollectionNotFound(String),

    #[error("Unauthorized access")]
    Unauthorized,

    #[error("Document must be a JSON object")]
    NotAnObject,

    #[error("Validation failed: {}", .0.join("; "))]
    ValidationFailed(Vec<String>),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Storage failure: {0}")]
    Storage(DatabaseError),
}

impl From<DatabaseError> for DocumentError {
    fn from(err: DatabaseError) -> Self {
        match err {
            DatabaseError::NotFound(msg) => DocumentError::NotFound(msg),
            DatabaseError::Rejected(violations) => DocumentError::ValidationFailed(violations),
            other => DocumentError::Storage(other),
        }
    }
}

/// Proof that a token passed the collection and action checks. Only
/// `DocumentService::authorize` creates one, so every operation below is
/// reachable only after its own check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grant {
    collection: String,
    action: Action,
}

impl Grant {
    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn action(&self) -> Action {
        self.action
    }

    fn require(&self, action: Action) -> Result<&str, DocumentError> {
        if self.action != action {
            debug!("Grant for {} used for {} on {}", self.action, action, self.collection);
            return Err(DocumentError::Unauthorized);
        }
        Ok(&self.collection)
    }
}

/// Runs every document operation through the same gate: collection exists,
/// token is allowed for the action, writes conform to the schema, then storage.
pub struct DocumentService {
    auth: AuthorizationIndex,
    schemas: SchemaIndex,
    store: Arc<dyn DocumentStore>,
}

impl DocumentService {
    /// Builds both indexes from one pass over the configuration
    pub fn from_config(config: &StoreConfig, store: Arc<dyn DocumentStore>) -> Result<Self, ConfigError> {
        let schemas = SchemaIndex::build(&config.collections)?;
        let auth = AuthorizationIndex::build(&config.collections, &config.access_tokens);
        Ok(Self { auth, schemas, store })
    }

    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    pub fn collection_exists(&self, collection: &str) -> bool {
        self.schemas.contains(collection)
    }

    /// Create the table of every configured collection
    pub async fn provision(&self) -> Result<(), DatabaseError> {
        let mut names: Vec<String> = self.schemas.collection_names().map(str::to_string).collect();
        names.sort();
        self.store.provision(&names).await
    }

    /// Collection must exist and the token must be granted `action` on it.
    /// Callers check first, then parse the request, then hand the grant to
    /// the matching operation.
    pub fn authorize(&self, collection: &str, action: Action, token: &str) -> Result<Grant, DocumentError> {
        if !self.collection_exists(collection) {
            return Err(DocumentError::CollectionNotFound(collection.to_string()));
        }
        if !self.auth.is_allowed(collection, action, token) {
            debug!("Denied {} on {}", action, collection);
            return Err(DocumentError::Unauthorized);
        }
        Ok(Grant { collection: collection.to_string(), action })
    }

    fn conform<'a>(&self, collection: &str, document: &'a Value) -> Result<&'a Map<String, Value>, DocumentError> {
        let body = document.as_object().ok_or(DocumentError::NotAnObject)?;
        if !self.schemas.validate(collection, document) {
            let violations = self.schemas.violations(collection, document);
            debug!("Rejected document for {}: {:?}", collection, violations);
            return Err(DocumentError::ValidationFailed(violations));
        }
        Ok(body)
    }

    pub async fn create(&self, grant: &Grant, document: Value) -> Result<i64, DocumentError> {
        let collection = grant.require(Action::Create)?;
        let body = self.conform(collection, &document)?;
        Ok(self.store.create(collection, body).await?)
    }

    pub async fn read(&self, grant: &Grant, id: i64) -> Result<Document, DocumentError> {
        let collection = grant.require(Action::Read)?;
        Ok(self.store.fetch(collection, id).await?)
    }

    pub async fn list(&self, grant: &Grant, page: Page) -> Result<Vec<Document>, DocumentError> {
        let collection = grant.require(Action::List)?;
        Ok(self.store.list(collection, page).await?)
    }

    pub async fn replace(&self, grant: &Grant, id: i64, document: Value) -> Result<(), DocumentError> {
        let collection = grant.require(Action::Replace)?;
        let body = self.conform(collection, &document)?;
        Ok(self.store.replace(collection, id, body).await?)
    }

    /// The merged result, not the fragment, has to satisfy the schema
    pub async fn patch(&self, grant: &Grant, id: i64, fields: Value) -> Result<Document, DocumentError> {
        let collection = grant.require(Action::Patch)?;
        let Value::Object(fields) = fields else {
            return Err(DocumentError::NotAnObject);
        };

        let guard = |merged: &Value| -> Result<(), Vec<String>> {
            if self.schemas.validate(collection, merged) {
                Ok(())
            } else {
                Err(self.schemas.violations(collection, merged))
            }
        };
        Ok(self.store.patch(collection, id, fields, &guard).await?)
    }

    pub async fn delete(&self, grant: &Grant, id: i64) -> Result<(), DocumentError> {
        let collection = grant.require(Action::Delete)?;
        Ok(self.store.remove(collection, id).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::MemoryDocumentStore;
    use serde_json::json;

    fn config() -> StoreConfig {
        StoreConfig::from_json_str(
            &json!({
                "host": "127.0.0.1",
                "port": 0,
                "access_tokens": [
                    { "name": "t1", "token": "secret-1" },
                    { "name": "t2", "token": "secret-2" }
                ],
                "collections": [{
                    "name": "notes",
                    "auth": { "all": ["t1"], "create": [], "read": ["t2"], "list": [],
                              "replace": [], "patch": [], "delete": [] },
                    "schema": {
                        "type": "object",
                        "properties": { "title": { "type": "string" }, "n": { "type": "integer" } },
                        "required": ["title"]
                    }
                }]
            })
            .to_string(),
        )
        .unwrap()
    }

    async fn service() -> DocumentService {
        let service = DocumentService::from_config(&config(), Arc::new(MemoryDocumentStore::new())).unwrap();
        service.provision().await.unwrap();
        service
    }

    fn grant(svc: &DocumentService, action: Action, token: &str) -> Grant {
        svc.authorize("notes", action, token).unwrap()
    }

    #[tokio::test]
    async fn create_then_read_scenario() {
        let svc = service().await;
        let id = svc.create(&grant(&svc, Action::Create, "secret-1"), json!({"title": "x"})).await.unwrap();
        assert_eq!(id, 1);

        let value = svc.read(&grant(&svc, Action::Read, "secret-2"), 1).await.unwrap().into_api_value();
        assert_eq!(value["title"], "x");
        assert_eq!(value["_id"], 1);
        assert!(value["_created_at"].is_string());
    }

    #[test]
    fn unknown_collection_wins_over_authorization() {
        let svc = DocumentService::from_config(&config(), Arc::new(MemoryDocumentStore::new())).unwrap();
        assert!(matches!(
            svc.authorize("tasks", Action::Read, "secret-1"),
            Err(DocumentError::CollectionNotFound(_))
        ));
        assert!(matches!(
            svc.authorize("tasks", Action::Read, ""),
            Err(DocumentError::CollectionNotFound(_))
        ));
    }

    #[test]
    fn tokens_are_checked_per_action() {
        let svc = DocumentService::from_config(&config(), Arc::new(MemoryDocumentStore::new())).unwrap();
        assert!(matches!(svc.authorize("notes", Action::Create, "secret-2"), Err(DocumentError::Unauthorized)));
        assert!(matches!(svc.authorize("notes", Action::List, ""), Err(DocumentError::Unauthorized)));
        assert!(matches!(svc.authorize("notes", Action::Delete, "secret-2"), Err(DocumentError::Unauthorized)));

        let granted = svc.authorize("notes", Action::Read, "secret-2").unwrap();
        assert_eq!(granted.collection(), "notes");
        assert_eq!(granted.action(), Action::Read);
    }

    #[tokio::test]
    async fn a_grant_only_covers_its_own_action() {
        let svc = service().await;
        let read = grant(&svc, Action::Read, "secret-2");
        assert!(matches!(svc.create(&read, json!({"title": "x"})).await, Err(DocumentError::Unauthorized)));
        assert!(matches!(svc.delete(&read, 1).await, Err(DocumentError::Unauthorized)));
        assert!(matches!(svc.read(&read, 1).await, Err(DocumentError::NotFound(_))));
    }

    #[tokio::test]
    async fn writes_are_validated() {
        let svc = service().await;
        let create = grant(&svc, Action::Create, "secret-1");
        let replace = grant(&svc, Action::Replace, "secret-1");
        assert!(matches!(
            svc.create(&create, json!({"n": 1})).await,
            Err(DocumentError::ValidationFailed(_))
        ));
        assert!(matches!(
            svc.create(&create, json!(["title"])).await,
            Err(DocumentError::NotAnObject)
        ));

        let id = svc.create(&create, json!({"title": "x"})).await.unwrap();
        assert!(matches!(
            svc.replace(&replace, id, json!({"title": 1})).await,
            Err(DocumentError::ValidationFailed(_))
        ));
        assert!(matches!(
            svc.replace(&replace, 99, json!({"title": "y"})).await,
            Err(DocumentError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn patch_validates_the_merged_document() {
        let svc = service().await;
        let id = svc.create(&grant(&svc, Action::Create, "secret-1"), json!({"title": "x", "n": 1})).await.unwrap();
        let patch = grant(&svc, Action::Patch, "secret-1");

        // fragment alone lacks the required title, merged result is fine
        let merged = svc.patch(&patch, id, json!({"n": 2})).await.unwrap();
        assert_eq!(Value::Object(merged.body), json!({"title": "x", "n": 2}));

        assert!(matches!(
            svc.patch(&patch, id, json!({"n": "two"})).await,
            Err(DocumentError::ValidationFailed(_))
        ));
        assert!(matches!(
            svc.patch(&patch, 42, json!({"n": 3})).await,
            Err(DocumentError::NotFound(_))
        ));
        assert!(matches!(
            svc.patch(&patch, id, json!("n")).await,
            Err(DocumentError::NotAnObject)
        ));
    }

    #[tokio::test]
    async fn delete_then_read_is_not_found() {
        let svc = service().await;
        let id = svc.create(&grant(&svc, Action::Create, "secret-1"), json!({"title": "x"})).await.unwrap();
        let delete = grant(&svc, Action::Delete, "secret-1");
        svc.delete(&delete, id).await.unwrap();
        assert!(matches!(
            svc.read(&grant(&svc, Action::Read, "secret-1"), id).await,
            Err(DocumentError::NotFound(_))
        ));
        svc.delete(&delete, id).await.unwrap();
    }
}
