//! Drives the router in-process, no socket involved.

use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use serde_json::{json, Map, Value};
use tower::ServiceExt;

use quickstore::api::build_openapi;
use quickstore::app::{self, AppState};
use quickstore::config::{AppConfig, StoreConfig};
use quickstore::database::{DatabaseError, Document, DocumentStore, MemoryDocumentStore, Page, PatchGuard};
use quickstore::services::DocumentService;

const TOKEN: &str = "router-secret";

fn books_config() -> StoreConfig {
    StoreConfig::from_yaml_str(
        r#"
host: 127.0.0.1
port: 0
access_tokens:
  - name: root
    token: router-secret
collections:
  - name: books
    auth:
      all: [root]
      create: []
      read: []
      list: []
      replace: []
      patch: []
      delete: []
    schema:
      type: object
      properties:
        isbn: { type: string, pattern: "^[0-9-]+$" }
        pages: { type: integer, minimum: 1 }
      required: [isbn]
"#,
    )
    .expect("valid config")
}

async fn app() -> Router {
    app_with(Arc::new(MemoryDocumentStore::new())).await
}

async fn app_with(store: Arc<dyn DocumentStore>) -> Router {
    let store_config = books_config();
    let mut config = AppConfig::development();
    config.api.enable_request_logging = false;
    config.api.max_request_size_bytes = 1024;

    let documents = DocumentService::from_config(&store_config, store).expect("service");
    documents.provision().await.expect("provision");

    let state = AppState::new(documents, build_openapi(&store_config), config.api.clone());
    app::router(state, &config)
}

async fn call(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {}", TOKEN));
    let body = match body {
        Some(v) => {
            builder = builder.header(header::CONTENT_TYPE, "application/json");
            Body::from(v.to_string())
        }
        None => Body::empty(),
    };

    let res = app.clone().oneshot(builder.body(body).unwrap()).await.unwrap();
    let status = res.status();
    let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap_or(Value::Null) };
    (status, value)
}

#[tokio::test]
async fn first_document_gets_id_one() {
    let app = app().await;

    let (status, body) = call(&app, Method::POST, "/api/books", Some(json!({"isbn": "978-0"}))).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body, json!({"success": true, "data": {"_id": 1}}));

    let (status, body) = call(&app, Method::GET, "/api/books/1", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["isbn"], "978-0");
    assert_eq!(body["data"]["_id"], 1);
}

#[tokio::test]
async fn schema_keywords_are_enforced() {
    let app = app().await;

    let (status, body) = call(&app, Method::POST, "/api/books", Some(json!({"isbn": "abc"}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_ERROR");

    let (status, _) = call(&app, Method::POST, "/api/books", Some(json!({"isbn": "1", "pages": 0}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = call(&app, Method::POST, "/api/books", Some(json!({"isbn": "1", "pages": 10}))).await;
    assert_eq!(status, StatusCode::CREATED);
}

#[tokio::test]
async fn synthetic_fields_shadow_stored_keys() {
    let app = app().await;

    let (_, body) = call(&app, Method::POST, "/api/books", Some(json!({"isbn": "1", "_id": 500}))).await;
    let id = body["data"]["_id"].as_i64().unwrap();
    assert_eq!(id, 1);

    let (_, body) = call(&app, Method::GET, "/api/books/1", None).await;
    assert_eq!(body["data"]["_id"], 1);
}

#[tokio::test]
async fn body_limit_applies() {
    let app = app().await;
    let big = "1".repeat(2048);
    let (status, _) = call(&app, Method::POST, "/api/books", Some(json!({"isbn": big}))).await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
}

#[tokio::test]
async fn openapi_and_health_are_public() {
    let app = app().await;

    let res = app
        .clone()
        .oneshot(Request::builder().uri("/docs/apispec.json").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = app
        .clone()
        .oneshot(Request::builder().uri("/api/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn unrouted_paths_are_not_found() {
    let app = app().await;
    let (status, _) = call(&app, Method::GET, "/api/books/1/extra", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn repeated_paging_keys_use_the_first_value() {
    let app = app().await;
    for n in 0..12 {
        let (status, _) = call(&app, Method::POST, "/api/books", Some(json!({"isbn": format!("{}", n)}))).await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (status, body) = call(&app, Method::GET, "/api/books?limit=5&limit=10", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().map(Vec::len), Some(5));

    let (status, body) = call(&app, Method::GET, "/api/books?skip=10&skip=1&limit=oops", None).await;
    assert_eq!(status, StatusCode::OK);
    let ids: Vec<i64> = body["data"].as_array().unwrap().iter().filter_map(|d| d["_id"].as_i64()).collect();
    assert_eq!(ids, vec![11, 12]);
}

#[tokio::test]
async fn repeated_paging_keys_do_not_hide_unknown_collections() {
    let app = app().await;
    let (status, body) = call(&app, Method::GET, "/api/ghosts?skip=1&skip=2", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "NOT_FOUND");
}

/// Backend whose storage is unreachable
struct DownStore;

fn down() -> DatabaseError {
    DatabaseError::Sqlx(sqlx::Error::PoolTimedOut)
}

#[async_trait]
impl DocumentStore for DownStore {
    fn backend(&self) -> &'static str {
        "down"
    }

    async fn provision(&self, _: &[String]) -> Result<(), DatabaseError> {
        Ok(())
    }

    async fn create(&self, _: &str, _: &Map<String, Value>) -> Result<i64, DatabaseError> {
        Err(down())
    }

    async fn fetch(&self, _: &str, _: i64) -> Result<Document, DatabaseError> {
        Err(down())
    }

    async fn list(&self, _: &str, _: Page) -> Result<Vec<Document>, DatabaseError> {
        Err(down())
    }

    async fn replace(&self, _: &str, _: i64, _: &Map<String, Value>) -> Result<(), DatabaseError> {
        Err(down())
    }

    async fn patch(&self, _: &str, _: i64, _: Map<String, Value>, _: PatchGuard<'_>) -> Result<Document, DatabaseError> {
        Err(down())
    }

    async fn remove(&self, _: &str, _: i64) -> Result<(), DatabaseError> {
        Err(down())
    }

    async fn health_check(&self) -> Result<(), DatabaseError> {
        Err(down())
    }
}

#[tokio::test]
async fn unreachable_storage_is_reported_with_the_error_envelope() {
    let app = app_with(Arc::new(DownStore)).await;

    let (status, body) = call(&app, Method::GET, "/api/health", None).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["error"], true);
    assert_eq!(body["code"], "SERVICE_UNAVAILABLE");

    let (status, body) = call(&app, Method::GET, "/api/books/1", None).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["message"], "Database error occurred");
}
