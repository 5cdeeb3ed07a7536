use axum::{extract::Extension, response::Json};
use serde_json::{json, Value};

use crate::app::AppState;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult};

/// GET / - Service banner
pub async fn root() -> Json<Value> {
    Json(json!({
        "success": true,
        "data": {
            "name": "QuickStore",
            "version": env!("CARGO_PKG_VERSION"),
            "endpoints": {
                "health": "/api/health",
                "collection": "/api/:collection (GET list, POST create)",
                "document": "/api/:collection/:id (GET, PUT, PATCH, DELETE)",
                "openapi": "/docs/apispec.json"
            }
        }
    }))
}

/// GET /api/health - Liveness plus a storage ping
pub async fn health(Extension(state): Extension<AppState>) -> ApiResult<Value> {
    let store = state.documents.store();

    if let Err(e) = store.health_check().await {
        tracing::warn!("Health check failed on {} backend: {}", store.backend(), e);
        return Err(ApiError::service_unavailable("Database unavailable"));
    }

    Ok(ApiResponse::success(json!({
        "status": "ok",
        "timestamp": chrono::Utc::now(),
        "backend": store.backend(),
        "database": "ok"
    })))
}

/// GET /docs/apispec.json - Generated OpenAPI document
pub async fn openapi(Extension(state): Extension<AppState>) -> Json<Value> {
    Json(state.openapi.as_ref().clone())
}
