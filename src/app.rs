use std::sync::Arc;

use axum::{
    extract::{DefaultBodyLimit, Extension},
    routing::get,
    Router,
};
use serde_json::Value;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::config::{ApiConfig, AppConfig};
use crate::handlers;
use crate::services::DocumentService;

/// Shared per-process state handed to every handler through an `Extension` layer
#[derive(Clone)]
pub struct AppState {
    pub documents: Arc<DocumentService>,
    pub openapi: Arc<Value>,
    pub api: ApiConfig,
}

impl AppState {
    pub fn new(documents: DocumentService, openapi: Value, api: ApiConfig) -> Self {
        Self {
            documents: Arc::new(documents),
            openapi: Arc::new(openapi),
            api,
        }
    }
}

pub fn router(state: AppState, config: &AppConfig) -> Router {
    let body_limit = state.api.max_request_size_bytes;

    let mut app = Router::new()
        // Public
        .route("/", get(handlers::system::root))
        .route("/docs/apispec.json", get(handlers::system::openapi))
        .nest("/api", api_routes())
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(Extension(state));

    if config.security.enable_cors {
        app = app.layer(CorsLayer::permissive());
    }
    if config.api.enable_request_logging {
        app = app.layer(TraceLayer::new_for_http());
    }
    app
}

fn api_routes() -> Router {
    use handlers::documents;

    Router::new()
        .route("/health", get(handlers::system::health))
        // Collection-level operations
        .route(
            "/:collection",
            get(documents::list)
                .post(documents::create)
                .options(documents::options),
        )
        // Document-level operations
        .route(
            "/:collection/:id",
            get(documents::read)
                .put(documents::replace)
                .patch(documents::patch)
                .delete(documents::delete)
                .options(documents::options),
        )
}
