use axum::{
    body::Bytes,
    extract::{Extension, Path, RawQuery},
    http::StatusCode,
    response::IntoResponse,
};
use serde_json::{json, Value};
use url::form_urlencoded;

use crate::app::AppState;
use crate::database::{Page, ID_FIELD};
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult, BearerToken};
use crate::types::Action;

/// `skip` and `limit` taken from the raw query string. Only the first
/// occurrence of each key counts; missing or unparsable values fall back to
/// the defaults instead of failing the request.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct ListQuery {
    pub skip: Option<i64>,
    pub limit: Option<i64>,
}

impl ListQuery {
    fn parse(raw: Option<&str>) -> Self {
        let Some(raw) = raw else {
            return Self::default();
        };
        let first = |key: &str| {
            form_urlencoded::parse(raw.as_bytes())
                .find(|(k, _)| k == key)
                .and_then(|(_, v)| v.trim().parse::<i64>().ok())
        };
        Self { skip: first("skip"), limit: first("limit") }
    }

    fn page(&self, default_limit: i64, max_limit: i64) -> Page {
        Page::clamped(self.skip, self.limit, default_limit, max_limit)
    }
}

fn parse_id(raw: &str) -> Result<i64, ApiError> {
    raw.parse::<i64>().map_err(|_| ApiError::bad_request("Invalid ID"))
}

fn parse_body(body: &Bytes) -> Result<Value, ApiError> {
    let value: Value = serde_json::from_slice(body).map_err(|_| ApiError::invalid_json("Invalid JSON"))?;
    if !value.is_object() {
        return Err(ApiError::invalid_json("Request body must be a JSON object"));
    }
    Ok(value)
}

fn identifier(id: i64) -> Value {
    json!({ ID_FIELD: id })
}

/// GET /api/:collection - Page through documents
pub async fn list(
    Path(collection): Path<String>,
    RawQuery(query): RawQuery,
    Extension(state): Extension<AppState>,
    token: BearerToken,
) -> ApiResult<Vec<Value>> {
    let grant = state.documents.authorize(&collection, Action::List, token.as_str())?;
    let page = ListQuery::parse(query.as_deref()).page(state.api.default_page_limit, state.api.max_page_limit);
    let documents = state.documents.list(&grant, page).await?;
    Ok(ApiResponse::success(
        documents.into_iter().map(|d| d.into_api_value()).collect(),
    ))
}

/// POST /api/:collection - Create a document
pub async fn create(
    Path(collection): Path<String>,
    Extension(state): Extension<AppState>,
    token: BearerToken,
    body: Bytes,
) -> ApiResult<Value> {
    let grant = state.documents.authorize(&collection, Action::Create, token.as_str())?;
    let document = parse_body(&body)?;
    let id = state.documents.create(&grant, document).await?;
    Ok(ApiResponse::created(identifier(id)))
}

/// GET /api/:collection/:id - Fetch one document
pub async fn read(
    Path((collection, id)): Path<(String, String)>,
    Extension(state): Extension<AppState>,
    token: BearerToken,
) -> ApiResult<Value> {
    let grant = state.documents.authorize(&collection, Action::Read, token.as_str())?;
    let id = parse_id(&id)?;
    let document = state.documents.read(&grant, id).await?;
    Ok(ApiResponse::success(document.into_api_value()))
}

/// PUT /api/:collection/:id - Replace the whole document
pub async fn replace(
    Path((collection, id)): Path<(String, String)>,
    Extension(state): Extension<AppState>,
    token: BearerToken,
    body: Bytes,
) -> ApiResult<Value> {
    let grant = state.documents.authorize(&collection, Action::Replace, token.as_str())?;
    let id = parse_id(&id)?;
    let document = parse_body(&body)?;
    state.documents.replace(&grant, id, document).await?;
    Ok(ApiResponse::success(identifier(id)))
}

/// PATCH /api/:collection/:id - Shallow-merge fields into the document
pub async fn patch(
    Path((collection, id)): Path<(String, String)>,
    Extension(state): Extension<AppState>,
    token: BearerToken,
    body: Bytes,
) -> ApiResult<Value> {
    let grant = state.documents.authorize(&collection, Action::Patch, token.as_str())?;
    let id = parse_id(&id)?;
    let fields = parse_body(&body)?;
    let document = state.documents.patch(&grant, id, fields).await?;
    Ok(ApiResponse::success(document.into_api_value()))
}

/// DELETE /api/:collection/:id - Physically delete the document
pub async fn delete(
    Path((collection, id)): Path<(String, String)>,
    Extension(state): Extension<AppState>,
    token: BearerToken,
) -> ApiResult<Value> {
    let grant = state.documents.authorize(&collection, Action::Delete, token.as_str())?;
    let id = parse_id(&id)?;
    state.documents.delete(&grant, id).await?;
    Ok(ApiResponse::success(identifier(id)))
}

/// OPTIONS on collection paths; real CORS preflights are answered by the CORS layer
pub async fn options() -> impl IntoResponse {
    StatusCode::NO_CONTENT
}
