//! OpenAPI 3 document generated from the store configuration

use std::collections::{HashMap, HashSet};

use serde_json::{json, Map, Value};

use crate::config::StoreConfig;
use crate::types::Collection;

/// Shared error body component; never handed to a collection
const ERROR_COMPONENT: &str = "ErrorResponse";

/// Preferred component name: the schema `title` when present, else the collection name
fn preferred_name(collection: &Collection) -> String {
    collection
        .schema
        .get("title")
        .and_then(Value::as_str)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| collection.name.clone())
}

/// One unique component name per collection, in order. A preferred name shared by several
/// collections, or equal to the error component, is qualified as `{name}_{collection}`.
fn component_names(collections: &[Collection]) -> Vec<String> {
    let preferred: Vec<String> = collections.iter().map(preferred_name).collect();
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for name in &preferred {
        *counts.entry(name.as_str()).or_default() += 1;
    }

    let mut taken: HashSet<String> = HashSet::from([ERROR_COMPONENT.to_string()]);
    let mut names = Vec::with_capacity(collections.len());
    for (collection, wanted) in collections.iter().zip(&preferred) {
        let mut name = if counts[wanted.as_str()] > 1 || wanted == ERROR_COMPONENT {
            format!("{}_{}", wanted, collection.name)
        } else {
            wanted.clone()
        };
        while taken.contains(&name) {
            name.push('_');
        }
        taken.insert(name.clone());
        names.push(name);
    }
    names
}

fn schema_ref(name: &str) -> Value {
    json!({ "$ref": format!("#/components/schemas/{}", name) })
}

fn json_content(schema: Value) -> Value {
    json!({ "application/json": { "schema": schema } })
}

fn error_response(description: &str) -> Value {
    json!({ "description": description, "content": json_content(schema_ref(ERROR_COMPONENT)) })
}

fn success_response(description: &str, data: Value) -> Value {
    json!({
        "description": description,
        "content": json_content(json!({
            "type": "object",
            "properties": { "success": { "type": "boolean" }, "data": data }
        }))
    })
}

fn id_parameter() -> Value {
    json!({
        "name": "id",
        "in": "path",
        "description": "Document ID",
        "required": true,
        "schema": { "type": "integer", "format": "int64" }
    })
}

fn query_parameter(name: &str, description: &str) -> Value {
    json!({
        "name": name,
        "in": "query",
        "description": description,
        "required": false,
        "schema": { "type": "integer" }
    })
}

fn collection_paths(collection: &Collection, schema_name: &str) -> (Value, Value) {
    let tags = json!([collection.name]);
    let document = schema_ref(schema_name);
    let identifier = json!({ "type": "object", "properties": { "_id": { "type": "integer" } } });

    let list_and_create = json!({
        "get": {
            "summary": "List documents",
            "description": format!("Page through documents in the {} collection", collection.name),
            "tags": tags,
            "parameters": [
                query_parameter("skip", "Number of documents to skip (default 0)"),
                query_parameter("limit", "Maximum number of documents to return (1-1000, default 100)")
            ],
            "responses": {
                "200": success_response("Documents retrieved", json!({ "type": "array", "items": document })),
                "401": error_response("Unauthorized access"),
                "404": error_response("Collection not found")
            }
        },
        "post": {
            "summary": "Create a document",
            "tags": tags,
            "requestBody": { "required": true, "content": json_content(document.clone()) },
            "responses": {
                "201": success_response("Document created", identifier.clone()),
                "400": error_response("Invalid JSON or validation failed"),
                "401": error_response("Unauthorized access"),
                "404": error_response("Collection not found")
            }
        }
    });

    let by_id = json!({
        "parameters": [id_parameter()],
        "get": {
            "summary": "Get a document by ID",
            "tags": tags,
            "responses": {
                "200": success_response("Document retrieved", document.clone()),
                "400": error_response("Invalid ID"),
                "401": error_response("Unauthorized access"),
                "404": error_response("Document or collection not found")
            }
        },
        "put": {
            "summary": "Replace a document",
            "tags": tags,
            "requestBody": { "required": true, "content": json_content(document.clone()) },
            "responses": {
                "200": success_response("Document replaced", identifier.clone()),
                "400": error_response("Invalid JSON, invalid ID or validation failed"),
                "401": error_response("Unauthorized access"),
                "404": error_response("Document or collection not found")
            }
        },
        "patch": {
            "summary": "Partially update a document",
            "description": "Top-level fields in the body overwrite stored fields; the merged document must satisfy the schema",
            "tags": tags,
            "requestBody": { "required": true, "content": json_content(json!({ "type": "object" })) },
            "responses": {
                "200": success_response("Document patched", document),
                "400": error_response("Invalid JSON, invalid ID or validation failed"),
                "401": error_response("Unauthorized access"),
                "404": error_response("Document or collection not found")
            }
        },
        "delete": {
            "summary": "Delete a document",
            "tags": tags,
            "responses": {
                "200": success_response("Document deleted", identifier),
                "400": error_response("Invalid ID"),
                "401": error_response("Unauthorized access"),
                "404": error_response("Collection not found")
            }
        }
    });

    (list_and_create, by_id)
}

pub fn build_openapi(config: &StoreConfig) -> Value {
    let mut paths = Map::new();
    let mut schemas = Map::new();
    let mut tags = Vec::new();

    schemas.insert(
        ERROR_COMPONENT.to_string(),
        json!({
            "type": "object",
            "properties": {
                "error": { "type": "boolean" },
                "message": { "type": "string" },
                "code": { "type": "string" },
                "violations": { "type": "array", "items": { "type": "string" } }
            }
        }),
    );

    paths.insert(
        "/health".to_string(),
        json!({
            "get": {
                "summary": "Health check endpoint",
                "security": [],
                "responses": {
                    "200": { "description": "OK" },
                    "503": error_response("Storage unavailable")
                }
            }
        }),
    );

    let names = component_names(&config.collections);
    for (collection, schema_name) in config.collections.iter().zip(names) {
        schemas.insert(schema_name.clone(), Value::Object(collection.schema.clone()));
        tags.push(json!({
            "name": collection.name,
            "description": format!("Operations related to the {} collection", collection.name)
        }));

        let (list_and_create, by_id) = collection_paths(collection, &schema_name);
        paths.insert(format!("/{}", collection.name), list_and_create);
        paths.insert(format!("/{}/{{id}}", collection.name), by_id);
    }

    let server = format!("{}/api", config.openapi_host.as_deref().unwrap_or("").trim_end_matches('/'));

    json!({
        "openapi": "3.0.3",
        "info": {
            "title": "QuickStore API",
            "description": "A simple document store API with authentication and schema validation",
            "version": env!("CARGO_PKG_VERSION")
        },
        "servers": [{ "url": server }],
        "components": {
            "securitySchemes": {
                "bearerAuth": { "type": "http", "scheme": "bearer" }
            },
            "schemas": schemas
        },
        "security": [{ "bearerAuth": [] }],
        "tags": tags,
        "paths": paths
    })
}
