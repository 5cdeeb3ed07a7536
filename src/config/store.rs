//! Store configuration file: listen address, access tokens and collections.
//!
//! Accepts JSON, or YAML when the file extension is `.yaml`/`.yml`. The raw document is
//! checked against an embedded meta-schema before it is deserialized, so every structural
//! problem is reported at once rather than one serde error at a time.

use std::collections::HashSet;
use std::path::Path;

use jsonschema::JSONSchema;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::warn;

use super::ConfigError;
use crate::types::{AccessToken, Collection};

/// Postgres truncates identifiers past 63 bytes
const MAX_COLLECTION_NAME_LEN: usize = 63;

static CONFIG_SCHEMA: Lazy<Value> = Lazy::new(|| {
    let token_list = json!({ "type": "array", "items": { "type": "string" } });
    json!({
        "type": "object",
        "properties": {
            "host": { "description": "Hostname or IP address the server binds to.", "type": "string" },
            "port": { "description": "TCP port the server listens on.", "type": "integer", "minimum": 0, "maximum": 65535 },
            "openapi_host": { "description": "Public base URL advertised in the OpenAPI document.", "type": "string" },
            "access_tokens": {
                "description": "Access tokens that can authenticate requests.",
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "name": { "description": "Label referenced from collection auth lists.", "type": "string" },
                        "token": { "description": "Secret bearer token.", "type": "string" }
                    },
                    "required": ["name", "token"]
                }
            },
            "collections": {
                "description": "Collection definitions: storage, access control and schema.",
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "name": { "description": "Unique collection name used in API routes and as the table name.", "type": "string" },
                        "auth": {
                            "description": "Per-action access control lists.",
                            "type": "object",
                            "properties": {
                                "all": token_list,
                                "create": token_list,
                                "read": token_list,
                                "list": token_list,
                                "replace": token_list,
                                "patch": token_list,
                                "delete": token_list
                            },
                            "required": ["all", "create", "read", "list", "replace", "patch", "delete"]
                        },
                        "schema": { "type": "object" }
                    },
                    "required": ["name", "auth", "schema"]
                }
            }
        },
        "required": ["host", "port", "access_tokens", "collections"]
    })
});

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    pub host: String,
    pub port: u16,
    #[serde(default)]
    pub openapi_host: Option<String>,
    pub access_tokens: Vec<AccessToken>,
    pub collections: Vec<Collection>,
}

impl StoreConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;

        match path.extension().and_then(|e| e.to_str()) {
            Some("yaml") | Some("yml") => Self::from_yaml_str(&content),
            _ => Self::from_json_str(&content),
        }
    }

    pub fn from_json_str(content: &str) -> Result<Self, ConfigError> {
        Self::from_value(serde_json::from_str(content)?)
    }

    pub fn from_yaml_str(content: &str) -> Result<Self, ConfigError> {
        Self::from_value(serde_yaml::from_str(content)?)
    }

    fn from_value(raw: Value) -> Result<Self, ConfigError> {
        check_meta_schema(&raw)?;
        let config: StoreConfig = serde_json::from_value(raw)?;
        config.check()?;
        Ok(config)
    }

    fn check(&self) -> Result<(), ConfigError> {
        let mut names = HashSet::new();
        for collection in &self.collections {
            if !is_safe_collection_name(&collection.name) {
                return Err(ConfigError::UnsafeCollectionName(collection.name.clone()));
            }
            if !names.insert(collection.name.as_str()) {
                return Err(ConfigError::DuplicateCollection(collection.name.clone()));
            }
        }

        let mut token_names = HashSet::new();
        for token in &self.access_tokens {
            if token.token.is_empty() {
                return Err(ConfigError::EmptyTokenSecret(token.name.clone()));
            }
            if !token_names.insert(token.name.as_str()) {
                warn!("Access token '{}' is defined more than once; the last definition wins", token.name);
            }
        }

        if let Some(host) = &self.openapi_host {
            match url::Url::parse(host) {
                Ok(url) if url.has_host() => {}
                _ => return Err(ConfigError::InvalidOpenapiHost(host.clone())),
            }
        }

        Ok(())
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Collection names double as table names, so only plain identifiers are allowed
pub fn is_safe_collection_name(name: &str) -> bool {
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    name.len() <= MAX_COLLECTION_NAME_LEN
        && (first.is_ascii_alphabetic() || first == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Compiled once, shared by every load
static CONFIG_VALIDATOR: Lazy<Result<JSONSchema, String>> =
    Lazy::new(|| JSONSchema::compile(&CONFIG_SCHEMA).map_err(|e| e.to_string()));

fn check_meta_schema(raw: &Value) -> Result<(), ConfigError> {
    let validator = CONFIG_VALIDATOR
        .as_ref()
        .map_err(|e| ConfigError::Invalid(vec![format!("config meta-schema: {}", e)]))?;

    if let Err(errors) = validator.validate(raw) {
        let messages = errors
            .map(|e| {
                let path = e.instance_path.to_string();
                if path.is_empty() {
                    e.to_string()
                } else {
                    format!("{}: {}", path, e)
                }
            })
            .collect();
        return Err(ConfigError::Invalid(messages));
    }
    Ok(())
}
