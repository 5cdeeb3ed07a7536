//! Compiled JSON-Schema validators, one per collection

use std::collections::HashMap;
use std::fmt;

use jsonschema::JSONSchema;
use serde_json::Value;

use crate::config::ConfigError;
use crate::types::Collection;

/// Read-only collection -> validator map. Only the compiled schema is cached;
/// every document is revalidated on every call.
#[derive(Default)]
pub struct SchemaIndex {
    validators: HashMap<String, JSONSchema>,
}

impl SchemaIndex {
    /// Compiles every collection schema. The draft is taken from `$schema`,
    /// falling back to draft 7.
    pub fn build(collections: &[Collection]) -> Result<Self, ConfigError> {
        let mut validators = HashMap::with_capacity(collections.len());
        for collection in collections {
            let schema = Value::Object(collection.schema.clone());
            let compiled = JSONSchema::compile(&schema).map_err(|e| ConfigError::InvalidSchema {
                collection: collection.name.clone(),
                message: e.to_string(),
            })?;
            validators.insert(collection.name.clone(), compiled);
        }
        Ok(Self { validators })
    }

    pub fn contains(&self, collection: &str) -> bool {
        self.validators.contains_key(collection)
    }

    /// False for unknown collections and for any schema violation
    pub fn validate(&self, collection: &str, document: &Value) -> bool {
        match self.validators.get(collection) {
            Some(validator) => validator.is_valid(document),
            None => false,
        }
    }

    /// Human readable violations, empty when the document is valid
    pub fn violations(&self, collection: &str, document: &Value) -> Vec<String> {
        let Some(validator) = self.validators.get(collection) else {
            return vec![format!("unknown collection '{}'", collection)];
        };

        match validator.validate(document) {
            Ok(()) => Vec::new(),
            Err(errors) => errors
                .map(|error| {
                    let path = error.instance_path.to_string();
                    if path.is_empty() {
                        error.to_string()
                    } else {
                        format!("{}: {}", path, error)
                    }
                })
                .collect(),
        }
    }

    pub fn collection_names(&self) -> impl Iterator<Item = &str> {
        self.validators.keys().map(String::as_str)
    }
}

impl fmt::Debug for SchemaIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchemaIndex")
            .field("collections", &self.validators.keys().collect::<Vec<_>>())
            .finish()
    }
}
