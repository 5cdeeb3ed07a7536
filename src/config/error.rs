use thiserror::Error;

/// Startup-time configuration failures. All of these are fatal.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid JSON in config: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid YAML in config: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Config is invalid:\n- {}", .0.join("\n- "))]
    Invalid(Vec<String>),

    #[error("Duplicate collection name: {0}")]
    DuplicateCollection(String),

    #[error("Unsafe collection name '{0}': expected [A-Za-z_][A-Za-z0-9_]*, at most 63 characters")]
    UnsafeCollectionName(String),

    #[error("Access token '{0}' has an empty secret")]
    EmptyTokenSecret(String),

    #[error("Invalid openapi_host '{0}': expected an absolute URL")]
    InvalidOpenapiHost(String),

    #[error("Schema for collection '{collection}' does not compile: {message}")]
    InvalidSchema { collection: String, message: String },
}
