use std::time::Duration;

use sqlx::{postgres::PgPoolOptions, PgPool};
use thiserror::Error;
use tracing::info;

use crate::config::DatabaseConfig;

/// Errors from the storage layer
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Invalid database URL")]
    InvalidDatabaseUrl,

    #[error("Invalid collection name: {0}")]
    InvalidCollectionName(String),

    #[error("Collection has no provisioned table: {0}")]
    UnknownCollection(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Stored document {id} in {collection} is not a JSON object")]
    CorruptDocument { collection: String, id: i64 },

    #[error("Merged document rejected: {}", .0.join("; "))]
    Rejected(Vec<String>),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

/// Connection helpers for the PostgreSQL backend
pub struct DatabaseManager;

impl DatabaseManager {
    /// Open the shared pool used by every request
    pub async fn connect(database_url: &str, settings: &DatabaseConfig) -> Result<PgPool, DatabaseError> {
        let redacted = Self::redact(database_url)?;

        let pool = PgPoolOptions::new()
            .max_connections(settings.max_connections)
            .acquire_timeout(Duration::from_secs(settings.connection_timeout))
            .connect(database_url)
            .await?;

        info!("Connected database pool: {}", redacted);
        Ok(pool)
    }

    /// Pings the pool to ensure connectivity
    pub async fn health_check(pool: &PgPool) -> Result<(), DatabaseError> {
        sqlx::query("SELECT 1").execute(pool).await?;
        Ok(())
    }

    /// Quote SQL identifier to prevent injection
    pub fn quote_identifier(name: &str) -> String {
        format!("\"{}\"", name.replace('"', "\"\""))
    }

    /// Database URL with the password masked, for logging
    fn redact(database_url: &str) -> Result<String, DatabaseError> {
        let mut url = url::Url::parse(database_url).map_err(|_| DatabaseError::InvalidDatabaseUrl)?;
        if url.password().is_some() {
            url.set_password(Some("***")).map_err(|_| DatabaseError::InvalidDatabaseUrl)?;
        }
        Ok(url.into())
    }
}
