use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use quickstore::api::build_openapi;
use quickstore::app::{self, AppState};
use quickstore::config::{AppConfig, StoreConfig};
use quickstore::database::{DatabaseManager, DocumentStore, MemoryDocumentStore, PgDocumentStore};
use quickstore::services::DocumentService;

#[derive(Parser)]
#[command(name = "quickstore")]
#[command(about = "Configuration-driven JSON document store")]
#[command(version)]
struct Cli {
    #[arg(long, default_value = "config.json", help = "Store configuration file (JSON, or YAML by extension)")]
    config: PathBuf,

    #[arg(long, env = "DATABASE_URL", help = "PostgreSQL connection string; omit to keep documents in memory")]
    database_url: Option<String>,

    #[arg(long, help = "Override the configured listen host")]
    host: Option<String>,

    #[arg(long, help = "Override the configured listen port")]
    port: Option<u16>,

    #[arg(long, help = "Print the generated OpenAPI document and exit")]
    print_openapi: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so cargo run picks up DATABASE_URL
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    let mut store_config = StoreConfig::load(&cli.config)
        .with_context(|| format!("failed to load configuration from {}", cli.config.display()))?;
    if let Some(host) = cli.host {
        store_config.host = host;
    }
    if let Some(port) = cli.port {
        store_config.port = port;
    }

    let openapi = build_openapi(&store_config);
    if cli.print_openapi {
        println!("{}", serde_json::to_string_pretty(&openapi)?);
        return Ok(());
    }

    let config = AppConfig::from_env();
    tracing::info!("Starting QuickStore in {:?} mode", config.environment);

    let store: Arc<dyn DocumentStore> = match cli.database_url.as_deref().filter(|url| !url.is_empty()) {
        Some(url) => {
            let pool = DatabaseManager::connect(url, &config.database).await?;
            Arc::new(PgDocumentStore::new(pool))
        }
        None => {
            tracing::warn!("DATABASE_URL not set; documents are kept in memory and lost on exit");
            Arc::new(MemoryDocumentStore::new())
        }
    };

    let documents = DocumentService::from_config(&store_config, store)?;
    documents
        .provision()
        .await
        .context("failed to provision collection tables")?;
    tracing::info!(
        "Serving {} collection(s) with {} access token(s)",
        store_config.collections.len(),
        store_config.access_tokens.len()
    );

    let state = AppState::new(documents, openapi, config.api.clone());
    let router = app::router(state, &config);

    let bind_addr = store_config.bind_address();
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;

    tracing::info!("QuickStore listening on http://{}", bind_addr);
    axum::serve(listener, router).await?;

    Ok(())
}
