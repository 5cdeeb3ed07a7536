#![allow(dead_code)]

use std::process::{Child, Command, Stdio};
use std::sync::OnceLock;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use reqwest::{RequestBuilder, StatusCode};
use serde_json::Value;

static SERVER: OnceLock<TestServer> = OnceLock::new();

pub const ADMIN: &str = "admin-secret";
pub const READER: &str = "reader-secret";
pub const WRITER: &str = "writer-secret";

/// Request bodies above this size are answered with 413
pub const MAX_REQUEST_SIZE: usize = 16 * 1024;

pub struct TestServer {
    pub port: u16,
    pub base_url: String,
    child: Child,
}

impl TestServer {
    fn spawn() -> Result<Self> {
        // Pick an unused port for isolation
        let port = portpicker::pick_unused_port().context("failed to pick free port")?;
        let base_url = format!("http://127.0.0.1:{}", port);

        // No DATABASE_URL, so the server keeps documents in memory
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_quickstore"));
        cmd.arg("--config")
            .arg(concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/config.json"))
            .arg("--port")
            .arg(port.to_string())
            .env_remove("DATABASE_URL")
            .env("API_MAX_REQUEST_SIZE_BYTES", MAX_REQUEST_SIZE.to_string())
            .env("RUST_LOG", "warn")
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit());

        let child = cmd.spawn().context("failed to spawn server binary")?;

        Ok(Self { port, base_url, child })
    }

    async fn wait_ready(&self, timeout: Duration) -> Result<()> {
        let client = reqwest::Client::new();
        let deadline = Instant::now() + timeout;
        loop {
            if Instant::now() > deadline {
                break;
            }
            let url = format!("{}/api/health", self.base_url);
            if let Ok(resp) = client.get(&url).send().await {
                if resp.status() == StatusCode::OK {
                    return Ok(());
                }
            }
            tokio::time::sleep(Duration::from_millis(150)).await;
        }
        anyhow::bail!("server did not become ready on {} within {:?}", self.base_url, timeout)
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

pub async fn ensure_server() -> Result<&'static TestServer> {
    let server = SERVER.get_or_init(|| TestServer::spawn().expect("failed to spawn server binary"));
    server.wait_ready(Duration::from_secs(10)).await?;
    Ok(server)
}

/// Attach `Authorization: Bearer <token>`
pub fn bearer(request: RequestBuilder, token: &str) -> RequestBuilder {
    request.header("Authorization", format!("Bearer {}", token))
}

/// Status plus decoded JSON body (Null when the body is empty)
pub async fn send(request: RequestBuilder) -> Result<(StatusCode, Value)> {
    let res = request.send().await?;
    let status = res.status();
    let text = res.text().await?;
    let body = if text.is_empty() { Value::Null } else { serde_json::from_str(&text)? };
    Ok((status, body))
}

/// Create a note as admin and return its identifier
pub async fn create_note(server: &TestServer, body: Value) -> Result<i64> {
    let client = reqwest::Client::new();
    let (status, body) = send(bearer(client.post(server.url("/api/notes")), ADMIN).json(&body)).await?;
    anyhow::ensure!(status == StatusCode::CREATED, "create failed with {}: {}", status, body);
    body["data"]["_id"].as_i64().context("missing _id in create response")
}
