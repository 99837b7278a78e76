//! Standalone MCP server binary for PublishKit.
//!
//! Communicates with AI clients over stdio JSON-RPC. Settings are read from
//! `{dataDir}/com.publishkit.tools/settings.json`; credentials arrive with each
//! tool call.

use anyhow::{Context, Result};
use rmcp::{transport::stdio, ServiceExt};
use std::sync::Arc;
use tracing::info;

use publishkit::mcp::PublishKitMcp;
use publishkit::settings::{resolve_data_dir, Settings};
use publishkit::tasks::Toolkit;

#[tokio::main]
async fn main() -> Result<()> {
    // Log to stderr so stdout stays clean for MCP JSON-RPC
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .init();

    let data_dir = resolve_data_dir()?;
    std::fs::create_dir_all(&data_dir)
        .with_context(|| format!("failed to create {}", data_dir.display()))?;

    let settings = Settings::load(&data_dir);
    info!(
        jimeng = %settings.jimeng_base_url,
        poll_interval_ms = settings.poll_interval_ms,
        max_wait_secs = ?settings.max_wait_secs,
        "loaded settings"
    );

    let toolkit = Arc::new(Toolkit::new(&settings));
    let shutdown = toolkit.shutdown_token();

    let server = PublishKitMcp::new(toolkit);

    info!("PublishKit MCP server starting on stdio");

    let service = server
        .serve(stdio())
        .await
        .context("MCP server failed to start")?;

    let quit = service.waiting().await;

    // Stop any image waits still polling after the client went away
    shutdown.cancel();
    quit?;

    Ok(())
}
