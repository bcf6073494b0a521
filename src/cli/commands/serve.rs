//! HTTP API server for the chat widget and the shop page.

use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::orchestrator::Orchestrator;
use crate::server::{self, AppState};
use crate::store::PgStore;
use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::info;

/// Run the HTTP API server.
pub async fn run_serve(host: Option<String>, port: Option<u16>, settings: Settings) -> Result<()> {
    if let Err(e) = preflight::check(Operation::Serve, &settings) {
        Output::error(&format!("{}", e));
        Output::info("Run 'shopwright doctor' for detailed diagnostics.");
        return Err(e.into());
    }

    let host = host.unwrap_or_else(|| settings.server.host.clone());
    let port = port.unwrap_or(settings.server.port);

    let store = Arc::new(
        PgStore::connect(&settings.database)
            .await
            .context("Database health check failed")?,
    );
    let orchestrator = Orchestrator::openai(&settings, store.clone(), store.clone())?;
    let state = Arc::new(AppState::new(
        orchestrator,
        store.clone(),
        settings.server.stream_format,
    ));

    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("Listening on {}", addr);

    Output::header("Shopwright API Server");
    println!();
    Output::success(&format!("Listening on http://{}", addr));
    println!();
    println!("Endpoints:");
    Output::kv("Chat", "POST /api/chat");
    Output::kv("Shop", "GET  /api/shop?sort=default|video");
    Output::kv("Health", "GET  /health");
    Output::kv("Stream format", &settings.server.stream_format.to_string());
    println!();
    Output::info("Press Ctrl+C to stop the server.");

    server::serve(listener, state).await?;
    store.close().await;

    Ok(())
}
