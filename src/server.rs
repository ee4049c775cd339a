//! MCP server initialization for stdio and streamable HTTP transports.
//!
//! Provides [`serve_stdio`] and [`serve_http`] entry points that open the knowledge
//! store and wire it into the MCP tool handler.

use crate::tools::HindsightTools;
use anyhow::{Context, Result};
use hindsight::config::HindsightConfig;
use hindsight::db::ConnectionManager;
use hindsight::knowledge::SearchConfig;
use rmcp::ServiceExt;
use std::sync::Arc;

/// Shared setup: open (and if needed create) the store.
fn setup_shared_state(config: &HindsightConfig) -> Result<(Arc<ConnectionManager>, SearchConfig)> {
    let db = ConnectionManager::open(&config.storage).with_context(|| {
        format!(
            "failed to open knowledge store at {}",
            config.storage.resolved_db_path().display()
        )
    })?;
    Ok((Arc::new(db), SearchConfig::from(&config.search)))
}

/// Start the configured transport.
pub async fn serve(config: HindsightConfig) -> Result<()> {
    match config.server.transport.as_str() {
        "stdio" => serve_stdio(config).await,
        "http" | "sse" => serve_http(config).await,
        other => anyhow::bail!("unknown transport {other:?} (expected stdio or http)"),
    }
}

/// Start the MCP server over stdio transport.
pub async fn serve_stdio(config: HindsightConfig) -> Result<()> {
    tracing::info!("starting Hindsight MCP server on stdio");

    let (db, search) = setup_shared_state(&config)?;

    let tools = HindsightTools::new(db, search);
    let transport = rmcp::transport::stdio();

    let server = tools.serve(transport).await?;
    tracing::info!("MCP server running, waiting for client");

    server.waiting().await?;
    tracing::info!("MCP server shut down");

    Ok(())
}

/// Start the MCP server over Streamable HTTP, mounted at `/mcp`.
pub async fn serve_http(config: HindsightConfig) -> Result<()> {
    let bind_addr = format!("{}:{}", config.server.host, config.server.port);

    tracing::info!(addr = %bind_addr, "starting Hindsight MCP server on HTTP");

    let (db, search) = setup_shared_state(&config)?;

    let service = rmcp::transport::streamable_http_server::StreamableHttpService::new(
        move || Ok(HindsightTools::new(Arc::clone(&db), search)),
        rmcp::transport::streamable_http_server::session::local::LocalSessionManager::default()
            .into(),
        Default::default(),
    );

    let router = axum::Router::new().nest_service("/mcp", service);

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {bind_addr}"))?;
    tracing::info!(addr = %bind_addr, "MCP server listening at http://{bind_addr}/mcp");

    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "failed to listen for ctrl-c");
            }
            tracing::info!("shutting down HTTP server");
        })
        .await?;

    Ok(())
}
