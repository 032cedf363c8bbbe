//! Process wiring for the HTTP and MCP servers.
//!
//! [`build_retriever`] opens the database, loads the embedding provider and
//! assembles a [`Retriever`]; [`serve_http`] and [`serve_stdio`] run it.

use std::sync::Arc;

use anyhow::{Context, Result};
use rmcp::ServiceExt;

use crate::config::RecollectConfig;
use crate::db;
use crate::embedding::{self, EmbeddingProvider};
use crate::http::{self, AppState};
use crate::retrieval::Retriever;
use crate::store::SqliteStore;
use crate::tools::RecollectTools;

/// Open the configured database and build a retriever over it.
pub fn build_retriever(config: &RecollectConfig) -> Result<Retriever> {
    let db_path = config.resolved_db_path();
    let conn = db::open_database(&db_path)?;

    if let Ok(Some(stored)) = db::schema::embedding_model(&conn) {
        if stored != config.embedding.model {
            tracing::warn!(
                stored = %stored,
                configured = %config.embedding.model,
                "embedding model differs from the one used at import; re-import records"
            );
        }
    }

    let embedder: Arc<dyn EmbeddingProvider> =
        Arc::from(embedding::create_provider(&config.embedding)?);
    tracing::info!(model = embedder.model_name(), "embedding provider ready");

    let store = Arc::new(SqliteStore::new(conn));
    Ok(Retriever::new(
        embedder,
        store.clone(),
        store.clone(),
        store,
        config.retrieval.clone(),
    ))
}

/// Serve `POST /v1/memories/retrieve` until ctrl-c.
pub async fn serve_http(config: RecollectConfig) -> Result<()> {
    let bind_addr = config.bind_addr();
    let retriever = Arc::new(build_retriever(&config)?);
    let router = http::router(AppState { retriever });

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {bind_addr}"))?;
    tracing::info!(addr = %bind_addr, "recollect listening at http://{bind_addr}/v1/memories/retrieve");

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

/// Serve the `retrieve_memories` MCP tool over stdio.
pub async fn serve_stdio(config: RecollectConfig) -> Result<()> {
    tracing::info!("starting recollect MCP server on stdio");
    let retriever = Arc::new(build_retriever(&config)?);

    let server = RecollectTools::new(retriever)
        .serve(rmcp::transport::stdio())
        .await?;
    tracing::info!("MCP server running, waiting for client");

    server.waiting().await?;
    tracing::info!("MCP server shut down");
    Ok(())
}
