//! MCP tool surface: a single `retrieve_memories` tool over the [`Retriever`].

use std::sync::Arc;

use rmcp::handler::server::tool::ToolRouter;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::{tool, tool_handler, tool_router, ServerHandler};

use crate::error::RetrievalError;
use crate::retrieval::normalize::RetrieveRequest;
use crate::retrieval::Retriever;

#[derive(Clone)]
pub struct RecollectTools {
    tool_router: ToolRouter<Self>,
    retriever: Arc<Retriever>,
}

#[tool_router]
impl RecollectTools {
    pub fn new(retriever: Arc<Retriever>) -> Self {
        Self {
            tool_router: Self::tool_router(),
            retriever,
        }
    }

    #[tool(description = "Retrieve stored memories relevant to a query. Modes: embedding (semantic similarity), bm25 (keywords), rrf (both, fused; default). Sources: episode, event_log, semantic_fact. Scope: all, personal, group.")]
    async fn retrieve_memories(
        &self,
        Parameters(request): Parameters<RetrieveRequest>,
    ) -> Result<String, String> {
        tracing::info!(
            query_len = request.query.as_deref().map_or(0, str::len),
            "retrieve_memories called"
        );

        let result = self
            .retriever
            .retrieve(&request)
            .await
            .map_err(|e| error_json(&e))?;

        serde_json::to_string(&result).map_err(|e| {
            error_json(&RetrievalError::Internal(format!("failed to encode result: {e}")))
        })
    }
}

/// Tool errors carry the same envelope as the HTTP surface.
fn error_json(err: &RetrievalError) -> String {
    serde_json::json!({
        "status": "error",
        "code": err.kind(),
        "message": err.to_string(),
    })
    .to_string()
}

#[tool_handler]
impl ServerHandler for RecollectTools {
    fn get_info(&self) -> rmcp::model::ServerInfo {
        rmcp::model::ServerInfo {
            instructions: Some(
                "recollect serves conversational memories. Call retrieve_memories with a \
                 natural language query to get the most relevant stored memories."
                    .into(),
            ),
            capabilities: rmcp::model::ServerCapabilities::builder()
                .enable_tools()
                .build(),
            ..Default::default()
        }
    }
}
