//! The retrieval core.
//!
//! A request flows normalize → scope → concurrent fetch → fuse → assemble.
//! [`Retriever`] wires the stages together over injected collaborators and is
//! shared by the HTTP, MCP and CLI surfaces.

pub mod assemble;
pub mod backend;
pub mod fetch;
pub mod fusion;
pub mod lexical;
pub mod normalize;
pub mod scope;
pub mod types;
pub mod vector;

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tokio::task::JoinHandle;

use crate::config::RetrievalConfig;
use crate::embedding::EmbeddingProvider;
use crate::error::RetrievalError;

use assemble::{elapsed_ms, Assembler, PipelineTrace, RetrievalResult};
use backend::{DocumentStore, LexicalIndex, VectorIndex};
use fetch::FetchBudget;
use fusion::FetchResult;
use lexical::LexicalFetcher;
use normalize::{normalize, RetrieveRequest};
use vector::VectorFetcher;

/// Hybrid retriever over a vector index, a lexical index and a document store.
#[derive(Clone)]
pub struct Retriever {
    vector: VectorFetcher,
    lexical: LexicalFetcher,
    assembler: Assembler,
    config: RetrievalConfig,
}

impl Retriever {
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        vector_index: Arc<dyn VectorIndex>,
        lexical_index: Arc<dyn LexicalIndex>,
        documents: Arc<dyn DocumentStore>,
        config: RetrievalConfig,
    ) -> Self {
        Self {
            vector: VectorFetcher::new(embedder, vector_index),
            lexical: LexicalFetcher::new(lexical_index),
            assembler: Assembler::new(documents),
            config,
        }
    }

    pub fn config(&self) -> &RetrievalConfig {
        &self.config
    }

    /// Answer one retrieval request.
    ///
    /// Invalid input is rejected before any collaborator is called. In `rrf`
    /// mode both fetchers run concurrently; dropping the returned future
    /// aborts whichever of them is still running.
    pub async fn retrieve(
        &self,
        request: &RetrieveRequest,
    ) -> Result<RetrievalResult, RetrievalError> {
        let started = Instant::now();
        let query = normalize(request, &self.config, Utc::now())?;
        let budget = FetchBudget::new(self.config.timeout(), self.config.retry_backoff());
        let filter = Arc::new(query.filter);

        let mut tasks = FetchTasks::default();
        if query.mode.uses_vector() {
            let fetcher = self.vector.clone();
            let (text, filter) = (query.text.clone(), Arc::clone(&filter));
            let pool = query.pool;
            tasks.vector = Some(tokio::spawn(async move {
                fetcher.fetch(text, filter, pool, budget).await
            }));
        }
        if query.mode.uses_lexical() {
            let fetcher = self.lexical.clone();
            let (text, filter) = (query.text.clone(), Arc::clone(&filter));
            let pool = query.pool;
            tasks.lexical = Some(tokio::spawn(async move {
                fetcher.fetch(text, filter, pool, budget).await
            }));
        }

        let (vector, lexical) = tasks.join().await?;
        let fetch_ms = elapsed_ms(started);

        let embedding_candidates = candidate_count(&vector);
        let bm25_candidates = candidate_count(&lexical);

        let fusion_started = Instant::now();
        let fusion = fusion::fuse(query.mode, vector, lexical, self.config.rrf_k)?;
        let fusion_ms = elapsed_ms(fusion_started);

        let trace = PipelineTrace {
            mode: query.mode,
            embedding_candidates,
            bm25_candidates,
            failed_origin: fusion.failed_origin,
            started,
            fetch_ms,
            fusion_ms,
        };
        let result = self.assembler.assemble(fusion.hits, query.top_k, trace).await?;

        tracing::info!(
            mode = %query.mode,
            data_source = %filter.data_source,
            embedding_candidates,
            bm25_candidates,
            returned = result.count,
            degraded = result.metadata.degraded,
            latency_ms = result.metadata.total_latency_ms,
            "retrieval complete"
        );
        Ok(result)
    }
}

fn candidate_count(result: &Option<FetchResult>) -> usize {
    match result {
        Some(Ok(hits)) => hits.len(),
        _ => 0,
    }
}

/// In-flight fetcher tasks; aborted if dropped before [`join`](Self::join) finishes.
#[derive(Default)]
struct FetchTasks {
    vector: Option<JoinHandle<FetchResult>>,
    lexical: Option<JoinHandle<FetchResult>>,
}

impl FetchTasks {
    /// Wait for every spawned fetcher.
    async fn join(&mut self) -> Result<(Option<FetchResult>, Option<FetchResult>), RetrievalError> {
        let vector = match self.vector.as_mut() {
            Some(handle) => Some(handle.await.map_err(join_failed)?),
            None => None,
        };
        let lexical = match self.lexical.as_mut() {
            Some(handle) => Some(handle.await.map_err(join_failed)?),
            None => None,
        };
        self.vector = None;
        self.lexical = None;
        Ok((vector, lexical))
    }
}

impl Drop for FetchTasks {
    fn drop(&mut self) {
        for handle in [self.vector.take(), self.lexical.take()].into_iter().flatten() {
            handle.abort();
        }
    }
}

fn join_failed(err: tokio::task::JoinError) -> RetrievalError {
    RetrievalError::Internal(format!("fetch task failed: {err}"))
}
