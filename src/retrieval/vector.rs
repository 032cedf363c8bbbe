//! Vector candidate fetcher: embed the query, then similarity search.

use std::sync::Arc;

use crate::embedding::EmbeddingProvider;
use crate::error::RetrievalError;
use crate::retrieval::backend::VectorIndex;
use crate::retrieval::fetch::{call_with_retry, rank, FetchBudget};
use crate::retrieval::scope::PartitionFilter;
use crate::retrieval::types::{CandidateHit, Origin};

#[derive(Clone)]
pub struct VectorFetcher {
    embedder: Arc<dyn EmbeddingProvider>,
    index: Arc<dyn VectorIndex>,
}

impl VectorFetcher {
    pub fn new(embedder: Arc<dyn EmbeddingProvider>, index: Arc<dyn VectorIndex>) -> Self {
        Self { embedder, index }
    }

    /// Ranked vector candidates for `query` (raw_score = cosine similarity).
    pub async fn fetch(
        &self,
        query: String,
        filter: Arc<PartitionFilter>,
        pool: usize,
        budget: FetchBudget,
    ) -> Result<Vec<CandidateHit>, RetrievalError> {
        let embedder = Arc::clone(&self.embedder);
        let index = Arc::clone(&self.index);

        // Separate blocking calls: an abort while embedding stops the search from being issued.
        let vector = call_with_retry(Origin::Vector, budget, move || embedder.embed(&query)).await?;
        let raw = call_with_retry(Origin::Vector, budget, move || {
            index.search(&vector, &filter, pool)
        })
        .await?;

        let hits = rank(Origin::Vector, raw, pool);
        tracing::debug!(candidates = hits.len(), "vector fetch complete");
        Ok(hits)
    }
}
