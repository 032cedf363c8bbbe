//! Collaborator contracts consumed by the retrieval core.
//!
//! Implementations are synchronous and must be `Send + Sync`; the core calls
//! them from `tokio::task::spawn_blocking`. [`crate::store::SqliteStore`]
//! implements all three over a local SQLite database.

use std::collections::HashMap;

use anyhow::Result;

use crate::retrieval::scope::PartitionFilter;
use crate::retrieval::types::MemoryRecord;

/// Similarity search over record embeddings.
pub trait VectorIndex: Send + Sync {
    /// Up to `limit` `(record_id, similarity)` pairs inside `filter`, most similar first.
    fn search(
        &self,
        vector: &[f32],
        filter: &PartitionFilter,
        limit: usize,
    ) -> Result<Vec<(String, f64)>>;
}

/// BM25-style term relevance search.
pub trait LexicalIndex: Send + Sync {
    /// Up to `limit` `(record_id, bm25_score)` pairs inside `filter`, best first.
    fn search(
        &self,
        terms: &[String],
        filter: &PartitionFilter,
        limit: usize,
    ) -> Result<Vec<(String, f64)>>;
}

/// Batched record lookup used for enrichment.
pub trait DocumentStore: Send + Sync {
    /// Records for the ids that exist; unknown ids are simply absent from the map.
    fn fetch_records(&self, record_ids: &[String]) -> Result<HashMap<String, MemoryRecord>>;
}
