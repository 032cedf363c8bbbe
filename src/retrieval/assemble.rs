//! Result assembly: dedup → truncate → batched enrichment → response metadata.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::RetrievalError;
use crate::retrieval::backend::DocumentStore;
use crate::retrieval::types::{FusedHit, MemoryRecord, Origin, RetrievalMode};

/// One returned memory.
#[derive(Debug, Clone, Serialize)]
pub struct RetrievedMemory {
    pub record_id: String,
    pub score: f64,
    pub display_text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    pub memory_sub_type: String,
    pub timestamp: DateTime<Utc>,
    pub user_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_id: Option<String>,
}

/// Wall-clock time spent per pipeline stage.
#[derive(Debug, Clone, Default, Serialize)]
pub struct StageLatency {
    pub fetch: f64,
    pub fusion: f64,
    pub enrich: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct RetrievalMetadata {
    pub retrieval_mode: RetrievalMode,
    /// Candidates returned by the vector fetcher (0 if it did not run or failed).
    pub embedding_candidates: usize,
    /// Candidates returned by the lexical fetcher (0 if it did not run or failed).
    pub bm25_candidates: usize,
    pub final_count: usize,
    pub degraded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed_origin: Option<Origin>,
    pub stage_latency_ms: StageLatency,
    pub total_latency_ms: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct RetrievalResult {
    pub memories: Vec<RetrievedMemory>,
    pub count: usize,
    pub metadata: RetrievalMetadata,
}

/// What the fetch and fusion stages report to the assembler.
#[derive(Debug, Clone)]
pub struct PipelineTrace {
    pub mode: RetrievalMode,
    pub embedding_candidates: usize,
    pub bm25_candidates: usize,
    pub failed_origin: Option<Origin>,
    pub started: Instant,
    pub fetch_ms: f64,
    pub fusion_ms: f64,
}

#[derive(Clone)]
pub struct Assembler {
    documents: Arc<dyn DocumentStore>,
}

impl Assembler {
    pub fn new(documents: Arc<dyn DocumentStore>) -> Self {
        Self { documents }
    }

    /// Build the final result from a fused ranking.
    ///
    /// Ids the document store cannot resolve are dropped and logged; a failed
    /// store call fails the request with an internal error.
    pub async fn assemble(
        &self,
        fused: Vec<FusedHit>,
        top_k: usize,
        trace: PipelineTrace,
    ) -> Result<RetrievalResult, RetrievalError> {
        let enrich_started = Instant::now();
        let survivors = dedup_and_truncate(fused, top_k);

        let ids: Vec<String> = survivors.iter().map(|h| h.record_id.clone()).collect();
        let mut records: HashMap<String, MemoryRecord> = if ids.is_empty() {
            HashMap::new()
        } else {
            let documents = Arc::clone(&self.documents);
            tokio::task::spawn_blocking(move || documents.fetch_records(&ids))
                .await
                .map_err(|e| RetrievalError::Internal(format!("enrichment task failed: {e}")))?
                .map_err(|e| RetrievalError::Internal(format!("record lookup failed: {e:#}")))?
        };

        let mut memories = Vec::with_capacity(survivors.len());
        for hit in survivors {
            let Some(record) = records.remove(&hit.record_id) else {
                tracing::warn!(
                    record_id = %hit.record_id,
                    "record missing from document store, dropped"
                );
                continue;
            };
            memories.push(RetrievedMemory {
                record_id: hit.record_id,
                score: hit.fused_score,
                display_text: record.display_text,
                subject: record.subject,
                memory_sub_type: record.memory_sub_type,
                timestamp: record.timestamp,
                user_id: record.user_id,
                group_id: record.group_id,
            });
        }

        let count = memories.len();
        let metadata = RetrievalMetadata {
            retrieval_mode: trace.mode,
            embedding_candidates: trace.embedding_candidates,
            bm25_candidates: trace.bm25_candidates,
            final_count: count,
            degraded: trace.failed_origin.is_some(),
            failed_origin: trace.failed_origin,
            stage_latency_ms: StageLatency {
                fetch: trace.fetch_ms,
                fusion: trace.fusion_ms,
                enrich: elapsed_ms(enrich_started),
            },
            total_latency_ms: elapsed_ms(trace.started),
        };

        Ok(RetrievalResult {
            memories,
            count,
            metadata,
        })
    }
}

/// Keep the first occurrence of each record_id, then cut to `top_k`.
pub fn dedup_and_truncate(fused: Vec<FusedHit>, top_k: usize) -> Vec<FusedHit> {
    let mut seen = HashSet::new();
    fused
        .into_iter()
        .filter(|hit| seen.insert(hit.record_id.clone()))
        .take(top_k)
        .collect()
}

pub(crate) fn elapsed_ms(since: Instant) -> f64 {
    since.elapsed().as_secs_f64() * 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retrieval::fusion::pass_through;
    use crate::retrieval::types::{CandidateHit, DataSource, Partition};

    struct MapStore(HashMap<String, MemoryRecord>);

    impl DocumentStore for MapStore {
        fn fetch_records(&self, ids: &[String]) -> anyhow::Result<HashMap<String, MemoryRecord>> {
            Ok(ids
                .iter()
                .filter_map(|id| self.0.get(id).map(|r| (id.clone(), r.clone())))
                .collect())
        }
    }

    struct BrokenStore;

    impl DocumentStore for BrokenStore {
        fn fetch_records(&self, _: &[String]) -> anyhow::Result<HashMap<String, MemoryRecord>> {
            anyhow::bail!("connection reset")
        }
    }

    fn record(id: &str) -> MemoryRecord {
        MemoryRecord {
            record_id: id.into(),
            partition: Partition::Group,
            data_source: DataSource::Episode,
            display_text: format!("text of {id}"),
            subject: Some("trip".into()),
            memory_sub_type: "episode".into(),
            timestamp: Utc::now(),
            user_id: Some("user_001".into()),
            group_id: Some("group_1".into()),
        }
    }

    fn hits(ids: &[&str]) -> Vec<FusedHit> {
        pass_through(
            ids.iter()
                .enumerate()
                .map(|(i, id)| CandidateHit {
                    record_id: id.to_string(),
                    source_rank: i + 1,
                    raw_score: 1.0 - i as f64 * 0.1,
                    origin: Origin::Vector,
                })
                .collect(),
        )
    }

    fn trace() -> PipelineTrace {
        PipelineTrace {
            mode: RetrievalMode::Embedding,
            embedding_candidates: 4,
            bm25_candidates: 0,
            failed_origin: None,
            started: Instant::now(),
            fetch_ms: 1.0,
            fusion_ms: 0.1,
        }
    }

    fn store(ids: &[&str]) -> Arc<dyn DocumentStore> {
        Arc::new(MapStore(ids.iter().map(|id| (id.to_string(), record(id))).collect()))
    }

    #[test]
    fn dedup_keeps_first_occurrence() {
        let kept = dedup_and_truncate(hits(&["a", "b", "a", "c"]), 10);
        let ids: Vec<&str> = kept.iter().map(|h| h.record_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
        assert_eq!(kept[0].fused_score, 1.0);
    }

    #[tokio::test]
    async fn truncates_and_enriches() {
        let assembler = Assembler::new(store(&["a", "b", "c", "d"]));
        let result = assembler
            .assemble(hits(&["a", "b", "c", "d"]), 2, trace())
            .await
            .unwrap();
        assert_eq!(result.count, 2);
        assert_eq!(result.memories[0].record_id, "a");
        assert_eq!(result.memories[0].display_text, "text of a");
        assert_eq!(result.memories[0].subject.as_deref(), Some("trip"));
        assert_eq!(result.metadata.final_count, 2);
        assert_eq!(result.metadata.embedding_candidates, 4);
        assert!(!result.metadata.degraded);
    }

    #[tokio::test]
    async fn unresolvable_records_are_dropped() {
        let assembler = Assembler::new(store(&["a", "c"]));
        let result = assembler
            .assemble(hits(&["a", "ghost", "c"]), 10, trace())
            .await
            .unwrap();
        let ids: Vec<&str> = result.memories.iter().map(|m| m.record_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "c"]);
    }

    #[tokio::test]
    async fn store_failure_is_internal_error() {
        let assembler = Assembler::new(Arc::new(BrokenStore));
        let err = assembler.assemble(hits(&["a"]), 10, trace()).await.unwrap_err();
        assert_eq!(err.kind(), "internal_error");
    }

    #[test]
    fn metadata_serializes_degraded_origin() {
        let metadata = RetrievalMetadata {
            retrieval_mode: RetrievalMode::Rrf,
            embedding_candidates: 3,
            bm25_candidates: 0,
            final_count: 3,
            degraded: true,
            failed_origin: Some(Origin::Lexical),
            stage_latency_ms: StageLatency::default(),
            total_latency_ms: 1.5,
        };
        let json = serde_json::to_value(&metadata).unwrap();
        assert_eq!(json["retrieval_mode"], "rrf");
        assert_eq!(json["degraded"], true);
        assert_eq!(json["failed_origin"], "lexical");
    }
}
