//! Rank fusion: single-source pass-through and Reciprocal Rank Fusion.
//!
//! RRF scores each record as `Σ 1 / (k + source_rank)` over the lists that
//! contain it, so vector similarity and BM25 never need a common scale.
//! [`fuse`] also owns the partial-failure policy: in `rrf` mode a single
//! failed fetcher degrades to the surviving list instead of failing the request.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::error::RetrievalError;
use crate::retrieval::types::{CandidateHit, FusedHit, Origin, RetrievalMode};

/// Result of a fetcher that was run; `None` in [`fuse`] means it was not run.
pub type FetchResult = Result<Vec<CandidateHit>, RetrievalError>;

/// Fused ranking plus the origin that failed, if the result is degraded.
#[derive(Debug)]
pub struct Fusion {
    pub hits: Vec<FusedHit>,
    pub failed_origin: Option<Origin>,
}

impl Fusion {
    pub fn degraded(&self) -> bool {
        self.failed_origin.is_some()
    }
}

/// Combine fetcher results according to `mode`.
pub fn fuse(
    mode: RetrievalMode,
    vector: Option<FetchResult>,
    lexical: Option<FetchResult>,
    rrf_k: usize,
) -> Result<Fusion, RetrievalError> {
    let complete = |hits| Fusion { hits, failed_origin: None };

    match mode {
        RetrievalMode::Embedding => Ok(complete(pass_through(required(vector, Origin::Vector)?))),
        RetrievalMode::Bm25 => Ok(complete(pass_through(required(lexical, Origin::Lexical)?))),
        RetrievalMode::Rrf => {
            let vector = required(vector, Origin::Vector);
            let lexical = required(lexical, Origin::Lexical);

            match (vector, lexical) {
                (Ok(v), Ok(l)) => Ok(complete(reciprocal_rank_fusion(
                    &[v.as_slice(), l.as_slice()],
                    rrf_k,
                ))),
                (Ok(v), Err(e)) => Ok(degrade(v, Origin::Lexical, &e)),
                (Err(e), Ok(l)) => Ok(degrade(l, Origin::Vector, &e)),
                (Err(ve), Err(le)) => {
                    tracing::error!(vector = %ve, lexical = %le, "both fetchers failed");
                    Err(pick_failure(ve, le))
                }
            }
        }
    }
}

/// Single-source ranking: order unchanged, `fused_score = raw_score`.
pub fn pass_through(hits: Vec<CandidateHit>) -> Vec<FusedHit> {
    hits.into_iter()
        .map(|hit| FusedHit {
            fused_score: hit.raw_score,
            origins: BTreeSet::from([hit.origin]),
            best_raw_scores: BTreeMap::from([(hit.origin, hit.raw_score)]),
            min_rank: hit.source_rank,
            record_id: hit.record_id,
        })
        .collect()
}

/// Reciprocal Rank Fusion over any number of ranked lists.
///
/// Sorted by descending fused score, then smaller minimum source rank, then
/// record_id. A record repeated within one list counts once, at its best rank.
pub fn reciprocal_rank_fusion(lists: &[&[CandidateHit]], k: usize) -> Vec<FusedHit> {
    let k = k as f64;
    let mut fused: HashMap<String, FusedHit> = HashMap::new();

    for list in lists {
        let mut best_in_list: HashMap<&str, &CandidateHit> = HashMap::new();
        for hit in list.iter() {
            best_in_list
                .entry(hit.record_id.as_str())
                .and_modify(|best| {
                    if hit.source_rank < best.source_rank {
                        *best = hit;
                    }
                })
                .or_insert(hit);
        }

        // Iterate in list order so score accumulation is deterministic.
        for hit in list.iter() {
            let Some(best) = best_in_list.remove(hit.record_id.as_str()) else {
                continue;
            };
            let entry = fused.entry(best.record_id.clone()).or_insert_with(|| FusedHit {
                record_id: best.record_id.clone(),
                fused_score: 0.0,
                origins: BTreeSet::new(),
                best_raw_scores: BTreeMap::new(),
                min_rank: usize::MAX,
            });
            entry.fused_score += 1.0 / (k + best.source_rank as f64);
            entry.origins.insert(best.origin);
            entry
                .best_raw_scores
                .entry(best.origin)
                .and_modify(|s| *s = s.max(best.raw_score))
                .or_insert(best.raw_score);
            entry.min_rank = entry.min_rank.min(best.source_rank);
        }
    }

    let mut merged: Vec<FusedHit> = fused.into_values().collect();
    merged.sort_by(|a, b| {
        b.fused_score
            .total_cmp(&a.fused_score)
            .then_with(|| a.min_rank.cmp(&b.min_rank))
            .then_with(|| a.record_id.cmp(&b.record_id))
    });
    merged
}

fn required(result: Option<FetchResult>, origin: Origin) -> FetchResult {
    result.unwrap_or_else(|| Err(missing(origin)))
}

fn missing(origin: Origin) -> RetrievalError {
    RetrievalError::Internal(format!("{origin} fetcher was required but not run"))
}

fn degrade(hits: Vec<CandidateHit>, failed: Origin, err: &RetrievalError) -> Fusion {
    tracing::warn!(
        failed_origin = %failed,
        error = %err,
        "fetcher failed, degrading to single-source ranking"
    );
    Fusion {
        hits: pass_through(hits),
        failed_origin: Some(failed),
    }
}

/// Backend outages outrank timeouts when both fetchers fail.
fn pick_failure(vector: RetrievalError, lexical: RetrievalError) -> RetrievalError {
    match (&vector, &lexical) {
        (RetrievalError::Timeout { .. }, RetrievalError::BackendUnavailable { .. }) => lexical,
        _ => vector,
    }
}
