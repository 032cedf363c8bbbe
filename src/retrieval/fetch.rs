//! Shared fetch plumbing: deadline, single retry, and ranking of raw index output.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

use crate::error::RetrievalError;
use crate::retrieval::types::{CandidateHit, Origin};

/// Time budget shared by every fetcher of one request.
#[derive(Debug, Clone, Copy)]
pub struct FetchBudget {
    pub deadline: Instant,
    pub retry_backoff: Duration,
}

impl FetchBudget {
    pub fn new(timeout: Duration, retry_backoff: Duration) -> Self {
        Self {
            deadline: Instant::now() + timeout,
            retry_backoff,
        }
    }
}

/// Run a blocking collaborator call on the blocking pool under the request
/// deadline, retrying once after a short backoff if the first attempt fails.
pub(crate) async fn call_with_retry<T, F>(
    origin: Origin,
    budget: FetchBudget,
    call: F,
) -> Result<T, RetrievalError>
where
    T: Send + 'static,
    F: Fn() -> anyhow::Result<T> + Send + Sync + 'static,
{
    let call = Arc::new(call);
    let attempt = move || {
        let call = Arc::clone(&call);
        async move {
            tokio::task::spawn_blocking(move || (*call)())
                .await
                .map_err(|e| RetrievalError::Internal(format!("{origin} fetch task failed: {e}")))
        }
    };

    let work = async move {
        let first_err = match attempt().await? {
            Ok(value) => return Ok(value),
            Err(e) => e,
        };

        if Instant::now() + budget.retry_backoff >= budget.deadline {
            return Err(backend_unavailable(origin, &first_err));
        }
        tracing::debug!(origin = %origin, error = %first_err, "fetch failed, retrying once");
        tokio::time::sleep(budget.retry_backoff).await;

        attempt()
            .await?
            .map_err(|e| backend_unavailable(origin, &e))
    };

    tokio::time::timeout_at(budget.deadline, work)
        .await
        .map_err(|_| RetrievalError::Timeout { origin })?
}

fn backend_unavailable(origin: Origin, err: &anyhow::Error) -> RetrievalError {
    RetrievalError::BackendUnavailable {
        origin,
        message: format!("{err:#}"),
    }
}

/// Turn raw `(record_id, score)` pairs into ranked candidates.
///
/// Orders by descending score (record_id breaks ties), keeps at most `limit`
/// entries and assigns 1-based ranks.
pub(crate) fn rank(origin: Origin, mut raw: Vec<(String, f64)>, limit: usize) -> Vec<CandidateHit> {
    raw.retain(|(_, score)| !score.is_nan());
    raw.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    raw.truncate(limit);
    raw.into_iter()
        .enumerate()
        .map(|(i, (record_id, raw_score))| CandidateHit {
            record_id,
            source_rank: i + 1,
            raw_score,
            origin,
        })
        .collect()
}
