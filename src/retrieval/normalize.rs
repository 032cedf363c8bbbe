//! Request normalization: defaults, validation, and scope resolution.
//!
//! Everything here happens before a fetcher is touched, so a rejected request
//! never reaches the embedding service or an index.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::config::RetrievalConfig;
use crate::error::RetrievalError;
use crate::retrieval::scope::{self, PartitionFilter};
use crate::retrieval::types::{DataSource, MemoryScope, RetrievalMode};

/// Raw retrieval request, as received over HTTP or MCP.
///
/// Enumerations arrive as plain strings so an unknown value is reported as a
/// configuration error instead of a deserialization failure.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct RetrieveRequest {
    #[schemars(description = "Natural language query. Required.")]
    pub query: Option<String>,

    #[schemars(description = "Restrict personal memories to this user")]
    pub user_id: Option<String>,

    #[schemars(description = "Restrict group memories to this group")]
    pub group_id: Option<String>,

    #[schemars(description = "Only memories from the last N days. Defaults to 365.")]
    pub time_range_days: Option<i64>,

    #[schemars(description = "Maximum number of memories to return. Defaults to 20.")]
    pub top_k: Option<i64>,

    #[schemars(description = "Retrieval mode: 'embedding', 'bm25' or 'rrf' (default)")]
    pub retrieval_mode: Option<String>,

    #[schemars(
        description = "Memory collection: 'episode' (default), 'event_log' or 'semantic_fact'"
    )]
    pub data_source: Option<String>,

    #[schemars(description = "Partitions to search: 'all' (default), 'personal' or 'group'")]
    pub memory_scope: Option<String>,
}

/// A validated request with every default applied.
#[derive(Debug, Clone)]
pub struct NormalizedQuery {
    pub text: String,
    pub top_k: usize,
    /// Candidate pool each fetcher asks its index for.
    pub pool: usize,
    pub mode: RetrievalMode,
    pub filter: PartitionFilter,
}

/// Validate `request` and fill in defaults from `config`.
pub fn normalize(
    request: &RetrieveRequest,
    config: &RetrievalConfig,
    now: DateTime<Utc>,
) -> Result<NormalizedQuery, RetrievalError> {
    let text = request
        .query
        .as_deref()
        .map(str::trim)
        .unwrap_or_default();
    if text.is_empty() {
        return Err(RetrievalError::Validation(
            "missing required parameter: query".into(),
        ));
    }

    let top_k = match request.top_k {
        None => config.default_top_k,
        Some(k) if k > 0 => usize::try_from(k).unwrap_or(usize::MAX),
        Some(k) => {
            return Err(RetrievalError::Validation(format!(
                "top_k must be a positive integer, got {k}"
            )))
        }
    };

    let time_range_days = match request.time_range_days {
        None => config.default_time_range_days,
        Some(d) if d > 0 => u32::try_from(d).unwrap_or(u32::MAX),
        Some(d) => {
            return Err(RetrievalError::Validation(format!(
                "time_range_days must be a positive integer, got {d}"
            )))
        }
    };

    let mode = match request.retrieval_mode.as_deref() {
        None => config.default_mode,
        Some(m) => m.parse().map_err(RetrievalError::Configuration)?,
    };

    let filter = scope::resolve(
        request
            .data_source
            .as_deref()
            .unwrap_or(DataSource::Episode.as_str()),
        request
            .memory_scope
            .as_deref()
            .unwrap_or(MemoryScope::All.as_str()),
        request.user_id.as_deref(),
        request.group_id.as_deref(),
        time_range_days,
        now,
    )?;

    Ok(NormalizedQuery {
        text: text.to_string(),
        top_k,
        pool: config.pool_size(top_k),
        mode,
        filter,
    })
}
