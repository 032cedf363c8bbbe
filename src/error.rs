//! Error taxonomy for the retrieval pipeline.
//!
//! Every failure that crosses a component boundary is a [`RetrievalError`].
//! The [`kind`](RetrievalError::kind) string is stable and is what the HTTP and
//! MCP surfaces report to callers.

use crate::retrieval::types::Origin;

/// Failure of a retrieval request.
#[derive(Debug, thiserror::Error)]
pub enum RetrievalError {
    /// Missing or malformed request input (empty query, non-positive `top_k`).
    #[error("{0}")]
    Validation(String),

    /// Unrecognized data source, memory scope, or retrieval mode.
    #[error("{0}")]
    Configuration(String),

    /// The embedding service or an index could not serve the request.
    #[error("{origin} backend unavailable: {message}")]
    BackendUnavailable { origin: Origin, message: String },

    /// The request deadline elapsed before the fetch completed.
    #[error("{origin} fetch exceeded the request deadline")]
    Timeout { origin: Origin },

    /// Unexpected failure while fusing or assembling results.
    #[error("internal error: {0}")]
    Internal(String),
}

impl RetrievalError {
    /// Stable, machine-readable error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation_error",
            Self::Configuration(_) => "configuration_error",
            Self::BackendUnavailable { .. } => "backend_unavailable",
            Self::Timeout { .. } => "timeout",
            Self::Internal(_) => "internal_error",
        }
    }

    /// `true` for errors caused by the caller's input.
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::Validation(_) | Self::Configuration(_))
    }

    /// The fetcher origin that produced this error, if any.
    pub fn origin(&self) -> Option<Origin> {
        match self {
            Self::BackendUnavailable { origin, .. } | Self::Timeout { origin } => Some(*origin),
            _ => None,
        }
    }
}
