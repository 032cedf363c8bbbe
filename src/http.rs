//! HTTP JSON surface over the [`Retriever`].

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;

use crate::error::RetrievalError;
use crate::retrieval::assemble::RetrievalResult;
use crate::retrieval::normalize::RetrieveRequest;
use crate::retrieval::Retriever;

#[derive(Clone)]
pub struct AppState {
    pub retriever: Arc<Retriever>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/v1/memories/retrieve", post(retrieve))
        .with_state(state)
}

async fn health() -> StatusCode {
    StatusCode::OK
}

#[derive(Debug, Serialize)]
pub struct RetrieveResponse {
    pub status: &'static str,
    pub message: String,
    pub result: RetrievalResult,
}

async fn retrieve(
    State(state): State<AppState>,
    payload: Result<Json<RetrieveRequest>, JsonRejection>,
) -> Result<Json<RetrieveResponse>, ApiError> {
    let Json(request) = payload.map_err(|rejection| {
        ApiError::from(RetrievalError::Validation(rejection.body_text()))
    })?;

    tracing::info!(
        query_len = request.query.as_deref().map_or(0, str::len),
        mode = request.retrieval_mode.as_deref().unwrap_or("default"),
        "retrieve called"
    );

    let result = state.retriever.retrieve(&request).await?;
    Ok(Json(RetrieveResponse {
        status: "ok",
        message: format!("found {} memories", result.count),
        result,
    }))
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    status: &'static str,
    code: &'static str,
    message: String,
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl From<RetrievalError> for ApiError {
    fn from(err: RetrievalError) -> Self {
        let status = match &err {
            RetrievalError::Validation(_) | RetrievalError::Configuration(_) => {
                StatusCode::BAD_REQUEST
            }
            RetrievalError::BackendUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            RetrievalError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            RetrievalError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            tracing::error!(code = err.kind(), error = %err, "retrieval failed");
        }
        Self {
            status,
            code: err.kind(),
            message: err.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            status: "error",
            code: self.code,
            message: self.message,
        };
        (self.status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retrieval::types::Origin;

    #[test]
    fn status_codes_follow_error_kind() {
        let cases = [
            (RetrievalError::Validation("q".into()), StatusCode::BAD_REQUEST),
            (RetrievalError::Configuration("m".into()), StatusCode::BAD_REQUEST),
            (
                RetrievalError::BackendUnavailable { origin: Origin::Vector, message: "x".into() },
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (RetrievalError::Timeout { origin: Origin::Lexical }, StatusCode::GATEWAY_TIMEOUT),
            (RetrievalError::Internal("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, expected) in cases {
            let kind = err.kind();
            let api = ApiError::from(err);
            assert_eq!(api.status, expected);
            assert_eq!(api.code, kind);
        }
    }
}
