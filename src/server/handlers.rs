//! Request handlers and error responses.

use super::AppState;
use super::paths::resolve_document_path;
use crate::error::SearchError;
use crate::index::DocumentId;
use crate::render::render_markdown;
use axum::Json;
use axum::extract::rejection::QueryRejection;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use serde::Deserialize;
use serde_json::json;
use std::time::Instant;

impl SearchError {
    /// HTTP status for this error.
    pub fn http_status(&self) -> StatusCode {
        match self {
            Self::InvalidQuery { .. } => StatusCode::BAD_REQUEST,
            Self::NotFound { .. } | Self::PathTraversal { .. } => StatusCode::NOT_FOUND,
            Self::NotReady => StatusCode::SERVICE_UNAVAILABLE,
            Self::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            Self::CorpusRead { .. }
            | Self::EmbedderFailure(_)
            | Self::Config { .. }
            | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for SearchError {
    fn into_response(self) -> Response {
        let status = self.http_status();
        if self.is_client_error() {
            tracing::debug!("Request rejected: {self}");
        } else {
            tracing::error!("Request failed: {self}");
        }

        let body = Json(json!({
            "error": {
                "code": self.status_code(),
                "message": self.to_string(),
            }
        }));
        (status, body).into_response()
    }
}

pub(super) async fn health_check() -> &'static str {
    "OK"
}

pub(super) async fn readiness(State(state): State<AppState>) -> Response {
    match state.engine() {
        Some(engine) => Json(json!({
            "status": "ready",
            "documents": engine.index().len(),
            "model": engine.embedder().model_name(),
            "dimension": engine.embedder().dimension().get(),
        }))
        .into_response(),
        None => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "status": "building" })),
        )
            .into_response(),
    }
}

/// `GET /content/{*path}`: render a corpus document as HTML.
pub(super) async fn content(
    State(state): State<AppState>,
    Path(requested): Path<String>,
) -> Result<Html<String>, SearchError> {
    let path = resolve_document_path(state.content_root(), &requested)?;
    let markdown = tokio::fs::read_to_string(&path)
        .await
        .map_err(|source| match source.kind() {
            std::io::ErrorKind::NotFound => SearchError::NotFound {
                path: requested.clone(),
            },
            _ => SearchError::CorpusRead {
                path: path.clone(),
                source,
            },
        })?;
    Ok(Html(render_markdown(&markdown)))
}

#[derive(Debug, Deserialize)]
pub(super) struct SearchParams {
    query: Option<String>,
}

/// `GET /search?query=...`: JSON array of the best matching identifiers.
///
/// Embedding is CPU-bound, so it runs on the blocking pool under the
/// configured request timeout.
pub(super) async fn search(
    State(state): State<AppState>,
    params: Result<Query<SearchParams>, QueryRejection>,
) -> Result<Json<Vec<DocumentId>>, SearchError> {
    let Query(params) = params.map_err(|rejection| SearchError::InvalidQuery {
        reason: rejection.body_text(),
    })?;
    let query = params.query.ok_or_else(|| SearchError::InvalidQuery {
        reason: "missing required parameter 'query'".to_string(),
    })?;
    let engine = state.engine().cloned().ok_or(SearchError::NotReady)?;

    let started = Instant::now();
    let timeout = state.request_timeout();
    let task = tokio::task::spawn_blocking(move || engine.search(&query));

    let results = match tokio::time::timeout(timeout, task).await {
        Ok(Ok(results)) => results?,
        Ok(Err(join_error)) => {
            return Err(SearchError::Internal(format!(
                "search task failed: {join_error}"
            )));
        }
        Err(_) => {
            return Err(SearchError::Timeout {
                elapsed_ms: started.elapsed().as_millis() as u64,
            });
        }
    };

    Ok(Json(results.into_iter().map(|hit| hit.id).collect()))
}
