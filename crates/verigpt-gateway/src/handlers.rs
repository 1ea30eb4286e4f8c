use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use serde::Serialize;
use verigpt_core::{QueryAnswer, QueryRequest, ServiceError};
use verigpt_index::store::index_files;
use verigpt_memory::{CorpusLoader, CorpusStats, DocumentError, FlatIndex};

use super::error::ApiError;
use super::server::AppState;

#[derive(Serialize)]
pub(crate) struct HealthResponse {
    status: &'static str,
    ready: bool,
    credentials_configured: bool,
    index_loaded: bool,
    corpus_dir: String,
    uptime_secs: u64,
}

#[derive(Serialize)]
pub(crate) struct FilesResponse {
    total_files: usize,
    files: Vec<String>,
}

#[derive(Serialize)]
pub(crate) struct IndexStatusResponse {
    status: &'static str,
    index_path: String,
    index_files: Vec<String>,
    loaded: bool,
    chunks: Option<usize>,
}

#[derive(Serialize)]
pub(crate) struct ReloadResponse {
    status: &'static str,
    chunks: usize,
}

pub(crate) async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let credentials_configured = state.service.credentials_configured();
    let index_loaded = state.index.is_loaded();
    let ready = credentials_configured && index_loaded;
    Json(HealthResponse {
        status: if ready { "healthy" } else { "degraded" },
        ready,
        credentials_configured,
        index_loaded,
        corpus_dir: state.corpus.root().display().to_string(),
        uptime_secs: state.started_at.elapsed().as_secs(),
    })
}

async fn on_corpus<T, F>(corpus: Arc<CorpusLoader>, f: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce(&CorpusLoader) -> Result<T, DocumentError> + Send + 'static,
{
    tokio::task::spawn_blocking(move || f(&corpus))
        .await
        .map_err(|e| ServiceError::Internal(format!("corpus task failed: {e}")))?
        .map_err(|e| ApiError::from(ServiceError::from(e)))
}

pub(crate) async fn files_handler(
    State(state): State<AppState>,
) -> Result<Json<FilesResponse>, ApiError> {
    let entries = on_corpus(state.corpus, CorpusLoader::list).await?;
    Ok(Json(FilesResponse {
        total_files: entries.len(),
        files: entries.into_iter().map(|e| e.path).collect(),
    }))
}

pub(crate) async fn stats_handler(
    State(state): State<AppState>,
) -> Result<Json<CorpusStats>, ApiError> {
    Ok(Json(on_corpus(state.corpus, CorpusLoader::stats).await?))
}

pub(crate) async fn agent_handler(
    State(state): State<AppState>,
    payload: Result<Json<QueryRequest>, JsonRejection>,
) -> Result<Json<QueryAnswer>, ApiError> {
    let Json(request) = payload.map_err(|rejection| {
        let status = rejection.status();
        if status == StatusCode::PAYLOAD_TOO_LARGE {
            ApiError::new(status, rejection.body_text())
        } else {
            ApiError::from(ServiceError::InvalidRequest(rejection.body_text()))
        }
    })?;

    let answer = state.service.ask(request).await?;
    Ok(Json(answer))
}

pub(crate) async fn index_status_handler(
    State(state): State<AppState>,
) -> Json<IndexStatusResponse> {
    let path = state.index_path.as_path();
    Json(IndexStatusResponse {
        status: if FlatIndex::exists(path) {
            "available"
        } else {
            "not_found"
        },
        index_path: path.display().to_string(),
        index_files: index_files(path),
        loaded: state.index.is_loaded(),
        chunks: state.index.chunk_count(),
    })
}

pub(crate) async fn index_reload_handler(
    State(state): State<AppState>,
) -> Result<Json<ReloadResponse>, ApiError> {
    let chunks = state
        .index
        .load_from_disk(&state.index_path)
        .await
        .map_err(ServiceError::from)?;
    tracing::info!(chunks, "index reloaded via API");
    Ok(Json(ReloadResponse {
        status: "reloaded",
        chunks,
    }))
}
