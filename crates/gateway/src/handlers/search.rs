//! Search handlers
//!
//! The wire shape keeps the positional `data` array clients already send:
//! `data = [theme, language, [[page, paragraph, text], ...]]`.

use axum::{extract::State, Json};
use serde::Deserialize;
use std::time::Instant;

use crate::AppState;
use citeguard_common::errors::{CoreError, Result};
use citeguard_common::metrics::EndpointTimer;
use citeguard_engine::orchestrator::Fragment;
use citeguard_engine::service::{
    ChunkMode, DirectSearchResponse, PlagiarismResponse, SimilarityParams, SimilarityResponse,
};

/// Positional request body: [theme, language, fragments]
type DataTuple = (String, String, Vec<(String, String, String)>);

#[derive(Debug, Deserialize)]
pub struct SimilarityRequest {
    pub data: DataTuple,
    #[serde(default)]
    pub threshold: Option<f32>,
    #[serde(default)]
    pub use_index: Option<bool>,
    #[serde(default)]
    pub sources: Option<Vec<String>>,
}

impl SimilarityRequest {
    fn into_params(self) -> SimilarityParams {
        let (theme, language, rows) = self.data;
        SimilarityParams {
            theme,
            language,
            fragments: rows
                .into_iter()
                .map(|(page, paragraph, text)| Fragment { page, paragraph, text })
                .collect(),
            threshold: self.threshold,
            use_index: self.use_index,
            sources: self.sources,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct PlagiarismRequest {
    #[serde(flatten)]
    pub base: SimilarityRequest,
    #[serde(default = "default_chunk_mode")]
    pub chunk_mode: ChunkMode,
    #[serde(default)]
    pub min_chunk_words: Option<usize>,
}

fn default_chunk_mode() -> ChunkMode {
    ChunkMode::Sentences
}

#[derive(Debug, Deserialize)]
pub struct IndexSearchRequest {
    pub query: String,
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default)]
    pub k: Option<usize>,
    #[serde(default)]
    pub threshold: Option<f32>,
}

fn default_language() -> String {
    "en".to_string()
}

/// Batch similarity search
pub async fn similarity(
    State(state): State<AppState>,
    Json(request): Json<SimilarityRequest>,
) -> Result<Json<SimilarityResponse>> {
    let _timer = EndpointTimer::new("similarity");
    let start = Instant::now();

    let response = state.service.similarity_search(request.into_params()).await?;

    tracing::info!(
        results = response.count,
        processed_texts = response.processed_texts,
        latency_ms = start.elapsed().as_millis() as u64,
        "Similarity search completed"
    );

    Ok(Json(response))
}

/// Plagiarism check aggregated by severity band
pub async fn plagiarism(
    State(state): State<AppState>,
    Json(request): Json<PlagiarismRequest>,
) -> Result<Json<PlagiarismResponse>> {
    let _timer = EndpointTimer::new("plagiarism");

    let response = state
        .service
        .plagiarism_check(
            request.base.into_params(),
            request.chunk_mode,
            request.min_chunk_words,
        )
        .await?;

    tracing::info!(
        detected = response.plagiarism_detected,
        chunks = response.chunks_checked,
        "Plagiarism check completed"
    );

    Ok(Json(response))
}

/// Direct index search (no cache, no federation)
pub async fn index_search(
    State(state): State<AppState>,
    Json(request): Json<IndexSearchRequest>,
) -> Result<Json<DirectSearchResponse>> {
    let _timer = EndpointTimer::new("index_search");

    if request.query.trim().is_empty() {
        return Err(CoreError::InvalidInput {
            message: "query must not be empty".to_string(),
        });
    }

    let response = state
        .service
        .direct_index_search(
            &request.query,
            &request.language,
            request.k,
            request.threshold,
        )
        .await?;

    Ok(Json(response))
}
