//! Service operations consumed by the HTTP layer
//!
//! Search operations: `similarity_search`, `plagiarism_check`,
//! `direct_index_search`. Admin operations: save, clear, backup,
//! remove_duplicates, reset_limits, clear_result_cache,
//! deduplication_stats. All validation happens here so the transport layer
//! stays a thin shell.

use crate::bands::PlagiarismBand;
use crate::context::CoreContext;
use crate::orchestrator::{run_batch, BatchRequest, Fragment, FragmentMatches, Match};
use citeguard_common::errors::{CoreError, Result};
use citeguard_common::text::{fragment, normalize};
use citeguard_index::{DedupStats, IndexStats};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// Default minimum words per chunk for plagiarism checks
const DEFAULT_MIN_CHUNK_WORDS: usize = 10;

/// Chunking mode for plagiarism checks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkMode {
    Sentences,
    Sliding,
}

#[derive(Debug, Clone)]
pub struct SimilarityParams {
    pub theme: String,
    pub language: String,
    pub fragments: Vec<Fragment>,
    pub threshold: Option<f32>,
    pub use_index: Option<bool>,
    pub sources: Option<Vec<String>>,
}

#[derive(Debug, Serialize)]
pub struct SimilarityResponse {
    pub results: Vec<FragmentMatches>,
    pub count: usize,
    pub processed_texts: usize,
    pub threshold_used: f32,
    pub index_enabled: bool,
    pub deadline_exceeded: bool,
}

#[derive(Debug, Serialize)]
pub struct PlagiarismResponse {
    pub plagiarism_detected: bool,
    pub bands: HashMap<&'static str, usize>,
    pub chunks_checked: usize,
    pub results: Vec<FragmentMatches>,
    pub deadline_exceeded: bool,
}

#[derive(Debug, Serialize)]
pub struct DirectSearchResponse {
    pub matches: Vec<Match>,
    pub count: usize,
}

#[derive(Debug, Serialize)]
pub struct DeduplicationStats {
    pub ledger: DedupStats,
    pub index: IndexStats,
}

pub struct SimilarityService {
    ctx: Arc<CoreContext>,
}

impl SimilarityService {
    pub fn new(ctx: Arc<CoreContext>) -> Self {
        Self { ctx }
    }

    pub fn context(&self) -> &Arc<CoreContext> {
        &self.ctx
    }

    fn validate(&self, params: &SimilarityParams) -> Result<(f32, bool)> {
        let threshold = params
            .threshold
            .unwrap_or(self.ctx.config.search.default_threshold);
        if !(0.0..=1.0).contains(&threshold) {
            return Err(CoreError::InvalidThreshold { value: threshold });
        }

        let language = params.language.trim();
        if language.is_empty()
            || language.len() > 8
            || !language.chars().all(|c| c.is_ascii_alphabetic() || c == '-' || c == '_')
        {
            return Err(CoreError::InvalidLanguage {
                code: params.language.clone(),
            });
        }

        if params.fragments.is_empty() {
            return Err(CoreError::InvalidInput {
                message: "at least one fragment is required".to_string(),
            });
        }
        if params.fragments.iter().any(|f| f.text.trim().is_empty()) {
            return Err(CoreError::InvalidInput {
                message: "fragment text must not be empty".to_string(),
            });
        }

        Ok((threshold, params.use_index.unwrap_or(true)))
    }

    /// Batch similarity search over tagged fragments.
    pub async fn similarity_search(&self, params: SimilarityParams) -> Result<SimilarityResponse> {
        let (threshold, use_index) = self.validate(&params)?;

        let outcome = run_batch(
            &self.ctx,
            BatchRequest {
                fragments: params.fragments,
                theme: params.theme,
                language: params.language,
                threshold,
                allowed_sources: params.sources,
                use_index,
            },
        )
        .await?;

        Ok(SimilarityResponse {
            count: outcome.results.iter().map(|r| r.matches.len()).sum(),
            processed_texts: outcome.telemetry.processed_texts,
            threshold_used: threshold,
            index_enabled: use_index,
            deadline_exceeded: outcome.telemetry.deadline_exceeded,
            results: outcome.results,
        })
    }

    /// Plagiarism check: fragment the submitted texts, run the similarity
    /// pipeline over the chunks, aggregate matches by severity band.
    /// Detection means at least one match in `high` or above.
    pub async fn plagiarism_check(
        &self,
        params: SimilarityParams,
        chunk_mode: ChunkMode,
        min_chunk_words: Option<usize>,
    ) -> Result<PlagiarismResponse> {
        let (threshold, use_index) = self.validate(&params)?;
        let min_words = min_chunk_words.unwrap_or(DEFAULT_MIN_CHUNK_WORDS).max(2);

        let mut chunks: Vec<Fragment> = Vec::new();
        for frag in &params.fragments {
            let pieces = match chunk_mode {
                ChunkMode::Sentences => fragment::sentences(&frag.text, min_words),
                // Sliding windows of the chunk minimum, half overlapping
                ChunkMode::Sliding => fragment::sliding(&frag.text, min_words, min_words / 2)?,
            };
            for (index, text) in pieces {
                chunks.push(Fragment {
                    page: frag.page.clone(),
                    paragraph: format!("{}:{}", frag.paragraph, index),
                    text,
                });
            }
        }

        if chunks.is_empty() {
            return Err(CoreError::InvalidInput {
                message: "no chunks produced from the submitted fragments".to_string(),
            });
        }

        let chunks_checked = chunks.len();
        let outcome = run_batch(
            &self.ctx,
            BatchRequest {
                fragments: chunks,
                theme: params.theme,
                language: params.language,
                threshold,
                allowed_sources: params.sources,
                use_index,
            },
        )
        .await?;

        let mut bands: HashMap<&'static str, usize> = HashMap::from([
            ("very_high", 0),
            ("high", 0),
            ("moderate", 0),
            ("low", 0),
            ("minimal", 0),
        ]);
        let mut detected = false;
        for result in &outcome.results {
            for m in &result.matches {
                *bands.entry(m.band.name()).or_insert(0) += 1;
                detected |= m.band.is_detection();
            }
        }

        Ok(PlagiarismResponse {
            plagiarism_detected: detected,
            bands,
            chunks_checked,
            deadline_exceeded: outcome.telemetry.deadline_exceeded,
            results: outcome.results,
        })
    }

    /// Search the vector index directly, bypassing cache and federation.
    pub async fn direct_index_search(
        &self,
        query: &str,
        language: &str,
        k: Option<usize>,
        threshold: Option<f32>,
    ) -> Result<DirectSearchResponse> {
        let threshold = threshold.unwrap_or(self.ctx.config.search.default_threshold);
        if !(0.0..=1.0).contains(&threshold) {
            return Err(CoreError::InvalidThreshold { value: threshold });
        }
        let k = k.unwrap_or(self.ctx.config.search.k_result).clamp(1, 100);

        let normalized = normalize(query, language);
        if normalized.is_empty() {
            return Err(CoreError::InvalidInput {
                message: "query normalizes to nothing".to_string(),
            });
        }

        let vectors = self.ctx.embeddings.embed(&[normalized]).await?;
        let hits = self.ctx.index.search(&vectors[0], k, threshold).await?;

        let ids: Vec<u64> = hits.iter().map(|h| h.paper_id).collect();
        let papers = self.ctx.index.papers(&ids).await;
        let by_id: HashMap<u64, _> = papers.into_iter().map(|p| (p.paper_id, p)).collect();

        let matches: Vec<Match> = hits
            .iter()
            .filter_map(|hit| {
                let paper = by_id.get(&hit.paper_id)?.clone();
                let band = PlagiarismBand::from_score(hit.score)?;
                Some(Match { paper, score: hit.score, band })
            })
            .map(|mut m| {
                m.paper.embedding = Vec::new();
                m
            })
            .collect();

        Ok(DirectSearchResponse {
            count: matches.len(),
            matches,
        })
    }

    // ---- Admin operations ----

    pub async fn save(&self) -> Result<()> {
        self.ctx.index.save().await
    }

    pub async fn clear(&self) -> Result<()> {
        self.ctx.index.clear().await
    }

    pub async fn backup(&self) -> Result<String> {
        let path = self.ctx.index.backup().await?;
        Ok(path.display().to_string())
    }

    pub async fn remove_duplicates(&self) -> Result<usize> {
        self.ctx.index.remove_duplicates().await
    }

    /// Restore every rate bucket to full and close every circuit.
    pub async fn reset_limits(&self) -> Result<()> {
        self.ctx.limiter.reset().await?;
        self.ctx.breaker.reset();
        Ok(())
    }

    pub async fn clear_result_cache(&self) -> u64 {
        self.ctx.result_cache.clear().await
    }

    pub async fn deduplication_stats(&self) -> Result<DeduplicationStats> {
        Ok(DeduplicationStats {
            ledger: self.ctx.index.ledger().stats().await?,
            index: self.ctx.index.stats().await,
        })
    }

    pub async fn index_stats(&self) -> IndexStats {
        self.ctx.index.stats().await
    }
}
