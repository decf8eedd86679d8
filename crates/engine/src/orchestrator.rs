//! Batch similarity orchestrator
//!
//! `run_batch` ties the pipeline together for a batch of fragments:
//! normalize and group, probe the result cache, probe the vector index,
//! federate to external sources for the remainder, re-embed and rank, write
//! everything back, and rebroadcast per original fragment.
//!
//! Every stage observes the batch deadline. On expiry the call returns the
//! best-effort partial results it has with `deadline_exceeded` set; it only
//! errors when the index or the embedding model is unusable.

use crate::bands::PlagiarismBand;
use crate::context::CoreContext;
use crate::result_cache::fingerprint;
use citeguard_common::errors::Result;
use citeguard_common::metrics;
use citeguard_common::text::normalize;
use citeguard_index::{ContentHash, Paper};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info};

/// Minimum normalized-abstract length for a federated paper to be usable
const MIN_ABSTRACT_CHARS: usize = 20;

/// A client-submitted fragment with its origin
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fragment {
    pub page: String,
    pub paragraph: String,
    pub text: String,
}

/// A ranked match for one query
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Match {
    pub paper: Paper,
    pub score: f32,
    pub band: PlagiarismBand,
}

impl Match {
    fn new(mut paper: Paper, score: f32, band: PlagiarismBand) -> Self {
        // Embeddings stay inside the index; responses and cache entries
        // carry metadata only
        paper.embedding = Vec::new();
        Self { paper, score, band }
    }
}

/// Matches rebroadcast to one original fragment
#[derive(Debug, Clone, Serialize)]
pub struct FragmentMatches {
    pub page: String,
    pub paragraph: String,
    pub text: String,
    pub matches: Vec<Match>,
}

#[derive(Debug, Clone)]
pub struct BatchRequest {
    pub fragments: Vec<Fragment>,
    pub theme: String,
    pub language: String,
    pub threshold: f32,
    pub allowed_sources: Option<Vec<String>>,
    pub use_index: bool,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchTelemetry {
    /// Unique normalized texts processed
    pub processed_texts: usize,
    pub cache_hits: usize,
    pub federated_queries: usize,
    pub papers_added: usize,
    pub deadline_exceeded: bool,
}

#[derive(Debug)]
pub struct BatchOutcome {
    pub results: Vec<FragmentMatches>,
    pub telemetry: BatchTelemetry,
}

/// One unique normalized text and the fragments that produced it
struct QueryGroup {
    normalized: String,
    fingerprint: String,
    fragment_indices: Vec<usize>,
}

pub async fn run_batch(ctx: &CoreContext, request: BatchRequest) -> Result<BatchOutcome> {
    let started = Instant::now();
    let deadline = started + Duration::from_secs(ctx.config.search.batch_deadline_secs);
    let mut telemetry = BatchTelemetry::default();

    // Step 1: normalize and group identical texts; each unique text is
    // computed once downstream
    let mut groups: Vec<QueryGroup> = Vec::new();
    let mut group_of: HashMap<String, usize> = HashMap::new();
    let mut fragment_group: Vec<Option<usize>> = Vec::with_capacity(request.fragments.len());

    for (i, fragment) in request.fragments.iter().enumerate() {
        let normalized = normalize(&fragment.text, &request.language);
        if normalized.is_empty() {
            fragment_group.push(None);
            continue;
        }
        let group = *group_of.entry(normalized.clone()).or_insert_with(|| {
            groups.push(QueryGroup {
                fingerprint: fingerprint(
                    &request.theme,
                    &request.language,
                    &normalized,
                    request.threshold,
                ),
                normalized,
                fragment_indices: Vec::new(),
            });
            groups.len() - 1
        });
        groups[group].fragment_indices.push(i);
        fragment_group.push(Some(group));
    }
    telemetry.processed_texts = groups.len();

    let mut group_results: Vec<Option<Vec<Match>>> = (0..groups.len()).map(|_| None).collect();

    // Step 2: cache probe; hits short-circuit
    for (g, group) in groups.iter().enumerate() {
        if let Some(matches) = ctx.result_cache.lookup(&group.fingerprint).await {
            group_results[g] = Some(matches);
            telemetry.cache_hits += 1;
        }
    }

    let pending: Vec<usize> = (0..groups.len())
        .filter(|&g| group_results[g].is_none())
        .collect();

    if !pending.is_empty() {
        if Instant::now() >= deadline {
            telemetry.deadline_exceeded = true;
        } else {
            compute_pending(
                ctx,
                &request,
                &groups,
                &pending,
                &mut group_results,
                &mut telemetry,
                deadline,
            )
            .await?;
        }
    }

    // Step 8: persist fresh results; cached hits are not rewritten, and a
    // deadline-truncated batch is not cached at all (partial answers must
    // not serve the next 24h of identical requests)
    if !telemetry.deadline_exceeded {
        for &g in &pending {
            if let Some(matches) = &group_results[g] {
                ctx.result_cache.store(&groups[g].fingerprint, matches).await;
            }
        }
    }
    if telemetry.papers_added > 0 {
        ctx.index.save_debounced();
    }

    // Rebroadcast per original fragment; duplicates of the same normalized
    // text share results
    let results: Vec<FragmentMatches> = request
        .fragments
        .iter()
        .enumerate()
        .map(|(i, fragment)| FragmentMatches {
            page: fragment.page.clone(),
            paragraph: fragment.paragraph.clone(),
            text: fragment.text.clone(),
            matches: fragment_group[i]
                .and_then(|g| group_results[g].clone())
                .unwrap_or_default(),
        })
        .collect();

    if telemetry.deadline_exceeded {
        metrics::record_deadline_exceeded();
    }
    metrics::record_search(
        started.elapsed().as_secs_f64(),
        telemetry.processed_texts,
        results.iter().map(|r| r.matches.len()).sum(),
    );

    info!(
        fragments = request.fragments.len(),
        unique = telemetry.processed_texts,
        cache_hits = telemetry.cache_hits,
        federated = telemetry.federated_queries,
        added = telemetry.papers_added,
        deadline_exceeded = telemetry.deadline_exceeded,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Similarity batch complete"
    );

    Ok(BatchOutcome { results, telemetry })
}

/// Steps 3-7 for the cache misses.
async fn compute_pending(
    ctx: &CoreContext,
    request: &BatchRequest,
    groups: &[QueryGroup],
    pending: &[usize],
    group_results: &mut [Option<Vec<Match>>],
    telemetry: &mut BatchTelemetry,
    deadline: Instant,
) -> Result<()> {
    let search_cfg = &ctx.config.search;

    // Step 3: one embedding batch for every unique pending text. Embedding
    // failure is fatal to the request; in-flight batches are never cancelled
    let texts: Vec<String> = pending.iter().map(|&g| groups[g].normalized.clone()).collect();
    let query_vectors = ctx.embeddings.embed(&texts).await?;

    // Step 4: index probe via the batched search primitive
    let mut index_matches: HashMap<usize, Vec<Match>> = HashMap::new();
    if request.use_index && !ctx.index.is_empty().await {
        let vectors: Vec<Vec<f32>> = query_vectors.iter().map(|v| v.as_ref().clone()).collect();
        let hit_lists = ctx
            .index
            .search_batch(&vectors, search_cfg.index_k, request.threshold)
            .await?;

        for (&g, hits) in pending.iter().zip(&hit_lists) {
            if hits.is_empty() {
                continue;
            }
            let ids: Vec<u64> = hits.iter().map(|h| h.paper_id).collect();
            let papers = ctx.index.papers(&ids).await;
            let by_id: HashMap<u64, &Paper> = papers.iter().map(|p| (p.paper_id, p)).collect();

            let matches: Vec<Match> = hits
                .iter()
                .filter_map(|hit| {
                    let paper = by_id.get(&hit.paper_id)?;
                    let band = PlagiarismBand::from_score(hit.score)?;
                    Some(Match::new((*paper).clone(), hit.score, band))
                })
                .collect();

            // A query with enough index results is done
            if matches.len() >= search_cfg.m_sufficient {
                let mut done = matches;
                done.truncate(search_cfg.k_result);
                group_results[g] = Some(done);
            } else {
                index_matches.insert(g, matches);
            }
        }
    }

    let remaining: Vec<usize> = pending
        .iter()
        .copied()
        .filter(|&g| group_results[g].is_none())
        .collect();
    if remaining.is_empty() {
        return Ok(());
    }

    if Instant::now() >= deadline {
        telemetry.deadline_exceeded = true;
        // Index-only partial results are better than nothing
        for &g in &remaining {
            if let Some(matches) = index_matches.remove(&g) {
                group_results[g] = Some(matches);
            }
        }
        return Ok(());
    }

    // Step 5: federate the remaining queries in parallel, bounded by the
    // orchestrator deadline (the federator applies its own global deadline
    // underneath)
    let remaining_time = deadline.saturating_duration_since(Instant::now());
    telemetry.federated_queries += remaining.len();

    let fetches = remaining.iter().map(|&g| {
        let query = groups[g].normalized.clone();
        async move {
            tokio::time::timeout(
                remaining_time,
                ctx.fetcher.fetch(
                    &query,
                    &request.theme,
                    &request.language,
                    request.allowed_sources.as_deref(),
                ),
            )
            .await
        }
    });
    let outcomes = futures::future::join_all(fetches).await;

    // Discard papers without a usable abstract, then embed the survivors'
    // normalized abstracts in one batch
    let mut owners: Vec<(usize, Paper)> = Vec::new();
    let mut abstract_texts: Vec<String> = Vec::new();
    for (&g, outcome) in remaining.iter().zip(outcomes) {
        let Ok(outcome) = outcome else {
            telemetry.deadline_exceeded = true;
            continue;
        };
        for paper in outcome.papers {
            let normalized_abstract = normalize(&paper.abstract_text, &request.language);
            if normalized_abstract.len() < MIN_ABSTRACT_CHARS {
                debug!(source = %paper.source, "Discarding paper without usable abstract");
                continue;
            }
            abstract_texts.push(normalized_abstract);
            owners.push((g, paper));
        }
    }

    let mut scored: HashMap<usize, Vec<(Paper, f32)>> = HashMap::new();
    if !owners.is_empty() {
        let abstract_vectors = ctx.embeddings.embed(&abstract_texts).await?;

        // Attach embeddings and add everything to the index; the index
        // consults the dedup ledger and skips duplicates silently
        let mut to_add = Vec::with_capacity(owners.len());
        for ((_, paper), vector) in owners.iter_mut().zip(&abstract_vectors) {
            paper.embedding = vector.as_ref().clone();
            to_add.push(paper.clone());
        }
        telemetry.papers_added += ctx.index.add(to_add).await?;

        // Resolve assigned ids so responses carry them
        let hashes: Vec<ContentHash> = owners.iter().map(|(_, p)| p.content_hash).collect();
        let indexed = ctx.index.find_by_hashes(&hashes).await;

        // Step 6: re-score against the query vector, keep >= threshold
        let vector_of: HashMap<usize, &Arc<Vec<f32>>> = pending
            .iter()
            .zip(&query_vectors)
            .map(|(&g, v)| (g, v))
            .collect();

        for ((g, paper), abstract_vector) in owners.into_iter().zip(abstract_vectors) {
            let Some(&query_vector) = vector_of.get(&g) else {
                continue;
            };
            let score = dot(query_vector, &abstract_vector);
            if score < request.threshold {
                continue;
            }
            let Some(band) = PlagiarismBand::from_score(score) else {
                continue;
            };
            let resolved = indexed.get(&paper.content_hash).cloned().unwrap_or(paper);
            scored.entry(g).or_default().push((resolved, score));
        }
    }

    // Step 7: union federated results with index results by content hash,
    // index entries first, then rank and truncate
    for &g in &remaining {
        let mut merged = index_matches.remove(&g).unwrap_or_default();
        let mut seen: HashSet<ContentHash> = merged.iter().map(|m| m.paper.content_hash).collect();

        for (paper, score) in scored.remove(&g).unwrap_or_default() {
            if !seen.insert(paper.content_hash) {
                continue;
            }
            if let Some(band) = PlagiarismBand::from_score(score) {
                merged.push(Match::new(paper, score, band));
            }
        }

        merged.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.paper.paper_id.cmp(&b.paper.paper_id))
        });
        merged.truncate(search_cfg.k_result);
        group_results[g] = Some(merged);
    }

    Ok(())
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}
