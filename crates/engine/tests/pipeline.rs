//! End-to-end pipeline scenarios with a stub embedder and a mock federator.
//!
//! The stub embedder returns fixed unit vectors for known normalized texts,
//! so cosine scores between queries and abstracts are chosen exactly; the
//! mock federator counts invocations and serves canned papers.

use async_trait::async_trait;
use citeguard_common::config::AppConfig;
use citeguard_common::embeddings::{Embedder, EmbeddingService, HashEmbedder};
use citeguard_common::errors::Result;
use citeguard_engine::context::CoreContext;
use citeguard_engine::orchestrator::Fragment;
use citeguard_engine::result_cache::ResultCache;
use citeguard_engine::service::{ChunkMode, SimilarityParams, SimilarityService};
use citeguard_engine::PlagiarismBand;
use citeguard_index::dedup::{DedupLedger, InMemoryDedupStore};
use citeguard_index::strategy::UpgradeThresholds;
use citeguard_index::{Paper, VectorIndex};
use citeguard_sources::circuit::CircuitBreaker;
use citeguard_sources::federator::{FederationOutcome, SourceFetcher};
use citeguard_sources::rate::{InMemoryRateBackend, SourceRateLimiter};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

const DIM: usize = 8;

/// Unit vector with cosine `c` against `axis_query()`
fn at_cosine(c: f32) -> Vec<f32> {
    let mut v = vec![0.0; DIM];
    v[0] = c;
    v[1] = (1.0 - c * c).sqrt();
    v
}

fn axis_query() -> Vec<f32> {
    let mut v = vec![0.0; DIM];
    v[0] = 1.0;
    v
}

/// Embedder returning pinned vectors for known normalized texts and
/// deterministic hashed vectors otherwise.
struct StubEmbedder {
    pinned: HashMap<String, Vec<f32>>,
    fallback: HashEmbedder,
}

impl StubEmbedder {
    fn new(pinned: HashMap<String, Vec<f32>>) -> Self {
        Self {
            pinned,
            fallback: HashEmbedder::new(DIM),
        }
    }
}

#[async_trait]
impl Embedder for StubEmbedder {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            match self.pinned.get(text) {
                Some(vector) => out.push(vector.clone()),
                None => out.extend(self.fallback.embed_batch(&[text.clone()]).await?),
            }
        }
        Ok(out)
    }

    fn model_name(&self) -> &str {
        "stub"
    }

    fn dimension(&self) -> usize {
        DIM
    }
}

/// Federator mock: canned papers, call counter, optional failure mode.
struct MockFetcher {
    papers: Mutex<Vec<Paper>>,
    fail: bool,
    calls: AtomicUsize,
}

impl MockFetcher {
    fn returning(papers: Vec<Paper>) -> Arc<Self> {
        Arc::new(Self {
            papers: Mutex::new(papers),
            fail: false,
            calls: AtomicUsize::new(0),
        })
    }

    fn failing() -> Arc<Self> {
        Arc::new(Self {
            papers: Mutex::new(Vec::new()),
            fail: true,
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SourceFetcher for MockFetcher {
    async fn fetch(
        &self,
        _query: &str,
        _theme: &str,
        _language: &str,
        _allowed_sources: Option<&[String]>,
    ) -> FederationOutcome {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return FederationOutcome::default();
        }
        FederationOutcome {
            papers: self.papers.lock().unwrap().clone(),
            envelopes: Vec::new(),
        }
    }
}

fn arxiv_paper(title: &str, abstract_text: &str) -> Paper {
    Paper::new(
        title.to_string(),
        abstract_text.to_string(),
        vec!["A. Author".into()],
        "arxiv".into(),
        "preprint".into(),
        "2024-01-01".into(),
        String::new(),
        String::new(),
    )
}

struct TestHarness {
    service: SimilarityService,
    _data_dir: tempfile::TempDir,
}

fn harness(
    pinned: HashMap<String, Vec<f32>>,
    fetcher: Arc<dyn SourceFetcher>,
    tune: impl FnOnce(&mut AppConfig),
) -> TestHarness {
    let data_dir = tempfile::tempdir().unwrap();

    let mut config = AppConfig::default();
    config.embedding.dimension = DIM;
    config.index.data_dir = data_dir.path().display().to_string();
    tune(&mut config);
    let config = Arc::new(config);

    let ledger = Arc::new(DedupLedger::new(
        Arc::new(InMemoryDedupStore::new()),
        10_000,
        0.01,
    ));
    let index = Arc::new(VectorIndex::new(
        DIM,
        ledger,
        UpgradeThresholds::default(),
        data_dir.path().to_path_buf(),
        Duration::from_millis(10),
    ));

    let limiter = Arc::new(SourceRateLimiter::new(
        Arc::new(InMemoryRateBackend::new()),
        HashMap::new(),
        citeguard_common::config::BucketConfig {
            capacity: 100,
            refill_per_sec: 100.0,
        },
    ));

    let ctx = Arc::new(CoreContext {
        config,
        embeddings: Arc::new(EmbeddingService::new(Arc::new(StubEmbedder::new(pinned)), 64)),
        index,
        fetcher,
        result_cache: Arc::new(ResultCache::new(None, 60)),
        limiter,
        breaker: Arc::new(CircuitBreaker::new(5, Duration::from_secs(30))),
    });

    TestHarness {
        service: SimilarityService::new(ctx),
        _data_dir: data_dir,
    }
}

fn params(text: &str) -> SimilarityParams {
    SimilarityParams {
        theme: "ml".into(),
        language: "en".into(),
        fragments: vec![Fragment {
            page: "p".into(),
            paragraph: "1".into(),
            text: text.into(),
        }],
        threshold: Some(0.5),
        use_index: Some(true),
        sources: None,
    }
}

// Normalized forms used as stub keys
const QUERY_TEXT: &str = "Neural networks are models";
const QUERY_NORM: &str = "neural networks models";
const ABSTRACT_TEXT: &str = "This paper surveys deep learning models for images.";
const ABSTRACT_NORM: &str = "paper surveys deep learning models images";

fn pinned_for_single_hit(cosine: f32) -> HashMap<String, Vec<f32>> {
    HashMap::from([
        (QUERY_NORM.to_string(), axis_query()),
        (ABSTRACT_NORM.to_string(), at_cosine(cosine)),
    ])
}

#[tokio::test]
async fn s1_empty_index_single_federated_hit() {
    let fetcher = MockFetcher::returning(vec![arxiv_paper("Deep Learning", ABSTRACT_TEXT)]);
    let h = harness(pinned_for_single_hit(0.85), fetcher.clone(), |_| {});

    let response = h.service.similarity_search(params(QUERY_TEXT)).await.unwrap();

    assert_eq!(response.count, 1);
    assert_eq!(response.processed_texts, 1);
    let matches = &response.results[0].matches;
    assert_eq!(matches.len(), 1);
    assert_eq!(matches[0].paper.source, "arxiv");
    assert!(matches!(
        matches[0].band,
        PlagiarismBand::Moderate | PlagiarismBand::High | PlagiarismBand::VeryHigh
    ));
    assert!(matches[0].paper.paper_id > 0);
    assert_eq!(fetcher.calls(), 1);

    // The paper was written back to the index
    assert_eq!(h.service.index_stats().await.count, 1);
}

#[tokio::test]
async fn s2_index_match_survives_failing_federator() {
    let fetcher = MockFetcher::failing();
    let h = harness(pinned_for_single_hit(0.85), fetcher.clone(), |_| {});

    let mut paper = arxiv_paper("Deep Learning", ABSTRACT_TEXT);
    paper.embedding = at_cosine(0.85);
    h.service.context().index.add(vec![paper]).await.unwrap();

    let response = h.service.similarity_search(params(QUERY_TEXT)).await.unwrap();

    // One index hit is below m_sufficient (5), so the federator was tried,
    // failed silently, and the index match still came back
    assert_eq!(fetcher.calls(), 1);
    assert_eq!(response.count, 1);
    assert_eq!(response.results[0].matches[0].paper.source, "arxiv");
    assert!(!response.deadline_exceeded);
}

#[tokio::test]
async fn s2_federator_not_invoked_when_index_sufficient() {
    let fetcher = MockFetcher::failing();
    let h = harness(pinned_for_single_hit(0.85), fetcher.clone(), |config| {
        config.search.m_sufficient = 1;
    });

    let mut paper = arxiv_paper("Deep Learning", ABSTRACT_TEXT);
    paper.embedding = at_cosine(0.85);
    h.service.context().index.add(vec![paper]).await.unwrap();

    let response = h.service.similarity_search(params(QUERY_TEXT)).await.unwrap();

    assert_eq!(response.count, 1);
    assert_eq!(fetcher.calls(), 0, "index satisfied the query; no fan-out");
}

#[tokio::test]
async fn s3_identical_papers_from_two_adapters_added_once() {
    // Same normalized title+abstract from two different sources
    let mut duplicate = arxiv_paper("Deep Learning", ABSTRACT_TEXT);
    duplicate.source = "crossref".into();
    duplicate.recompute_hash();
    let fetcher = MockFetcher::returning(vec![
        arxiv_paper("Deep Learning", ABSTRACT_TEXT),
        duplicate,
    ]);
    let h = harness(pinned_for_single_hit(0.85), fetcher, |_| {});

    let response = h.service.similarity_search(params(QUERY_TEXT)).await.unwrap();

    // Exactly one addition to the index, one match in the response
    assert_eq!(h.service.index_stats().await.count, 1);
    assert_eq!(response.count, 1);
}

#[tokio::test]
async fn s5_band_aggregation_over_index_matches() {
    // Four indexed papers at exact cosines against the query
    let scores = [0.95f32, 0.82, 0.71, 0.65];
    let fetcher = MockFetcher::failing();
    let h = harness(
        HashMap::from([(QUERY_NORM.to_string(), axis_query())]),
        fetcher,
        |config| {
            config.search.m_sufficient = 1;
        },
    );

    let papers: Vec<Paper> = scores
        .iter()
        .enumerate()
        .map(|(i, &score)| {
            let mut paper = arxiv_paper(
                &format!("Paper {}", i),
                &format!("Distinct abstract number {} with enough words.", i),
            );
            paper.embedding = at_cosine(score);
            paper
        })
        .collect();
    h.service.context().index.add(papers).await.unwrap();

    let response = h
        .service
        .plagiarism_check(params(QUERY_TEXT), ChunkMode::Sentences, Some(2))
        .await
        .unwrap();

    assert!(response.plagiarism_detected);
    assert_eq!(response.bands["very_high"], 1);
    assert_eq!(response.bands["high"], 1);
    assert_eq!(response.bands["moderate"], 1);
    assert_eq!(response.bands["low"], 1);
    assert_eq!(response.bands["minimal"], 0);
}

#[tokio::test]
async fn repeat_request_is_deterministic() {
    let fetcher = MockFetcher::returning(vec![arxiv_paper("Deep Learning", ABSTRACT_TEXT)]);
    let h = harness(pinned_for_single_hit(0.85), fetcher, |_| {});

    let first = h.service.similarity_search(params(QUERY_TEXT)).await.unwrap();
    let second = h.service.similarity_search(params(QUERY_TEXT)).await.unwrap();

    let summarize = |r: &citeguard_engine::service::SimilarityResponse| {
        r.results[0]
            .matches
            .iter()
            .map(|m| (m.paper.content_hash, (m.score * 1000.0) as i32))
            .collect::<Vec<_>>()
    };
    assert_eq!(summarize(&first), summarize(&second));
    // Second run must not duplicate the paper
    assert_eq!(h.service.index_stats().await.count, 1);
}

#[tokio::test]
async fn zero_deadline_returns_partial_with_flag() {
    let fetcher = MockFetcher::returning(vec![arxiv_paper("Deep Learning", ABSTRACT_TEXT)]);
    let h = harness(pinned_for_single_hit(0.85), fetcher, |config| {
        config.search.batch_deadline_secs = 0;
    });

    let response = h.service.similarity_search(params(QUERY_TEXT)).await.unwrap();

    assert!(response.deadline_exceeded);
    assert_eq!(response.count, 0);
}

#[tokio::test]
async fn duplicate_fragments_share_results() {
    let fetcher = MockFetcher::returning(vec![arxiv_paper("Deep Learning", ABSTRACT_TEXT)]);
    let h = harness(pinned_for_single_hit(0.85), fetcher, |_| {});

    let mut p = params(QUERY_TEXT);
    p.fragments.push(Fragment {
        page: "p".into(),
        paragraph: "2".into(),
        text: QUERY_TEXT.into(),
    });

    let response = h.service.similarity_search(p).await.unwrap();

    // One unique text, two fragments, identical matches rebroadcast
    assert_eq!(response.processed_texts, 1);
    assert_eq!(response.results.len(), 2);
    assert_eq!(response.results[0].matches.len(), 1);
    assert_eq!(response.results[1].matches.len(), 1);
    assert_eq!(
        response.results[0].matches[0].paper.content_hash,
        response.results[1].matches[0].paper.content_hash
    );
}

#[tokio::test]
async fn below_threshold_papers_are_not_returned() {
    let fetcher = MockFetcher::returning(vec![arxiv_paper("Deep Learning", ABSTRACT_TEXT)]);
    let h = harness(pinned_for_single_hit(0.3), fetcher, |_| {});

    let response = h.service.similarity_search(params(QUERY_TEXT)).await.unwrap();
    assert_eq!(response.count, 0);
    // The paper still landed in the index for future queries
    assert_eq!(h.service.index_stats().await.count, 1);
}

#[tokio::test]
async fn invalid_threshold_rejected() {
    let h = harness(HashMap::new(), MockFetcher::failing(), |_| {});
    let mut p = params(QUERY_TEXT);
    p.threshold = Some(1.5);

    let err = h.service.similarity_search(p).await.unwrap_err();
    assert!(matches!(
        err,
        citeguard_common::errors::CoreError::InvalidThreshold { .. }
    ));
}

#[tokio::test]
async fn invalid_language_rejected() {
    let h = harness(HashMap::new(), MockFetcher::failing(), |_| {});
    let mut p = params(QUERY_TEXT);
    p.language = "12!".into();

    let err = h.service.similarity_search(p).await.unwrap_err();
    assert!(matches!(
        err,
        citeguard_common::errors::CoreError::InvalidLanguage { .. }
    ));
}

#[tokio::test]
async fn direct_index_search_bypasses_federation() {
    let fetcher = MockFetcher::failing();
    let h = harness(pinned_for_single_hit(0.85), fetcher.clone(), |_| {});

    let mut paper = arxiv_paper("Deep Learning", ABSTRACT_TEXT);
    paper.embedding = at_cosine(0.85);
    h.service.context().index.add(vec![paper]).await.unwrap();

    let response = h
        .service
        .direct_index_search(QUERY_TEXT, "en", Some(5), Some(0.5))
        .await
        .unwrap();

    assert_eq!(response.count, 1);
    assert_eq!(fetcher.calls(), 0);
}
