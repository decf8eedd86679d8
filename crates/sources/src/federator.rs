//! Source federator
//!
//! Fans a query out to every permitted adapter in parallel, awaits them
//! under a global deadline, and merges the results: per-source cap, then
//! concatenation in adapter declaration order, then stable dedup by content
//! hash. Adapters that miss the deadline are cancelled and reported failed;
//! the cancellation itself settles their circuit exactly once.

use crate::adapter::{AdapterEnvelope, AdapterQuery, SourceAdapter, SourceDriver};
use async_trait::async_trait;
use citeguard_index::{ContentHash, Paper};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::info;

/// Outcome of one fan-out: merged papers plus per-source envelopes
#[derive(Debug, Default)]
pub struct FederationOutcome {
    pub papers: Vec<Paper>,
    pub envelopes: Vec<AdapterEnvelope>,
}

/// Federation seam; the orchestrator depends on this, tests mock it.
#[async_trait]
pub trait SourceFetcher: Send + Sync {
    async fn fetch(
        &self,
        query: &str,
        theme: &str,
        language: &str,
        allowed_sources: Option<&[String]>,
    ) -> FederationOutcome;
}

pub struct Federator {
    adapters: Vec<Arc<dyn SourceAdapter>>,
    driver: Arc<SourceDriver>,
    global_deadline: Duration,
    per_source_cap: usize,
}

impl Federator {
    pub fn new(
        adapters: Vec<Arc<dyn SourceAdapter>>,
        driver: Arc<SourceDriver>,
        global_deadline: Duration,
        per_source_cap: usize,
    ) -> Self {
        Self {
            adapters,
            driver,
            global_deadline,
            per_source_cap,
        }
    }

    pub fn source_tags(&self) -> Vec<&'static str> {
        self.adapters.iter().map(|a| a.tag()).collect()
    }

    fn permitted(&self, allowed: Option<&[String]>) -> Vec<Arc<dyn SourceAdapter>> {
        self.adapters
            .iter()
            .filter(|adapter| match allowed {
                None => true,
                Some(filter) => filter
                    .iter()
                    .any(|tag| tag.eq_ignore_ascii_case(adapter.tag())),
            })
            .cloned()
            .collect()
    }
}

#[async_trait]
impl SourceFetcher for Federator {
    async fn fetch(
        &self,
        query: &str,
        theme: &str,
        language: &str,
        allowed_sources: Option<&[String]>,
    ) -> FederationOutcome {
        let adapters = self.permitted(allowed_sources);
        if adapters.is_empty() {
            return FederationOutcome::default();
        }

        let adapter_query = AdapterQuery {
            query: query.to_string(),
            theme: theme.to_string(),
            language: language.to_string(),
            limit: self.per_source_cap,
        };

        // Fan out; tasks run concurrently, the loop below only collects
        let mut handles = Vec::with_capacity(adapters.len());
        for adapter in adapters {
            let driver = Arc::clone(&self.driver);
            let task_query = adapter_query.clone();
            let tag = adapter.tag();
            handles.push((
                tag,
                tokio::spawn(async move { driver.call(adapter.as_ref(), &task_query).await }),
            ));
        }

        let deadline = Instant::now() + self.global_deadline;
        let mut envelopes = Vec::with_capacity(handles.len());
        for (tag, mut handle) in handles {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match tokio::time::timeout(remaining, &mut handle).await {
                Ok(Ok(envelope)) => envelopes.push(envelope),
                Ok(Err(join_error)) => {
                    tracing::warn!(source = tag, error = %join_error, "Source task failed");
                    envelopes.push(AdapterEnvelope {
                        source: tag,
                        papers: Vec::new(),
                        ok: false,
                        latency_ms: self.global_deadline.as_millis() as u64,
                        error: Some("task_failed".to_string()),
                    });
                }
                Err(_elapsed) => {
                    // Cancelling drops the in-flight call; its guard settles
                    // the circuit
                    handle.abort();
                    envelopes.push(AdapterEnvelope {
                        source: tag,
                        papers: Vec::new(),
                        ok: false,
                        latency_ms: self.global_deadline.as_millis() as u64,
                        error: Some("deadline".to_string()),
                    });
                }
            }
        }

        let papers = merge(&mut envelopes, self.per_source_cap);

        let failed = envelopes.iter().filter(|e| !e.ok).count();
        info!(
            sources = envelopes.len(),
            failed,
            papers = papers.len(),
            "Federation fan-out complete"
        );

        FederationOutcome { papers, envelopes }
    }
}

/// Cap each envelope, concatenate in declaration order, dedupe by content
/// hash preserving first-seen order.
fn merge(envelopes: &mut [AdapterEnvelope], per_source_cap: usize) -> Vec<Paper> {
    let mut seen: HashSet<ContentHash> = HashSet::new();
    let mut merged = Vec::new();

    for envelope in envelopes.iter_mut() {
        envelope.papers.truncate(per_source_cap);
        for paper in &envelope.papers {
            if seen.insert(paper.content_hash) {
                merged.push(paper.clone());
            }
        }
    }

    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paper(source: &str, title: &str, abstract_text: &str) -> Paper {
        Paper::new(
            title.to_string(),
            abstract_text.to_string(),
            vec![],
            source.to_string(),
            "article".into(),
            String::new(),
            String::new(),
            String::new(),
        )
    }

    fn envelope(source: &'static str, papers: Vec<Paper>) -> AdapterEnvelope {
        AdapterEnvelope {
            source,
            papers,
            ok: true,
            latency_ms: 5,
            error: None,
        }
    }

    #[test]
    fn test_merge_dedupes_across_sources_first_seen_wins() {
        let mut envelopes = vec![
            envelope(
                "crossref",
                vec![paper("crossref", "Shared Title", "Shared abstract body.")],
            ),
            envelope(
                "arxiv",
                vec![
                    paper("arxiv", "shared title", "shared ABSTRACT body"),
                    paper("arxiv", "Unique", "A different abstract."),
                ],
            ),
        ];

        let merged = merge(&mut envelopes, 5);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].source, "crossref");
        assert_eq!(merged[1].title, "Unique");
    }

    #[test]
    fn test_merge_applies_per_source_cap_before_concat() {
        let papers: Vec<Paper> = (0..10)
            .map(|i| paper("zenodo", &format!("Title {}", i), &format!("Abstract {}", i)))
            .collect();
        let mut envelopes = vec![envelope("zenodo", papers)];

        let merged = merge(&mut envelopes, 3);
        assert_eq!(merged.len(), 3);
        assert_eq!(envelopes[0].papers.len(), 3);
    }

    #[test]
    fn test_merge_preserves_declaration_order() {
        let mut envelopes = vec![
            envelope("crossref", vec![paper("crossref", "First", "From crossref.")]),
            envelope("arxiv", vec![paper("arxiv", "Second", "From arxiv.")]),
        ];

        let merged = merge(&mut envelopes, 5);
        assert_eq!(merged[0].source, "crossref");
        assert_eq!(merged[1].source, "arxiv");
    }
}
