//! External source adapter template
//!
//! Every bibliographic source implements two hooks — `build_request` and
//! `parse_response` — and the shared driver does the rest: rate limiting,
//! circuit breaking, the HTTP call with a per-source timeout, and failure
//! classification. Adapters never raise; errors travel in the envelope.

use crate::circuit::CircuitBreaker;
use crate::rate::SourceRateLimiter;
use citeguard_common::errors::Result;
use citeguard_common::metrics;
use citeguard_index::Paper;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

/// Query handed to every adapter
#[derive(Debug, Clone)]
pub struct AdapterQuery {
    pub query: String,
    pub theme: String,
    pub language: String,
    pub limit: usize,
}

/// Request description returned by `build_request`
#[derive(Debug, Clone)]
pub struct SourceRequest {
    pub url: String,
    pub params: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
}

impl SourceRequest {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            params: Vec::new(),
            headers: Vec::new(),
        }
    }

    pub fn param(mut self, key: &str, value: impl Into<String>) -> Self {
        self.params.push((key.to_string(), value.into()));
        self
    }

    pub fn header(mut self, key: &str, value: impl Into<String>) -> Self {
        self.headers.push((key.to_string(), value.into()));
        self
    }
}

/// Per-source logic: request shaping and response parsing
pub trait SourceAdapter: Send + Sync {
    /// Stable source tag (also the registry key)
    fn tag(&self) -> &'static str;

    /// False when a required key or contact is unconfigured; the driver
    /// then skips the source with `ok = true` and no papers.
    fn configured(&self) -> bool {
        true
    }

    fn build_request(&self, query: &AdapterQuery) -> SourceRequest;

    fn parse_response(&self, bytes: &[u8], content_type: &str) -> Result<Vec<Paper>>;
}

/// Result envelope; adapters never raise
#[derive(Debug)]
pub struct AdapterEnvelope {
    pub source: &'static str,
    pub papers: Vec<Paper>,
    pub ok: bool,
    pub latency_ms: u64,
    pub error: Option<String>,
}

impl AdapterEnvelope {
    fn skipped(source: &'static str) -> Self {
        Self {
            source,
            papers: Vec::new(),
            ok: true,
            latency_ms: 0,
            error: None,
        }
    }

    fn failed(source: &'static str, latency_ms: u64, error: impl Into<String>) -> Self {
        Self {
            source,
            papers: Vec::new(),
            ok: false,
            latency_ms,
            error: Some(error.into()),
        }
    }
}

/// Ensures a breaker-admitted call settles its circuit exactly once, even
/// when the federator cancels the future mid-flight: a drop without an
/// explicit outcome counts as a failure.
struct CircuitGuard<'a> {
    breaker: &'a CircuitBreaker,
    source: &'static str,
    settled: bool,
}

impl<'a> CircuitGuard<'a> {
    fn new(breaker: &'a CircuitBreaker, source: &'static str) -> Self {
        Self {
            breaker,
            source,
            settled: false,
        }
    }

    fn success(mut self) {
        self.breaker.on_success(self.source);
        self.settled = true;
    }

    fn failure(mut self) {
        self.breaker.on_failure(self.source);
        self.settled = true;
    }

    /// Settle without touching the breaker (non-fatal 4xx)
    fn disarm(mut self) {
        self.settled = true;
    }
}

impl Drop for CircuitGuard<'_> {
    fn drop(&mut self) {
        if !self.settled {
            self.breaker.on_failure(self.source);
        }
    }
}

/// Shared driver executing the template around the two adapter hooks.
pub struct SourceDriver {
    http: reqwest::Client,
    limiter: Arc<SourceRateLimiter>,
    breaker: Arc<CircuitBreaker>,
    timeout: Duration,
}

impl SourceDriver {
    pub fn new(
        http: reqwest::Client,
        limiter: Arc<SourceRateLimiter>,
        breaker: Arc<CircuitBreaker>,
        timeout: Duration,
    ) -> Self {
        Self {
            http,
            limiter,
            breaker,
            timeout,
        }
    }

    pub fn breaker(&self) -> &Arc<CircuitBreaker> {
        &self.breaker
    }

    pub fn limiter(&self) -> &Arc<SourceRateLimiter> {
        &self.limiter
    }

    pub async fn call(&self, adapter: &dyn SourceAdapter, query: &AdapterQuery) -> AdapterEnvelope {
        let source = adapter.tag();

        if !adapter.configured() {
            debug!(source, "Source unconfigured; skipping");
            return AdapterEnvelope::skipped(source);
        }

        if !self.limiter.try_acquire(source).await {
            metrics::record_adapter_call(source, false, 0.0);
            return AdapterEnvelope::failed(source, 0, "rate_limited");
        }

        if !self.breaker.allow(source) {
            metrics::record_adapter_call(source, false, 0.0);
            return AdapterEnvelope::failed(source, 0, "circuit_open");
        }

        let guard = CircuitGuard::new(&self.breaker, source);
        let start = Instant::now();
        let envelope = self.execute(adapter, query, guard, start).await;
        metrics::record_adapter_call(source, envelope.ok, start.elapsed().as_secs_f64());
        envelope
    }

    async fn execute(
        &self,
        adapter: &dyn SourceAdapter,
        query: &AdapterQuery,
        guard: CircuitGuard<'_>,
        start: Instant,
    ) -> AdapterEnvelope {
        let source = adapter.tag();
        let request = adapter.build_request(query);

        let mut builder = self
            .http
            .get(&request.url)
            .query(&request.params)
            .timeout(self.timeout);
        for (key, value) in &request.headers {
            builder = builder.header(key, value);
        }

        let response = match builder.send().await {
            Ok(response) => response,
            Err(e) => {
                let latency = start.elapsed().as_millis() as u64;
                guard.failure();
                let kind = if e.is_timeout() { "timeout" } else { "network" };
                debug!(source, error = %e, "Source call failed");
                return AdapterEnvelope::failed(source, latency, kind);
            }
        };

        let status = response.status();
        let latency = start.elapsed().as_millis() as u64;

        if !status.is_success() {
            if status.as_u16() == 429 || status.is_server_error() {
                guard.failure();
            } else {
                // Other 4xx: the request was wrong for this source, not a
                // source outage; no circuit increment
                guard.disarm();
            }
            return AdapterEnvelope::failed(source, latency, format!("http_{}", status.as_u16()));
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();

        let bytes = match response.bytes().await {
            Ok(bytes) => bytes,
            Err(e) => {
                let latency = start.elapsed().as_millis() as u64;
                guard.failure();
                debug!(source, error = %e, "Source body read failed");
                return AdapterEnvelope::failed(source, latency, "network");
            }
        };

        match adapter.parse_response(&bytes, &content_type) {
            Ok(papers) => {
                guard.success();
                let latency = start.elapsed().as_millis() as u64;
                debug!(source, papers = papers.len(), latency_ms = latency, "Source call ok");
                AdapterEnvelope {
                    source,
                    papers,
                    ok: true,
                    latency_ms: latency,
                    error: None,
                }
            }
            Err(e) => {
                let latency = start.elapsed().as_millis() as u64;
                guard.failure();
                debug!(source, error = %e, "Source response unparseable");
                AdapterEnvelope::failed(source, latency, "parse")
            }
        }
    }
}
