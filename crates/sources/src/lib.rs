//! CiteGuard External Sources
//!
//! Federated access to twelve bibliographic APIs behind a shared
//! template-method driver:
//! - per-source token-bucket rate limiting (in-process or redis-backed)
//! - per-source circuit breaking (closed / open / half-open)
//! - parallel fan-out with a global deadline and stable deduplication

pub mod adapter;
pub mod adapters;
pub mod circuit;
pub mod federator;
pub mod rate;

pub use adapter::{AdapterEnvelope, AdapterQuery, SourceAdapter, SourceDriver, SourceRequest};
pub use adapters::build_adapters;
pub use circuit::{CircuitBreaker, CircuitSnapshot, CircuitState};
pub use federator::{FederationOutcome, Federator, SourceFetcher};
pub use rate::{InMemoryRateBackend, RateBackend, RedisRateBackend, SourceRateLimiter};
