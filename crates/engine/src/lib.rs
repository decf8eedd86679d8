//! CiteGuard Similarity Engine
//!
//! The end-to-end batch pipeline: normalize, cache probe, index probe,
//! federated fetch, re-embed, rank, write back. The HTTP layer consumes the
//! typed operations in `service`; everything threads through a
//! `CoreContext` constructed once at startup.

pub mod bands;
pub mod context;
pub mod orchestrator;
pub mod result_cache;
pub mod service;

pub use bands::PlagiarismBand;
pub use context::CoreContext;
pub use orchestrator::{
    run_batch, BatchOutcome, BatchRequest, BatchTelemetry, Fragment, FragmentMatches, Match,
};
pub use result_cache::{fingerprint, ResultCache};
pub use service::SimilarityService;
