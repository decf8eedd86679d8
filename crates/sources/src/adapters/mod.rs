//! Concrete bibliographic source adapters
//!
//! One module per source, each implementing the two template hooks. The
//! registry order below is the declaration order the federator preserves
//! when concatenating results.

mod arxiv;
mod core_ac;
mod crossref;
mod doaj;
mod europe_pmc;
mod hal;
mod internet_archive;
mod openalex;
mod pubmed;
mod semantic_scholar;
mod unpaywall;
mod zenodo;

pub use arxiv::ArxivAdapter;
pub use core_ac::CoreAdapter;
pub use crossref::CrossrefAdapter;
pub use doaj::DoajAdapter;
pub use europe_pmc::EuropePmcAdapter;
pub use hal::HalAdapter;
pub use internet_archive::InternetArchiveAdapter;
pub use openalex::OpenAlexAdapter;
pub use pubmed::PubmedAdapter;
pub use semantic_scholar::SemanticScholarAdapter;
pub use unpaywall::UnpaywallAdapter;
pub use zenodo::ZenodoAdapter;

use crate::adapter::SourceAdapter;
use citeguard_common::config::FederationConfig;
use std::sync::Arc;

/// Build the full adapter registry in declaration order.
pub fn build_adapters(config: &FederationConfig) -> Vec<Arc<dyn SourceAdapter>> {
    vec![
        Arc::new(CrossrefAdapter::new(config.contact_email.clone())),
        Arc::new(PubmedAdapter::new(config.pubmed_api_key.clone())),
        Arc::new(SemanticScholarAdapter::new(
            config.semantic_scholar_api_key.clone(),
        )),
        Arc::new(ArxivAdapter::new()),
        Arc::new(OpenAlexAdapter::new(config.contact_email.clone())),
        Arc::new(EuropePmcAdapter::new()),
        Arc::new(DoajAdapter::new()),
        Arc::new(ZenodoAdapter::new()),
        Arc::new(CoreAdapter::new(config.core_api_key.clone())),
        Arc::new(InternetArchiveAdapter::new()),
        Arc::new(UnpaywallAdapter::new(config.unpaywall_email.clone())),
        Arc::new(HalAdapter::new()),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_order_and_size() {
        let adapters = build_adapters(&FederationConfig::default());
        let tags: Vec<&str> = adapters.iter().map(|a| a.tag()).collect();
        assert_eq!(
            tags,
            vec![
                "crossref",
                "pubmed",
                "semantic_scholar",
                "arxiv",
                "openalex",
                "europe_pmc",
                "doaj",
                "zenodo",
                "core",
                "internet_archive",
                "unpaywall",
                "hal",
            ]
        );
    }

    #[test]
    fn test_keyed_sources_unconfigured_by_default() {
        let adapters = build_adapters(&FederationConfig::default());
        for adapter in &adapters {
            match adapter.tag() {
                "core" | "unpaywall" => assert!(!adapter.configured()),
                _ => assert!(adapter.configured(), "{} should be configured", adapter.tag()),
            }
        }
    }
}
