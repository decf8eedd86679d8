//! PubMed via the Europe PMC REST gateway
//!
//! The native E-utilities need an esearch/efetch round-trip to reach
//! abstracts, which does not fit the single-request template. Europe PMC
//! mirrors PubMed (`SRC:MED`) and returns abstracts in one call, so this
//! adapter queries the mirror restricted to PubMed records. An NCBI API key,
//! when configured, is forwarded for etiquette on the shared gateway.

use crate::adapter::{AdapterQuery, SourceAdapter, SourceRequest};
use citeguard_common::errors::Result;
use citeguard_index::Paper;
use serde::Deserialize;

pub struct PubmedAdapter {
    api_key: Option<String>,
}

impl PubmedAdapter {
    pub fn new(api_key: Option<String>) -> Self {
        Self { api_key }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PubmedResponse {
    result_list: Option<PubmedResultList>,
}

#[derive(Deserialize)]
struct PubmedResultList {
    #[serde(default)]
    result: Vec<PubmedRecord>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PubmedRecord {
    title: Option<String>,
    abstract_text: Option<String>,
    author_string: Option<String>,
    doi: Option<String>,
    first_publication_date: Option<String>,
    #[serde(default)]
    pub_type_list: Option<PubTypeList>,
    pmid: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PubTypeList {
    #[serde(default)]
    pub_type: Vec<String>,
}

impl SourceAdapter for PubmedAdapter {
    fn tag(&self) -> &'static str {
        "pubmed"
    }

    fn build_request(&self, query: &AdapterQuery) -> SourceRequest {
        let mut request = SourceRequest::new(
            "https://www.ebi.ac.uk/europepmc/webservices/rest/search",
        )
        .param("query", format!("({} {}) AND SRC:MED", query.theme, query.query))
        .param("format", "json")
        .param("resultType", "core")
        .param("pageSize", query.limit.to_string());
        if let Some(key) = &self.api_key {
            request = request.param("api_key", key.clone());
        }
        request
    }

    fn parse_response(&self, bytes: &[u8], _content_type: &str) -> Result<Vec<Paper>> {
        let response: PubmedResponse = serde_json::from_slice(bytes)?;

        Ok(response
            .result_list
            .map(|list| list.result)
            .unwrap_or_default()
            .into_iter()
            .filter_map(|record| {
                let title = record.title?.trim().to_string();
                if title.is_empty() {
                    return None;
                }

                let authors = record
                    .author_string
                    .map(|joined| {
                        joined
                            .split(',')
                            .map(|name| name.trim().trim_end_matches('.').to_string())
                            .filter(|name| !name.is_empty())
                            .collect()
                    })
                    .unwrap_or_default();

                let url = record
                    .pmid
                    .map(|pmid| format!("https://pubmed.ncbi.nlm.nih.gov/{}/", pmid))
                    .unwrap_or_default();

                Some(Paper::new(
                    title,
                    record.abstract_text.unwrap_or_default(),
                    authors,
                    self.tag().to_string(),
                    record
                        .pub_type_list
                        .and_then(|list| list.pub_type.into_iter().next())
                        .unwrap_or_else(|| "article".to_string()),
                    record.first_publication_date.unwrap_or_default(),
                    record.doi.unwrap_or_default(),
                    url,
                ))
            })
            .collect())
    }
}
