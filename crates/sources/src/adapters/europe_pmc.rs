//! Europe PMC REST API
//!
//! <https://www.ebi.ac.uk/europepmc/webservices/rest/search>, unrestricted
//! (all sources, not just the PubMed mirror the `pubmed` adapter scopes to).

use crate::adapter::{AdapterQuery, SourceAdapter, SourceRequest};
use citeguard_common::errors::Result;
use citeguard_index::Paper;
use serde::Deserialize;

pub struct EuropePmcAdapter;

impl EuropePmcAdapter {
    pub fn new() -> Self {
        Self
    }
}

impl Default for EuropePmcAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct EpmcResponse {
    result_list: Option<EpmcResultList>,
}

#[derive(Deserialize)]
struct EpmcResultList {
    #[serde(default)]
    result: Vec<EpmcRecord>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct EpmcRecord {
    title: Option<String>,
    abstract_text: Option<String>,
    author_string: Option<String>,
    doi: Option<String>,
    first_publication_date: Option<String>,
    pub_type: Option<String>,
    #[serde(default)]
    full_text_url_list: Option<EpmcUrlList>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct EpmcUrlList {
    #[serde(default)]
    full_text_url: Vec<EpmcUrl>,
}

#[derive(Deserialize)]
struct EpmcUrl {
    url: Option<String>,
}

impl SourceAdapter for EuropePmcAdapter {
    fn tag(&self) -> &'static str {
        "europe_pmc"
    }

    fn build_request(&self, query: &AdapterQuery) -> SourceRequest {
        SourceRequest::new("https://www.ebi.ac.uk/europepmc/webservices/rest/search")
            .param("query", format!("{} {}", query.theme, query.query))
            .param("format", "json")
            .param("resultType", "core")
            .param("pageSize", query.limit.to_string())
    }

    fn parse_response(&self, bytes: &[u8], _content_type: &str) -> Result<Vec<Paper>> {
        let response: EpmcResponse = serde_json::from_slice(bytes)?;

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
                    .full_text_url_list
                    .and_then(|list| list.full_text_url.into_iter().next())
                    .and_then(|u| u.url)
                    .unwrap_or_default();

                Some(Paper::new(
                    title,
                    record.abstract_text.unwrap_or_default(),
                    authors,
                    self.tag().to_string(),
                    record.pub_type.unwrap_or_else(|| "article".to_string()),
                    record.first_publication_date.unwrap_or_default(),
                    record.doi.unwrap_or_default(),
                    url,
                ))
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "resultList": {
            "result": [
                {
                    "title": "CRISPR screening at scale.",
                    "abstractText": "We describe pooled genetic screens.",
                    "authorString": "Doudna J, Charpentier E.",
                    "doi": "10.7777/crispr",
                    "firstPublicationDate": "2020-02-14",
                    "pubType": "review",
                    "fullTextUrlList": {
                        "fullTextUrl": [{"url": "https://europepmc.org/article/MED/1"}]
                    }
                }
            ]
        }
    }"#;

    #[test]
    fn test_parse_sample() {
        let adapter = EuropePmcAdapter::new();
        let papers = adapter.parse_response(SAMPLE.as_bytes(), "application/json").unwrap();

        assert_eq!(papers.len(), 1);
        assert_eq!(papers[0].title, "CRISPR screening at scale.");
        assert_eq!(papers[0].authors, vec!["Doudna J", "Charpentier E"]);
        assert_eq!(papers[0].document_type, "review");
        assert_eq!(papers[0].url, "https://europepmc.org/article/MED/1");
    }

    #[test]
    fn test_unrestricted_query() {
        let adapter = EuropePmcAdapter::new();
        let request = adapter.build_request(&AdapterQuery {
            query: "protein".into(),
            theme: "biology".into(),
            language: "en".into(),
            limit: 5,
        });
        let query_param = request
            .params
            .iter()
            .find(|(k, _)| k == "query")
            .map(|(_, v)| v.clone())
            .unwrap();
        assert!(!query_param.contains("SRC:MED"));
    }
}
