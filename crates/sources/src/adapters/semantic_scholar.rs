//! Semantic Scholar Graph API
//!
//! <https://api.semanticscholar.org/graph/v1/paper/search>. Works without a
//! key at a shared rate; a configured key rides in the `x-api-key` header.

use crate::adapter::{AdapterQuery, SourceAdapter, SourceRequest};
use citeguard_common::errors::Result;
use citeguard_index::Paper;
use serde::Deserialize;

pub struct SemanticScholarAdapter {
    api_key: Option<String>,
}

impl SemanticScholarAdapter {
    pub fn new(api_key: Option<String>) -> Self {
        Self { api_key }
    }
}

#[derive(Deserialize)]
struct S2Response {
    #[serde(default)]
    data: Vec<S2Paper>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct S2Paper {
    title: Option<String>,
    #[serde(rename = "abstract")]
    abstract_text: Option<String>,
    #[serde(default)]
    authors: Vec<S2Author>,
    external_ids: Option<S2ExternalIds>,
    url: Option<String>,
    publication_date: Option<String>,
    #[serde(default)]
    publication_types: Option<Vec<String>>,
}

#[derive(Deserialize)]
struct S2Author {
    name: Option<String>,
}

#[derive(Deserialize)]
struct S2ExternalIds {
    #[serde(rename = "DOI")]
    doi: Option<String>,
}

impl SourceAdapter for SemanticScholarAdapter {
    fn tag(&self) -> &'static str {
        "semantic_scholar"
    }

    fn build_request(&self, query: &AdapterQuery) -> SourceRequest {
        let mut request = SourceRequest::new(
            "https://api.semanticscholar.org/graph/v1/paper/search",
        )
        .param("query", format!("{} {}", query.theme, query.query))
        .param("limit", query.limit.to_string())
        .param(
            "fields",
            "title,abstract,authors,externalIds,url,publicationDate,publicationTypes",
        );
        if let Some(key) = &self.api_key {
            request = request.header("x-api-key", key.clone());
        }
        request
    }

    fn parse_response(&self, bytes: &[u8], _content_type: &str) -> Result<Vec<Paper>> {
        let response: S2Response = serde_json::from_slice(bytes)?;

        Ok(response
            .data
            .into_iter()
            .filter_map(|item| {
                let title = item.title?.trim().to_string();
                if title.is_empty() {
                    return None;
                }

                Some(Paper::new(
                    title,
                    item.abstract_text.unwrap_or_default(),
                    item.authors.into_iter().filter_map(|a| a.name).collect(),
                    self.tag().to_string(),
                    item.publication_types
                        .and_then(|types| types.into_iter().next())
                        .unwrap_or_else(|| "article".to_string()),
                    item.publication_date.unwrap_or_default(),
                    item.external_ids.and_then(|ids| ids.doi).unwrap_or_default(),
                    item.url.unwrap_or_default(),
                ))
            })
            .collect())
    }
}
