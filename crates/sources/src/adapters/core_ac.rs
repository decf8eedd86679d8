//! CORE v3 works search
//!
//! <https://api.core.ac.uk/v3/search/works>. Requires an API key; when none
//! is configured the driver skips the source.

use crate::adapter::{AdapterQuery, SourceAdapter, SourceRequest};
use citeguard_common::errors::Result;
use citeguard_index::Paper;
use serde::Deserialize;

pub struct CoreAdapter {
    api_key: Option<String>,
}

impl CoreAdapter {
    pub fn new(api_key: Option<String>) -> Self {
        Self { api_key }
    }
}

#[derive(Deserialize)]
struct CoreResponse {
    #[serde(default)]
    results: Vec<CoreWork>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CoreWork {
    title: Option<String>,
    #[serde(rename = "abstract")]
    abstract_text: Option<String>,
    #[serde(default)]
    authors: Vec<CoreAuthor>,
    doi: Option<String>,
    published_date: Option<String>,
    document_type: Option<String>,
    download_url: Option<String>,
}

#[derive(Deserialize)]
struct CoreAuthor {
    name: Option<String>,
}

impl SourceAdapter for CoreAdapter {
    fn tag(&self) -> &'static str {
        "core"
    }

    fn configured(&self) -> bool {
        self.api_key.is_some()
    }

    fn build_request(&self, query: &AdapterQuery) -> SourceRequest {
        let mut request = SourceRequest::new("https://api.core.ac.uk/v3/search/works")
            .param("q", format!("{} {}", query.theme, query.query))
            .param("limit", query.limit.to_string());
        if let Some(key) = &self.api_key {
            request = request.header("Authorization", format!("Bearer {}", key));
        }
        request
    }

    fn parse_response(&self, bytes: &[u8], _content_type: &str) -> Result<Vec<Paper>> {
        let response: CoreResponse = serde_json::from_slice(bytes)?;

        Ok(response
            .results
            .into_iter()
            .filter_map(|work| {
                let title = work.title?.trim().to_string();
                if title.is_empty() {
                    return None;
                }

                Some(Paper::new(
                    title,
                    work.abstract_text.unwrap_or_default(),
                    work.authors.into_iter().filter_map(|a| a.name).collect(),
                    self.tag().to_string(),
                    work.document_type.unwrap_or_else(|| "article".to_string()),
                    work.published_date
                        .map(|d| d.chars().take(10).collect())
                        .unwrap_or_default(),
                    work.doi.unwrap_or_default(),
                    work.download_url.unwrap_or_default(),
                ))
            })
            .collect())
    }
}
