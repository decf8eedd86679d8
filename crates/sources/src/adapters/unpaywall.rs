//! Unpaywall search API
//!
//! <https://api.unpaywall.org/v2/search>. Requires a contact email; skipped
//! when unconfigured. The search surface carries no abstracts, so most hits
//! only survive downstream when another source supplies the same paper with
//! one.

use crate::adapter::{AdapterQuery, SourceAdapter, SourceRequest};
use citeguard_common::errors::Result;
use citeguard_index::Paper;
use serde::Deserialize;

pub struct UnpaywallAdapter {
    email: Option<String>,
}

impl UnpaywallAdapter {
    pub fn new(email: Option<String>) -> Self {
        Self { email }
    }
}

#[derive(Deserialize)]
struct UnpaywallResponse {
    #[serde(default)]
    results: Vec<UnpaywallResult>,
}

#[derive(Deserialize)]
struct UnpaywallResult {
    response: Option<UnpaywallWork>,
}

#[derive(Deserialize)]
struct UnpaywallWork {
    title: Option<String>,
    #[serde(default)]
    z_authors: Option<Vec<UnpaywallAuthor>>,
    doi: Option<String>,
    doi_url: Option<String>,
    published_date: Option<String>,
    genre: Option<String>,
}

#[derive(Deserialize)]
struct UnpaywallAuthor {
    given: Option<String>,
    family: Option<String>,
}

impl SourceAdapter for UnpaywallAdapter {
    fn tag(&self) -> &'static str {
        "unpaywall"
    }

    fn configured(&self) -> bool {
        self.email.is_some()
    }

    fn build_request(&self, query: &AdapterQuery) -> SourceRequest {
        let mut request = SourceRequest::new("https://api.unpaywall.org/v2/search")
            .param("query", format!("{} {}", query.theme, query.query));
        if let Some(email) = &self.email {
            request = request.param("email", email.clone());
        }
        request
    }

    fn parse_response(&self, bytes: &[u8], _content_type: &str) -> Result<Vec<Paper>> {
        let response: UnpaywallResponse = serde_json::from_slice(bytes)?;

        Ok(response
            .results
            .into_iter()
            .filter_map(|result| {
                let work = result.response?;
                let title = work.title?.trim().to_string();
                if title.is_empty() {
                    return None;
                }

                let authors = work
                    .z_authors
                    .unwrap_or_default()
                    .into_iter()
                    .map(|a| {
                        [a.given.as_deref(), a.family.as_deref()]
                            .into_iter()
                            .flatten()
                            .collect::<Vec<_>>()
                            .join(" ")
                    })
                    .filter(|name| !name.is_empty())
                    .collect();

                Some(Paper::new(
                    title,
                    String::new(),
                    authors,
                    self.tag().to_string(),
                    work.genre.unwrap_or_else(|| "article".to_string()),
                    work.published_date.unwrap_or_default(),
                    work.doi.unwrap_or_default(),
                    work.doi_url.unwrap_or_default(),
                ))
            })
            .collect())
    }
}
