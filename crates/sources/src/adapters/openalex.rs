//! OpenAlex works API
//!
//! <https://api.openalex.org/works>. Abstracts are stored as an inverted
//! index (word -> positions) and have to be reassembled. A mailto parameter
//! moves requests into the polite pool.

use crate::adapter::{AdapterQuery, SourceAdapter, SourceRequest};
use citeguard_common::errors::Result;
use citeguard_index::Paper;
use serde::Deserialize;
use std::collections::HashMap;

pub struct OpenAlexAdapter {
    mailto: Option<String>,
}

impl OpenAlexAdapter {
    pub fn new(mailto: Option<String>) -> Self {
        Self { mailto }
    }
}

#[derive(Deserialize)]
struct OpenAlexResponse {
    #[serde(default)]
    results: Vec<OpenAlexWork>,
}

#[derive(Deserialize)]
struct OpenAlexWork {
    display_name: Option<String>,
    abstract_inverted_index: Option<HashMap<String, Vec<usize>>>,
    #[serde(default)]
    authorships: Vec<OpenAlexAuthorship>,
    doi: Option<String>,
    id: Option<String>,
    publication_date: Option<String>,
    #[serde(rename = "type")]
    work_type: Option<String>,
}

#[derive(Deserialize)]
struct OpenAlexAuthorship {
    author: Option<OpenAlexAuthor>,
}

#[derive(Deserialize)]
struct OpenAlexAuthor {
    display_name: Option<String>,
}

/// Rebuild the abstract from its inverted index: place each word at its
/// recorded positions, then join.
fn reassemble_abstract(inverted: &HashMap<String, Vec<usize>>) -> String {
    let mut positions: Vec<(usize, &str)> = inverted
        .iter()
        .flat_map(|(word, indices)| indices.iter().map(move |&i| (i, word.as_str())))
        .collect();
    positions.sort_by_key(|(i, _)| *i);
    positions
        .into_iter()
        .map(|(_, word)| word)
        .collect::<Vec<_>>()
        .join(" ")
}

impl SourceAdapter for OpenAlexAdapter {
    fn tag(&self) -> &'static str {
        "openalex"
    }

    fn build_request(&self, query: &AdapterQuery) -> SourceRequest {
        let mut request = SourceRequest::new("https://api.openalex.org/works")
            .param("search", format!("{} {}", query.theme, query.query))
            .param("per-page", query.limit.to_string());
        if let Some(mailto) = &self.mailto {
            request = request.param("mailto", mailto.clone());
        }
        request
    }

    fn parse_response(&self, bytes: &[u8], _content_type: &str) -> Result<Vec<Paper>> {
        let response: OpenAlexResponse = serde_json::from_slice(bytes)?;

        Ok(response
            .results
            .into_iter()
            .filter_map(|work| {
                let title = work.display_name?.trim().to_string();
                if title.is_empty() {
                    return None;
                }

                let abstract_text = work
                    .abstract_inverted_index
                    .map(|idx| reassemble_abstract(&idx))
                    .unwrap_or_default();

                Some(Paper::new(
                    title,
                    abstract_text,
                    work.authorships
                        .into_iter()
                        .filter_map(|a| a.author.and_then(|a| a.display_name))
                        .collect(),
                    self.tag().to_string(),
                    work.work_type.unwrap_or_else(|| "article".to_string()),
                    work.publication_date.unwrap_or_default(),
                    work.doi.unwrap_or_default(),
                    work.id.unwrap_or_default(),
                ))
            })
            .collect())
    }
}
