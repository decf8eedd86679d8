//! DOAJ articles API
//!
//! <https://doaj.org/api/search/articles/{query}>. The query rides in the
//! path, percent-encoded by reqwest when the URL is assembled.

use crate::adapter::{AdapterQuery, SourceAdapter, SourceRequest};
use citeguard_common::errors::Result;
use citeguard_index::Paper;
use serde::Deserialize;

pub struct DoajAdapter;

impl DoajAdapter {
    pub fn new() -> Self {
        Self
    }
}

impl Default for DoajAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Deserialize)]
struct DoajResponse {
    #[serde(default)]
    results: Vec<DoajResult>,
}

#[derive(Deserialize)]
struct DoajResult {
    bibjson: Option<DoajBibjson>,
}

#[derive(Deserialize)]
struct DoajBibjson {
    title: Option<String>,
    #[serde(rename = "abstract")]
    abstract_text: Option<String>,
    #[serde(default)]
    author: Vec<DoajAuthor>,
    #[serde(default)]
    identifier: Vec<DoajIdentifier>,
    year: Option<String>,
    month: Option<String>,
    #[serde(default)]
    link: Vec<DoajLink>,
}

#[derive(Deserialize)]
struct DoajAuthor {
    name: Option<String>,
}

#[derive(Deserialize)]
struct DoajIdentifier {
    #[serde(rename = "type")]
    id_type: Option<String>,
    id: Option<String>,
}

#[derive(Deserialize)]
struct DoajLink {
    url: Option<String>,
}

impl SourceAdapter for DoajAdapter {
    fn tag(&self) -> &'static str {
        "doaj"
    }

    fn build_request(&self, query: &AdapterQuery) -> SourceRequest {
        let needle: String = format!("{} {}", query.theme, query.query)
            .chars()
            .map(|c| if c == '/' { ' ' } else { c })
            .collect();
        SourceRequest::new(format!("https://doaj.org/api/search/articles/{}", needle))
            .param("pageSize", query.limit.to_string())
    }

    fn parse_response(&self, bytes: &[u8], _content_type: &str) -> Result<Vec<Paper>> {
        let response: DoajResponse = serde_json::from_slice(bytes)?;

        Ok(response
            .results
            .into_iter()
            .filter_map(|result| {
                let bibjson = result.bibjson?;
                let title = bibjson.title?.trim().to_string();
                if title.is_empty() {
                    return None;
                }

                let doi = bibjson
                    .identifier
                    .iter()
                    .find(|id| id.id_type.as_deref() == Some("doi"))
                    .and_then(|id| id.id.clone())
                    .unwrap_or_default();

                let date = match (bibjson.year.as_deref(), bibjson.month.as_deref()) {
                    (Some(y), Some(m)) => format!("{}-{:0>2}", y, m),
                    (Some(y), None) => y.to_string(),
                    _ => String::new(),
                };

                Some(Paper::new(
                    title,
                    bibjson.abstract_text.unwrap_or_default(),
                    bibjson.author.into_iter().filter_map(|a| a.name).collect(),
                    self.tag().to_string(),
                    "article".to_string(),
                    date,
                    doi,
                    bibjson
                        .link
                        .into_iter()
                        .find_map(|l| l.url)
                        .unwrap_or_default(),
                ))
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "results": [
            {
                "bibjson": {
                    "title": "Open Access Trends",
                    "abstract": "We study open access publication growth.",
                    "author": [{"name": "Tim Berners-Lee"}],
                    "identifier": [
                        {"type": "eissn", "id": "1234-5678"},
                        {"type": "doi", "id": "10.3333/oa"}
                    ],
                    "year": "2019",
                    "month": "7",
                    "link": [{"url": "https://doaj.org/article/abc"}]
                }
            }
        ]
    }"#;

    #[test]
    fn test_parse_sample() {
        let adapter = DoajAdapter::new();
        let papers = adapter.parse_response(SAMPLE.as_bytes(), "application/json").unwrap();

        assert_eq!(papers.len(), 1);
        assert_eq!(papers[0].doi, "10.3333/oa");
        assert_eq!(papers[0].publication_date, "2019-07");
        assert_eq!(papers[0].url, "https://doaj.org/article/abc");
    }

    #[test]
    fn test_query_slash_folded_out_of_path() {
        let adapter = DoajAdapter::new();
        let request = adapter.build_request(&AdapterQuery {
            query: "tcp/ip stacks".into(),
            theme: "networks".into(),
            language: "en".into(),
            limit: 5,
        });
        assert!(!request.url["https://doaj.org/api/search/articles/".len()..].contains('/'));
    }
}
