//! Zenodo records API
//!
//! <https://zenodo.org/api/records>. Descriptions frequently carry HTML;
//! it is left for downstream normalization to strip.

use crate::adapter::{AdapterQuery, SourceAdapter, SourceRequest};
use citeguard_common::errors::Result;
use citeguard_index::Paper;
use serde::Deserialize;

pub struct ZenodoAdapter;

impl ZenodoAdapter {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ZenodoAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Deserialize)]
struct ZenodoResponse {
    hits: Option<ZenodoHits>,
}

#[derive(Deserialize)]
struct ZenodoHits {
    #[serde(default)]
    hits: Vec<ZenodoRecord>,
}

#[derive(Deserialize)]
struct ZenodoRecord {
    metadata: Option<ZenodoMetadata>,
    links: Option<ZenodoLinks>,
}

#[derive(Deserialize)]
struct ZenodoMetadata {
    title: Option<String>,
    description: Option<String>,
    #[serde(default)]
    creators: Vec<ZenodoCreator>,
    doi: Option<String>,
    publication_date: Option<String>,
    resource_type: Option<ZenodoResourceType>,
}

#[derive(Deserialize)]
struct ZenodoCreator {
    name: Option<String>,
}

#[derive(Deserialize)]
struct ZenodoResourceType {
    #[serde(rename = "type")]
    type_name: Option<String>,
}

#[derive(Deserialize)]
struct ZenodoLinks {
    self_html: Option<String>,
}

impl SourceAdapter for ZenodoAdapter {
    fn tag(&self) -> &'static str {
        "zenodo"
    }

    fn build_request(&self, query: &AdapterQuery) -> SourceRequest {
        SourceRequest::new("https://zenodo.org/api/records")
            .param("q", format!("{} {}", query.theme, query.query))
            .param("size", query.limit.to_string())
    }

    fn parse_response(&self, bytes: &[u8], _content_type: &str) -> Result<Vec<Paper>> {
        let response: ZenodoResponse = serde_json::from_slice(bytes)?;

        Ok(response
            .hits
            .map(|hits| hits.hits)
            .unwrap_or_default()
            .into_iter()
            .filter_map(|record| {
                let url = record
                    .links
                    .and_then(|l| l.self_html)
                    .unwrap_or_default();
                let metadata = record.metadata?;
                let title = metadata.title?.trim().to_string();
                if title.is_empty() {
                    return None;
                }

                Some(Paper::new(
                    title,
                    metadata.description.unwrap_or_default(),
                    metadata.creators.into_iter().filter_map(|c| c.name).collect(),
                    self.tag().to_string(),
                    metadata
                        .resource_type
                        .and_then(|rt| rt.type_name)
                        .unwrap_or_else(|| "dataset".to_string()),
                    metadata.publication_date.unwrap_or_default(),
                    metadata.doi.unwrap_or_default(),
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
        "hits": {
            "hits": [
                {
                    "metadata": {
                        "title": "Benchmark Corpus v2",
                        "description": "<p>An annotated benchmark corpus.</p>",
                        "creators": [{"name": "Knuth, Donald"}],
                        "doi": "10.5281/zenodo.1",
                        "publication_date": "2023-01-20",
                        "resource_type": {"type": "publication"}
                    },
                    "links": {"self_html": "https://zenodo.org/records/1"}
                }
            ]
        }
    }"#;

    #[test]
    fn test_parse_sample() {
        let adapter = ZenodoAdapter::new();
        let papers = adapter.parse_response(SAMPLE.as_bytes(), "application/json").unwrap();

        assert_eq!(papers.len(), 1);
        assert_eq!(papers[0].title, "Benchmark Corpus v2");
        assert_eq!(papers[0].authors, vec!["Knuth, Donald"]);
        assert_eq!(papers[0].document_type, "publication");
        assert_eq!(papers[0].url, "https://zenodo.org/records/1");
    }

    #[test]
    fn test_recordless_response() {
        let adapter = ZenodoAdapter::new();
        let papers = adapter.parse_response(b"{}", "application/json").unwrap();
        assert!(papers.is_empty());
    }
}
