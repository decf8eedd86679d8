//! Crossref works API
//!
//! <https://api.crossref.org/works>. Abstracts arrive as JATS XML; the
//! markup is left in place because normalization strips it downstream.
//! Crossref etiquette asks polite callers to identify themselves with a
//! mailto parameter.

use crate::adapter::{AdapterQuery, SourceAdapter, SourceRequest};
use citeguard_common::errors::Result;
use citeguard_index::Paper;
use serde::Deserialize;

pub struct CrossrefAdapter {
    mailto: Option<String>,
}

impl CrossrefAdapter {
    pub fn new(mailto: Option<String>) -> Self {
        Self { mailto }
    }
}

#[derive(Deserialize)]
struct CrossrefResponse {
    message: CrossrefMessage,
}

#[derive(Deserialize)]
struct CrossrefMessage {
    #[serde(default)]
    items: Vec<CrossrefItem>,
}

#[derive(Deserialize)]
struct CrossrefItem {
    #[serde(default)]
    title: Vec<String>,
    #[serde(rename = "abstract")]
    abstract_text: Option<String>,
    #[serde(default)]
    author: Vec<CrossrefAuthor>,
    #[serde(rename = "DOI")]
    doi: Option<String>,
    #[serde(rename = "URL")]
    url: Option<String>,
    #[serde(rename = "type")]
    item_type: Option<String>,
    issued: Option<CrossrefDate>,
}

#[derive(Deserialize)]
struct CrossrefAuthor {
    given: Option<String>,
    family: Option<String>,
}

#[derive(Deserialize)]
struct CrossrefDate {
    #[serde(rename = "date-parts", default)]
    date_parts: Vec<Vec<Option<i32>>>,
}

impl CrossrefDate {
    fn to_iso(&self) -> String {
        let Some(parts) = self.date_parts.first() else {
            return String::new();
        };
        let mut values = parts.iter().flatten();
        match (values.next(), values.next(), values.next()) {
            (Some(y), Some(m), Some(d)) => format!("{:04}-{:02}-{:02}", y, m, d),
            (Some(y), Some(m), None) => format!("{:04}-{:02}", y, m),
            (Some(y), None, None) => format!("{:04}", y),
            _ => String::new(),
        }
    }
}

impl SourceAdapter for CrossrefAdapter {
    fn tag(&self) -> &'static str {
        "crossref"
    }

    fn build_request(&self, query: &AdapterQuery) -> SourceRequest {
        let mut request = SourceRequest::new("https://api.crossref.org/works")
            .param("query", format!("{} {}", query.theme, query.query))
            .param("rows", query.limit.to_string())
            .param(
                "select",
                "title,abstract,author,DOI,URL,type,issued",
            );
        if let Some(mailto) = &self.mailto {
            request = request
                .param("mailto", mailto.clone())
                .header("User-Agent", format!("citeguard (mailto:{})", mailto));
        }
        request
    }

    fn parse_response(&self, bytes: &[u8], _content_type: &str) -> Result<Vec<Paper>> {
        let response: CrossrefResponse = serde_json::from_slice(bytes)?;

        Ok(response
            .message
            .items
            .into_iter()
            .filter_map(|item| {
                let title = item.title.first()?.trim().to_string();
                if title.is_empty() {
                    return None;
                }
                let authors = item
                    .author
                    .iter()
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
                    item.abstract_text.unwrap_or_default(),
                    authors,
                    self.tag().to_string(),
                    item.item_type.unwrap_or_else(|| "article".to_string()),
                    item.issued.map(|d| d.to_iso()).unwrap_or_default(),
                    item.doi.unwrap_or_default(),
                    item.url.unwrap_or_default(),
                ))
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "message": {
            "items": [
                {
                    "title": ["Deep Learning for Vision"],
                    "abstract": "<jats:p>A survey of convolutional models.</jats:p>",
                    "author": [{"given": "Ada", "family": "Lovelace"}],
                    "DOI": "10.1234/dl",
                    "URL": "https://doi.org/10.1234/dl",
                    "type": "journal-article",
                    "issued": {"date-parts": [[2023, 4, 2]]}
                },
                {
                    "title": [],
                    "DOI": "10.1234/untitled"
                }
            ]
        }
    }"#;

    #[test]
    fn test_parse_sample() {
        let adapter = CrossrefAdapter::new(None);
        let papers = adapter.parse_response(SAMPLE.as_bytes(), "application/json").unwrap();

        assert_eq!(papers.len(), 1);
        let paper = &papers[0];
        assert_eq!(paper.title, "Deep Learning for Vision");
        assert_eq!(paper.authors, vec!["Ada Lovelace"]);
        assert_eq!(paper.doi, "10.1234/dl");
        assert_eq!(paper.publication_date, "2023-04-02");
        assert_eq!(paper.source, "crossref");
    }

    #[test]
    fn test_request_includes_mailto_when_configured() {
        let adapter = CrossrefAdapter::new(Some("ops@example.org".into()));
        let request = adapter.build_request(&AdapterQuery {
            query: "neural networks".into(),
            theme: "ml".into(),
            language: "en".into(),
            limit: 5,
        });

        assert!(request.params.iter().any(|(k, _)| k == "mailto"));
        assert!(request.headers.iter().any(|(k, _)| k == "User-Agent"));
    }

    #[test]
    fn test_parse_garbage_is_error() {
        let adapter = CrossrefAdapter::new(None);
        assert!(adapter.parse_response(b"not json", "text/plain").is_err());
    }
}
