//! HAL open archive API
//!
//! <https://api.archives-ouvertes.fr/search/>. A Solr surface; fields are
//! requested explicitly and multi-valued fields arrive as arrays.

use crate::adapter::{AdapterQuery, SourceAdapter, SourceRequest};
use citeguard_common::errors::Result;
use citeguard_index::Paper;
use serde::Deserialize;

pub struct HalAdapter;

impl HalAdapter {
    pub fn new() -> Self {
        Self
    }
}

impl Default for HalAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Deserialize)]
struct HalResponse {
    response: Option<HalInner>,
}

#[derive(Deserialize)]
struct HalInner {
    #[serde(default)]
    docs: Vec<HalDoc>,
}

#[derive(Deserialize)]
struct HalDoc {
    #[serde(rename = "title_s", default)]
    titles: Vec<String>,
    #[serde(rename = "abstract_s", default)]
    abstracts: Vec<String>,
    #[serde(rename = "authFullName_s", default)]
    authors: Vec<String>,
    #[serde(rename = "doiId_s")]
    doi: Option<String>,
    #[serde(rename = "producedDate_s")]
    produced_date: Option<String>,
    #[serde(rename = "docType_s")]
    doc_type: Option<String>,
    #[serde(rename = "uri_s")]
    uri: Option<String>,
}

impl SourceAdapter for HalAdapter {
    fn tag(&self) -> &'static str {
        "hal"
    }

    fn build_request(&self, query: &AdapterQuery) -> SourceRequest {
        SourceRequest::new("https://api.archives-ouvertes.fr/search/")
            .param("q", format!("{} {}", query.theme, query.query))
            .param("wt", "json")
            .param(
                "fl",
                "title_s,abstract_s,authFullName_s,doiId_s,producedDate_s,docType_s,uri_s",
            )
            .param("rows", query.limit.to_string())
    }

    fn parse_response(&self, bytes: &[u8], _content_type: &str) -> Result<Vec<Paper>> {
        let response: HalResponse = serde_json::from_slice(bytes)?;

        Ok(response
            .response
            .map(|inner| inner.docs)
            .unwrap_or_default()
            .into_iter()
            .filter_map(|doc| {
                let title = doc.titles.into_iter().next()?.trim().to_string();
                if title.is_empty() {
                    return None;
                }

                Some(Paper::new(
                    title,
                    doc.abstracts.into_iter().next().unwrap_or_default(),
                    doc.authors,
                    self.tag().to_string(),
                    doc.doc_type.unwrap_or_else(|| "ART".to_string()),
                    doc.produced_date
                        .map(|d| d.chars().take(10).collect())
                        .unwrap_or_default(),
                    doc.doi.unwrap_or_default(),
                    doc.uri.unwrap_or_default(),
                ))
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "response": {
            "docs": [
                {
                    "title_s": ["Modèles de langage multilingues"],
                    "abstract_s": ["Nous étudions les modèles multilingues."],
                    "authFullName_s": ["Marie Curie"],
                    "doiId_s": "10.8888/hal",
                    "producedDate_s": "2022-06-01",
                    "docType_s": "ART",
                    "uri_s": "https://hal.science/hal-000001"
                }
            ]
        }
    }"#;

    #[test]
    fn test_parse_sample() {
        let adapter = HalAdapter::new();
        let papers = adapter.parse_response(SAMPLE.as_bytes(), "application/json").unwrap();

        assert_eq!(papers.len(), 1);
        assert_eq!(papers[0].title, "Modèles de langage multilingues");
        assert_eq!(papers[0].authors, vec!["Marie Curie"]);
        assert_eq!(papers[0].url, "https://hal.science/hal-000001");
    }

    #[test]
    fn test_requested_fields() {
        let adapter = HalAdapter::new();
        let request = adapter.build_request(&AdapterQuery {
            query: "language models".into(),
            theme: "nlp".into(),
            language: "fr".into(),
            limit: 5,
        });
        let fl = request.params.iter().find(|(k, _)| k == "fl").unwrap().1.clone();
        assert!(fl.contains("abstract_s"));
    }
}
