//! Internet Archive scholar search
//!
//! <https://archive.org/advancedsearch.php>. Field types are loose in this
//! API: `description` and `creator` may be a string or an array.

use crate::adapter::{AdapterQuery, SourceAdapter, SourceRequest};
use citeguard_common::errors::Result;
use citeguard_index::Paper;
use serde::Deserialize;

pub struct InternetArchiveAdapter;

impl InternetArchiveAdapter {
    pub fn new() -> Self {
        Self
    }
}

impl Default for InternetArchiveAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Deserialize)]
struct IaResponse {
    response: Option<IaInner>,
}

#[derive(Deserialize)]
struct IaInner {
    #[serde(default)]
    docs: Vec<IaDoc>,
}

/// String-or-array fields in the archive schema
#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

impl OneOrMany {
    fn first(self) -> Option<String> {
        match self {
            OneOrMany::One(s) => Some(s),
            OneOrMany::Many(items) => items.into_iter().next(),
        }
    }

    fn all(self) -> Vec<String> {
        match self {
            OneOrMany::One(s) => vec![s],
            OneOrMany::Many(items) => items,
        }
    }
}

#[derive(Deserialize)]
struct IaDoc {
    identifier: Option<String>,
    title: Option<OneOrMany>,
    description: Option<OneOrMany>,
    creator: Option<OneOrMany>,
    date: Option<String>,
    mediatype: Option<String>,
}

impl SourceAdapter for InternetArchiveAdapter {
    fn tag(&self) -> &'static str {
        "internet_archive"
    }

    fn build_request(&self, query: &AdapterQuery) -> SourceRequest {
        SourceRequest::new("https://archive.org/advancedsearch.php")
            .param("q", format!("{} {} AND mediatype:texts", query.theme, query.query))
            .param("fl[]", "identifier,title,description,creator,date,mediatype")
            .param("rows", query.limit.to_string())
            .param("output", "json")
    }

    fn parse_response(&self, bytes: &[u8], _content_type: &str) -> Result<Vec<Paper>> {
        let response: IaResponse = serde_json::from_slice(bytes)?;

        Ok(response
            .response
            .map(|inner| inner.docs)
            .unwrap_or_default()
            .into_iter()
            .filter_map(|doc| {
                let title = doc.title.and_then(OneOrMany::first)?.trim().to_string();
                if title.is_empty() {
                    return None;
                }

                let url = doc
                    .identifier
                    .map(|id| format!("https://archive.org/details/{}", id))
                    .unwrap_or_default();

                Some(Paper::new(
                    title,
                    doc.description.and_then(OneOrMany::first).unwrap_or_default(),
                    doc.creator.map(OneOrMany::all).unwrap_or_default(),
                    self.tag().to_string(),
                    doc.mediatype.unwrap_or_else(|| "texts".to_string()),
                    doc.date.map(|d| d.chars().take(10).collect()).unwrap_or_default(),
                    String::new(),
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
        "response": {
            "docs": [
                {
                    "identifier": "principia-mathematica",
                    "title": "Principia Mathematica",
                    "description": ["A foundational treatise on mathematics."],
                    "creator": ["Whitehead, Alfred North", "Russell, Bertrand"],
                    "date": "1910-01-01T00:00:00Z",
                    "mediatype": "texts"
                },
                {
                    "identifier": "single-string-fields",
                    "title": "Single String Fields",
                    "description": "Description as a bare string.",
                    "creator": "One Author"
                }
            ]
        }
    }"#;

    #[test]
    fn test_parse_handles_string_or_array() {
        let adapter = InternetArchiveAdapter::new();
        let papers = adapter.parse_response(SAMPLE.as_bytes(), "application/json").unwrap();

        assert_eq!(papers.len(), 2);
        assert_eq!(papers[0].authors.len(), 2);
        assert_eq!(papers[0].publication_date, "1910-01-01");
        assert_eq!(papers[0].url, "https://archive.org/details/principia-mathematica");
        assert_eq!(papers[1].authors, vec!["One Author"]);
        assert_eq!(papers[1].abstract_text, "Description as a bare string.");
    }

    #[test]
    fn test_texts_filter_in_query() {
        let adapter = InternetArchiveAdapter::new();
        let request = adapter.build_request(&AdapterQuery {
            query: "logic".into(),
            theme: "math".into(),
            language: "en".into(),
            limit: 5,
        });
        let q = request.params.iter().find(|(k, _)| k == "q").unwrap().1.clone();
        assert!(q.contains("mediatype:texts"));
    }
}
