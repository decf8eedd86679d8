//! arXiv Atom feed API
//!
//! <http://export.arxiv.org/api/query>. The only non-JSON source; the Atom
//! payload is deserialized with quick-xml.

use crate::adapter::{AdapterQuery, SourceAdapter, SourceRequest};
use citeguard_common::errors::{CoreError, Result};
use citeguard_index::Paper;
use serde::Deserialize;

pub struct ArxivAdapter;

impl ArxivAdapter {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ArxivAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Deserialize)]
struct AtomFeed {
    #[serde(rename = "entry", default)]
    entries: Vec<AtomEntry>,
}

#[derive(Deserialize)]
struct AtomEntry {
    id: Option<String>,
    title: Option<String>,
    summary: Option<String>,
    published: Option<String>,
    #[serde(rename = "author", default)]
    authors: Vec<AtomAuthor>,
    #[serde(rename = "arxiv:doi", default)]
    doi: Option<String>,
}

#[derive(Deserialize)]
struct AtomAuthor {
    name: Option<String>,
}

impl SourceAdapter for ArxivAdapter {
    fn tag(&self) -> &'static str {
        "arxiv"
    }

    fn build_request(&self, query: &AdapterQuery) -> SourceRequest {
        SourceRequest::new("http://export.arxiv.org/api/query")
            .param(
                "search_query",
                format!("all:{} {}", query.theme, query.query),
            )
            .param("start", "0")
            .param("max_results", query.limit.to_string())
    }

    fn parse_response(&self, bytes: &[u8], _content_type: &str) -> Result<Vec<Paper>> {
        let text = std::str::from_utf8(bytes).map_err(|_| CoreError::InvalidInput {
            message: "arxiv feed is not utf-8".to_string(),
        })?;
        let feed: AtomFeed = quick_xml::de::from_str(text).map_err(|e| CoreError::InvalidInput {
            message: format!("arxiv feed unparseable: {}", e),
        })?;

        Ok(feed
            .entries
            .into_iter()
            .filter_map(|entry| {
                let title = entry.title?.split_whitespace().collect::<Vec<_>>().join(" ");
                if title.is_empty() {
                    return None;
                }
                let summary = entry
                    .summary
                    .map(|s| s.split_whitespace().collect::<Vec<_>>().join(" "))
                    .unwrap_or_default();

                let date = entry
                    .published
                    .map(|p| p.chars().take(10).collect())
                    .unwrap_or_default();

                Some(Paper::new(
                    title,
                    summary,
                    entry.authors.into_iter().filter_map(|a| a.name).collect(),
                    self.tag().to_string(),
                    "preprint".to_string(),
                    date,
                    entry.doi.unwrap_or_default(),
                    entry.id.unwrap_or_default(),
                ))
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<feed xmlns="http://www.w3.org/2005/Atom" xmlns:arxiv="http://arxiv.org/schemas/atom">
  <title>ArXiv Query Results</title>
  <entry>
    <id>http://arxiv.org/abs/1706.03762v7</id>
    <published>2017-06-12T17:57:34Z</published>
    <title>Attention Is All
      You Need</title>
    <summary>The dominant sequence transduction models are based on
      recurrent networks.</summary>
    <author><name>Ashish Vaswani</name></author>
    <author><name>Noam Shazeer</name></author>
  </entry>
</feed>"#;

    #[test]
    fn test_parse_sample() {
        let adapter = ArxivAdapter::new();
        let papers = adapter.parse_response(SAMPLE.as_bytes(), "application/atom+xml").unwrap();

        assert_eq!(papers.len(), 1);
        let paper = &papers[0];
        // Feed line breaks are collapsed
        assert_eq!(paper.title, "Attention Is All You Need");
        assert!(paper.abstract_text.starts_with("The dominant sequence"));
        assert_eq!(paper.authors.len(), 2);
        assert_eq!(paper.publication_date, "2017-06-12");
        assert_eq!(paper.url, "http://arxiv.org/abs/1706.03762v7");
        assert_eq!(paper.document_type, "preprint");
    }

    #[test]
    fn test_empty_feed() {
        let adapter = ArxivAdapter::new();
        let papers = adapter
            .parse_response(
                br#"<feed xmlns="http://www.w3.org/2005/Atom"><title>empty</title></feed>"#,
                "application/atom+xml",
            )
            .unwrap();
        assert!(papers.is_empty());
    }

    #[test]
    fn test_non_xml_is_error() {
        let adapter = ArxivAdapter::new();
        assert!(adapter.parse_response(b"{\"json\": true}", "application/json").is_err());
    }
}
