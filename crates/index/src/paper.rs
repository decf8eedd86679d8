//! Paper model and content addressing

use citeguard_common::text::fold;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// 32-byte content digest identifying a paper for deduplication.
///
/// Computed over the language-independent normalized form of
/// `title + "\n" + abstract`; serialized as lowercase hex.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContentHash(pub [u8; 32]);

impl ContentHash {
    /// Digest the normalized title and abstract.
    pub fn of(title: &str, abstract_text: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(fold(title).as_bytes());
        hasher.update(b"\n");
        hasher.update(fold(abstract_text).as_bytes());
        Self(hasher.finalize().into())
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn from_hex(s: &str) -> Option<Self> {
        let bytes = hex::decode(s).ok()?;
        let array: [u8; 32] = bytes.try_into().ok()?;
        Some(Self(array))
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl Serialize for ContentHash {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for ContentHash {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        ContentHash::from_hex(&s)
            .ok_or_else(|| serde::de::Error::custom("expected 64 hex characters"))
    }
}

/// Sentinel for papers not yet inserted into the index.
pub const UNASSIGNED_PAPER_ID: u64 = 0;

/// A matched or indexed document.
///
/// `paper_id` is assigned by the index on insert (adapters construct papers
/// with `UNASSIGNED_PAPER_ID`); `embedding` is filled by the orchestrator
/// before the paper reaches the index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Paper {
    pub paper_id: u64,
    pub content_hash: ContentHash,
    pub title: String,
    #[serde(rename = "abstract")]
    pub abstract_text: String,
    pub authors: Vec<String>,
    pub source: String,
    pub document_type: String,
    pub publication_date: String,
    pub doi: String,
    pub url: String,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub embedding: Vec<f32>,
}

impl Paper {
    /// Build an unindexed paper from adapter output, deriving its content
    /// hash from the title and abstract.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        title: String,
        abstract_text: String,
        authors: Vec<String>,
        source: String,
        document_type: String,
        publication_date: String,
        doi: String,
        url: String,
    ) -> Self {
        let content_hash = ContentHash::of(&title, &abstract_text);
        Self {
            paper_id: UNASSIGNED_PAPER_ID,
            content_hash,
            title,
            abstract_text,
            authors,
            source,
            document_type,
            publication_date,
            doi,
            url,
            embedding: Vec::new(),
        }
    }

    /// Recompute the content hash from the current title and abstract.
    pub fn recompute_hash(&mut self) {
        self.content_hash = ContentHash::of(&self.title, &self.abstract_text);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_ignores_case_and_markup() {
        let a = ContentHash::of("Deep Learning", "A survey of models.");
        let b = ContentHash::of("deep learning", "A survey of   models");
        assert_eq!(a, b);
    }

    #[test]
    fn test_hash_separates_title_and_abstract() {
        let a = ContentHash::of("alpha beta", "gamma");
        let b = ContentHash::of("alpha", "beta gamma");
        assert_ne!(a, b);
    }

    #[test]
    fn test_hex_round_trip() {
        let hash = ContentHash::of("title", "abstract");
        let parsed = ContentHash::from_hex(&hash.to_hex()).unwrap();
        assert_eq!(hash, parsed);
    }

    #[test]
    fn test_new_paper_is_unassigned() {
        let paper = Paper::new(
            "Deep Learning".into(),
            "This paper surveys deep learning models for images.".into(),
            vec!["A. Author".into()],
            "arxiv".into(),
            "article".into(),
            "2024-01-01".into(),
            "10.1/x".into(),
            "https://example.org".into(),
        );
        assert_eq!(paper.paper_id, UNASSIGNED_PAPER_ID);
        assert!(paper.embedding.is_empty());
        assert_eq!(
            paper.content_hash,
            ContentHash::of(&paper.title, &paper.abstract_text)
        );
    }
}
