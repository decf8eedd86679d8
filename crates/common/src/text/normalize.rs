//! Text normalization
//!
//! Produces the canonical form of a fragment or abstract. The same input
//! bytes yield the same output bytes in every process; both the embedding
//! cache and the content hash depend on that.
//!
//! Steps, in order: HTML strip (elements discarded, entities decoded),
//! Unicode NFKC, case fold to lower, non-letter/non-digit runs folded to a
//! single space, trim. `normalize` additionally removes stopwords when the
//! language has a known table; `fold` stops before stopword removal and is
//! the language-independent form used for content hashing.

use scraper::Html;
use unicode_normalization::UnicodeNormalization;

use super::stopwords;

/// Language-independent normalization: HTML strip, NFKC, lowercase,
/// punctuation folding, trim.
pub fn fold(raw: &str) -> String {
    let stripped = strip_html(raw);

    let mut out = String::with_capacity(stripped.len());
    let mut pending_space = false;

    for ch in stripped.nfkc() {
        if ch.is_alphanumeric() {
            for lower in ch.to_lowercase() {
                if pending_space && !out.is_empty() {
                    out.push(' ');
                }
                pending_space = false;
                out.push(lower);
            }
        } else {
            pending_space = true;
        }
    }

    out
}

/// Full normalization for embedding: `fold` plus stopword removal for
/// languages with a known table. Unknown languages skip removal.
pub fn normalize(raw: &str, language: &str) -> String {
    let folded = fold(raw);

    let Some(table) = stopwords::for_language(language) else {
        return folded;
    };

    let kept: Vec<&str> = folded
        .split(' ')
        .filter(|word| !word.is_empty() && !table.contains(word))
        .collect();

    kept.join(" ")
}

/// Discard HTML elements and decode entities. Plain text passes through
/// without invoking the parser.
fn strip_html(raw: &str) -> String {
    if !raw.contains('<') && !raw.contains('&') {
        return raw.to_string();
    }

    let fragment = Html::parse_fragment(raw);
    let mut text = String::with_capacity(raw.len());
    for piece in fragment.root_element().text() {
        if !text.is_empty() && !text.ends_with(' ') {
            text.push(' ');
        }
        text.push_str(piece);
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fold_lowercases_and_folds_punctuation() {
        assert_eq!(fold("Hello,   World!!"), "hello world");
    }

    #[test]
    fn test_fold_strips_html_and_decodes_entities() {
        assert_eq!(
            fold("<p>Deep <b>learning</b> &amp; vision</p>"),
            "deep learning vision"
        );
    }

    #[test]
    fn test_fold_applies_nfkc() {
        // Fullwidth latin compatibility characters fold to ASCII
        assert_eq!(fold("ＤＥＥＰ　ｌｅａｒｎｉｎｇ"), "deep learning");
    }

    #[test]
    fn test_normalize_removes_english_stopwords() {
        assert_eq!(
            normalize("This is a survey of the deep models", "en"),
            "survey deep models"
        );
    }

    #[test]
    fn test_normalize_unknown_language_skips_removal() {
        assert_eq!(normalize("dette er en test", "da"), "dette er en test");
    }

    #[test]
    fn test_normalize_region_subtag() {
        assert_eq!(normalize("the models", "en-US"), "models");
    }

    #[test]
    fn test_deterministic() {
        let a = normalize("Neural  networks &amp; <i>models</i>", "en");
        let b = normalize("Neural  networks &amp; <i>models</i>", "en");
        assert_eq!(a, b);
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(normalize("", "en"), "");
        assert_eq!(fold("   "), "");
    }
}
