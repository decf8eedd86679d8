//! Request-shaped fragmenting
//!
//! Two chunking modes used by plagiarism checks:
//! - `sentences`: sentence-boundary splits, merging runs of short sentences
//!   until a word minimum is reached
//! - `sliding`: fixed-size overlapping word windows
//!
//! Both return `(index, text)` pairs.

use crate::errors::{CoreError, Result};

/// Sentence terminators: ASCII and CJK fullwidth forms.
const TERMINATORS: &[char] = &['.', '!', '?', '。', '！', '？'];

/// Split on sentence boundaries, emitting fragments of at least `min_words`
/// words. Consecutive too-short sentences are concatenated until the
/// minimum is reached. A trailing remainder below the minimum is only
/// emitted when nothing else was.
pub fn sentences(text: &str, min_words: usize) -> Vec<(usize, String)> {
    let mut fragments = Vec::new();
    let mut buffer = String::new();

    for sentence in split_sentences(text) {
        if buffer.is_empty() {
            buffer = sentence;
        } else {
            buffer.push(' ');
            buffer.push_str(&sentence);
        }

        if word_count(&buffer) >= min_words {
            fragments.push((fragments.len(), std::mem::take(&mut buffer)));
        }
    }

    if !buffer.is_empty() && fragments.is_empty() {
        fragments.push((0, buffer));
    }

    fragments
}

/// Produce overlapping windows of `window_words` words advancing by
/// `window_words - overlap_words`. Requires `0 < overlap < window`. When the
/// final stride would leave trailing words uncovered, one extra window
/// ending at the last word is emitted.
pub fn sliding(text: &str, window_words: usize, overlap_words: usize) -> Result<Vec<(usize, String)>> {
    if overlap_words == 0 || overlap_words >= window_words {
        return Err(CoreError::InvalidInput {
            message: format!(
                "sliding window requires 0 < overlap ({}) < window ({})",
                overlap_words, window_words
            ),
        });
    }

    let words: Vec<&str> = text.split_whitespace().collect();
    if words.is_empty() {
        return Ok(Vec::new());
    }

    if words.len() <= window_words {
        return Ok(vec![(0, words.join(" "))]);
    }

    let step = window_words - overlap_words;
    let mut windows = Vec::new();
    let mut start = 0;

    while start + window_words <= words.len() {
        windows.push((windows.len(), words[start..start + window_words].join(" ")));
        start += step;
    }

    // Cover the tail if the last full stride stopped short of the end
    let covered_to = (windows.len() - 1) * step + window_words;
    if covered_to < words.len() {
        let tail_start = words.len() - window_words;
        windows.push((windows.len(), words[tail_start..].join(" ")));
    }

    Ok(windows)
}

/// Split into sentences on a terminator followed by whitespace or end.
fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut current = String::new();
    let mut chars = text.chars().peekable();

    while let Some(ch) = chars.next() {
        current.push(ch);
        if TERMINATORS.contains(&ch) {
            let at_boundary = match chars.peek() {
                None => true,
                Some(next) => next.is_whitespace(),
            };
            if at_boundary {
                let trimmed = current.trim();
                if !trimmed.is_empty() {
                    sentences.push(trimmed.to_string());
                }
                current.clear();
            }
        }
    }

    let trimmed = current.trim();
    if !trimmed.is_empty() {
        sentences.push(trimmed.to_string());
    }

    sentences
}

fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}
