//! Text processing for the similarity pipeline
//!
//! - `normalize`: deterministic cleanup feeding both embedding and hashing
//! - `stopwords`: per-language stopword tables
//! - `fragment`: sentence-boundary and sliding-window chunking

pub mod fragment;
pub mod normalize;
pub mod stopwords;

pub use fragment::{sentences, sliding};
pub use normalize::{fold, normalize};
