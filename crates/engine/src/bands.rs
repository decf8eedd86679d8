//! Plagiarism severity bands
//!
//! Cosine scores map onto closed intervals: very_high >= 0.90,
//! high >= 0.80, moderate >= 0.70, low >= 0.60, minimal >= 0.50. Scores
//! below 0.50 are not returned at all.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlagiarismBand {
    VeryHigh,
    High,
    Moderate,
    Low,
    Minimal,
}

impl PlagiarismBand {
    /// Classify a cosine score; `None` below the reporting floor.
    pub fn from_score(score: f32) -> Option<Self> {
        if score >= 0.90 {
            Some(PlagiarismBand::VeryHigh)
        } else if score >= 0.80 {
            Some(PlagiarismBand::High)
        } else if score >= 0.70 {
            Some(PlagiarismBand::Moderate)
        } else if score >= 0.60 {
            Some(PlagiarismBand::Low)
        } else if score >= 0.50 {
            Some(PlagiarismBand::Minimal)
        } else {
            None
        }
    }

    /// Bands at or above `high` count as detected plagiarism.
    pub fn is_detection(&self) -> bool {
        matches!(self, PlagiarismBand::VeryHigh | PlagiarismBand::High)
    }

    pub fn name(&self) -> &'static str {
        match self {
            PlagiarismBand::VeryHigh => "very_high",
            PlagiarismBand::High => "high",
            PlagiarismBand::Moderate => "moderate",
            PlagiarismBand::Low => "low",
            PlagiarismBand::Minimal => "minimal",
        }
    }
}
