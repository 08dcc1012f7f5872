//! Passage discovery and local alignment.
//!
//! The `scores` stage turns merged candidate pairs into aligned passages.
//! Anchor chaining ([`best_passages`]) finds locally dense runs of shared
//! n-grams; Smith-Waterman-Gotoh ([`swg`]) refines each run into an exact
//! character-level local alignment with affine gaps. When a refinement would
//! blow the DP cell budget the passage degrades to the anchor splice instead
//! of aborting the stream; degradations are tagged in [`PassageOutcome`] and
//! counted in the stage stats.

pub mod joined;
mod passages;
mod stage;
pub mod swg;
mod wdiff;

pub use passages::{best_passages, PassageOutcome};
pub use stage::{ScoreStage, ScoreStats, ScoresConfig};
pub use swg::{SwgParams, MAX_DP_CELLS};
pub use wdiff::{aligned_words, word_substitutions};

use thiserror::Error;

/// Errors from the alignment stage. Per-pair trouble never lands here; it
/// degrades or skips. These are stream-level failures.
#[derive(Debug, Error)]
pub enum AlignError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Record(#[from] pairs::PairError),
    #[error("invalid config: {0}")]
    InvalidConfig(String),
}

/// A locally aligned passage between two token sequences.
///
/// `start*`/`end*` are half-open token offsets into the respective documents;
/// `seq1`/`seq2` are the gapped character strings produced by the aligner,
/// with `-` marking gaps.
#[derive(Debug, Clone, PartialEq)]
pub struct Alignment {
    pub seq1: String,
    pub seq2: String,
    pub start1: usize,
    pub end1: usize,
    pub start2: usize,
    pub end2: usize,
    pub score: f32,
}

impl Alignment {
    /// The zero-span alignment substituted when a pair cannot be aligned.
    pub fn empty() -> Self {
        Alignment {
            seq1: String::new(),
            seq2: String::new(),
            start1: 0,
            end1: 0,
            start2: 0,
            end2: 0,
            score: 0.0,
        }
    }

    /// Column statistics: equal non-gap columns and gap runs (gap opens
    /// across both rows).
    pub fn stats(&self) -> AlignmentStats {
        let mut matches = 0usize;
        let mut gaps = 0usize;
        let mut in_gap1 = false;
        let mut in_gap2 = false;
        for (c1, c2) in self.seq1.chars().zip(self.seq2.chars()) {
            if c1 == '-' {
                if !in_gap1 {
                    gaps += 1;
                }
                in_gap1 = true;
            } else {
                in_gap1 = false;
            }
            if c2 == '-' {
                if !in_gap2 {
                    gaps += 1;
                }
                in_gap2 = true;
            } else {
                in_gap2 = false;
            }
            if c1 == c2 && c1 != '-' {
                matches += 1;
            }
        }
        AlignmentStats {
            matches,
            gaps,
            score: self.score,
        }
    }
}

/// Summary numbers reported in the `scores` TSV and quote-hunt JSON.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AlignmentStats {
    pub matches: usize,
    pub gaps: usize,
    pub score: f32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stats_count_matches_and_gap_runs() {
        let a = Alignment {
            seq1: "abc--def".into(),
            seq2: "abcxxd-f".into(),
            start1: 0,
            end1: 2,
            start2: 0,
            end2: 2,
            score: 7.5,
        };
        let stats = a.stats();
        // Columns: abc match, two gaps in seq1 (one run), d matches, one gap
        // in seq2 (one run), f matches.
        assert_eq!(stats.matches, 5);
        assert_eq!(stats.gaps, 2);
        assert_eq!(stats.score, 7.5);
    }

    #[test]
    fn empty_alignment_has_zero_stats() {
        let stats = Alignment::empty().stats();
        assert_eq!(stats.matches, 0);
        assert_eq!(stats.gaps, 0);
    }
}
