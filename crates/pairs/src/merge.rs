//! The `merge` stage: coalesce contiguous records for one pair.
//!
//! Input must be pair-key contiguous (the enumerator emits contiguous runs
//! per posting list; an external sort restores contiguity across shards).
//! Merging concatenates feature lists and drops pairs with fewer than
//! `min_matches` features.

use std::io::{BufRead, Write};

use serde::{Deserialize, Serialize};

use crate::{PairError, PairRecord};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergeConfig {
    /// Minimum number of features a merged pair needs to survive.
    pub min_matches: usize,
}

impl Default for MergeConfig {
    fn default() -> Self {
        MergeConfig { min_matches: 1 }
    }
}

impl MergeConfig {
    pub fn with_min_matches(mut self, min_matches: usize) -> Self {
        self.min_matches = min_matches;
        self
    }

    pub fn validate(&self) -> Result<(), PairError> {
        if self.min_matches == 0 {
            return Err(PairError::InvalidConfig(
                "min-matches must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// Pure streaming reduction over a sorted record stream.
pub struct PairMerger {
    cfg: MergeConfig,
}

impl PairMerger {
    pub fn new(cfg: MergeConfig) -> Result<Self, PairError> {
        cfg.validate()?;
        Ok(PairMerger { cfg })
    }

    pub fn run(&self, input: impl BufRead, out: &mut dyn Write) -> Result<u64, PairError> {
        let mut emitted = 0u64;
        let mut current: Option<PairRecord> = None;

        for (lineno, line) in input.lines().enumerate() {
            let line = line?;
            if line.is_empty() {
                continue;
            }
            let record = PairRecord::parse(&line, lineno + 1)?;
            match &mut current {
                Some(acc) if acc.docs == record.docs => {
                    acc.features.extend(record.features);
                }
                _ => {
                    if let Some(acc) = current.take() {
                        emitted += self.flush(acc, out)?;
                    }
                    current = Some(record);
                }
            }
        }
        if let Some(acc) = current.take() {
            emitted += self.flush(acc, out)?;
        }

        tracing::info!(pairs_emitted = emitted, "pair merge done");
        Ok(emitted)
    }

    fn flush(&self, record: PairRecord, out: &mut dyn Write) -> Result<u64, PairError> {
        if record.features.len() >= self.cfg.min_matches {
            writeln!(out, "{}", record.to_line())?;
            Ok(1)
        } else {
            Ok(0)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn merge(input: &str, min_matches: usize) -> String {
        let merger = PairMerger::new(MergeConfig::default().with_min_matches(min_matches)).unwrap();
        let mut out = Vec::new();
        merger.run(input.as_bytes(), &mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn contiguous_runs_concatenate() {
        let input = "[[1 2] [[\"\" 2 1 1]]]\n[[1 2] [[\"\" 3 1 2]]]\n[[1 4] [[\"\" 2 1 1]]]\n";
        let out = merge(input, 1);
        assert_eq!(
            out,
            "[[1 2] [[\"\" 2 1 1] [\"\" 3 1 2]]]\n[[1 4] [[\"\" 2 1 1]]]\n"
        );
    }

    #[test]
    fn min_matches_threshold_drops_single_feature_pairs() {
        let input = "[[1 2] [[\"\" 2 1 1]]]\n[[1 2] [[\"\" 3 1 2]]]\n[[1 4] [[\"\" 2 1 1]]]\n";
        let out = merge(input, 2);
        assert_eq!(out, "[[1 2] [[\"\" 2 1 1] [\"\" 3 1 2]]]\n");
    }

    #[test]
    fn single_record_below_threshold_emits_nothing() {
        assert_eq!(merge("[[1 2] [[\"\" 2 1 1]]]\n", 2), "");
    }

    #[test]
    fn merge_is_idempotent_on_merged_output() {
        let input = "[[1 2] [[\"\" 2 1 1]]]\n[[1 2] [[\"\" 3 1 2]]]\n";
        let once = merge(input, 1);
        let twice = merge(&once, 1);
        assert_eq!(once, twice);
    }

    #[test]
    fn malformed_line_is_fatal() {
        let merger = PairMerger::new(MergeConfig::default()).unwrap();
        let mut out = Vec::new();
        let err = merger.run("not a record\n".as_bytes(), &mut out);
        assert!(matches!(err, Err(PairError::Record { line: 1, .. })));
    }

    #[test]
    fn blank_lines_are_skipped() {
        let out = merge("\n[[1 2] [[\"\" 2 1 1]]]\n\n", 1);
        assert_eq!(out, "[[1 2] [[\"\" 2 1 1]]]\n");
    }
}
