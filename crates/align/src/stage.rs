//! The `scores` stage: merged pairs in, alignment records out.

use std::io::{BufRead, Write};

use serde::{Deserialize, Serialize};

use corpus::IndexStore;
use pairs::PairRecord;

use crate::joined::{token_end, token_start};
use crate::passages::{best_passages, PassageOutcome};
use crate::swg::{self, SwgParams};
use crate::{AlignError, Alignment};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoresConfig {
    /// N-gram order for anchor discovery. Zero means whole-document
    /// Smith-Waterman instead of anchor chaining.
    pub gram: usize,
    #[serde(default)]
    pub swg: SwgParams,
}

impl Default for ScoresConfig {
    fn default() -> Self {
        ScoresConfig {
            gram: 5,
            swg: SwgParams::default(),
        }
    }
}

impl ScoresConfig {
    pub fn with_gram(mut self, gram: usize) -> Self {
        self.gram = gram;
        self
    }
}

/// Counters reported once per run. `degraded` counts passages that fell back
/// to the anchor splice; `empty` counts pairs that produced no passage at
/// all.
#[derive(Debug, Default, Clone, Copy)]
pub struct ScoreStats {
    pub pairs: u64,
    pub passages: u64,
    pub degraded: u64,
    pub empty: u64,
}

/// Streaming aligner over merged pair records.
pub struct ScoreStage<'a> {
    index: &'a dyn IndexStore,
    cfg: ScoresConfig,
}

impl<'a> ScoreStage<'a> {
    pub fn new(index: &'a dyn IndexStore, cfg: ScoresConfig) -> Self {
        ScoreStage { index, cfg }
    }

    pub fn run(&self, input: impl BufRead, out: &mut dyn Write) -> Result<ScoreStats, AlignError> {
        let mut stats = ScoreStats::default();

        for (lineno, line) in input.lines().enumerate() {
            let line = line?;
            if line.is_empty() {
                continue;
            }
            let record = PairRecord::parse(&line, lineno + 1)?;
            let (id1, id2) = record.docs;
            // An id the index does not know is a silent skip, like any other
            // index miss.
            let (Some(d1), Some(d2)) = (self.index.doc(id1), self.index.doc(id2)) else {
                tracing::debug!(id1, id2, "pair references unknown documents");
                continue;
            };
            stats.pairs += 1;

            let w1 = d1.words();
            let w2 = d2.words();
            let outcome = self.align_pair(&w1, &w2);
            stats.degraded += outcome.spliced() as u64;

            let passages: Vec<Alignment> = match outcome {
                PassageOutcome::Empty => {
                    stats.empty += 1;
                    vec![Alignment::empty()]
                }
                other => other.passages().to_vec(),
            };

            for p in &passages {
                if p.end1 - p.start1 < self.cfg.gram {
                    continue;
                }
                stats.passages += 1;
                self.emit(out, p, id1, id2, &d1.name, &d2.name, w1.len(), w2.len())?;
            }
        }

        tracing::info!(
            pairs = stats.pairs,
            passages = stats.passages,
            degraded = stats.degraded,
            empty = stats.empty,
            "alignment done"
        );
        Ok(stats)
    }

    fn align_pair(&self, w1: &[&str], w2: &[&str]) -> PassageOutcome {
        if self.cfg.gram == 0 {
            let joined1 = w1.join(" ");
            let joined2 = w2.join(" ");
            return match swg::align(&joined1, &joined2, &self.cfg.swg) {
                Some(ca) if !ca.seq1.is_empty() => {
                    PassageOutcome::Aligned(vec![Alignment {
                        start1: token_start(&joined1, ca.start1),
                        end1: token_end(&joined1, ca.start1, ca.end1),
                        start2: token_start(&joined2, ca.start2),
                        end2: token_end(&joined2, ca.start2, ca.end2),
                        seq1: ca.seq1,
                        seq2: ca.seq2,
                        score: ca.score,
                    }])
                }
                // A whole-document DP too big for the budget has no anchor
                // passages to fall back on at gram zero.
                _ => PassageOutcome::Empty,
            };
        }
        best_passages(self.cfg.gram, w1, w2, &self.cfg.swg)
    }

    #[allow(clippy::too_many_arguments)]
    fn emit(
        &self,
        out: &mut dyn Write,
        p: &Alignment,
        id1: u32,
        id2: u32,
        name1: &str,
        name2: &str,
        len1: usize,
        len2: usize,
    ) -> Result<(), AlignError> {
        let stats = p.stats();
        let match_len1 = p.end1 - p.start1;
        let match_len2 = p.end2 - p.start2;
        let frac1 = if len1 > 0 {
            match_len1 as f64 / len1 as f64
        } else {
            0.0
        };
        let frac2 = if len2 > 0 {
            match_len2 as f64 / len2 as f64
        } else {
            0.0
        };
        writeln!(
            out,
            "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}",
            match_len1,
            frac1,
            frac2,
            stats.matches,
            stats.gaps,
            stats.score,
            id1,
            id2,
            name1,
            name2,
            p.start1,
            p.end1,
            p.start2,
            p.end2,
            p.seq1.trim_matches('-'),
            p.seq2.trim_matches('-'),
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use corpus::{Document, NgramIndex};

    fn run_scores(index: &NgramIndex, cfg: ScoresConfig, input: &str) -> (Vec<Vec<String>>, ScoreStats) {
        let stage = ScoreStage::new(index, cfg);
        let mut out = Vec::new();
        let stats = stage.run(input.as_bytes(), &mut out).unwrap();
        let rows = String::from_utf8(out)
            .unwrap()
            .lines()
            .map(|l| l.split('\t').map(str::to_string).collect())
            .collect();
        (rows, stats)
    }

    fn passage_corpus() -> NgramIndex {
        let shared = "tell me not in mournful numbers life is but an empty dream";
        NgramIndex::from_documents(
            vec![
                Document::new("a/1", format!("opening words here {shared} and closing remarks")),
                Document::new("b/1", format!("other paper intro {shared} different ending text")),
            ],
            5,
        )
    }

    #[test]
    fn emits_sixteen_fields_for_shared_passage() {
        let index = passage_corpus();
        let (rows, stats) = run_scores(&index, ScoresConfig::default(), "[[0 1] [[\"\" 2 1 1]]]\n");
        assert_eq!(stats.pairs, 1);
        assert_eq!(rows.len(), 1);
        let row = &rows[0];
        assert_eq!(row.len(), 16);
        assert_eq!(row[6], "0");
        assert_eq!(row[7], "1");
        assert_eq!(row[8], "a/1");
        assert_eq!(row[9], "b/1");
        // Shared passage is 12 tokens starting at token 3 on both sides.
        assert_eq!(row[10], "3");
        assert_eq!(row[11], "15");
        assert_eq!(row[12], "3");
        assert_eq!(row[13], "15");
        assert_eq!(row[0], "12");
        assert_eq!(row[4], "0");
    }

    #[test]
    fn swapped_pair_transposes_fields() {
        // The aligner itself is symmetric; emitting with swapped ids swaps
        // the per-document columns.
        let index = passage_corpus();
        let (fwd, _) = run_scores(&index, ScoresConfig::default(), "[[0 1] [[\"\" 2 1 1]]]\n");
        let (rev, _) = run_scores(&index, ScoresConfig::default(), "[[1 0] [[\"\" 2 1 1]]]\n");
        let (f, r) = (&fwd[0], &rev[0]);
        assert_eq!(f[3], r[3]);
        assert_eq!(f[4], r[4]);
        assert_eq!(f[5], r[5]);
        assert_eq!((f[6].as_str(), f[7].as_str()), (r[7].as_str(), r[6].as_str()));
        assert_eq!((f[10].as_str(), f[11].as_str()), (r[12].as_str(), r[13].as_str()));
        assert_eq!(f[14], r[15]);
        assert_eq!(f[15], r[14]);
    }

    #[test]
    fn gram_zero_runs_whole_document_alignment() {
        let index = passage_corpus();
        let (rows, stats) = run_scores(
            &index,
            ScoresConfig::default().with_gram(0),
            "[[0 1] [[\"\" 2 1 1]]]\n",
        );
        assert_eq!(stats.passages, 1);
        let match_len1: usize = rows[0][0].parse().unwrap();
        assert!(match_len1 >= 11);
    }

    #[test]
    fn unalignable_pair_emits_nothing_at_positive_gram() {
        let index = NgramIndex::from_documents(
            vec![
                Document::new("a/1", "entirely distinct vocabulary in this document"),
                Document::new("b/1", "nothing shared with the other side at all"),
            ],
            5,
        );
        let (rows, stats) = run_scores(&index, ScoresConfig::default(), "[[0 1] [[\"\" 2 1 1]]]\n");
        assert!(rows.is_empty());
        assert_eq!(stats.empty, 1);
    }

    #[test]
    fn unknown_doc_ids_are_skipped() {
        let index = passage_corpus();
        let (rows, stats) = run_scores(&index, ScoresConfig::default(), "[[7 9] [[\"\" 2 1 1]]]\n");
        assert!(rows.is_empty());
        assert_eq!(stats.pairs, 0);
    }

    #[test]
    fn malformed_record_is_fatal() {
        let index = passage_corpus();
        let stage = ScoreStage::new(&index, ScoresConfig::default());
        let mut out = Vec::new();
        assert!(stage.run("garbage\n".as_bytes(), &mut out).is_err());
    }

    #[test]
    fn identical_long_passage_matches_every_character() {
        let text: Vec<String> = (0..200).map(|k| format!("word{k}")).collect();
        let text = text.join(" ");
        let index = NgramIndex::from_documents(
            vec![
                Document::new("a/1", text.clone()),
                Document::new("b/1", text.clone()),
            ],
            5,
        );
        let (rows, _) = run_scores(&index, ScoresConfig::default(), "[[0 1] [[\"\" 2 1 1]]]\n");
        let row = &rows[0];
        assert_eq!(row[0], "200");
        let matches: usize = row[3].parse().unwrap();
        assert_eq!(matches, text.chars().count());
        assert_eq!(row[4], "0");
    }
}
