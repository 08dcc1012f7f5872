//! Umbrella crate for the reprint detection pipeline.
//!
//! `reprint` re-exports the workspace crates so applications can drive the
//! whole pipeline through a single dependency: candidate pair enumeration
//! over an n-gram index ([`pairs`]), passage alignment ([`align`]), greedy
//! single-link clustering ([`cluster`]), and reference-text quote hunting
//! ([`quotes`]). Each stage reads and writes line-delimited records on
//! injected handles, so stages compose across processes with pipes and an
//! external sort, or in memory through [`detect_clusters`].
//!
//! ## Pipeline shape
//!
//! ```text
//! pairs -> sort -> merge -> scores -> cluster -> format
//!                               \
//!                                quotes (alternate front end)
//! ```
//!
//! Horizontal sharding happens at the `pairs` stage: shards differ by
//! `step`, `modp`, and `modrec`, their outputs are concatenated and sorted,
//! and everything downstream is oblivious to the split. Clustering is the
//! one stage that must see the whole stream in a single process.

pub use align::{
    best_passages, word_substitutions, Alignment, AlignmentStats, PassageOutcome, ScoreStage,
    ScoresConfig,
};
pub use cluster::{render_clusters, ClusterConfig, ClusterStage, MemberRec};
pub use corpus::{
    series_of, tokenize, CorpusError, DocMeta, Document, IndexStore, NgramIndex, Posting,
    PostingList, SeriesMap, Token,
};
pub use pairs::{MergeConfig, PairEnumerator, PairMerger, PairRecord, PairsConfig};
pub use quotes::{QuoteHunter, QuotesConfig};

use std::io::BufRead;

use thiserror::Error;

/// Failures from any stage of an in-memory pipeline run.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Corpus(#[from] corpus::CorpusError),
    #[error(transparent)]
    Pair(#[from] pairs::PairError),
    #[error(transparent)]
    Align(#[from] align::AlignError),
    #[error(transparent)]
    Cluster(#[from] cluster::ClusterError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Run pairs, merge, scores, and cluster over one index in memory and return
/// the cluster JSON lines.
///
/// The stages communicate through buffers, with the same sort between
/// `pairs` and `merge` that a sharded deployment gets from an external sort.
/// Suitable for tests and small corpora; at corpus scale the stages run as
/// separate sharded processes.
pub fn detect_clusters(
    index: &dyn IndexStore,
    series: &SeriesMap,
    pairs_cfg: PairsConfig,
    merge_cfg: MergeConfig,
    scores_cfg: ScoresConfig,
    cluster_cfg: ClusterConfig,
) -> Result<String, PipelineError> {
    let mut pair_lines = Vec::new();
    PairEnumerator::new(index, series, pairs_cfg)?.run(&mut pair_lines)?;

    let mut sorted: Vec<&str> = std::str::from_utf8(&pair_lines)
        .expect("pair records are utf-8")
        .lines()
        .collect();
    sorted.sort_unstable();
    let sorted = sorted.join("\n");

    let mut merged = Vec::new();
    PairMerger::new(merge_cfg)?.run(sorted.as_bytes(), &mut merged)?;

    let mut scored = Vec::new();
    ScoreStage::new(index, scores_cfg).run(merged.as_slice(), &mut scored)?;

    let mut clustered = Vec::new();
    cluster::ClusterStage::new(cluster_cfg)?.run(scored.as_slice(), &mut clustered)?;

    Ok(String::from_utf8(clustered).expect("cluster output is utf-8"))
}

/// Load a newline-delimited word set, skipping blank lines.
pub fn read_word_set(reader: impl BufRead) -> Result<hashbrown::HashSet<String>, PipelineError> {
    let mut set = hashbrown::HashSet::new();
    for line in reader.lines() {
        let line = line?;
        let word = line.trim();
        if !word.is_empty() {
            set.insert(word.to_string());
        }
    }
    Ok(set)
}
