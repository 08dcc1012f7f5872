//! Anchor-chaining passage discovery.
//!
//! Shared n-grams between two token sequences become anchor points `(i, j)`.
//! Sorted anchors are chained while the per-document gap stays under
//! [`MAX_ANCHOR_GAP`] and the second coordinate stays monotone; each chain
//! bounds a candidate passage, which is then refined by a Smith-Waterman
//! run over the space-joined token span. A chain too large for the DP cell
//! budget degrades to the anchor splice instead.

use hashbrown::HashMap;

use crate::joined::{token_end, token_start};
use crate::swg::{self, SwgParams};
use crate::Alignment;

/// Maximum token gap between consecutive anchors in a chain, on either side.
pub const MAX_ANCHOR_GAP: usize = 200;

/// Minimum fraction of the first document's span that anchors must cover.
const MIN_PASSAGE_DENSITY: f64 = 0.1;

/// Outcome of passage discovery for one candidate pair.
///
/// `Degraded` carries usable passages; the tag exists so the stage can count
/// and report fallbacks rather than swallowing them.
#[derive(Debug, Clone, PartialEq)]
pub enum PassageOutcome {
    Aligned(Vec<Alignment>),
    Degraded {
        passages: Vec<Alignment>,
        spliced: usize,
    },
    Empty,
}

impl PassageOutcome {
    pub fn passages(&self) -> &[Alignment] {
        match self {
            PassageOutcome::Aligned(p) => p,
            PassageOutcome::Degraded { passages, .. } => passages,
            PassageOutcome::Empty => &[],
        }
    }

    pub fn spliced(&self) -> usize {
        match self {
            PassageOutcome::Degraded { spliced, .. } => *spliced,
            _ => 0,
        }
    }
}

/// Discover locally dense shared passages between `w1` and `w2`.
pub fn best_passages(gram: usize, w1: &[&str], w2: &[&str], params: &SwgParams) -> PassageOutcome {
    if gram == 0 || w1.len() < gram || w2.len() < gram {
        return PassageOutcome::Empty;
    }

    let mut grams1: HashMap<String, Vec<usize>> = HashMap::new();
    for i in 0..=w1.len() - gram {
        grams1.entry(w1[i..i + gram].join("~")).or_default().push(i);
    }

    let mut anchors: Vec<(usize, usize)> = Vec::new();
    for j in 0..=w2.len() - gram {
        if let Some(is) = grams1.get(&w2[j..j + gram].join("~")) {
            for &i in is {
                anchors.push((i, j));
            }
        }
    }
    if anchors.is_empty() {
        return PassageOutcome::Empty;
    }
    anchors.sort_unstable();

    let mut chains: Vec<Vec<(usize, usize)>> = Vec::new();
    let mut chain: Vec<(usize, usize)> = vec![anchors[0]];
    for &(i, j) in &anchors[1..] {
        let &(pi, pj) = chain.last().unwrap();
        if i - pi <= MAX_ANCHOR_GAP && j >= pj && j - pj <= MAX_ANCHOR_GAP {
            chain.push((i, j));
        } else {
            chains.push(std::mem::replace(&mut chain, vec![(i, j)]));
        }
    }
    chains.push(chain);

    let mut passages = Vec::new();
    let mut spliced = 0usize;
    for chain in chains {
        if anchor_density(&chain, gram) < MIN_PASSAGE_DENSITY {
            continue;
        }
        let span1 = chain[0].0..chain.last().unwrap().0 + gram;
        let j_min = chain.iter().map(|a| a.1).min().unwrap();
        let j_max = chain.iter().map(|a| a.1).max().unwrap();
        let span2 = j_min..j_max + gram;

        let joined1 = w1[span1.clone()].join(" ");
        let joined2 = w2[span2.clone()].join(" ");
        match swg::align(&joined1, &joined2, params) {
            Some(ca) if !ca.seq1.is_empty() => {
                passages.push(Alignment {
                    start1: span1.start + token_start(&joined1, ca.start1),
                    end1: span1.start + token_end(&joined1, ca.start1, ca.end1),
                    start2: span2.start + token_start(&joined2, ca.start2),
                    end2: span2.start + token_end(&joined2, ca.start2, ca.end2),
                    seq1: ca.seq1,
                    seq2: ca.seq2,
                    score: ca.score,
                });
            }
            Some(_) => {}
            None => {
                tracing::debug!(
                    span1 = span1.end - span1.start,
                    span2 = span2.end - span2.start,
                    "passage over DP budget, splicing anchors"
                );
                passages.push(splice(&chain, gram, w1, w2, span1, span2, params));
                spliced += 1;
            }
        }
    }

    if passages.is_empty() {
        PassageOutcome::Empty
    } else if spliced > 0 {
        PassageOutcome::Degraded { passages, spliced }
    } else {
        PassageOutcome::Aligned(passages)
    }
}

/// Fraction of the chain's first-document span covered by anchor grams.
fn anchor_density(chain: &[(usize, usize)], gram: usize) -> f64 {
    let span = chain.last().unwrap().0 + gram - chain[0].0;
    let mut covered = 0usize;
    let mut cursor = chain[0].0;
    for &(i, _) in chain {
        let start = i.max(cursor);
        let end = i + gram;
        if end > start {
            covered += end - start;
            cursor = end;
        }
    }
    covered as f64 / span as f64
}

/// Gap-marked concatenation of matched grams and the unmatched stretches
/// between them. The shape of the alignment is approximate; the spans are
/// exact.
fn splice(
    chain: &[(usize, usize)],
    gram: usize,
    w1: &[&str],
    w2: &[&str],
    span1: std::ops::Range<usize>,
    span2: std::ops::Range<usize>,
    params: &SwgParams,
) -> Alignment {
    let mut parts1: Vec<String> = Vec::new();
    let mut parts2: Vec<String> = Vec::new();
    let mut c1 = span1.start;
    let mut c2 = span2.start;

    let unaligned = |parts1: &mut Vec<String>,
                     parts2: &mut Vec<String>,
                     s1: &[&str],
                     s2: &[&str]| {
        for t in s1 {
            parts1.push((*t).to_string());
            parts2.push("-".repeat(t.chars().count()));
        }
        for t in s2 {
            parts1.push("-".repeat(t.chars().count()));
            parts2.push((*t).to_string());
        }
    };

    for &(i, j) in chain {
        if i < c1 || j < c2 {
            continue;
        }
        unaligned(&mut parts1, &mut parts2, &w1[c1..i], &w2[c2..j]);
        for k in 0..gram {
            parts1.push(w1[i + k].to_string());
            parts2.push(w2[j + k].to_string());
        }
        c1 = i + gram;
        c2 = j + gram;
    }
    unaligned(
        &mut parts1,
        &mut parts2,
        &w1[c1..span1.end],
        &w2[c2..span2.end],
    );

    let seq1 = parts1.join(" ");
    let seq2 = parts2.join(" ");
    let score = swg::score_of(&seq1, &seq2, params);
    Alignment {
        seq1,
        seq2,
        start1: span1.start,
        end1: span1.end,
        start2: span2.start,
        end2: span2.end,
        score,
    }
}
