//! Word-level substitution mining over aligned passage pairs.
//!
//! Given the two gapped strings of an alignment, recover the aligned word
//! pairs and report isolated substitutions: windows where the central pair
//! differs while every neighbor matches. The length and dictionary
//! requirements keep OCR noise and inflection variants out of the output;
//! what remains is mostly genuine editorial substitution.

use hashbrown::HashSet;

/// Aligned word pairs from two gapped sequences, split at columns where both
/// rows carry a space. Gap markers are stripped from the recovered words.
pub fn aligned_words(align1: &str, align2: &str) -> Vec<(String, String)> {
    let mut pairs = Vec::new();
    let mut cur1 = String::new();
    let mut cur2 = String::new();
    for (c1, c2) in align1.chars().zip(align2.chars()) {
        if c1 == ' ' && c2 == ' ' {
            if !cur1.is_empty() || !cur2.is_empty() {
                pairs.push((std::mem::take(&mut cur1), std::mem::take(&mut cur2)));
            }
        } else {
            if c1 != '-' {
                cur1.push(c1);
            }
            if c2 != '-' {
                cur2.push(c2);
            }
        }
    }
    if !cur1.is_empty() || !cur2.is_empty() {
        pairs.push((cur1, cur2));
    }
    pairs
}

/// Report isolated word substitutions in an aligned passage pair.
///
/// A window of `gram` aligned word pairs votes for its central pair when the
/// center differs, every other pair in the window matches exactly, both
/// central words are longer than 7 characters, and both appear in `dict`.
pub fn word_substitutions(
    align1: &str,
    align2: &str,
    gram: usize,
    dict: &HashSet<String>,
) -> Vec<(String, String)> {
    let pairs = aligned_words(align1, align2);
    let mut out = Vec::new();
    if gram == 0 || pairs.len() < gram {
        return out;
    }
    let center = gram / 2;
    for window in pairs.windows(gram) {
        let (w1, w2) = &window[center];
        if w1 == w2 {
            continue;
        }
        let neighbors_match = window
            .iter()
            .enumerate()
            .all(|(k, (a, b))| k == center || a == b);
        if neighbors_match
            && w1.chars().count() > 7
            && w2.chars().count() > 7
            && dict.contains(w1)
            && dict.contains(w2)
        {
            out.push((w1.clone(), w2.clone()));
        }
    }
    out
}
