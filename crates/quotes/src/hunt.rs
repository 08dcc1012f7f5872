//! The `quotes` stage: reference rows in, JSON hits out.

use std::io::{BufRead, Write};

use hashbrown::{HashMap, HashSet};
use serde::{Deserialize, Serialize};

use align::joined::{token_end, token_start};
use align::swg::{self, SwgParams};
use align::{aligned_words, Alignment};
use corpus::{Document, IndexStore};

use crate::page::{bounding_box, page_url};
use crate::QuoteError;

/// Configuration for [`QuoteHunter`]. Defaults mirror the CLI.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuotesConfig {
    /// Skip index terms whose document frequency exceeds this.
    pub max_count: u32,
    /// Split hit chains at reference-position gaps larger than this.
    pub max_gap: usize,
    /// Drop spans scoring below this.
    pub min_score: f64,
    /// Pretty-print the JSON output.
    pub pretty: bool,
    /// Attach per-word alignment records to each hit.
    pub words: bool,
    /// Tokens of context fetched around a span on both sides before the
    /// refinement alignment.
    pub context: usize,
    /// Corpus documents excluded from hits, e.g. canonical editions that
    /// would echo every query.
    #[serde(default)]
    pub bad_docs: HashSet<String>,
    /// Optional unigram log-probability table; when present each hit carries
    /// the summed log-probability of its reference tokens.
    #[serde(default)]
    pub lm: Option<HashMap<String, f64>>,
    #[serde(default)]
    pub swg: SwgParams,
}

impl Default for QuotesConfig {
    fn default() -> Self {
        QuotesConfig {
            max_count: 1000,
            max_gap: 200,
            min_score: 0.0,
            pretty: false,
            words: false,
            context: 50,
            bad_docs: HashSet::new(),
            lm: None,
            swg: SwgParams::default(),
        }
    }
}

impl QuotesConfig {
    pub fn with_max_count(mut self, max_count: u32) -> Self {
        self.max_count = max_count;
        self
    }

    pub fn with_max_gap(mut self, max_gap: usize) -> Self {
        self.max_gap = max_gap;
        self
    }

    pub fn with_min_score(mut self, min_score: f64) -> Self {
        self.min_score = min_score;
        self
    }

    pub fn with_words(mut self, words: bool) -> Self {
        self.words = words;
        self
    }

    pub fn with_bad_docs(mut self, bad_docs: HashSet<String>) -> Self {
        self.bad_docs = bad_docs;
        self
    }

    pub fn with_lm(mut self, lm: HashMap<String, f64>) -> Self {
        self.lm = Some(lm);
        self
    }

    pub fn validate(&self) -> Result<(), QuoteError> {
        if self.max_count == 0 {
            return Err(QuoteError::InvalidConfig(
                "max-count must be at least 1".into(),
            ));
        }
        if self.max_gap == 0 {
            return Err(QuoteError::InvalidConfig(
                "max-gap must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// Counters reported once per run.
#[derive(Debug, Default, Clone, Copy)]
pub struct QuoteStats {
    pub refs: u64,
    pub terms_probed: u64,
    pub pages: u64,
    pub spans: u64,
    pub hits: u64,
}

/// One index hit, inverted onto a corpus page.
struct Hit {
    ref_pos: usize,
    df: u32,
    positions: Vec<u32>,
}

#[derive(Serialize)]
struct WordRecord {
    word1: String,
    word2: String,
    matched: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    bbox: Option<[i64; 4]>,
}

#[derive(Serialize)]
struct QuoteHit<'a> {
    page: &'a str,
    date: Option<&'a str>,
    title: Option<&'a str>,
    language: Option<&'a str>,
    score: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    lm: Option<f64>,
    matches: usize,
    gaps: usize,
    swscore: f32,
    start1: usize,
    end1: usize,
    start2: usize,
    end2: usize,
    text1: String,
    align1: &'a str,
    align2: &'a str,
    passage: String,
    url: Option<String>,
    cites: Vec<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    words: Option<Vec<WordRecord>>,
}

/// Streaming quote hunter over one index part.
pub struct QuoteHunter<'a> {
    index: &'a dyn IndexStore,
    cfg: QuotesConfig,
}

impl<'a> QuoteHunter<'a> {
    pub fn new(index: &'a dyn IndexStore, cfg: QuotesConfig) -> Result<Self, QuoteError> {
        cfg.validate()?;
        Ok(QuoteHunter { index, cfg })
    }

    /// Read `name\ttext` reference rows from `input` and write one JSON hit
    /// per surviving span to `out`.
    pub fn run(&self, input: impl BufRead, out: &mut dyn Write) -> Result<QuoteStats, QuoteError> {
        let mut stats = QuoteStats::default();

        let mut refs: Vec<(String, String)> = Vec::new();
        for (lineno, line) in input.lines().enumerate() {
            let line = line?;
            if line.is_empty() {
                continue;
            }
            let Some((name, text)) = line.split_once('\t') else {
                return Err(QuoteError::Record {
                    line: lineno + 1,
                    reason: "expected name<TAB>text".into(),
                });
            };
            refs.push((name.to_string(), text.to_string()));
        }
        stats.refs = refs.len() as u64;

        // Concatenate reference tokens; origin maps a global token position
        // back to its reference document.
        let mut ref_tokens: Vec<String> = Vec::new();
        let mut origin: Vec<usize> = Vec::new();
        for (ri, (_, text)) in refs.iter().enumerate() {
            for t in corpus::tokenize(text) {
                ref_tokens.push(t.text);
                origin.push(ri);
            }
        }

        let gram = self.index.gram();
        if gram == 0 || ref_tokens.len() < gram {
            tracing::info!(refs = stats.refs, "reference text shorter than index gram");
            return Ok(stats);
        }

        let mut term_positions: HashMap<String, Vec<usize>> = HashMap::new();
        for i in 0..=ref_tokens.len() - gram {
            term_positions
                .entry(ref_tokens[i..i + gram].join("~"))
                .or_default()
                .push(i);
        }

        let mut pages: HashMap<u32, Vec<Hit>> = HashMap::new();
        for (term, positions) in &term_positions {
            let Some(list) = self.index.postings(term) else {
                continue;
            };
            stats.terms_probed += 1;
            if list.total > self.cfg.max_count {
                continue;
            }
            for posting in &list.entries {
                let Some(name) = self.index.doc_name(posting.doc) else {
                    continue;
                };
                if self.cfg.bad_docs.contains(name) {
                    continue;
                }
                for &rp in positions {
                    pages.entry(posting.doc).or_default().push(Hit {
                        ref_pos: rp,
                        df: list.total,
                        positions: posting.positions.clone(),
                    });
                }
            }
        }
        stats.pages = pages.len() as u64;

        let mut page_ids: Vec<u32> = pages.keys().copied().collect();
        page_ids.sort_unstable();
        for pid in page_ids {
            let mut hits = pages.remove(&pid).expect("page id from key set");
            hits.sort_by_key(|h| h.ref_pos);

            let mut begin = 0usize;
            for k in 1..=hits.len() {
                let boundary = k == hits.len()
                    || hits[k].ref_pos - hits[k - 1].ref_pos > self.cfg.max_gap;
                if !boundary {
                    continue;
                }
                let span = &hits[begin..k];
                begin = k;
                stats.spans += 1;

                let score: f64 = span.iter().map(|h| (1.0 / h.df as f64).ln_1p()).sum();
                if score < self.cfg.min_score {
                    continue;
                }
                if self.emit_span(pid, span, gram, score, &refs, &ref_tokens, &origin, out)? {
                    stats.hits += 1;
                }
            }
        }

        tracing::info!(
            refs = stats.refs,
            terms_probed = stats.terms_probed,
            pages = stats.pages,
            spans = stats.spans,
            hits = stats.hits,
            "quote hunt done"
        );
        Ok(stats)
    }

    #[allow(clippy::too_many_arguments)]
    fn emit_span(
        &self,
        pid: u32,
        span: &[Hit],
        gram: usize,
        score: f64,
        refs: &[(String, String)],
        ref_tokens: &[String],
        origin: &[usize],
        out: &mut dyn Write,
    ) -> Result<bool, QuoteError> {
        let Some(doc) = self.index.doc(pid) else {
            return Ok(false);
        };
        let start = span[0].ref_pos;
        let end = span.last().expect("non-empty span").ref_pos + gram;
        let min2 = span
            .iter()
            .flat_map(|h| h.positions.iter())
            .min()
            .copied()
            .unwrap_or(0) as usize;
        let max2 = span
            .iter()
            .flat_map(|h| h.positions.iter())
            .max()
            .copied()
            .unwrap_or(0) as usize
            + gram;

        let words2 = doc.words();
        let ctx = self.cfg.context;
        let rs = start.saturating_sub(ctx);
        let re = (end + ctx).min(ref_tokens.len());
        let cs = min2.saturating_sub(ctx);
        let ce = (max2 + ctx).min(words2.len());

        let joined1 = ref_tokens[rs..re].join(" ");
        let joined2 = words2[cs..ce].join(" ");
        let Some(ca) = swg::align(&joined1, &joined2, &self.cfg.swg) else {
            tracing::debug!(page = %doc.name, "span context over DP budget, dropped");
            return Ok(false);
        };
        if ca.seq1.is_empty() {
            return Ok(false);
        }

        let start1 = rs + token_start(&joined1, ca.start1);
        let end1 = rs + token_end(&joined1, ca.start1, ca.end1);
        let start2 = cs + token_start(&joined2, ca.start2);
        let end2 = cs + token_end(&joined2, ca.start2, ca.end2);

        let stats = Alignment {
            seq1: ca.seq1,
            seq2: ca.seq2,
            start1,
            end1,
            start2,
            end2,
            score: ca.score,
        };
        let col_stats = stats.stats();

        let mut cites: Vec<&str> = origin[start..end.min(origin.len())]
            .iter()
            .map(|&ri| refs[ri].0.as_str())
            .collect();
        cites.dedup();

        let lm = self.cfg.lm.as_ref().map(|table| {
            ref_tokens[start..end.min(ref_tokens.len())]
                .iter()
                .filter_map(|t| table.get(t.as_str()))
                .sum()
        });

        let url = page_url(doc.meta.url.as_deref(), raw_slice(doc, start2, end2));
        let words = self
            .cfg
            .words
            .then(|| word_records(&stats.seq1, &stats.seq2, doc, start2));

        let hit = QuoteHit {
            page: &doc.name,
            date: doc.meta.date.as_deref(),
            title: doc.meta.title.as_deref(),
            language: doc.meta.language.as_deref(),
            score,
            lm,
            matches: col_stats.matches,
            gaps: col_stats.gaps,
            swscore: col_stats.score,
            start1,
            end1,
            start2,
            end2,
            text1: ref_tokens[start1..end1.min(ref_tokens.len())].join(" "),
            align1: &stats.seq1,
            align2: &stats.seq2,
            passage: words2[start2..end2.min(words2.len())].join(" "),
            url,
            cites,
            words,
        };
        if self.cfg.pretty {
            serde_json::to_writer_pretty(&mut *out, &hit)?;
        } else {
            serde_json::to_writer(&mut *out, &hit)?;
        }
        writeln!(out)?;
        Ok(true)
    }
}

/// Raw-text slice spanned by a token range, extended to the next token start
/// so trailing OCR markup stays inside the slice.
fn raw_slice(doc: &Document, tok_start: usize, tok_end: usize) -> &str {
    if tok_start >= tok_end || tok_start >= doc.tokens.len() {
        return "";
    }
    let lo = doc.tokens[tok_start].start;
    let hi = doc
        .tokens
        .get(tok_end)
        .map(|t| t.start)
        .unwrap_or(doc.text.len());
    &doc.text[lo..hi]
}

/// Per-word alignment records with corpus-side bounding boxes when the raw
/// text carries OCR coords.
fn word_records(seq1: &str, seq2: &str, doc: &Document, corpus_tok_start: usize) -> Vec<WordRecord> {
    let mut out = Vec::new();
    let mut ci = corpus_tok_start;
    for (word1, word2) in aligned_words(seq1, seq2) {
        let bbox = if word2.is_empty() {
            None
        } else {
            let b = bounding_box(raw_slice(doc, ci, ci + 1));
            ci += 1;
            b
        };
        let matched = !word1.is_empty() && word1 == word2;
        out.push(WordRecord {
            word1,
            word2,
            matched,
            bbox,
        });
    }
    out
}
