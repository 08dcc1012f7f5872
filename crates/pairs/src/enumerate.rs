//! The `pairs` stage: walk posting lists, filter features, emit pairs.

use std::io::Write;

use hashbrown::{HashMap, HashSet};
use xxhash_rust::xxh3::xxh3_64;

use corpus::{IndexStore, SeriesMap};

use crate::{PairError, PairRecord};

/// Configuration for [`PairEnumerator`]. Defaults mirror the CLI.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct PairsConfig {
    /// Cap on the cross-series cross-count of a feature; the bound applied is
    /// `max_series * (max_series - 1) / 2`.
    pub max_series: u32,
    /// Drop a posting whose term frequency exceeds this.
    pub max_df: u32,
    /// Keep only keys with `hash(key) % modp == 0`.
    pub modp: u64,
    /// Keep only records with `hash(pair) % modrec == 0`.
    pub modrec: u64,
    /// Skip `step * stride` keys before scanning.
    pub step: usize,
    /// Number of keys to scan after the skip.
    pub stride: usize,
    /// Drop features whose mean token character length is below this.
    pub word_length: f64,
    /// Emit a series-pair histogram instead of records.
    pub counts: bool,
    /// Stopword set; features containing any stopword are dropped.
    #[serde(default)]
    pub stop: HashSet<String>,
}

impl Default for PairsConfig {
    fn default() -> Self {
        PairsConfig {
            max_series: 100,
            max_df: 100,
            modp: 1,
            modrec: 1,
            step: 0,
            stride: 1000,
            word_length: 1.5,
            counts: false,
            stop: HashSet::new(),
        }
    }
}

impl PairsConfig {
    pub fn with_max_series(mut self, max_series: u32) -> Self {
        self.max_series = max_series;
        self
    }

    pub fn with_max_df(mut self, max_df: u32) -> Self {
        self.max_df = max_df;
        self
    }

    pub fn with_shard(mut self, modp: u64, modrec: u64) -> Self {
        self.modp = modp;
        self.modrec = modrec;
        self
    }

    pub fn with_window(mut self, step: usize, stride: usize) -> Self {
        self.step = step;
        self.stride = stride;
        self
    }

    pub fn with_word_length(mut self, word_length: f64) -> Self {
        self.word_length = word_length;
        self
    }

    pub fn with_counts(mut self, counts: bool) -> Self {
        self.counts = counts;
        self
    }

    pub fn with_stop(mut self, stop: HashSet<String>) -> Self {
        self.stop = stop;
        self
    }

    pub fn validate(&self) -> Result<(), PairError> {
        if self.modp == 0 || self.modrec == 0 {
            return Err(PairError::InvalidConfig(
                "modp and modrec must be at least 1".into(),
            ));
        }
        if self.stride == 0 {
            return Err(PairError::InvalidConfig("stride must be positive".into()));
        }
        if !self.word_length.is_finite() || self.word_length < 0.0 {
            return Err(PairError::InvalidConfig(
                "word-length must be a non-negative number".into(),
            ));
        }
        Ok(())
    }
}

/// Counters reported once per run.
#[derive(Debug, Default, Clone, Copy)]
pub struct PairStats {
    pub keys_scanned: u64,
    pub keys_kept: u64,
    pub pairs_emitted: u64,
}

/// Streaming enumerator over one index part.
pub struct PairEnumerator<'a> {
    index: &'a dyn IndexStore,
    series: &'a SeriesMap,
    cfg: PairsConfig,
}

impl<'a> PairEnumerator<'a> {
    pub fn new(
        index: &'a dyn IndexStore,
        series: &'a SeriesMap,
        cfg: PairsConfig,
    ) -> Result<Self, PairError> {
        cfg.validate()?;
        Ok(PairEnumerator { index, series, cfg })
    }

    /// Walk the configured key window and write records (or the counts
    /// histogram) to `out`.
    pub fn run(&self, out: &mut dyn Write) -> Result<PairStats, PairError> {
        let cfg = &self.cfg;
        let upper = u64::from(cfg.max_series) * u64::from(cfg.max_series.saturating_sub(1)) / 2;
        let mut stats = PairStats::default();
        let mut histogram: HashMap<(String, String), u64> = HashMap::new();

        for (key, list) in self
            .index
            .scan()
            .skip(cfg.step * cfg.stride)
            .take(cfg.stride)
        {
            stats.keys_scanned += 1;

            if cfg.modp > 1 && xxh3_64(key.as_bytes()) % cfg.modp != 0 {
                continue;
            }
            if !self.key_shape_ok(key) {
                continue;
            }
            if u64::from(list.total) > upper {
                continue;
            }
            if self.cross_count(list) > upper {
                continue;
            }
            stats.keys_kept += 1;

            // Entries are sorted by doc id, so i < j gives docA < docB.
            for (i, a) in list.entries.iter().enumerate() {
                if a.tf > cfg.max_df {
                    continue;
                }
                let sa = self.series.series(a.doc);
                for b in &list.entries[i + 1..] {
                    if b.tf > cfg.max_df || self.series.series(b.doc) == sa {
                        continue;
                    }
                    if cfg.modrec > 1 && pair_hash(a.doc, b.doc) % cfg.modrec != 0 {
                        continue;
                    }
                    stats.pairs_emitted += 1;
                    if cfg.counts {
                        let key = (
                            self.series_name(a.doc).to_string(),
                            self.series_name(b.doc).to_string(),
                        );
                        *histogram.entry(key).or_insert(0) += 1;
                    } else {
                        let record = PairRecord {
                            docs: (a.doc, b.doc),
                            features: vec![crate::Feature {
                                gram: String::new(),
                                total: list.total,
                                tf1: a.tf,
                                tf2: b.tf,
                            }],
                        };
                        writeln!(out, "{}", record.to_line())?;
                    }
                }
            }
        }

        if cfg.counts {
            let mut rows: Vec<_> = histogram.into_iter().collect();
            rows.sort();
            for ((sa, sb), n) in rows {
                writeln!(out, "{sa}\t{sb}\t{n}")?;
            }
        }

        tracing::info!(
            keys_scanned = stats.keys_scanned,
            keys_kept = stats.keys_kept,
            pairs_emitted = stats.pairs_emitted,
            "pair enumeration done"
        );
        Ok(stats)
    }

    /// Stopword and mean-token-length filters over the `~`-joined key.
    fn key_shape_ok(&self, key: &str) -> bool {
        let mut tokens = 0usize;
        let mut chars = 0usize;
        for tok in key.split('~') {
            if self.cfg.stop.contains(tok) {
                return false;
            }
            tokens += 1;
            chars += tok.chars().count();
        }
        tokens > 0 && chars as f64 / tokens as f64 >= self.cfg.word_length
    }

    /// Number of cross-series unordered document pairs this feature induces:
    /// `sum_{i<j} g_i * g_j` over series group sizes.
    fn cross_count(&self, list: &corpus::PostingList) -> u64 {
        let mut groups: HashMap<u32, u64> = HashMap::new();
        for p in &list.entries {
            *groups.entry(self.series.series(p.doc)).or_insert(0) += 1;
        }
        let total: u64 = groups.values().sum();
        let same: u64 = groups.values().map(|g| g * g).sum();
        (total * total - same) / 2
    }

    fn series_name(&self, doc: u32) -> &str {
        self.index
            .doc_name(doc)
            .map(corpus::series_of)
            .unwrap_or("")
    }
}

fn pair_hash(a: u32, b: u32) -> u64 {
    let mut bytes = [0u8; 8];
    bytes[..4].copy_from_slice(&a.to_le_bytes());
    bytes[4..].copy_from_slice(&b.to_le_bytes());
    xxh3_64(&bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use corpus::{Document, NgramIndex};

    fn emit(index: &NgramIndex, cfg: PairsConfig) -> Vec<String> {
        let series = SeriesMap::from_index(index);
        let mut out = Vec::new();
        PairEnumerator::new(index, &series, cfg)
            .unwrap()
            .run(&mut out)
            .unwrap();
        String::from_utf8(out)
            .unwrap()
            .lines()
            .map(str::to_string)
            .collect()
    }

    fn fox_corpus() -> NgramIndex {
        NgramIndex::from_documents(
            vec![
                Document::new("a/1", "alpha beta the quick brown fox jumps gamma delta"),
                Document::new("a/2", "unrelated words only here today"),
                Document::new("b/1", "intro text the quick brown fox jumps closing words"),
            ],
            5,
        )
    }

    #[test]
    fn emits_single_cross_series_pair() {
        let lines = emit(&fox_corpus(), PairsConfig::default());
        assert_eq!(lines, vec![r#"[[0 2] [["" 2 1 1]]]"#]);
    }

    #[test]
    fn within_series_pairs_are_suppressed() {
        let index = NgramIndex::from_documents(
            vec![
                Document::new("a/1", "the quick brown fox jumps"),
                Document::new("a/2", "the quick brown fox jumps"),
            ],
            5,
        );
        assert!(emit(&index, PairsConfig::default()).is_empty());
    }

    #[test]
    fn stopword_kills_feature() {
        let stop: HashSet<String> = ["the"].iter().map(|s| s.to_string()).collect();
        let lines = emit(&fox_corpus(), PairsConfig::default().with_stop(stop));
        // The only shared 5-gram contains "the", so nothing survives.
        assert!(lines.is_empty());
    }

    #[test]
    fn short_tokens_filtered_by_word_length() {
        let index = NgramIndex::from_documents(
            vec![
                Document::new("a/1", "a b c d e longer tail one"),
                Document::new("b/1", "a b c d e other close two"),
            ],
            5,
        );
        // "a~b~c~d~e" has mean length 1.0 < 1.5.
        let lines = emit(&index, PairsConfig::default());
        assert!(lines.is_empty());
    }

    #[test]
    fn max_series_one_excludes_everything() {
        // upper = 0, so every feature fails the total bound.
        let lines = emit(&fox_corpus(), PairsConfig::default().with_max_series(1));
        assert!(lines.is_empty());
    }

    #[test]
    fn max_df_drops_heavy_postings() {
        let index = NgramIndex::from_documents(
            vec![
                Document::new("a/1", "ho hum ho hum ho hum ho hum"),
                Document::new("b/1", "ho hum again and again and again"),
            ],
            2,
        );
        let lines = emit(&index, PairsConfig::default().with_max_df(1));
        // "ho~hum" has tf 4 in a/1; with max_df 1 that posting is dropped.
        assert!(lines.is_empty());
    }

    #[test]
    fn counts_mode_emits_histogram() {
        let lines = emit(&fox_corpus(), PairsConfig::default().with_counts(true));
        assert_eq!(lines, vec!["a\tb\t1"]);
    }

    #[test]
    fn step_skips_whole_windows() {
        let index = fox_corpus();
        let lines = emit(&index, PairsConfig::default().with_window(1, 1000));
        // Fewer than 1000 keys exist, so window 1 is empty.
        assert!(lines.is_empty());
    }

    #[test]
    fn cross_count_formula() {
        let index = NgramIndex::from_documents(
            vec![
                Document::new("a/1", "shared five gram run here"),
                Document::new("a/2", "shared five gram run here"),
                Document::new("b/1", "shared five gram run here"),
                Document::new("c/1", "shared five gram run here"),
            ],
            5,
        );
        let series = SeriesMap::from_index(&index);
        let cfg = PairsConfig::default();
        let enumerator = PairEnumerator::new(&index, &series, cfg).unwrap();
        let list = index.postings("shared~five~gram~run~here").unwrap();
        // groups {a:2, b:1, c:1}: 2*1 + 2*1 + 1*1 = 5
        assert_eq!(enumerator.cross_count(list), 5);
    }

    #[test]
    fn invalid_config_rejected() {
        assert!(PairsConfig::default().with_shard(0, 1).validate().is_err());
        assert!(PairsConfig::default().with_window(0, 0).validate().is_err());
    }
}
