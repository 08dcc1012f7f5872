//! Mutable single-link clustering state.

use hashbrown::{HashMap, HashSet};
use serde::{Deserialize, Serialize};

use crate::ClusterError;

/// Linkage and quota configuration. Defaults mirror the CLI.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterConfig {
    /// Absolute token-overlap threshold; when positive it replaces the
    /// relative criterion.
    pub min_overlap: usize,
    /// Relative span overlap threshold, `intersection / max(len1, len2)`.
    pub relative_overlap: f64,
    /// Drop clusters where one series holds more than this fraction of
    /// members. Disabled at 1.0.
    pub max_proportion: f64,
    /// Drop clusters where one series holds more than this many members.
    pub max_repeats: usize,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        ClusterConfig {
            min_overlap: 0,
            relative_overlap: 0.5,
            max_proportion: 1.0,
            max_repeats: 4,
        }
    }
}

impl ClusterConfig {
    pub fn with_min_overlap(mut self, min_overlap: usize) -> Self {
        self.min_overlap = min_overlap;
        self
    }

    pub fn with_relative_overlap(mut self, relative_overlap: f64) -> Self {
        self.relative_overlap = relative_overlap;
        self
    }

    pub fn with_max_proportion(mut self, max_proportion: f64) -> Self {
        self.max_proportion = max_proportion;
        self
    }

    pub fn with_max_repeats(mut self, max_repeats: usize) -> Self {
        self.max_repeats = max_repeats;
        self
    }

    pub fn validate(&self) -> Result<(), ClusterError> {
        if !(0.0..=1.0).contains(&self.relative_overlap) {
            return Err(ClusterError::InvalidConfig(
                "relative-overlap must be between 0 and 1".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.max_proportion) || self.max_proportion <= 0.0 {
            return Err(ClusterError::InvalidConfig(
                "max-proportion must be in (0, 1]".into(),
            ));
        }
        if self.max_repeats == 0 {
            return Err(ClusterError::InvalidConfig(
                "max-repeats must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// One document's passage inside a cluster.
#[derive(Debug, Clone, PartialEq)]
pub struct MemberRec {
    pub doc: u32,
    pub name: String,
    pub series: String,
    pub score: f64,
    pub start: usize,
    pub end: usize,
}

/// Clustering state: `members[cid]` maps doc id to its passage, and
/// `clusters[doc]` is the set of cluster ids the document belongs to (one
/// document can carry several disjoint reused spans).
///
/// Invariant: cluster ids are assigned monotonically from `top` and never
/// reused; a merge survives under the smallest id among the merged set.
pub struct ClusterState {
    cfg: ClusterConfig,
    top: u32,
    members: HashMap<u32, HashMap<u32, MemberRec>>,
    clusters: HashMap<u32, HashSet<u32>>,
}

impl ClusterState {
    pub fn new(cfg: ClusterConfig) -> Result<Self, ClusterError> {
        cfg.validate()?;
        Ok(ClusterState {
            cfg,
            top: 0,
            members: HashMap::new(),
            clusters: HashMap::new(),
        })
    }

    pub fn cluster_count(&self) -> usize {
        self.members.len()
    }

    /// Link one alignment record into the state.
    pub fn add(&mut self, r1: MemberRec, r2: MemberRec) {
        let mut matches: Vec<u32> = Vec::new();
        self.matching_clusters(&r1, &mut matches);
        self.matching_clusters(&r2, &mut matches);
        matches.sort_unstable();
        matches.dedup();

        match matches.len() {
            0 => {
                let cid = self.top;
                self.top += 1;
                let mut recs = HashMap::new();
                self.clusters.entry(r1.doc).or_default().insert(cid);
                self.clusters.entry(r2.doc).or_default().insert(cid);
                recs.insert(r1.doc, r1);
                recs.insert(r2.doc, r2);
                self.members.insert(cid, recs);
            }
            1 => {
                let cid = matches[0];
                let recs = self.members.get_mut(&cid).expect("live cluster id");
                self.clusters.entry(r1.doc).or_default().insert(cid);
                self.clusters.entry(r2.doc).or_default().insert(cid);
                recs.insert(r1.doc, r1);
                recs.insert(r2.doc, r2);
            }
            _ => {
                let survivor = matches[0];
                let mut unified = self.members.remove(&survivor).expect("live cluster id");
                for &cid in &matches[1..] {
                    let old = self.members.remove(&cid).expect("live cluster id");
                    unified.extend(old);
                }
                unified.insert(r1.doc, r1);
                unified.insert(r2.doc, r2);
                // Re-point every document in the merged set, not only the two
                // from this record; stale ids must not linger.
                for doc in unified.keys() {
                    let set = self.clusters.entry(*doc).or_default();
                    for cid in &matches {
                        set.remove(cid);
                    }
                    set.insert(survivor);
                }
                self.members.insert(survivor, unified);
            }
        }
    }

    /// Clusters already containing `rec.doc` with enough span overlap.
    fn matching_clusters(&self, rec: &MemberRec, out: &mut Vec<u32>) {
        let Some(cids) = self.clusters.get(&rec.doc) else {
            return;
        };
        for &cid in cids {
            if let Some(existing) = self.members.get(&cid).and_then(|m| m.get(&rec.doc)) {
                if self.overlap_ok(existing, rec) {
                    out.push(cid);
                }
            }
        }
    }

    fn overlap_ok(&self, a: &MemberRec, b: &MemberRec) -> bool {
        let lo = a.start.max(b.start);
        let hi = a.end.min(b.end);
        let inter = hi.saturating_sub(lo);
        if self.cfg.min_overlap > 0 {
            inter >= self.cfg.min_overlap
        } else {
            let denom = (a.end - a.start).max(b.end - b.start);
            denom > 0 && inter as f64 / denom as f64 >= self.cfg.relative_overlap
        }
    }

    /// Apply the series quotas and return surviving clusters as rendered
    /// member lists, sorted for output: size descending, then lexicographic
    /// member list; members sorted by `(name, start)`.
    pub fn finish(self) -> Vec<Vec<(String, usize, usize)>> {
        let cfg = &self.cfg;
        let mut kept: Vec<Vec<(String, usize, usize)>> = Vec::new();

        for (_, recs) in self.members {
            let size = recs.len();
            let mut per_series: HashMap<&str, usize> = HashMap::new();
            for rec in recs.values() {
                *per_series.entry(rec.series.as_str()).or_insert(0) += 1;
            }
            let top_rep = per_series.values().copied().max().unwrap_or(0);
            if cfg.max_proportion < 1.0 && top_rep as f64 / size as f64 > cfg.max_proportion {
                continue;
            }
            if top_rep > cfg.max_repeats {
                continue;
            }
            drop(per_series);
            let mut members: Vec<(String, usize, usize)> = recs
                .into_values()
                .map(|r| (r.name, r.start, r.end))
                .collect();
            members.sort();
            kept.push(members);
        }

        kept.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
        kept
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(doc: u32, name: &str, start: usize, end: usize) -> MemberRec {
        MemberRec {
            doc,
            name: name.to_string(),
            series: corpus::series_of(name).to_string(),
            score: 100.0,
            start,
            end,
        }
    }

    fn state() -> ClusterState {
        ClusterState::new(ClusterConfig::default()).unwrap()
    }

    #[test]
    fn triangle_collapses_to_one_cluster() {
        let mut s = state();
        // (A,B), (B,C), (A,C); all spans overlap at 80%.
        s.add(rec(0, "a/1", 0, 100), rec(1, "b/1", 0, 100));
        s.add(rec(1, "b/1", 10, 110), rec(2, "c/1", 0, 100));
        s.add(rec(0, "a/1", 10, 110), rec(2, "c/1", 10, 110));
        let out = s.finish();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].len(), 3);
    }

    #[test]
    fn merge_order_is_immaterial_for_membership() {
        let run = |order: &[((u32, &str), (u32, &str))]| {
            let mut s = state();
            for ((d1, n1), (d2, n2)) in order {
                s.add(rec(*d1, n1, 0, 100), rec(*d2, n2, 0, 100));
            }
            let mut names: Vec<String> = s.finish().remove(0).into_iter().map(|m| m.0).collect();
            names.sort();
            names
        };
        // (A,B), (C,D), (B,C) merges two clusters; (A,B), (B,C), (C,D) chains.
        let merged = run(&[((0, "a/1"), (1, "b/1")), ((2, "c/1"), (3, "d/1")), ((1, "b/1"), (2, "c/1"))]);
        let chained = run(&[((0, "a/1"), (1, "b/1")), ((1, "b/1"), (2, "c/1")), ((2, "c/1"), (3, "d/1"))]);
        assert_eq!(merged, chained);
        assert_eq!(merged, vec!["a/1", "b/1", "c/1", "d/1"]);
    }

    #[test]
    fn merge_survivor_is_smallest_cid_and_ids_never_reused() {
        let mut s = state();
        s.add(rec(0, "a/1", 0, 100), rec(1, "b/1", 0, 100)); // cid 0
        s.add(rec(2, "c/1", 0, 100), rec(3, "d/1", 0, 100)); // cid 1
        s.add(rec(1, "b/1", 0, 100), rec(2, "c/1", 0, 100)); // merge -> 0
        assert_eq!(s.cluster_count(), 1);
        assert!(s.members.contains_key(&0));
        // A fresh pair must take a never-used id.
        s.add(rec(8, "x/1", 0, 100), rec(9, "y/1", 0, 100));
        assert!(s.members.contains_key(&2));
        assert_eq!(s.top, 3);
    }

    #[test]
    fn merge_repoints_all_documents() {
        let mut s = state();
        s.add(rec(0, "a/1", 0, 100), rec(1, "b/1", 0, 100)); // cid 0
        s.add(rec(2, "c/1", 0, 100), rec(3, "d/1", 0, 100)); // cid 1
        s.add(rec(1, "b/1", 0, 100), rec(2, "c/1", 0, 100)); // merge
        // Documents 0 and 3 were only in the pre-merge clusters; their sets
        // must point at the survivor, with no stale ids.
        assert_eq!(s.clusters[&0], HashSet::from_iter([0u32]));
        assert_eq!(s.clusters[&3], HashSet::from_iter([0u32]));
    }

    #[test]
    fn disjoint_spans_in_one_document_form_two_clusters() {
        let mut s = state();
        s.add(rec(0, "a/1", 0, 50), rec(1, "b/1", 0, 50));
        s.add(rec(0, "a/1", 500, 550), rec(2, "c/1", 0, 50));
        assert_eq!(s.cluster_count(), 2);
        assert_eq!(s.clusters[&0].len(), 2);
    }

    #[test]
    fn relative_overlap_below_threshold_does_not_link() {
        let mut s = state();
        s.add(rec(0, "a/1", 0, 100), rec(1, "b/1", 0, 100));
        // 30 of 100 tokens overlap: 0.3 < 0.5.
        s.add(rec(0, "a/1", 70, 170), rec(2, "c/1", 0, 100));
        assert_eq!(s.cluster_count(), 2);
    }

    #[test]
    fn absolute_overlap_criterion_when_min_overlap_set() {
        let cfg = ClusterConfig::default().with_min_overlap(10);
        let mut s = ClusterState::new(cfg).unwrap();
        s.add(rec(0, "a/1", 0, 100), rec(1, "b/1", 0, 100));
        // 30-token absolute overlap passes even though the ratio is 0.3.
        s.add(rec(0, "a/1", 70, 170), rec(2, "c/1", 0, 100));
        assert_eq!(s.cluster_count(), 1);
    }

    #[test]
    fn repeated_series_quota_drops_cluster() {
        let cfg = ClusterConfig::default().with_max_repeats(1);
        let mut s = ClusterState::new(cfg).unwrap();
        // A and C share series "s1".
        s.add(rec(0, "s1/1", 0, 100), rec(1, "b/1", 0, 100));
        s.add(rec(1, "b/1", 0, 100), rec(2, "s1/2", 0, 100));
        s.add(rec(0, "s1/1", 0, 100), rec(2, "s1/2", 0, 100));
        assert!(s.finish().is_empty());
    }

    #[test]
    fn proportion_quota_drops_dominated_cluster() {
        let cfg = ClusterConfig::default().with_max_proportion(0.5);
        let mut s = ClusterState::new(cfg).unwrap();
        s.add(rec(0, "s1/1", 0, 100), rec(1, "s1/2", 0, 100));
        s.add(rec(1, "s1/2", 0, 100), rec(2, "b/1", 0, 100));
        // s1 holds 2 of 3 members: 0.67 > 0.5.
        assert!(s.finish().is_empty());
    }

    #[test]
    fn output_sorted_by_size_then_members() {
        let mut s = state();
        s.add(rec(0, "a/1", 0, 100), rec(1, "b/1", 0, 100));
        s.add(rec(1, "b/1", 0, 100), rec(2, "c/1", 0, 100));
        s.add(rec(5, "x/1", 0, 40), rec(6, "y/1", 0, 40));
        let out = s.finish();
        assert_eq!(out[0].len(), 3);
        assert_eq!(out[1].len(), 2);
        assert_eq!(out[1][0].0, "x/1");
    }

    #[test]
    fn later_record_overwrites_member_span() {
        let mut s = state();
        s.add(rec(0, "a/1", 0, 100), rec(1, "b/1", 0, 100));
        s.add(rec(0, "a/1", 5, 105), rec(1, "b/1", 2, 102));
        let out = s.finish();
        assert_eq!(out[0], vec![("a/1".to_string(), 5, 105), ("b/1".to_string(), 2, 102)]);
    }

    #[test]
    fn bad_config_rejected() {
        assert!(ClusterState::new(ClusterConfig::default().with_relative_overlap(1.5)).is_err());
        assert!(ClusterState::new(ClusterConfig::default().with_max_repeats(0)).is_err());
    }
}
