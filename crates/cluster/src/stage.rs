//! The `cluster` stage: alignment TSV in, cluster JSON lines out.

use std::io::{BufRead, Write};

use serde::Serialize;

use corpus::series_of;

use crate::state::{ClusterConfig, ClusterState, MemberRec};
use crate::ClusterError;

/// Counters reported once per run.
#[derive(Debug, Default, Clone, Copy)]
pub struct ClusterStats {
    pub records: u64,
    pub clusters: u64,
}

#[derive(Serialize)]
struct ClusterOut<'a> {
    id: usize,
    size: usize,
    members: &'a [(String, usize, usize)],
}

/// Single-process clustering over the full record stream.
pub struct ClusterStage {
    cfg: ClusterConfig,
}

impl ClusterStage {
    pub fn new(cfg: ClusterConfig) -> Result<Self, ClusterError> {
        cfg.validate()?;
        Ok(ClusterStage { cfg })
    }

    pub fn run(
        &self,
        input: impl BufRead,
        out: &mut dyn Write,
    ) -> Result<ClusterStats, ClusterError> {
        let mut state = ClusterState::new(self.cfg.clone())?;
        let mut stats = ClusterStats::default();

        for (lineno, line) in input.lines().enumerate() {
            let line = line?;
            if line.is_empty() {
                continue;
            }
            let (r1, r2) = parse_alignment_record(&line, lineno + 1)?;
            state.add(r1, r2);
            stats.records += 1;
        }

        // Size is the number of distinct names; members are keyed by doc id,
        // so the two coincide unless the index maps one name to several ids.
        let mut id = 0usize;
        for members in state.finish() {
            id += 1;
            let mut names: Vec<&str> = members.iter().map(|m| m.0.as_str()).collect();
            names.dedup();
            let rendered = ClusterOut {
                id,
                size: names.len(),
                members: &members,
            };
            serde_json::to_writer(&mut *out, &rendered)?;
            writeln!(out)?;
        }
        stats.clusters = id as u64;

        tracing::info!(
            records = stats.records,
            clusters = stats.clusters,
            "clustering done"
        );
        Ok(stats)
    }
}

fn numeric<T: std::str::FromStr>(
    fields: &[&str],
    idx: usize,
    what: &str,
    lineno: usize,
) -> Result<T, ClusterError> {
    fields[idx].parse().map_err(|_| ClusterError::Record {
        line: lineno,
        reason: format!("bad {what}"),
    })
}

/// Pull the two member records out of one 16-field `scores` line.
pub(crate) fn parse_alignment_record(
    line: &str,
    lineno: usize,
) -> Result<(MemberRec, MemberRec), ClusterError> {
    let fields: Vec<&str> = line.split('\t').collect();
    if fields.len() != 16 {
        return Err(ClusterError::Record {
            line: lineno,
            reason: format!("expected 16 fields, got {}", fields.len()),
        });
    }
    let score: f64 = numeric(&fields, 3, "matches", lineno)?;
    let id1: u32 = numeric(&fields, 6, "id1", lineno)?;
    let id2: u32 = numeric(&fields, 7, "id2", lineno)?;
    let (name1, name2) = (fields[8], fields[9]);

    let r1 = MemberRec {
        doc: id1,
        name: name1.to_string(),
        series: series_of(name1).to_string(),
        score,
        start: numeric(&fields, 10, "s1", lineno)?,
        end: numeric(&fields, 11, "e1", lineno)?,
    };
    let r2 = MemberRec {
        doc: id2,
        name: name2.to_string(),
        series: series_of(name2).to_string(),
        score,
        start: numeric(&fields, 12, "s2", lineno)?,
        end: numeric(&fields, 13, "e2", lineno)?,
    };
    for r in [&r1, &r2] {
        if r.start > r.end {
            return Err(ClusterError::Record {
                line: lineno,
                reason: "inverted span".into(),
            });
        }
    }
    Ok((r1, r2))
}
