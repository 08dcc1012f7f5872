//! Human-readable rendering of cluster JSON lines.
//!
//! Thin presentation layer over the `cluster` output: slices each member's
//! passage back out of the index and prints a block per cluster.

use std::io::{BufRead, Write};

use chrono::NaiveDate;
use serde::Deserialize;

use corpus::IndexStore;

use crate::ClusterError;

#[derive(Deserialize)]
struct ClusterIn {
    id: usize,
    size: usize,
    members: Vec<(String, usize, usize)>,
}

/// Render each cluster JSON line as a readable block, resolving member
/// passages through `index`. Members print in date order (undated last) so a
/// reprint family reads as a timeline. Unknown names or out-of-range spans
/// render as empty passages rather than failing the stream.
pub fn render_clusters(
    index: &dyn IndexStore,
    input: impl BufRead,
    out: &mut dyn Write,
) -> Result<u64, ClusterError> {
    let mut rendered = 0u64;
    for (lineno, line) in input.lines().enumerate() {
        let line = line?;
        if line.is_empty() {
            continue;
        }
        let mut cluster: ClusterIn =
            serde_json::from_str(&line).map_err(|e| ClusterError::Record {
                line: lineno + 1,
                reason: e.to_string(),
            })?;
        cluster.members.sort_by_key(|(name, start, _)| {
            let date = index
                .doc_id(name)
                .and_then(|id| index.doc(id))
                .and_then(|d| d.meta.date.as_deref())
                .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok());
            (date.is_none(), date, name.clone(), *start)
        });
        writeln!(out, "Cluster {} ({} members)", cluster.id, cluster.size)?;
        for (name, start, end) in &cluster.members {
            let doc = index.doc_id(name).and_then(|id| index.doc(id));
            let passage = doc
                .map(|d| {
                    let words = d.words();
                    let lo = (*start).min(words.len());
                    let hi = (*end).min(words.len());
                    words[lo..hi].join(" ")
                })
                .unwrap_or_default();
            let date = doc
                .and_then(|d| d.meta.date.as_deref())
                .unwrap_or("-");
            writeln!(out, "  {date}  {name} [{start},{end})")?;
            writeln!(out, "    {passage}")?;
        }
        writeln!(out)?;
        rendered += 1;
    }
    Ok(rendered)
}
