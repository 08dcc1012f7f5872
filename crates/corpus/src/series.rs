//! Series identification.
//!
//! Document names follow a `series/issue` convention; the series prefix
//! groups documents from one publication. Candidate pairs inside a single
//! series are suppressed by the enumerator, so the map must be cheap to
//! probe: a dense `Vec<u32>` indexed by doc id.

use std::io::BufRead;

use hashbrown::HashMap;

use crate::{CorpusError, IndexStore};

/// Series prefix of a document name: everything before the first `/`, or the
/// whole name when it has no delimiter.
pub fn series_of(name: &str) -> &str {
    match name.find('/') {
        Some(idx) => &name[..idx],
        None => name,
    }
}

/// Dense `doc id -> series id` mapping.
///
/// Series ids are interned starting at 1; id 0 is the sentinel for unknown
/// documents. Callers only ever compare series ids for equality, so the
/// sentinel is safe as long as it is used consistently.
pub struct SeriesMap {
    series: Vec<u32>,
}

impl SeriesMap {
    /// Build by scanning the index's doc-name table and interning prefixes.
    pub fn from_index(index: &dyn IndexStore) -> Self {
        let mut intern: HashMap<String, u32> = HashMap::new();
        let mut series = Vec::with_capacity(index.doc_count());
        for id in 0..index.doc_count() as u32 {
            let sid = match index.doc_name(id) {
                Some(name) => {
                    let prefix = series_of(name);
                    let next = intern.len() as u32 + 1;
                    *intern.entry_ref(prefix).or_insert(next)
                }
                None => 0,
            };
            series.push(sid);
        }
        SeriesMap { series }
    }

    /// Load a precomputed `docId\tseriesId` table. Ids must be ascending and
    /// the max doc id is the last line's id.
    pub fn from_tsv(reader: impl BufRead) -> Result<Self, CorpusError> {
        let mut series = Vec::new();
        for (lineno, line) in reader.lines().enumerate() {
            let line = line?;
            if line.is_empty() {
                continue;
            }
            let mut fields = line.split('\t');
            let doc: usize = fields
                .next()
                .and_then(|f| f.parse().ok())
                .ok_or_else(|| CorpusError::SeriesMap {
                    line: lineno + 1,
                    reason: "bad doc id".into(),
                })?;
            let sid: u32 = fields
                .next()
                .and_then(|f| f.parse().ok())
                .ok_or_else(|| CorpusError::SeriesMap {
                    line: lineno + 1,
                    reason: "bad series id".into(),
                })?;
            if doc < series.len() {
                return Err(CorpusError::SeriesMap {
                    line: lineno + 1,
                    reason: "doc ids must be ascending".into(),
                });
            }
            series.resize(doc, 0);
            series.push(sid);
        }
        Ok(SeriesMap { series })
    }

    /// Series id for a document; 0 for ids outside the map.
    pub fn series(&self, doc: u32) -> u32 {
        self.series.get(doc as usize).copied().unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }
}
