//! Document model and n-gram index access for reprint detection.
//!
//! This crate owns the read side of the pipeline: the [`Document`] model with
//! offset-preserving tokens, the [`IndexStore`] trait that every downstream
//! stage consumes, the concrete [`NgramIndex`] snapshot implementation, and
//! the [`SeriesMap`] used to suppress within-series candidate pairs.
//!
//! Stages never see raw files. They are handed an `&dyn IndexStore` (opened
//! once per process, used single-threaded) and read or write line-delimited
//! records on injected handles.

mod index;
mod series;
mod token;

pub use index::{NgramIndex, Posting, PostingList, INDEX_SCHEMA_VERSION};
pub use series::{series_of, SeriesMap};
pub use token::{tokenize, Token};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors produced while opening or reading corpus data.
#[derive(Debug, Error)]
pub enum CorpusError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("snapshot encode error: {0}")]
    Encode(String),
    #[error("snapshot decode error: {0}")]
    Decode(String),
    #[error("unsupported index schema version {found} (expected {expected})")]
    SchemaVersion { found: u16, expected: u16 },
    #[error("malformed series map line {line}: {reason}")]
    SeriesMap { line: usize, reason: String },
}

/// Small per-document metadata map. Absent fields propagate as JSON null in
/// downstream output rather than failing a record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocMeta {
    pub date: Option<String>,
    pub title: Option<String>,
    pub url: Option<String>,
    pub language: Option<String>,
}

/// An immutable corpus document: external name, raw text, and the token
/// sequence with byte offsets into that text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub name: String,
    pub text: String,
    pub tokens: Vec<Token>,
    #[serde(default)]
    pub meta: DocMeta,
}

impl Document {
    /// Build a document by tokenizing `text`.
    pub fn new(name: impl Into<String>, text: impl Into<String>) -> Self {
        let text = text.into();
        let tokens = tokenize(&text);
        Document {
            name: name.into(),
            text,
            tokens,
            meta: DocMeta::default(),
        }
    }

    pub fn with_meta(mut self, meta: DocMeta) -> Self {
        self.meta = meta;
        self
    }

    /// Token texts as string slices, in order.
    pub fn words(&self) -> Vec<&str> {
        self.tokens.iter().map(|t| t.text.as_str()).collect()
    }

    /// The series prefix of this document's name.
    pub fn series(&self) -> &str {
        series_of(&self.name)
    }
}

/// Read interface over a precomputed n-gram inverted index.
///
/// Implementations hold the whole corpus view needed by the pipeline: doc-id
/// assignment, name lookup in both directions, token sequences, and posting
/// lists keyed by `~`-joined n-grams. Keys scan in lexicographic order so the
/// `step`/`stride` sharding of the pair enumerator is deterministic.
pub trait IndexStore {
    /// N-gram order the index was built with.
    fn gram(&self) -> usize;

    fn doc_count(&self) -> usize;
    fn doc(&self, id: u32) -> Option<&Document>;
    fn doc_name(&self, id: u32) -> Option<&str>;
    fn doc_id(&self, name: &str) -> Option<u32>;

    fn key_count(&self) -> usize;
    /// Ordered scan over every `(key, postings)` entry.
    fn scan<'a>(&'a self) -> Box<dyn Iterator<Item = (&'a str, &'a PostingList)> + 'a>;
    /// Exact-key probe. Absent keys are a silent miss, not an error.
    fn postings(&self, key: &str) -> Option<&PostingList>;
}
