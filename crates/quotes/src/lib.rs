//! Quotation hunting: align reference texts against a corpus index.
//!
//! The alternate front end of the pipeline. Instead of enumerating all
//! candidate pairs, [`QuoteHunter`] takes one or more reference documents,
//! probes the index for every rare n-gram they contain, chains the hits on
//! each corpus page into candidate spans, refines each span with a local
//! alignment over surrounding context, and emits one JSON hit per span.

mod hunt;
mod page;

pub use hunt::{QuoteHunter, QuoteStats, QuotesConfig};
pub use page::{bounding_box, page_anchor, page_url, parse_coords};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum QuoteError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid config: {0}")]
    InvalidConfig(String),
    #[error("malformed reference row at line {line}: {reason}")]
    Record { line: usize, reason: String },
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}
