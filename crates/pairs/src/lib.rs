//! Candidate pair generation for reprint detection.
//!
//! Two streaming stages live here. [`PairEnumerator`] walks an index part's
//! posting lists, filters features by rarity and shape, and emits one record
//! per cross-series document pair sharing a feature. [`PairMerger`] coalesces
//! contiguous runs of records for the same pair and applies the minimum
//! feature-count threshold.
//!
//! Between the two stages sits an external sort by pair key; inside a single
//! posting list the enumerator already emits pairs in `(docA, docB)` order.

mod enumerate;
mod merge;
pub mod record;

pub use enumerate::{PairEnumerator, PairStats, PairsConfig};
pub use merge::{MergeConfig, PairMerger};
pub use record::{Feature, PairRecord};

use thiserror::Error;

/// Errors from the pair stages. Malformed input records are fatal per stage;
/// everything else is configuration or I/O.
#[derive(Debug, Error)]
pub enum PairError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid config: {0}")]
    InvalidConfig(String),
    #[error("malformed pair record at line {line}: {reason}")]
    Record { line: usize, reason: String },
}
