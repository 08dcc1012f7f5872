//! Greedy single-link clustering of aligned passages.
//!
//! The `cluster` stage reads the tab-separated alignment records produced by
//! `scores` and groups passages into reprint families: two passages link when
//! their token spans in a shared document overlap enough. State is held in
//! plain hash tables ([`ClusterState`]); cluster ids are assigned
//! monotonically and never reused. Output ordering is deterministic for a
//! fixed input ordering, which single-link greedy clustering requires.

mod format;
mod stage;
mod state;

pub use format::render_clusters;
pub use stage::{ClusterStage, ClusterStats};
pub use state::{ClusterConfig, ClusterState, MemberRec};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClusterError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid config: {0}")]
    InvalidConfig(String),
    #[error("malformed alignment record at line {line}: {reason}")]
    Record { line: usize, reason: String },
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}
