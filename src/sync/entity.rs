//! The view of a snapshot that the scheduler needs.
//!
//! Anything the upstream returns can be synchronized as long as it exposes a
//! stable id, a lifecycle status and the two in-play fields the cadence policy
//! reads.

use thiserror::Error;

use crate::db::models::GameStatus;

/// Data-quality problems with a single snapshot. These never abort a cycle.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SnapshotError {
    #[error("missing required field `{0}`")]
    MissingField(&'static str),

    #[error("malformed snapshot: {0}")]
    Malformed(String),

    #[error("status regressed from {from:?} to {to:?}")]
    StatusRegression { from: GameStatus, to: GameStatus },
}

pub trait LiveEntity: Clone + Send + Sync + 'static {
    /// Stable upstream identifier, never reused.
    fn id(&self) -> &str;

    fn status(&self) -> GameStatus;

    /// Current period, meaningful only while in progress.
    fn period(&self) -> Option<u32>;

    /// Absolute score gap, meaningful only while in progress.
    fn score_differential(&self) -> Option<u32>;

    /// Fingerprint of the persisted content, used to skip unchanged re-fetches.
    fn content_hash(&self) -> String;

    fn validate(&self) -> Result<(), SnapshotError> {
        if self.id().trim().is_empty() {
            return Err(SnapshotError::MissingField("id"));
        }
        Ok(())
    }
}
