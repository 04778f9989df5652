use std::time::Duration;

use thiserror::Error;

use super::rate_limiter::RateLimitError;

/// Cycle-level failures. Any of these ends the current cycle only; the next
/// outer tick tries again.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("upstream fetch failed: {0:#}")]
    Upstream(anyhow::Error),

    #[error("upstream fetch timed out after {0:?}")]
    Timeout(Duration),

    #[error(transparent)]
    RateLimit(#[from] RateLimitError),
}

impl SyncError {
    /// Shutdown surfaces as a closed limiter; it is not worth a warning.
    pub fn is_shutdown(&self) -> bool {
        matches!(self, SyncError::RateLimit(RateLimitError::Closed))
    }
}
