use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::live_scores::ScoreProvider;

use super::error::SyncError;
use super::rate_limiter::RateLimiter;

/// The only path from the sync engine to an upstream provider.
///
/// Building one requires the shared [`RateLimiter`], so a source cannot be
/// wired up without the quota gate.
pub struct RateLimitedFetcher<E> {
    provider: Arc<dyn ScoreProvider<E>>,
    limiter: Arc<RateLimiter>,
    timeout: Duration,
}

impl<E: Send> RateLimitedFetcher<E> {
    pub fn new(
        provider: Arc<dyn ScoreProvider<E>>,
        limiter: Arc<RateLimiter>,
        timeout: Duration,
    ) -> Self {
        RateLimitedFetcher {
            provider,
            limiter,
            timeout,
        }
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    /// Reserve one call slot, then fetch. The timeout covers the network call
    /// only, not the time spent waiting on the limiter.
    pub async fn fetch(&self) -> Result<Vec<E>, SyncError> {
        self.limiter.acquire().await?;
        debug!("[{}] Fetching snapshots", self.provider.name());
        match tokio::time::timeout(self.timeout, self.provider.fetch_snapshots()).await {
            Ok(Ok(snapshots)) => Ok(snapshots),
            Ok(Err(e)) => Err(SyncError::Upstream(e)),
            Err(_) => Err(SyncError::Timeout(self.timeout)),
        }
    }
}
