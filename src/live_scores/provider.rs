use anyhow::Result;
use async_trait::async_trait;

/// Trait that every scoreboard provider must implement.
///
/// Providers are never called directly by the sync engine; they are wrapped
/// in a [`RateLimitedFetcher`](crate::sync::RateLimitedFetcher) so that every
/// upstream request goes through the shared quota.
#[async_trait]
pub trait ScoreProvider<E>: Send + Sync {
    /// Return a snapshot of every game the upstream currently lists, in
    /// upstream order.
    async fn fetch_snapshots(&self) -> Result<Vec<E>>;

    /// Human-readable name for logging.
    fn name(&self) -> &str;
}
