use std::time::Duration;

use rand::Rng;
use tokio::sync::watch;
use tracing::{debug, info};

use super::engine::{CycleReport, SyncEngine};
use super::entity::LiveEntity;
use super::error::SyncError;
use super::status::StatusBoard;

/// Stretches the outer tick while the upstream keeps failing.
///
/// The first failure keeps the normal tick; each further consecutive failure
/// doubles it, up to `max`. A success resets it.
#[derive(Debug, Clone)]
pub struct FailureBackoff {
    base: Duration,
    max: Duration,
    consecutive_failures: u32,
}

impl FailureBackoff {
    pub fn new(base: Duration, max: Duration) -> Self {
        FailureBackoff {
            base,
            max: max.max(base),
            consecutive_failures: 0,
        }
    }

    pub fn record_success(&mut self) {
        self.consecutive_failures = 0;
    }

    pub fn record_failure(&mut self) {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    pub fn current_delay(&self) -> Duration {
        if self.consecutive_failures <= 1 {
            return self.base;
        }
        let factor = 2u32.saturating_pow(self.consecutive_failures - 1);
        self.base.saturating_mul(factor).min(self.max)
    }
}

/// Drives one source's engine on a fixed outer tick.
///
/// Cycles never overlap: each runs to completion before the next sleep.
pub struct SyncService<E: LiveEntity> {
    engine: SyncEngine<E>,
    backoff: FailureBackoff,
    startup_jitter: Duration,
    status: StatusBoard,
}

impl<E: LiveEntity> SyncService<E> {
    pub fn new(
        engine: SyncEngine<E>,
        tick: Duration,
        max_backoff: Duration,
        status: StatusBoard,
    ) -> Self {
        SyncService {
            engine,
            backoff: FailureBackoff::new(tick, max_backoff),
            startup_jitter: Duration::ZERO,
            status,
        }
    }

    pub fn with_startup_jitter(mut self, jitter: Duration) -> Self {
        self.startup_jitter = jitter;
        self
    }

    pub fn source(&self) -> &str {
        self.engine.source()
    }

    /// Sleep before the next cycle, including any failure backoff.
    pub fn next_delay(&self) -> Duration {
        self.backoff.current_delay()
    }

    /// Run exactly one cycle and publish its outcome.
    pub async fn run_once(&mut self) -> Result<CycleReport, SyncError> {
        let result = self.engine.run_cycle().await;
        let source = self.engine.source().to_string();
        let provider = self.engine.fetcher().provider_name().to_string();
        match &result {
            Ok(report) => {
                self.backoff.record_success();
                self.status
                    .record_success(&source, &provider, report, self.engine.states().len())
                    .await;
            }
            Err(e) if e.is_shutdown() => {}
            Err(e) => {
                self.backoff.record_failure();
                let failures = self.backoff.consecutive_failures();
                self.status
                    .record_failure(&source, &provider, &e.to_string(), failures)
                    .await;
            }
        }
        result
    }

    /// Loop until `shutdown` flips to `true` (or its sender is dropped).
    ///
    /// A cycle already running when shutdown arrives is allowed to finish;
    /// a cycle stuck waiting on a closed limiter returns immediately.
    pub async fn run_forever(mut self, mut shutdown: watch::Receiver<bool>) {
        info!(
            "{} sync service started (provider={}, tick={:?}, slowest interval={:?})",
            self.source(),
            self.engine.fetcher().provider_name(),
            self.backoff.base,
            self.engine.policy().longest_interval()
        );

        if !self.startup_jitter.is_zero() {
            let max_ms = self.startup_jitter.as_millis() as u64;
            let delay = Duration::from_millis(rand::thread_rng().gen_range(0..=max_ms));
            debug!("{} sync: staggering first cycle by {:?}", self.source(), delay);
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = shutdown.changed() => {}
            }
        }

        loop {
            if *shutdown.borrow() {
                break;
            }
            if let Err(e) = self.run_once().await {
                if e.is_shutdown() {
                    break;
                }
            }

            let delay = self.next_delay();
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        info!("{} sync service stopped", self.source());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::db::models::LiveGame;
    use crate::sync::cadence::CadencePolicy;
    use crate::sync::fetcher::RateLimitedFetcher;
    use crate::sync::rate_limiter::RateLimiter;
    use crate::sync::testing::{live, MemoryStore, ScriptedProvider};

    fn service(
        provider: Arc<ScriptedProvider>,
        limiter: Arc<RateLimiter>,
        status: StatusBoard,
    ) -> SyncService<LiveGame> {
        let fetcher =
            RateLimitedFetcher::<LiveGame>::new(provider, limiter, Duration::from_secs(10));
        let engine = SyncEngine::new(
            "nfl",
            fetcher,
            Arc::new(MemoryStore::new()),
            CadencePolicy::default(),
        );
        SyncService::new(engine, Duration::from_secs(5), Duration::from_secs(60), status)
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let mut b = FailureBackoff::new(Duration::from_secs(5), Duration::from_secs(30));
        assert_eq!(b.current_delay(), Duration::from_secs(5));
        b.record_failure();
        assert_eq!(b.current_delay(), Duration::from_secs(5));
        b.record_failure();
        assert_eq!(b.current_delay(), Duration::from_secs(10));
        b.record_failure();
        assert_eq!(b.current_delay(), Duration::from_secs(20));
        b.record_failure();
        assert_eq!(b.current_delay(), Duration::from_secs(30));
        for _ in 0..40 {
            b.record_failure();
        }
        assert_eq!(b.current_delay(), Duration::from_secs(30));
        b.record_success();
        assert_eq!(b.current_delay(), Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_once_publishes_status() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            Err("connection reset"),
            Err("connection reset"),
            Ok(vec![live("a", 0, 0)]),
        ]));
        let limiter = Arc::new(RateLimiter::new(60, Duration::from_secs(60)).unwrap());
        let board = StatusBoard::new();
        let mut svc = service(provider, limiter, board.clone());

        assert!(svc.run_once().await.is_err());
        assert!(svc.run_once().await.is_err());
        assert_eq!(svc.next_delay(), Duration::from_secs(10));
        assert_eq!(board.snapshot().await["nfl"].consecutive_failures, 2);

        let report = svc.run_once().await.unwrap();
        assert_eq!(report.inserted, 1);
        assert_eq!(svc.next_delay(), Duration::from_secs(5));
        let snapshot = board.snapshot().await;
        let status = &snapshot["nfl"];
        assert_eq!(status.consecutive_failures, 0);
        assert_eq!(status.tracked_entities, 1);
        assert_eq!(status.provider, "scripted");
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_forever_ticks_until_shutdown() {
        let provider = Arc::new(ScriptedProvider::new(vec![Ok(vec![live("a", 0, 0)])]));
        let limiter = Arc::new(RateLimiter::new(60, Duration::from_secs(60)).unwrap());
        let svc = service(provider.clone(), limiter, StatusBoard::new());
        let (tx, rx) = watch::channel(false);

        let handle = tokio::spawn(svc.run_forever(rx));
        // Cycles at t=0, 5, 10.
        tokio::time::sleep(Duration::from_secs(12)).await;
        tx.send(true).unwrap();
        handle.await.unwrap();

        assert_eq!(provider.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_closed_limiter_stops_service() {
        let provider = Arc::new(ScriptedProvider::new(vec![Ok(vec![])]));
        let limiter = Arc::new(RateLimiter::new(1, Duration::from_secs(3600)).unwrap());
        let svc = service(provider.clone(), limiter.clone(), StatusBoard::new());
        let (_tx, rx) = watch::channel(false);

        let handle = tokio::spawn(svc.run_forever(rx));
        tokio::time::sleep(Duration::from_secs(30)).await;
        // Second cycle is parked on the exhausted limiter.
        limiter.close();
        handle.await.unwrap();

        assert_eq!(provider.calls(), 1);
    }
}
