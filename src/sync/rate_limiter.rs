//! Sliding-window rate limiter shared by every sync service in the process.
//!
//! The upstream quota is per account/IP, not per sport, so one instance is
//! built in `main` and handed to each [`RateLimitedFetcher`](super::RateLimitedFetcher).
//! The limiter knows nothing about games; it only counts calls.

use std::collections::VecDeque;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use tokio::sync::{watch, Mutex};
use tokio::time::Instant;
use tracing::debug;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RateLimitError {
    #[error("max_calls must be greater than zero")]
    ZeroCalls,

    #[error("window must be greater than zero")]
    ZeroWindow,

    #[error("rate limiter closed")]
    Closed,
}

/// Point-in-time view of the limiter for the status endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct LimiterUsage {
    pub max_calls: usize,
    pub window_secs: u64,
    pub calls_in_window: usize,
    pub total_acquired: u64,
}

struct Window {
    /// Timestamps of calls still inside the trailing window, oldest first
    calls: VecDeque<Instant>,
    total_acquired: u64,
}

pub struct RateLimiter {
    max_calls: usize,
    window: Duration,
    state: Mutex<Window>,
    closed: watch::Sender<bool>,
}

impl RateLimiter {
    pub fn new(max_calls: usize, window: Duration) -> Result<Self, RateLimitError> {
        if max_calls == 0 {
            return Err(RateLimitError::ZeroCalls);
        }
        if window.is_zero() {
            return Err(RateLimitError::ZeroWindow);
        }
        let (closed, _) = watch::channel(false);
        Ok(RateLimiter {
            max_calls,
            window,
            state: Mutex::new(Window {
                calls: VecDeque::with_capacity(max_calls),
                total_acquired: 0,
            }),
            closed,
        })
    }

    /// Wait for a free slot and reserve it.
    ///
    /// Exhaustion only shows up as latency. The only error is
    /// [`RateLimitError::Closed`], returned once [`close`](Self::close) has
    /// been called, including to callers already waiting.
    pub async fn acquire(&self) -> Result<(), RateLimitError> {
        let mut closed = self.closed.subscribe();
        loop {
            if *closed.borrow_and_update() {
                return Err(RateLimitError::Closed);
            }

            let wait = {
                let mut state = self.state.lock().await;
                let now = Instant::now();
                self.prune(&mut state.calls, now);
                if state.calls.len() < self.max_calls {
                    state.calls.push_back(now);
                    state.total_acquired += 1;
                    return Ok(());
                }
                // Full window: the oldest call frees the next slot.
                match state.calls.front() {
                    Some(&oldest) => (oldest + self.window).saturating_duration_since(now),
                    None => Duration::ZERO,
                }
            };

            debug!("Rate limiter: quota exhausted, waiting {:?}", wait);
            tokio::select! {
                _ = tokio::time::sleep(wait) => {}
                _ = closed.changed() => {}
            }
        }
    }

    /// Reject all current and future acquirers.
    pub fn close(&self) {
        self.closed.send_replace(true);
    }

    pub async fn usage(&self) -> LimiterUsage {
        let mut state = self.state.lock().await;
        self.prune(&mut state.calls, Instant::now());
        LimiterUsage {
            max_calls: self.max_calls,
            window_secs: self.window.as_secs(),
            calls_in_window: state.calls.len(),
            total_acquired: state.total_acquired,
        }
    }

    fn prune(&self, calls: &mut VecDeque<Instant>, now: Instant) {
        while calls
            .front()
            .is_some_and(|&t| now.saturating_duration_since(t) >= self.window)
        {
            calls.pop_front();
        }
    }
}
