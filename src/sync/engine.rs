//! One polling cycle: fetch everything once, act only on what is due or
//! changed.
//!
//! The upstream scoreboard is a single bulk endpoint, so cadence does not
//! reduce fetches; the rate limiter does that. Cadence decides whether a
//! returned game is written (re-confirmed) this cycle or left alone.

use std::sync::Arc;

use serde::Serialize;
use tokio::time::Instant;
use tracing::{error, info, warn};

use super::cadence::CadencePolicy;
use super::entity::{LiveEntity, SnapshotError};
use super::error::SyncError;
use super::fetcher::RateLimitedFetcher;
use super::state::{EntityState, StateStore};
use super::store::{EntityStore, UpsertOutcome};

/// Aggregate outcome of one cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CycleReport {
    pub inserted: usize,
    pub updated: usize,
    pub skipped: usize,
    /// Store writes that failed; those games stay due
    pub failed: usize,
    /// Snapshots dropped as malformed or regressed
    pub invalid: usize,
    pub api_calls: usize,
}

impl CycleReport {
    pub fn is_partial(&self) -> bool {
        self.failed > 0 || self.invalid > 0
    }
}

pub struct SyncEngine<E: LiveEntity> {
    source: String,
    fetcher: RateLimitedFetcher<E>,
    store: Arc<dyn EntityStore<E>>,
    policy: CadencePolicy,
    states: StateStore,
}

impl<E: LiveEntity> SyncEngine<E> {
    pub fn new(
        source: impl Into<String>,
        fetcher: RateLimitedFetcher<E>,
        store: Arc<dyn EntityStore<E>>,
        policy: CadencePolicy,
    ) -> Self {
        SyncEngine {
            source: source.into(),
            fetcher,
            store,
            policy,
            states: StateStore::new(),
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn policy(&self) -> &CadencePolicy {
        &self.policy
    }

    pub fn states(&self) -> &StateStore {
        &self.states
    }

    pub fn fetcher(&self) -> &RateLimitedFetcher<E> {
        &self.fetcher
    }

    /// Run a single cycle to completion.
    ///
    /// A fetch failure ends the cycle with `Err` and leaves every entity's
    /// state untouched. Per-entity problems are logged and counted; they
    /// never abort the remaining entities.
    pub async fn run_cycle(&mut self) -> Result<CycleReport, SyncError> {
        let snapshots = match self.fetcher.fetch().await {
            Ok(s) => s,
            Err(e) => {
                if !e.is_shutdown() {
                    warn!(
                        "{} sync: fetch from {} failed: {}",
                        self.source,
                        self.fetcher.provider_name(),
                        e
                    );
                }
                return Err(e);
            }
        };

        let now = Instant::now();
        let mut report = CycleReport {
            api_calls: 1,
            ..CycleReport::default()
        };

        let due = self.states.due(snapshots.iter().map(|s| s.id()), now);

        for snapshot in &snapshots {
            if let Err(e) = self.check_snapshot(snapshot) {
                error!("{} sync: dropping snapshot {:?}: {}", self.source, snapshot.id(), e);
                report.invalid += 1;
                continue;
            }

            let id = snapshot.id();
            let interval = self.policy.classify(snapshot);
            let hash = snapshot.content_hash();

            if !due.contains(id) && self.states.hash_matches(id, &hash) {
                report.skipped += 1;
                continue;
            }

            match self.store.upsert(snapshot).await {
                Ok(outcome) => {
                    match outcome {
                        UpsertOutcome::Inserted => report.inserted += 1,
                        UpsertOutcome::Updated => report.updated += 1,
                    }
                    self.states.record(
                        id,
                        EntityState {
                            last_polled_at: now,
                            current_interval: interval,
                            last_hash: hash,
                            last_status: snapshot.status(),
                        },
                    );
                }
                Err(e) => {
                    error!("{} sync: failed to upsert {}: {:#}", self.source, id, e);
                    report.failed += 1;
                }
            }
        }

        info!(
            "{} sync: inserted={} updated={} skipped={} api_calls={} failed={} invalid={}",
            self.source,
            report.inserted,
            report.updated,
            report.skipped,
            report.api_calls,
            report.failed,
            report.invalid
        );
        if report.is_partial() {
            warn!(
                "{} sync: cycle completed with {} failed write(s) and {} invalid snapshot(s)",
                self.source, report.failed, report.invalid
            );
        }
        Ok(report)
    }

    fn check_snapshot(&self, snapshot: &E) -> Result<(), SnapshotError> {
        snapshot.validate()?;
        if let Some(prev) = self.states.get(snapshot.id()) {
            if !prev.last_status.can_transition_to(snapshot.status()) {
                return Err(SnapshotError::StatusRegression {
                    from: prev.last_status,
                    to: snapshot.status(),
                });
            }
        }
        Ok(())
    }

    /// Interval currently assigned to `id`, if it has been processed.
    #[cfg(test)]
    pub fn interval_of(&self, id: &str) -> Option<std::time::Duration> {
        self.states.get(id).map(|s| s.current_interval)
    }
}
