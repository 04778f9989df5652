use std::collections::{HashMap, HashSet};
use std::time::Duration;

use tokio::time::Instant;

use crate::db::models::GameStatus;

/// Scheduler bookkeeping for one tracked entity. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityState {
    /// Last time this entity was successfully written
    pub last_polled_at: Instant,
    pub current_interval: Duration,
    pub last_hash: String,
    pub last_status: GameStatus,
}

impl EntityState {
    pub fn is_due(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.last_polled_at) >= self.current_interval
    }
}

/// Per-source map of entity id → state.
///
/// Entries are created on first sighting and never removed: finished games
/// sit at the slowest interval, so the map is bounded by the number of games
/// a source sees over its lifetime.
#[derive(Debug, Default)]
pub struct StateStore {
    entries: HashMap<String, EntityState>,
}

impl StateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &str) -> Option<&EntityState> {
        self.entries.get(id)
    }

    /// Unknown ids are always due.
    pub fn is_due(&self, id: &str, now: Instant) -> bool {
        self.entries.get(id).map_or(true, |s| s.is_due(now))
    }

    pub fn hash_matches(&self, id: &str, hash: &str) -> bool {
        self.entries.get(id).is_some_and(|s| s.last_hash == hash)
    }

    /// Ids among `candidates` whose cadence has elapsed, plus ids never seen.
    pub fn due<'a, I>(&self, candidates: I, now: Instant) -> HashSet<String>
    where
        I: IntoIterator<Item = &'a str>,
    {
        candidates
            .into_iter()
            .filter(|id| self.is_due(id, now))
            .map(str::to_string)
            .collect()
    }

    pub fn record(&mut self, id: &str, state: EntityState) {
        self.entries.insert(id.to_string(), state);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}
