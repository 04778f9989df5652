//! Maps an entity's observed state to how often it deserves attention.
//!
//! Request budget follows information value: a one-possession game in the
//! closing period is tracked near real time, blowouts and breaks less so,
//! and games that have not started or are over only need re-confirming.

use std::time::Duration;

use crate::db::models::GameStatus;

use super::entity::LiveEntity;

/// Interval table plus the thresholds that define a "close game".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CadencePolicy {
    pub interval_final: Duration,
    pub interval_scheduled: Duration,
    pub interval_halftime: Duration,
    pub interval_close_game: Duration,
    pub interval_live_default: Duration,
    /// Periods at or past this index count as the closing stretch
    pub close_game_period_threshold: u32,
    /// Score gaps at or below this count as close
    pub close_game_score_threshold: u32,
}

impl Default for CadencePolicy {
    fn default() -> Self {
        CadencePolicy {
            interval_final: Duration::from_secs(300),
            interval_scheduled: Duration::from_secs(60),
            interval_halftime: Duration::from_secs(15),
            interval_close_game: Duration::from_secs(5),
            interval_live_default: Duration::from_secs(10),
            close_game_period_threshold: 4,
            close_game_score_threshold: 7,
        }
    }
}

impl CadencePolicy {
    /// First matching rule wins. Pure: no clock, no I/O, no memory of
    /// previous classifications.
    pub fn classify<E: LiveEntity>(&self, entity: &E) -> Duration {
        match entity.status() {
            GameStatus::Final => self.interval_final,
            GameStatus::Scheduled => self.interval_scheduled,
            GameStatus::Halftime => self.interval_halftime,
            GameStatus::InProgress if self.is_close_game(entity) => self.interval_close_game,
            GameStatus::InProgress => self.interval_live_default,
        }
    }

    fn is_close_game<E: LiveEntity>(&self, entity: &E) -> bool {
        match (entity.period(), entity.score_differential()) {
            (Some(period), Some(diff)) => {
                period >= self.close_game_period_threshold
                    && diff <= self.close_game_score_threshold
            }
            _ => false,
        }
    }

    /// The slowest tier; anything no longer updating decays towards it.
    pub fn longest_interval(&self) -> Duration {
        [
            self.interval_final,
            self.interval_scheduled,
            self.interval_halftime,
            self.interval_close_game,
            self.interval_live_default,
        ]
        .into_iter()
        .max()
        .unwrap_or(self.interval_final)
    }
}
