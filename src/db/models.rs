use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::sync::entity::{LiveEntity, SnapshotError};

/// Live game state as fetched from the scoreboard provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiveGame {
    /// External event ID from the scoreboard provider
    pub event_id: String,
    pub sport: String,
    pub league: String,
    pub home_team: String,
    pub away_team: String,
    pub home_score: i32,
    pub away_score: i32,
    /// Quarter / period index, only set while the game is under way
    pub period: Option<u32>,
    pub status: GameStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GameStatus {
    Scheduled,
    InProgress,
    Halftime,
    Final,
}

impl GameStatus {
    /// Statuses only move forward; halftime may return to in-progress and
    /// `Final` is absorbing.
    pub fn can_transition_to(self, next: GameStatus) -> bool {
        use GameStatus::*;
        match (self, next) {
            (a, b) if a == b => true,
            (Scheduled, _) => true,
            (InProgress, Halftime) | (InProgress, Final) => true,
            (Halftime, InProgress) | (Halftime, Final) => true,
            _ => false,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            GameStatus::Scheduled => "scheduled",
            GameStatus::InProgress => "in_progress",
            GameStatus::Halftime => "halftime",
            GameStatus::Final => "final",
        }
    }

    pub fn from_db(s: &str) -> Option<GameStatus> {
        match s {
            "scheduled" => Some(GameStatus::Scheduled),
            "in_progress" => Some(GameStatus::InProgress),
            "halftime" => Some(GameStatus::Halftime),
            "final" => Some(GameStatus::Final),
            _ => None,
        }
    }
}

impl LiveEntity for LiveGame {
    fn id(&self) -> &str {
        &self.event_id
    }

    fn status(&self) -> GameStatus {
        self.status
    }

    fn period(&self) -> Option<u32> {
        self.period
    }

    fn score_differential(&self) -> Option<u32> {
        Some(self.home_score.abs_diff(self.away_score))
    }

    fn content_hash(&self) -> String {
        // Field order is fixed by the struct; serde_json keeps it stable.
        let bytes = serde_json::to_vec(self).unwrap_or_default();
        hex::encode(Sha256::digest(&bytes))
    }

    fn validate(&self) -> Result<(), SnapshotError> {
        if self.event_id.trim().is_empty() {
            return Err(SnapshotError::MissingField("event_id"));
        }
        if self.home_team.trim().is_empty() || self.away_team.trim().is_empty() {
            return Err(SnapshotError::MissingField("participants"));
        }
        if self.home_score < 0 || self.away_score < 0 {
            return Err(SnapshotError::Malformed(format!(
                "negative score {}-{}",
                self.home_score, self.away_score
            )));
        }
        if self.status == GameStatus::InProgress && self.period.is_none() {
            return Err(SnapshotError::MissingField("period"));
        }
        Ok(())
    }
}

/// A persisted game row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredGame {
    #[serde(flatten)]
    pub game: LiveGame,
    pub snapshot_hash: String,
    pub updated_at: DateTime<Utc>,
}
