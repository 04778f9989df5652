use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::{Arc, Mutex, MutexGuard};

pub mod models;
use models::*;

use crate::sync::{EntityStore, LiveEntity, UpsertOutcome};

/// Thread-safe SQLite connection pool (single connection with mutex)
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open (or create) the SQLite database at the given path
    pub fn open(path: &str) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        let db = Database {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.run_migrations()?;
        Ok(db)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow!("database mutex poisoned"))
    }

    /// Run schema migrations (idempotent)
    fn run_migrations(&self) -> Result<()> {
        let conn = self.lock()?;
        conn.execute_batch(SCHEMA_SQL)?;
        Ok(())
    }

    // ── Games ─────────────────────────────────────────────────────────────────

    /// Insert or update a game by event id.
    ///
    /// A row whose stored hash already matches is left untouched, so
    /// re-writing identical content does not even bump `updated_at`.
    pub fn upsert_game(&self, game: &LiveGame) -> Result<UpsertOutcome> {
        let hash = game.content_hash();
        let conn = self.lock()?;
        let inserted = conn.execute(
            "INSERT INTO games (id, sport, league, home_team, away_team,
                                home_score, away_score, period, status,
                                snapshot_hash, updated_at)
             VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11)
             ON CONFLICT(id) DO NOTHING",
            params![
                game.event_id,
                game.sport,
                game.league,
                game.home_team,
                game.away_team,
                game.home_score,
                game.away_score,
                game.period,
                game.status.as_str(),
                hash,
                Utc::now(),
            ],
        )?;
        if inserted == 1 {
            return Ok(UpsertOutcome::Inserted);
        }

        // Every hashed column is rewritten so the stored hash always
        // describes the stored row.
        conn.execute(
            "UPDATE games SET
                sport=?2, league=?3, home_team=?4, away_team=?5,
                home_score=?6, away_score=?7, period=?8, status=?9,
                snapshot_hash=?10, updated_at=?11
             WHERE id=?1 AND snapshot_hash != ?10",
            params![
                game.event_id,
                game.sport,
                game.league,
                game.home_team,
                game.away_team,
                game.home_score,
                game.away_score,
                game.period,
                game.status.as_str(),
                hash,
                Utc::now(),
            ],
        )?;
        Ok(UpsertOutcome::Updated)
    }

    pub fn get_game(&self, id: &str) -> Result<Option<StoredGame>> {
        let conn = self.lock()?;
        let game = conn
            .query_row(
                &format!("SELECT {} FROM games WHERE id=?1", GAME_COLUMNS),
                params![id],
                map_game,
            )
            .optional()?;
        Ok(game)
    }

    /// List games, most recently changed first
    pub fn list_games(&self, limit: i64) -> Result<Vec<StoredGame>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM games ORDER BY updated_at DESC LIMIT ?1",
            GAME_COLUMNS
        ))?;
        let games = stmt
            .query_map(params![limit], map_game)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(games)
    }
}

#[async_trait]
impl EntityStore<LiveGame> for Database {
    async fn upsert(&self, entity: &LiveGame) -> Result<UpsertOutcome> {
        self.upsert_game(entity)
    }
}

// ── SQL helpers ────────────────────────────────────────────────────────────────

const GAME_COLUMNS: &str = "id, sport, league, home_team, away_team, home_score, away_score,
                            period, status, snapshot_hash, updated_at";

fn map_game(row: &rusqlite::Row) -> rusqlite::Result<StoredGame> {
    let status: String = row.get(8)?;
    let status = GameStatus::from_db(&status).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            8,
            rusqlite::types::Type::Text,
            format!("unknown game status '{}'", status).into(),
        )
    })?;
    Ok(StoredGame {
        game: LiveGame {
            event_id: row.get(0)?,
            sport: row.get(1)?,
            league: row.get(2)?,
            home_team: row.get(3)?,
            away_team: row.get(4)?,
            home_score: row.get(5)?,
            away_score: row.get(6)?,
            period: row.get(7)?,
            status,
        },
        snapshot_hash: row.get(9)?,
        updated_at: row.get(10)?,
    })
}

/// SQLite schema (idempotent CREATE IF NOT EXISTS)
pub const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS games (
    id            TEXT    PRIMARY KEY,
    sport         TEXT    NOT NULL,
    league        TEXT    NOT NULL,
    home_team     TEXT    NOT NULL,
    away_team     TEXT    NOT NULL,
    home_score    INTEGER NOT NULL,
    away_score    INTEGER NOT NULL,
    period        INTEGER,
    status        TEXT    NOT NULL,
    snapshot_hash TEXT    NOT NULL,
    updated_at    TEXT    NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_games_status ON games(status);
CREATE INDEX IF NOT EXISTS idx_games_updated ON games(updated_at);
"#;

#[cfg(test)]
mod tests {
    use super::*;

    fn game(home: i32, away: i32, status: GameStatus) -> LiveGame {
        LiveGame {
            event_id: "401547665".into(),
            sport: "football".into(),
            league: "nfl".into(),
            home_team: "Kansas City Chiefs".into(),
            away_team: "Buffalo Bills".into(),
            home_score: home,
            away_score: away,
            period: Some(4),
            status,
        }
    }

    #[test]
    fn test_upsert_insert_then_update() {
        let db = Database::open(":memory:").unwrap();

        let first = db.upsert_game(&game(0, 0, GameStatus::InProgress)).unwrap();
        let second = db.upsert_game(&game(7, 0, GameStatus::InProgress)).unwrap();

        assert_eq!(first, UpsertOutcome::Inserted);
        assert_eq!(second, UpsertOutcome::Updated);
        let stored = db.get_game("401547665").unwrap().unwrap();
        assert_eq!(stored.game.home_score, 7);
        assert_eq!(stored.game.status, GameStatus::InProgress);
    }

    #[test]
    fn test_identical_upsert_leaves_row_unchanged() {
        let db = Database::open(":memory:").unwrap();
        let g = game(21, 17, GameStatus::Final);

        db.upsert_game(&g).unwrap();
        let once = db.get_game(&g.event_id).unwrap().unwrap();
        db.upsert_game(&g).unwrap();
        let twice = db.get_game(&g.event_id).unwrap().unwrap();

        assert_eq!(once.game, twice.game);
        assert_eq!(once.snapshot_hash, twice.snapshot_hash);
        assert_eq!(once.updated_at, twice.updated_at);
        assert_eq!(db.list_games(10).unwrap().len(), 1);
    }

    #[test]
    fn test_renamed_team_keeps_hash_consistent_with_row() {
        let db = Database::open(":memory:").unwrap();
        db.upsert_game(&game(3, 0, GameStatus::InProgress)).unwrap();

        let mut renamed = game(3, 0, GameStatus::InProgress);
        renamed.away_team = "Buffalo Bills (renamed)".into();
        assert_eq!(db.upsert_game(&renamed).unwrap(), UpsertOutcome::Updated);

        let stored = db.get_game("401547665").unwrap().unwrap();
        assert_eq!(stored.game, renamed);
        assert_eq!(stored.snapshot_hash, stored.game.content_hash());
    }

    #[test]
    fn test_missing_game_is_none() {
        let db = Database::open(":memory:").unwrap();
        assert!(db.get_game("nope").unwrap().is_none());
    }

    #[tokio::test]
    async fn test_entity_store_impl() {
        let db = Database::open(":memory:").unwrap();
        let store: &dyn EntityStore<LiveGame> = &db;
        assert_eq!(
            store.upsert(&game(3, 0, GameStatus::InProgress)).await.unwrap(),
            UpsertOutcome::Inserted
        );
    }
}
