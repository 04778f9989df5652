//! In-memory provider and store fakes shared by the sync tests.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use anyhow::Result;
use async_trait::async_trait;

use crate::db::models::{GameStatus, LiveGame};
use crate::live_scores::ScoreProvider;

use super::store::{EntityStore, UpsertOutcome};

pub fn game(id: &str, status: GameStatus, period: Option<u32>, home: i32, away: i32) -> LiveGame {
    LiveGame {
        event_id: id.into(),
        sport: "football".into(),
        league: "nfl".into(),
        home_team: format!("{} Home", id),
        away_team: format!("{} Away", id),
        home_score: home,
        away_score: away,
        period,
        status,
    }
}

pub fn scheduled(id: &str) -> LiveGame {
    game(id, GameStatus::Scheduled, None, 0, 0)
}

pub fn final_game(id: &str) -> LiveGame {
    game(id, GameStatus::Final, None, 27, 20)
}

/// In-progress game in period 1.
pub fn live(id: &str, home: i32, away: i32) -> LiveGame {
    game(id, GameStatus::InProgress, Some(1), home, away)
}

#[derive(Clone)]
enum Step {
    Games(Vec<LiveGame>),
    Fail(&'static str),
    Hang,
}

/// Replays scripted responses in order; the last one repeats forever.
pub struct ScriptedProvider {
    steps: Mutex<VecDeque<Step>>,
    calls: AtomicUsize,
}

impl ScriptedProvider {
    pub fn new(responses: Vec<Result<Vec<LiveGame>, &'static str>>) -> Self {
        let steps = responses
            .into_iter()
            .map(|r| match r {
                Ok(games) => Step::Games(games),
                Err(msg) => Step::Fail(msg),
            })
            .collect();
        ScriptedProvider {
            steps: Mutex::new(steps),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn hanging() -> Self {
        ScriptedProvider {
            steps: Mutex::new(VecDeque::from([Step::Hang])),
            calls: AtomicUsize::new(0),
        }
    }

    /// Replace the script with a single repeating response.
    pub fn set(&self, games: Vec<LiveGame>) {
        let mut steps = self.steps.lock().unwrap();
        steps.clear();
        steps.push_back(Step::Games(games));
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn next_step(&self) -> Step {
        let mut steps = self.steps.lock().unwrap();
        if steps.len() > 1 {
            steps.pop_front().unwrap()
        } else {
            steps.front().cloned().unwrap_or(Step::Games(vec![]))
        }
    }
}

#[async_trait]
impl ScoreProvider<LiveGame> for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn fetch_snapshots(&self) -> Result<Vec<LiveGame>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.next_step() {
            Step::Games(games) => Ok(games),
            Step::Fail(msg) => Err(anyhow::anyhow!(msg)),
            Step::Hang => std::future::pending().await,
        }
    }
}

/// Upsert-by-id map that counts calls and can be told to fail for given ids.
#[derive(Default)]
pub struct MemoryStore {
    rows: Mutex<HashMap<String, LiveGame>>,
    failing: Mutex<HashSet<String>>,
    calls: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed(&self, games: &[LiveGame]) {
        let mut rows = self.rows.lock().unwrap();
        for g in games {
            rows.insert(g.event_id.clone(), g.clone());
        }
    }

    pub fn fail_for(&self, id: &str) {
        self.failing.lock().unwrap().insert(id.to_string());
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn get(&self, id: &str) -> Option<LiveGame> {
        self.rows.lock().unwrap().get(id).cloned()
    }

    pub fn snapshot(&self) -> HashMap<String, LiveGame> {
        self.rows.lock().unwrap().clone()
    }
}

#[async_trait]
impl EntityStore<LiveGame> for MemoryStore {
    async fn upsert(&self, entity: &LiveGame) -> Result<UpsertOutcome> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.lock().unwrap().contains(&entity.event_id) {
            anyhow::bail!("storage unavailable for {}", entity.event_id);
        }
        let previous = self
            .rows
            .lock()
            .unwrap()
            .insert(entity.event_id.clone(), entity.clone());
        Ok(match previous {
            Some(_) => UpsertOutcome::Updated,
            None => UpsertOutcome::Inserted,
        })
    }
}

#[tokio::test]
async fn test_memory_store_upsert_is_idempotent() {
    let store = MemoryStore::new();
    let g = live("a", 7, 3);

    assert_eq!(store.upsert(&g).await.unwrap(), UpsertOutcome::Inserted);
    let after_once = store.snapshot();
    assert_eq!(store.upsert(&g).await.unwrap(), UpsertOutcome::Updated);

    assert_eq!(store.snapshot(), after_once);
    assert_eq!(store.get("a"), Some(g));
}
