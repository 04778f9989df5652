use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, error};
use url::Url;

use super::provider::ScoreProvider;
use crate::db::models::{GameStatus, LiveGame};
use crate::sync::entity::SnapshotError;

pub const DEFAULT_ESPN_API_URL: &str = "https://site.api.espn.com/apis/site/v2/sports";

/// Map a short source name to ESPN's `(sport, league)` path pair.
/// Anything of the form `sport/league` passes through unchanged.
pub fn resolve_source(source: &str) -> Option<(String, String)> {
    let pair = match source.to_lowercase().as_str() {
        "nfl" => ("football", "nfl"),
        "ncaaf" | "college-football" => ("football", "college-football"),
        "nba" => ("basketball", "nba"),
        "wnba" => ("basketball", "wnba"),
        "ncaab" | "mens-college-basketball" => ("basketball", "mens-college-basketball"),
        "nhl" => ("hockey", "nhl"),
        "mlb" => ("baseball", "mlb"),
        other => {
            let (sport, league) = other.split_once('/')?;
            if sport.is_empty() || league.is_empty() || league.contains('/') {
                return None;
            }
            return Some((sport.to_string(), league.to_string()));
        }
    };
    Some((pair.0.to_string(), pair.1.to_string()))
}

/// Scoreboard provider backed by ESPN's public site API.
/// One instance per league; a single request returns every game on the board.
pub struct EspnScoreboard {
    http: Client,
    name: String,
    sport: String,
    league: String,
    /// Base URL for overriding in tests
    base_url: String,
    connect_timeout: Duration,
}

impl EspnScoreboard {
    /// `timeout` bounds connection setup only. The whole request is bounded
    /// by the caller (`RateLimitedFetcher`) with the same value, so the
    /// configured fetch timeout is the one that fires.
    pub fn new(source: &str, base_url: Option<&str>, timeout: Duration) -> Result<Self> {
        let (sport, league) =
            resolve_source(source).ok_or_else(|| anyhow!("unknown scoreboard source '{}'", source))?;
        let http = Client::builder()
            .connect_timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(EspnScoreboard {
            http,
            name: format!("ESPN/{}", league),
            sport,
            league,
            base_url: base_url.unwrap_or(DEFAULT_ESPN_API_URL).to_string(),
            connect_timeout: timeout,
        })
    }

    pub fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }

    fn scoreboard_url(&self) -> Result<Url> {
        let mut url = Url::parse(&self.base_url)
            .with_context(|| format!("invalid ESPN base URL '{}'", self.base_url))?;
        url.path_segments_mut()
            .map_err(|_| anyhow!("ESPN base URL cannot be a base: {}", self.base_url))?
            .pop_if_empty()
            .extend([self.sport.as_str(), self.league.as_str(), "scoreboard"]);
        Ok(url)
    }
}

#[async_trait]
impl ScoreProvider<LiveGame> for EspnScoreboard {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch_snapshots(&self) -> Result<Vec<LiveGame>> {
        let url = self.scoreboard_url()?;
        debug!("Fetching scoreboard from {}", url);

        let resp = self
            .http
            .get(url)
            .send()
            .await
            .context("ESPN scoreboard request failed")?;

        if !resp.status().is_success() {
            anyhow::bail!("ESPN scoreboard error: {}", resp.status());
        }

        let raw: serde_json::Value = resp
            .json()
            .await
            .context("Failed to parse ESPN scoreboard response")?;

        Ok(parse_scoreboard(&raw, &self.sport, &self.league))
    }
}

fn status_from_espn(status: &serde_json::Value) -> Option<GameStatus> {
    let kind = &status["type"];
    if kind["name"].as_str() == Some("STATUS_HALFTIME") {
        return Some(GameStatus::Halftime);
    }
    match kind["state"].as_str()? {
        "pre" => Some(GameStatus::Scheduled),
        "in" => Some(GameStatus::InProgress),
        "post" => Some(GameStatus::Final),
        _ => None,
    }
}

/// Scores arrive as strings ("24") or numbers. Anything else, or a value
/// outside `i32`, is rejected rather than defaulted.
fn parse_score(v: &serde_json::Value) -> Option<i32> {
    match v {
        serde_json::Value::String(s) => s.trim().parse().ok(),
        serde_json::Value::Number(n) => n.as_i64().and_then(|n| i32::try_from(n).ok()),
        _ => None,
    }
}

fn parse_event(ev: &serde_json::Value, sport: &str, league: &str) -> Result<LiveGame, SnapshotError> {
    let event_id = ev["id"]
        .as_str()
        .ok_or(SnapshotError::MissingField("id"))?
        .to_string();
    let competition = ev["competitions"]
        .get(0)
        .ok_or(SnapshotError::MissingField("competitions"))?;
    let status_json = if ev["status"].is_object() {
        &ev["status"]
    } else {
        &competition["status"]
    };
    let status = status_from_espn(status_json).ok_or_else(|| {
        SnapshotError::Malformed(format!("unrecognised status {}", status_json["type"]))
    })?;

    let competitors = competition["competitors"]
        .as_array()
        .ok_or(SnapshotError::MissingField("competitors"))?;
    let side = |which: &str| {
        competitors
            .iter()
            .find(|c| c["homeAway"].as_str() == Some(which))
    };
    let home = side("home").ok_or(SnapshotError::MissingField("home competitor"))?;
    let away = side("away").ok_or(SnapshotError::MissingField("away competitor"))?;

    let team = |c: &serde_json::Value, field: &'static str| {
        c["team"]["displayName"]
            .as_str()
            .map(str::to_string)
            .ok_or(SnapshotError::MissingField(field))
    };
    let score = |c: &serde_json::Value| {
        parse_score(&c["score"])
            .ok_or_else(|| SnapshotError::Malformed(format!("invalid score {}", c["score"])))
    };

    let period = match status {
        GameStatus::InProgress | GameStatus::Halftime => status_json["period"]
            .as_u64()
            .and_then(|p| u32::try_from(p).ok()),
        _ => None,
    };

    Ok(LiveGame {
        event_id,
        sport: sport.to_string(),
        league: league.to_string(),
        home_team: team(home, "home team")?,
        away_team: team(away, "away team")?,
        home_score: score(home)?,
        away_score: score(away)?,
        period,
        status,
    })
}

/// Convert a scoreboard payload into snapshots, preserving upstream order.
/// Events that cannot be read are logged at error level and left out; the
/// rest of the board is still returned.
pub fn parse_scoreboard(raw: &serde_json::Value, sport: &str, league: &str) -> Vec<LiveGame> {
    let events = match raw["events"].as_array() {
        Some(a) => a,
        None => return vec![],
    };

    events
        .iter()
        .filter_map(|ev| match parse_event(ev, sport, league) {
            Ok(game) => Some(game),
            Err(e) => {
                error!("[ESPN/{}] dropping event {}: {}", league, ev["id"], e);
                None
            }
        })
        .collect()
}
