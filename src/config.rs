use clap::Parser;
use std::time::Duration;

use crate::live_scores::espn::{resolve_source, DEFAULT_ESPN_API_URL};
use crate::sync::CadencePolicy;

/// Adaptive, rate-limited live scoreboard sync
#[derive(Parser, Debug, Clone)]
#[command(name = "scoreboard-sync", version, about)]
pub struct Config {
    /// Status endpoint listen address
    #[arg(long, env = "STATUS_ADDR", default_value = "0.0.0.0:8080")]
    pub status_addr: String,

    /// SQLite database path
    #[arg(long, env = "DATABASE_PATH", default_value = "scoreboard.db")]
    pub database_path: String,

    /// ESPN site API base URL
    #[arg(long, env = "ESPN_API_URL", default_value = DEFAULT_ESPN_API_URL)]
    pub espn_api_url: String,

    /// Sources to sync, e.g. `nfl,nba` or `soccer/eng.1`
    #[arg(long, env = "SOURCES", value_delimiter = ',', default_value = "nfl")]
    pub sources: Vec<String>,

    /// Upstream calls allowed per window, shared by all sources
    #[arg(long, env = "MAX_CALLS_PER_WINDOW", default_value = "60")]
    pub max_calls_per_window: i64,

    /// Rate-limit window length in seconds
    #[arg(long, env = "WINDOW_SECONDS", default_value = "60")]
    pub window_seconds: u64,

    /// Seconds between sync cycles for each source
    #[arg(long, env = "OUTER_TICK_SECONDS", default_value = "5")]
    pub outer_tick_seconds: u64,

    /// Timeout for a single upstream fetch in seconds
    #[arg(long, env = "FETCH_TIMEOUT_SECS", default_value = "10")]
    pub fetch_timeout_secs: u64,

    /// Upper bound on the stretched tick after repeated upstream failures
    #[arg(long, env = "MAX_BACKOFF_SECS", default_value = "60")]
    pub max_backoff_secs: u64,

    /// Random delay (up to this many ms) before each source's first cycle
    #[arg(long, env = "STARTUP_JITTER_MS", default_value = "1000")]
    pub startup_jitter_ms: u64,

    /// Cadence for finished games (seconds)
    #[arg(long, env = "INTERVAL_FINAL", default_value = "300")]
    pub interval_final: u64,

    /// Cadence for games not yet started (seconds)
    #[arg(long, env = "INTERVAL_SCHEDULED", default_value = "60")]
    pub interval_scheduled: u64,

    /// Cadence for games at halftime (seconds)
    #[arg(long, env = "INTERVAL_HALFTIME", default_value = "15")]
    pub interval_halftime: u64,

    /// Cadence for close games late on (seconds)
    #[arg(long, env = "INTERVAL_CLOSE_GAME", default_value = "5")]
    pub interval_close_game: u64,

    /// Cadence for every other in-progress game (seconds)
    #[arg(long, env = "INTERVAL_LIVE_DEFAULT", default_value = "10")]
    pub interval_live_default: u64,

    /// Period from which a game can count as close
    #[arg(long, env = "CLOSE_GAME_PERIOD_THRESHOLD", default_value = "4")]
    pub close_game_period_threshold: u32,

    /// Largest score gap that still counts as close
    #[arg(long, env = "CLOSE_GAME_SCORE_THRESHOLD", default_value = "7")]
    pub close_game_score_threshold: u32,
}

impl Config {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.max_calls_per_window <= 0 {
            anyhow::bail!("max_calls_per_window must be positive");
        }
        if self.window_seconds == 0 {
            anyhow::bail!("window_seconds must be positive");
        }
        if self.outer_tick_seconds == 0 {
            anyhow::bail!("outer_tick_seconds must be positive");
        }
        if self.fetch_timeout_secs == 0 {
            anyhow::bail!("fetch_timeout_secs must be positive");
        }
        let intervals = [
            ("interval_final", self.interval_final),
            ("interval_scheduled", self.interval_scheduled),
            ("interval_halftime", self.interval_halftime),
            ("interval_close_game", self.interval_close_game),
            ("interval_live_default", self.interval_live_default),
        ];
        for (name, secs) in intervals {
            if secs == 0 {
                anyhow::bail!("{} must be positive", name);
            }
        }
        if self.close_game_period_threshold == 0 {
            anyhow::bail!("close_game_period_threshold must be at least 1");
        }
        if self.sources.is_empty() {
            anyhow::bail!("at least one source is required");
        }
        let mut seen = std::collections::HashSet::new();
        for source in &self.sources {
            if resolve_source(source).is_none() {
                anyhow::bail!("unknown source '{}'", source);
            }
            if !seen.insert(source.to_lowercase()) {
                anyhow::bail!("source '{}' listed twice", source);
            }
        }
        Ok(())
    }

    pub fn cadence_policy(&self) -> CadencePolicy {
        CadencePolicy {
            interval_final: Duration::from_secs(self.interval_final),
            interval_scheduled: Duration::from_secs(self.interval_scheduled),
            interval_halftime: Duration::from_secs(self.interval_halftime),
            interval_close_game: Duration::from_secs(self.interval_close_game),
            interval_live_default: Duration::from_secs(self.interval_live_default),
            close_game_period_threshold: self.close_game_period_threshold,
            close_game_score_threshold: self.close_game_score_threshold,
        }
    }

    pub fn max_calls(&self) -> usize {
        self.max_calls_per_window.max(0) as usize
    }

    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_seconds)
    }

    pub fn outer_tick(&self) -> Duration {
        Duration::from_secs(self.outer_tick_seconds)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    pub fn max_backoff(&self) -> Duration {
        Duration::from_secs(self.max_backoff_secs)
    }

    pub fn startup_jitter(&self) -> Duration {
        Duration::from_millis(self.startup_jitter_ms)
    }
}
