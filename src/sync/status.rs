use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::RwLock;

use super::engine::CycleReport;

/// What the status endpoint shows for one source.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SourceStatus {
    pub provider: String,
    pub cycles: u64,
    pub consecutive_failures: u32,
    pub tracked_entities: usize,
    pub last_report: Option<CycleReport>,
    pub last_success_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub last_error_at: Option<DateTime<Utc>>,
}

/// Shared, read-mostly view of every service's latest cycle.
#[derive(Clone, Default)]
pub struct StatusBoard {
    inner: Arc<RwLock<BTreeMap<String, SourceStatus>>>,
}

impl StatusBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn record_success(
        &self,
        source: &str,
        provider: &str,
        report: &CycleReport,
        tracked_entities: usize,
    ) {
        let mut inner = self.inner.write().await;
        let entry = inner.entry(source.to_string()).or_default();
        entry.provider = provider.to_string();
        entry.cycles += 1;
        entry.consecutive_failures = 0;
        entry.tracked_entities = tracked_entities;
        entry.last_report = Some(report.clone());
        entry.last_success_at = Some(Utc::now());
    }

    pub async fn record_failure(&self, source: &str, provider: &str, error: &str, consecutive: u32) {
        let mut inner = self.inner.write().await;
        let entry = inner.entry(source.to_string()).or_default();
        entry.provider = provider.to_string();
        entry.cycles += 1;
        entry.consecutive_failures = consecutive;
        entry.last_error = Some(error.to_string());
        entry.last_error_at = Some(Utc::now());
    }

    pub async fn snapshot(&self) -> BTreeMap<String, SourceStatus> {
        self.inner.read().await.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_success_resets_failures() {
        let board = StatusBoard::new();
        board.record_failure("nba", "ESPN", "timed out", 2).await;
        let report = CycleReport {
            updated: 4,
            api_calls: 1,
            ..CycleReport::default()
        };
        board.record_success("nba", "ESPN", &report, 12).await;

        let snap = board.snapshot().await;
        let nba = &snap["nba"];
        assert_eq!(nba.cycles, 2);
        assert_eq!(nba.consecutive_failures, 0);
        assert_eq!(nba.tracked_entities, 12);
        assert_eq!(nba.last_report.as_ref().unwrap().updated, 4);
        assert_eq!(nba.last_error.as_deref(), Some("timed out"));
    }
}
