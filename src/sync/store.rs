use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum UpsertOutcome {
    Inserted,
    Updated,
}

/// Persistence collaborator. Upserts are keyed by entity id and idempotent:
/// writing identical content twice leaves the stored row unchanged.
#[async_trait]
pub trait EntityStore<E>: Send + Sync {
    async fn upsert(&self, entity: &E) -> Result<UpsertOutcome>;
}
