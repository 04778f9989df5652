//! Adaptive polling: a shared rate limiter gates one bulk fetch per cycle,
//! and a per-entity cadence decides which returned games are written.

pub mod cadence;
pub mod engine;
pub mod entity;
pub mod error;
pub mod fetcher;
pub mod rate_limiter;
pub mod service;
pub mod state;
pub mod status;
pub mod store;

#[cfg(test)]
pub mod testing;

pub use cadence::CadencePolicy;
pub use engine::SyncEngine;
pub use entity::LiveEntity;
pub use fetcher::RateLimitedFetcher;
pub use rate_limiter::RateLimiter;
pub use service::SyncService;
pub use status::StatusBoard;
pub use store::{EntityStore, UpsertOutcome};
