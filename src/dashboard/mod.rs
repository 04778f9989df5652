//! Read-only JSON status endpoints. No UI; intended for health checks and
//! ad-hoc inspection.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;
use tower_http::cors::CorsLayer;

use crate::db::Database;
use crate::sync::{RateLimiter, StatusBoard};

#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub status: StatusBoard,
    pub limiter: Arc<RateLimiter>,
}

#[derive(Debug, Deserialize)]
struct GamesQuery {
    limit: Option<i64>,
}

/// Build the Axum router for the status endpoints.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/sync", get(sync_handler))
        .route("/api/games", get(games_handler))
        .route("/api/games/:id", get(game_handler))
        .route("/api/limiter", get(limiter_handler))
        .layer(CorsLayer::permissive())
        .with_state(Arc::new(state))
}

/// GET /api/sync
async fn sync_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.status.snapshot().await)
}

/// GET /api/games?limit=100
async fn games_handler(
    State(state): State<Arc<AppState>>,
    Query(q): Query<GamesQuery>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let limit = q.limit.unwrap_or(100).clamp(1, 1000);
    state
        .db
        .list_games(limit)
        .map(Json)
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
}

/// GET /api/games/:id
async fn game_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    match state.db.get_game(&id) {
        Ok(Some(game)) => Ok(Json(game)),
        Ok(None) => Err((StatusCode::NOT_FOUND, format!("game {} not found", id))),
        Err(e) => Err((StatusCode::INTERNAL_SERVER_ERROR, e.to_string())),
    }
}

/// GET /api/limiter
async fn limiter_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.limiter.usage().await)
}
