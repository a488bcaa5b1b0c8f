//! Current advisory board and manual refresh.

use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use tracing::info;

use crate::context::InsightSnapshot;
use crate::AppContext;

// ---

pub fn router() -> Router<AppContext> {
    // ---
    Router::new()
        .route("/insights", get(current))
        .route("/insights/refresh", post(refresh))
}

async fn current(State(ctx): State<AppContext>) -> Json<InsightSnapshot> {
    Json(ctx.insights())
}

/// Regenerate now, after the configured artificial delay.
async fn refresh(State(ctx): State<AppContext>) -> Json<InsightSnapshot> {
    // ---
    let board = ctx.manual_refresh().await;
    info!(
        "POST /insights/refresh - version {}, {} insights",
        board.version,
        board.insights.len()
    );
    Json(board)
}
