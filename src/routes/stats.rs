use axum::{extract::State, routing::get, Json, Router};

use crate::stats::{compute_stats, DashboardStats};
use crate::AppContext;

// ---

pub fn router() -> Router<AppContext> {
    // ---
    Router::new().route("/stats", get(handler))
}

async fn handler(State(ctx): State<AppContext>) -> Json<DashboardStats> {
    // ---
    Json(compute_stats(&ctx.snapshot()))
}
