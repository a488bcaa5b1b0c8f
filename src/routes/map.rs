//! Map overlays: density heat points and flow trails.

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::projection::{self, HeatPoint, Trail};
use crate::AppContext;

// ---

pub fn router() -> Router<AppContext> {
    // ---
    Router::new()
        .route("/map/heat", get(heat))
        .route("/map/trails", get(trails))
}

#[derive(Debug, Serialize)]
struct HeatResponse {
    mean_intensity: f64,
    points: Vec<HeatPoint>,
}

#[derive(Debug, Deserialize)]
struct TrailsQuery {
    /// Return every trail instead of the current phase's subset.
    #[serde(default)]
    all: bool,
}

#[derive(Debug, Serialize)]
struct TrailsResponse {
    phase: usize,
    trails: Vec<Trail>,
}

async fn heat(State(ctx): State<AppContext>) -> Json<HeatResponse> {
    // ---
    let points = projection::heat_points(&ctx.snapshot());
    Json(HeatResponse {
        mean_intensity: projection::mean_intensity(&points),
        points,
    })
}

async fn trails(
    State(ctx): State<AppContext>,
    Query(params): Query<TrailsQuery>,
) -> Json<TrailsResponse> {
    // ---
    let all = projection::flow_trails(&ctx.snapshot());
    let phase = ctx.trail_phase();
    let trails = if params.all {
        all
    } else {
        projection::visible_trails(&all, phase)
    };
    Json(TrailsResponse { phase, trails })
}
