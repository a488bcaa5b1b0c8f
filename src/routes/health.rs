// src/routes/health.rs
//! API health check endpoint for the crowdsense backend.
//!
//! This module defines the `/health` route used by container orchestrators
//! and CI pipelines to verify that the service is running. Besides liveness
//! it reports whether the last external feed poll failed, in which case the
//! service is still up but serving its last good snapshot.

use axum::{extract::State, routing::get, Json, Router};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::AppContext;

/// JSON response body for the `/health` endpoint.
#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    locations: usize,
    last_update: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    feed_error: Option<String>,
}

/// Handle `GET /health`.
///
/// Reports `"degraded"` instead of `"ok"` while the feed error flag is set.
/// Never touches the database or the feed itself.
async fn health(State(ctx): State<AppContext>) -> Json<HealthResponse> {
    // ---
    let (locations, last_update, feed_error) = ctx.with_store(|store| {
        (
            store.len(),
            store.last_update(),
            store.feed_error().map(String::from),
        )
    });

    Json(HealthResponse {
        status: if feed_error.is_some() { "degraded" } else { "ok" },
        locations,
        last_update,
        feed_error,
    })
}

/// Create a subrouter containing the `/health` route.
pub fn router() -> Router<AppContext> {
    Router::new().route("/health", get(health))
}
