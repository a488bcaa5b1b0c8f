//! Location CRUD, occupancy updates, crowd logs and the city list.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, put},
    Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::ApiError;
use crate::models::{CrowdLog, Location, LocationPatch, NewLocation};
use crate::status::{self, CrowdStatus};
use crate::store::LocationFilter;
use crate::AppContext;

// ---

pub fn router() -> Router<AppContext> {
    // ---
    Router::new()
        .route("/locations", get(list_locations).post(create_location))
        .route(
            "/locations/{id}",
            get(get_location)
                .patch(patch_location)
                .delete(delete_location),
        )
        .route("/locations/{id}/count", put(update_count))
        .route("/locations/{id}/logs", get(location_logs))
        .route("/cities", get(list_cities))
}

/// A location plus the figures derived from it at read time.
#[derive(Debug, Serialize)]
pub struct LocationView {
    #[serde(flatten)]
    pub location: Location,
    pub utilization: u32,
    pub status: CrowdStatus,
    pub status_label: &'static str,
    pub wait_minutes: u32,
    pub wait_label: String,
    pub updated_ago: String,
}

impl From<Location> for LocationView {
    fn from(location: Location) -> Self {
        // ---
        let status = location.status();
        let wait_minutes = location.wait_minutes();
        Self {
            utilization: location.utilization(),
            status,
            status_label: status.label(),
            wait_minutes,
            wait_label: status::format_wait_time(wait_minutes),
            updated_ago: status::format_time_ago(location.last_updated, Utc::now()),
            location,
        }
    }
}

/// Query parameters for filtering locations; empty values are ignored.
#[derive(Debug, Deserialize)]
pub struct LocationsQuery {
    city: Option<String>,
    q: Option<String>,
}

impl From<LocationsQuery> for LocationFilter {
    fn from(query: LocationsQuery) -> Self {
        // ---
        let non_empty = |v: Option<String>| v.filter(|s| !s.is_empty());
        Self {
            city: non_empty(query.city),
            search: non_empty(query.q),
        }
    }
}

/// Optional recent-hours window for crowd logs.
#[derive(Debug, Deserialize)]
pub struct LogsQuery {
    hours: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct CountUpdate {
    count: i64,
}

async fn list_locations(
    State(ctx): State<AppContext>,
    Query(params): Query<LocationsQuery>,
) -> Json<Vec<LocationView>> {
    // ---
    debug!("GET /locations - {:?}", params);
    let filter = LocationFilter::from(params);
    let locations = ctx.with_store(|store| store.get_filtered(&filter));
    Json(locations.into_iter().map(LocationView::from).collect())
}

async fn create_location(
    State(ctx): State<AppContext>,
    Json(fields): Json<NewLocation>,
) -> Result<impl IntoResponse, ApiError> {
    // ---
    if fields.capacity == 0 {
        return Err(ApiError::BadRequest("capacity must be positive".to_string()));
    }

    let location = ctx.add_location(fields);
    info!("POST /locations - added {} ({})", location.name, location.id);
    Ok((StatusCode::CREATED, Json(LocationView::from(location))))
}

async fn get_location(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
) -> Result<Json<LocationView>, ApiError> {
    // ---
    ctx.with_store(|store| store.get(&id).cloned())
        .map(|location| Json(LocationView::from(location)))
        .ok_or(ApiError::NotFound(id))
}

async fn patch_location(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
    Json(patch): Json<LocationPatch>,
) -> Result<Json<LocationView>, ApiError> {
    // ---
    if patch.capacity == Some(0) {
        return Err(ApiError::BadRequest("capacity must be positive".to_string()));
    }

    let location = ctx
        .update_location(&id, patch)
        .ok_or_else(|| ApiError::NotFound(id.clone()))?;
    info!("PATCH /locations/{} - updated", id);
    Ok(Json(LocationView::from(location)))
}

async fn delete_location(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    // ---
    if !ctx.delete_location(&id) {
        return Err(ApiError::NotFound(id));
    }
    info!("DELETE /locations/{} - removed", id);
    Ok(StatusCode::NO_CONTENT)
}

/// Set the live count; values outside `[0, capacity]` are clamped.
async fn update_count(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
    Json(body): Json<CountUpdate>,
) -> Result<Json<LocationView>, ApiError> {
    // ---
    let location = ctx
        .update_count(&id, body.count)
        .ok_or_else(|| ApiError::NotFound(id.clone()))?;
    debug!(
        "PUT /locations/{}/count - requested {}, stored {}",
        id, body.count, location.current_count
    );
    Ok(Json(LocationView::from(location)))
}

/// Crowd logs for a location, oldest first; `?hours=N` keeps the last N hours.
async fn location_logs(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
    Query(params): Query<LogsQuery>,
) -> Result<Json<Vec<CrowdLog>>, ApiError> {
    // ---
    if params.hours == Some(0) {
        return Err(ApiError::BadRequest("hours must be positive".to_string()));
    }
    if ctx.with_store(|store| store.get(&id).is_none()) {
        return Err(ApiError::NotFound(id));
    }

    let logs = ctx.logs_within(&id, params.hours).await?;
    debug!("GET /locations/{}/logs - {} entries", id, logs.len());
    Ok(Json(logs))
}

async fn list_cities(State(ctx): State<AppContext>) -> Json<Vec<String>> {
    // ---
    Json(ctx.with_store(|store| store.cities()))
}
