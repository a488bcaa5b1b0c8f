use axum::Router;

use crate::AppContext;

mod error;
mod health;
mod insights;
mod locations;
mod map;
mod stats;

pub use error::ApiError;

// ---

pub fn router(ctx: AppContext) -> Router {
    // ---
    Router::new()
        .merge(locations::router())
        .merge(insights::router())
        .merge(map::router())
        .merge(stats::router())
        .merge(health::router())
        .with_state(ctx)
}
