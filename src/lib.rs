//! Crowd density monitoring backend.
//!
//! A reactive in-memory [`store::LocationStore`] holds every monitored site.
//! A random-walk simulation, an optional external feed and admin requests
//! mutate it; insights, dashboard statistics and map overlays are pure
//! read-side derivations recomputed from its snapshot. Everything is wired
//! together by [`AppContext`] and exposed over HTTP by [`routes::router`].

pub mod config;
pub mod context;
pub mod db;
pub mod feed;
pub mod history;
pub mod insights;
pub mod models;
pub mod projection;
pub mod routes;
pub mod schema;
pub mod seed;
pub mod stats;
pub mod status;
pub mod store;

pub use config::Config;
pub use context::AppContext;
pub use models::{CrowdLog, Location, LocationCategory, LocationPatch, NewLocation};
pub use status::{ClassificationPolicy, CrowdStatus};
pub use store::LocationStore;
