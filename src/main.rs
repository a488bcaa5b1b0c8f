//! Application entry point for the `crowdsense` backend service.
//!
//! This binary orchestrates the full startup sequence for the crowd
//! monitoring API, including:
//! - Loading configuration from environment variables or `.env`
//! - Initializing structured logging/tracing
//! - Optionally connecting to PostgreSQL and creating the schema
//! - Loading persisted locations, or seeding the built-in catalogue
//! - Starting the simulation, insight, trail and feed timers
//! - Binding the Axum HTTP server and serving requests until Ctrl-C
//!
//! # Environment Variables
//! - `DATABASE_URL` (optional) – PostgreSQL connection string
//! - `AXUM_LOG_LEVEL` (optional) – log verbosity (default: `debug`)
//! - `AXUM_SPAN_EVENTS` (optional) – span event mode for tracing
//!
//! See `config.rs` for the full list.
use std::env;

use anyhow::{Context, Result};
use axum::Router;
use chrono::Utc;
use dotenvy::dotenv;
use is_terminal::IsTerminal;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt::format::FmtSpan;

use crowdsense::{config, db, routes, schema, seed, AppContext, Config, Location};

// ---

#[tokio::main]
async fn main() -> Result<()> {
    // ---
    dotenv().ok();
    init_tracing();

    let cfg = config::load_from_env()?;
    cfg.log_config();

    let pool = match cfg.db_url.as_deref() {
        Some(db_url) => Some(connect(&cfg, db_url).await?),
        None => {
            tracing::info!("DATABASE_URL not set, running without persistence");
            None
        }
    };

    let locations = initial_locations(pool.as_ref()).await?;
    tracing::info!("Starting with {} locations", locations.len());

    let bind_addr = cfg.bind_addr.clone();
    let ctx = AppContext::new(cfg, locations, pool);
    ctx.start();

    // Build app from routes gateway
    let app: Router = routes::router(ctx.clone());

    let listener = tokio::net::TcpListener::bind(bind_addr.as_str())
        .await
        .with_context(|| format!("Failed to bind {}", bind_addr))?;
    tracing::info!("Listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    ctx.shutdown().await;
    Ok(())
}

async fn connect(cfg: &Config, db_url: &str) -> Result<PgPool> {
    // ---
    let masked = config::mask_db_url(db_url);
    tracing::info!("Attempting to connect to database: {}", masked);

    let pool = PgPoolOptions::new()
        .max_connections(cfg.db_pool_max)
        .connect(db_url)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to connect to database '{}': {}", masked, e))?;

    tracing::info!("Successfully connected to database");

    schema::create_schema(&pool).await?;
    Ok(pool)
}

/// Persisted locations if there are any, otherwise the seed catalogue
/// (written back to the database when one is configured).
async fn initial_locations(pool: Option<&PgPool>) -> Result<Vec<Location>> {
    // ---
    let Some(pool) = pool else {
        return Ok(seed::seed_locations(Utc::now()));
    };

    let stored = db::load_locations(pool).await?;
    if !stored.is_empty() {
        return Ok(stored);
    }

    let seeded = seed::seed_locations(Utc::now());
    for location in &seeded {
        db::upsert_location(pool, location).await?;
    }
    tracing::info!("Seeded database with {} locations", seeded.len());
    Ok(seeded)
}

async fn shutdown_signal() {
    // ---
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

// ---

/// Initialize the global tracing subscriber for structured logging.
///
/// This function configures the [`tracing_subscriber`] with:
/// - Log target, file, and line number output enabled
/// - Color output controlled by TTY detection and `FORCE_COLOR` env var:
///   - `FORCE_COLOR=1|true|yes`: force colors on
///   - `FORCE_COLOR=0|false|no`: force colors off
///   - unset or other values: auto-detect TTY
/// - Span event emission mode controlled by the `AXUM_SPAN_EVENTS` env var:
///   - `"full"`       : emit ENTER, EXIT, and CLOSE events with timing
///   - `"enter_exit"` : emit ENTER and EXIT only
///   - unset or other values: emit CLOSE events only (default)
/// - Log level controlled by the `AXUM_LOG_LEVEL` env var
///
/// This should be called once at application startup before any logging
/// or tracing macros are invoked.
fn init_tracing() {
    // ---
    let span_events = match env::var("AXUM_SPAN_EVENTS").as_deref() {
        Ok("full") => FmtSpan::FULL,
        Ok("enter_exit") => FmtSpan::ENTER | FmtSpan::EXIT,
        _ => FmtSpan::CLOSE,
    };

    let use_color = match env::var("FORCE_COLOR").as_deref() {
        Ok("1") | Ok("true") | Ok("yes") => true,
        Ok("0") | Ok("false") | Ok("no") => false,
        _ => std::io::stdout().is_terminal(),
    };

    // Use RUST_LOG if available, otherwise fall back to AXUM_LOG_LEVEL
    let env_filter = if env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        let level = match env::var("AXUM_LOG_LEVEL").ok().as_deref() {
            Some("trace") => "trace",
            Some("debug") => "debug",
            Some("info") => "info",
            Some("warn") => "warn",
            Some("error") => "error",
            _ => "debug",
        };
        EnvFilter::new(format!("{level},sqlx::query=warn,hyper=info,reqwest=info"))
    };

    tracing_subscriber::fmt()
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .with_span_events(span_events)
        .with_env_filter(env_filter)
        .with_ansi(use_color)
        .compact()
        .init();
}
