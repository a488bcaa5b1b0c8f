//! Configuration loader for the `crowdsense` backend service.
//!
//! This module centralizes all runtime configuration values and their defaults,
//! loading from environment variables (with optional `.env` file support
//! provided by the caller). Every setting has a default, so the service runs
//! standalone on the built-in location catalogue when nothing is configured.
//!
use std::env;
use std::time::Duration;

use anyhow::{anyhow, Result};

/// Parse an optional integer environment variable with a default value.
macro_rules! parse_env_u32 {
    ($var_name:expr, $default:expr) => {
        env::var($var_name)
            .ok()
            .map(|v| v.parse::<u32>())
            .transpose()
            .map_err(|e| anyhow!("Invalid {}: {}", $var_name, e))?
            .unwrap_or($default)
    };
}

/// Parse an optional `u64` environment variable with a default value.
macro_rules! parse_env_u64 {
    ($var_name:expr, $default:expr) => {
        env::var($var_name)
            .ok()
            .map(|v| v.parse::<u64>())
            .transpose()
            .map_err(|e| anyhow!("Invalid {}: {}", $var_name, e))?
            .unwrap_or($default)
    };
}

/// Read an optional string environment variable; blank values count as unset.
macro_rules! optional_env {
    ($var_name:expr) => {
        env::var($var_name).ok().filter(|v| !v.trim().is_empty())
    };
}

/// Strongly typed application configuration.
///
/// All fields are immutable after loading, ensuring a consistent configuration
/// snapshot for the lifetime of the application.
#[derive(Debug, Clone)]
pub struct Config {
    // ---
    /// Address the HTTP server binds to.
    pub bind_addr: String,

    /// PostgreSQL connection string; persistence is skipped when unset.
    pub db_url: Option<String>,

    /// Maximum number of database connections in the pool.
    pub db_pool_max: u32,

    /// External location feed URL; polling is skipped when unset.
    pub feed_url: Option<String>,

    /// Maximum number of feed pages to fetch per poll (safety limit).
    pub feed_max_pages: u32,

    pub feed_poll_interval: Duration,

    /// Run the random-walk occupancy simulation.
    pub simulation_enabled: bool,

    pub simulation_tick: Duration,

    pub insight_refresh_interval: Duration,

    pub trail_phase_interval: Duration,

    /// Artificial delay applied to manual insight refreshes.
    pub manual_refresh_delay: Duration,

    /// Fixed seed for all randomness; entropy when unset.
    pub rng_seed: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        // ---
        Self {
            bind_addr: "0.0.0.0:8080".to_string(),
            db_url: None,
            db_pool_max: 5,
            feed_url: None,
            feed_max_pages: 100,
            feed_poll_interval: Duration::from_secs(30),
            simulation_enabled: true,
            simulation_tick: Duration::from_millis(5000),
            insight_refresh_interval: Duration::from_secs(15),
            trail_phase_interval: Duration::from_millis(2000),
            manual_refresh_delay: Duration::from_millis(600),
            rng_seed: None,
        }
    }
}

fn parse_bool(var_name: &str, value: &str) -> Result<bool> {
    // ---
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(anyhow!("Invalid {}: '{}' is not a boolean", var_name, other)),
    }
}

/// Load configuration from environment variables with defaults.
///
/// Optional:
/// - `BIND_ADDR` – listen address (default: 0.0.0.0:8080)
/// - `DATABASE_URL` – PostgreSQL connection string (default: unset, no persistence)
/// - `DB_POOL_MAX` – max DB connections (default: 5)
/// - `FEED_URL` – external location feed (default: unset, no polling)
/// - `FEED_MAX_PAGES` – max feed pages per poll (default: 100)
/// - `FEED_POLL_SECS` – feed poll interval (default: 30)
/// - `SIMULATION_ENABLED` – random-walk timer on/off (default: true)
/// - `SIMULATION_TICK_MS` – simulation interval (default: 5000)
/// - `INSIGHT_REFRESH_SECS` – insight timer (default: 15)
/// - `TRAIL_PHASE_MS` – trail rotation interval (default: 2000)
/// - `MANUAL_REFRESH_DELAY_MS` – manual refresh delay (default: 600)
/// - `RNG_SEED` – deterministic randomness (default: unset)
///
/// Returns an error if any variable is present but invalid.
pub fn load_from_env() -> Result<Config> {
    // ---
    let defaults = Config::default();

    let bind_addr = optional_env!("BIND_ADDR").unwrap_or(defaults.bind_addr);
    let db_url = optional_env!("DATABASE_URL");
    let db_pool_max = parse_env_u32!("DB_POOL_MAX", defaults.db_pool_max);
    let feed_url = optional_env!("FEED_URL");
    let feed_max_pages = parse_env_u32!("FEED_MAX_PAGES", defaults.feed_max_pages);
    let feed_poll_secs = parse_env_u64!("FEED_POLL_SECS", 30);
    let simulation_enabled = match optional_env!("SIMULATION_ENABLED") {
        Some(v) => parse_bool("SIMULATION_ENABLED", &v)?,
        None => defaults.simulation_enabled,
    };
    let simulation_tick_ms = parse_env_u64!("SIMULATION_TICK_MS", 5000);
    let insight_refresh_secs = parse_env_u64!("INSIGHT_REFRESH_SECS", 15);
    let trail_phase_ms = parse_env_u64!("TRAIL_PHASE_MS", 2000);
    let manual_refresh_delay_ms = parse_env_u64!("MANUAL_REFRESH_DELAY_MS", 600);
    let rng_seed = optional_env!("RNG_SEED")
        .map(|v| v.parse::<u64>())
        .transpose()
        .map_err(|e| anyhow!("Invalid RNG_SEED: {}", e))?;

    if simulation_tick_ms == 0 || insight_refresh_secs == 0 || trail_phase_ms == 0 {
        return Err(anyhow!("Timer intervals must be greater than zero"));
    }
    if feed_poll_secs == 0 {
        return Err(anyhow!("Invalid FEED_POLL_SECS: must be greater than zero"));
    }

    Ok(Config {
        bind_addr,
        db_url,
        db_pool_max,
        feed_url,
        feed_max_pages,
        feed_poll_interval: Duration::from_secs(feed_poll_secs),
        simulation_enabled,
        simulation_tick: Duration::from_millis(simulation_tick_ms),
        insight_refresh_interval: Duration::from_secs(insight_refresh_secs),
        trail_phase_interval: Duration::from_millis(trail_phase_ms),
        manual_refresh_delay: Duration::from_millis(manual_refresh_delay_ms),
        rng_seed,
    })
}

/// Replace the password in a connection URL with `****`.
pub fn mask_db_url(db_url: &str) -> String {
    // ---
    let userinfo_start = db_url.find("://").map_or(0, |p| p + 3);
    if let Some(at_pos) = db_url.rfind('@') {
        if let Some(colon_pos) = db_url[..at_pos].rfind(':') {
            if colon_pos >= userinfo_start {
                return format!("{}:****{}", &db_url[..colon_pos], &db_url[at_pos..]);
            }
        }
    }
    db_url.to_string()
}

impl Config {
    /// Log the loaded configuration for debugging purposes.
    ///
    /// Masks sensitive information like database passwords while showing
    /// all configuration values that were loaded.
    pub fn log_config(&self) {
        // ---
        let masked_db_url = self.db_url.as_deref().map(mask_db_url);
        let unset = || "<unset>".to_string();

        tracing::info!("Configuration loaded:");
        tracing::info!("  BIND_ADDR               : {}", self.bind_addr);
        tracing::info!(
            "  DATABASE_URL            : {}",
            masked_db_url.unwrap_or_else(unset)
        );
        tracing::info!("  DB_POOL_MAX             : {}", self.db_pool_max);
        tracing::info!(
            "  FEED_URL                : {}",
            self.feed_url.clone().unwrap_or_else(unset)
        );
        tracing::info!("  FEED_MAX_PAGES          : {}", self.feed_max_pages);
        tracing::info!("  FEED_POLL_SECS          : {}", self.feed_poll_interval.as_secs());
        tracing::info!("  SIMULATION_ENABLED      : {}", self.simulation_enabled);
        tracing::info!("  SIMULATION_TICK_MS      : {}", self.simulation_tick.as_millis());
        tracing::info!(
            "  INSIGHT_REFRESH_SECS    : {}",
            self.insight_refresh_interval.as_secs()
        );
        tracing::info!("  TRAIL_PHASE_MS          : {}", self.trail_phase_interval.as_millis());
        tracing::info!(
            "  MANUAL_REFRESH_DELAY_MS : {}",
            self.manual_refresh_delay.as_millis()
        );
        tracing::info!(
            "  RNG_SEED                : {}",
            self.rng_seed.map_or_else(unset, |s| s.to_string())
        );
    }
}
