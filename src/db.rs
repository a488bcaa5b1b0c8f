//! PostgreSQL sink for location state and crowd logs.
//!
//! The in-memory store stays authoritative; these writes are best effort and
//! failures are logged instead of propagated to clients. All writes go
//! through one [`DbWrite`] channel drained by a single task, so they reach
//! the database in the order the store applied them.

use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::models::{CrowdLog, Location, RawLocationRecord};

// ---

/// One queued write, mirroring a store mutation.
#[derive(Debug, Clone, PartialEq)]
pub enum DbWrite {
    /// Insert or replace the full location record.
    Upsert(Location),
    /// Count change from the count endpoint: row update plus its log entry.
    Count(CrowdLog),
    /// Log entry for a count changed by some other update.
    Log(CrowdLog),
    Delete(String),
    /// Stop the writer once everything queued before it is written.
    Shutdown,
}

/// Spawn the single writer task for `pool`.
pub fn spawn_writer(pool: PgPool) -> (mpsc::UnboundedSender<DbWrite>, JoinHandle<()>) {
    // ---
    let (tx, rx) = mpsc::unbounded_channel();
    let handle = tokio::spawn(run_writer(pool, rx));
    (tx, handle)
}

async fn run_writer(pool: PgPool, mut rx: mpsc::UnboundedReceiver<DbWrite>) {
    // ---
    while let Some(write) = rx.recv().await {
        let result = match &write {
            DbWrite::Upsert(location) => upsert_location(&pool, location).await,
            DbWrite::Count(log) => record_count(&pool, log).await,
            DbWrite::Log(log) => insert_log(&pool, log).await,
            DbWrite::Delete(id) => delete_location(&pool, id).await,
            DbWrite::Shutdown => break,
        };
        if let Err(e) = result {
            tracing::error!("Failed to persist {:?}: {}", write, e);
        }
    }
    tracing::info!("Database writer stopped");
}

/// Load all persisted locations in insertion order.
///
/// Rows whose category no longer parses are skipped with a warning.
pub async fn load_locations(pool: &PgPool) -> Result<Vec<Location>> {
    // ---
    let rows: Vec<RawLocationRecord> = sqlx::query_as(
        r#"
        SELECT id, name, city, state, category, capacity, current_count,
               latitude, longitude, average_service_rate, updated_at, image_url
        FROM locations
        ORDER BY seq
        "#,
    )
    .fetch_all(pool)
    .await?;

    let now = Utc::now();
    let mut locations = Vec::with_capacity(rows.len());
    for row in rows {
        match row.to_location(now) {
            Ok(location) => locations.push(location),
            Err(e) => tracing::warn!("Skipping stored location {}: {}", row.id, e),
        }
    }

    tracing::debug!("Loaded {} locations from database", locations.len());
    Ok(locations)
}

/// Insert or replace the full record for `location`.
pub async fn upsert_location(pool: &PgPool, location: &Location) -> Result<(), sqlx::Error> {
    // ---
    sqlx::query(
        r#"
        INSERT INTO locations (
            id, name, city, state, category, capacity, current_count,
            latitude, longitude, average_service_rate, updated_at, image_url
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
        ON CONFLICT (id) DO UPDATE SET
            name = EXCLUDED.name,
            city = EXCLUDED.city,
            state = EXCLUDED.state,
            category = EXCLUDED.category,
            capacity = EXCLUDED.capacity,
            current_count = EXCLUDED.current_count,
            latitude = EXCLUDED.latitude,
            longitude = EXCLUDED.longitude,
            average_service_rate = EXCLUDED.average_service_rate,
            updated_at = EXCLUDED.updated_at,
            image_url = EXCLUDED.image_url
        "#,
    )
    .bind(&location.id)
    .bind(&location.name)
    .bind(&location.city)
    .bind(&location.state)
    .bind(location.category.as_str())
    .bind(i64::from(location.capacity))
    .bind(i64::from(location.current_count))
    .bind(location.latitude)
    .bind(location.longitude)
    .bind(location.average_service_rate)
    .bind(location.last_updated)
    .bind(&location.image_url)
    .execute(pool)
    .await?;

    Ok(())
}

/// Persist a count change together with its crowd log entry.
pub async fn record_count(pool: &PgPool, log: &CrowdLog) -> Result<(), sqlx::Error> {
    // ---
    let mut tx = pool.begin().await?;

    sqlx::query("UPDATE locations SET current_count = $2, updated_at = $3 WHERE id = $1")
        .bind(&log.location_id)
        .bind(i64::from(log.count))
        .bind(log.timestamp)
        .execute(&mut *tx)
        .await?;

    insert_log(&mut *tx, log).await?;
    tx.commit().await
}

/// Append one crowd log row, keeping the id it has in memory.
pub async fn insert_log<'e, E>(executor: E, log: &CrowdLog) -> Result<(), sqlx::Error>
where
    E: sqlx::PgExecutor<'e>,
{
    // ---
    sqlx::query(
        r#"
        INSERT INTO crowd_logs (id, location_id, count, timestamp)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (id) DO NOTHING
        "#,
    )
    .bind(&log.id)
    .bind(&log.location_id)
    .bind(i64::from(log.count))
    .bind(log.timestamp)
    .execute(executor)
    .await?;

    Ok(())
}

#[derive(sqlx::FromRow)]
struct CrowdLogRow {
    id: String,
    location_id: String,
    count: i64,
    timestamp: DateTime<Utc>,
}

impl From<CrowdLogRow> for CrowdLog {
    fn from(row: CrowdLogRow) -> Self {
        // ---
        Self {
            id: row.id,
            location_id: row.location_id,
            count: u32::try_from(row.count.max(0)).unwrap_or(u32::MAX),
            timestamp: row.timestamp,
        }
    }
}

/// Persisted logs for `location_id`, oldest first, optionally only those
/// recorded at or after `since`.
pub async fn load_logs(
    pool: &PgPool,
    location_id: &str,
    since: Option<DateTime<Utc>>,
) -> Result<Vec<CrowdLog>> {
    // ---
    let rows: Vec<CrowdLogRow> = sqlx::query_as(
        r#"
        SELECT id, location_id, count, timestamp
        FROM crowd_logs
        WHERE location_id = $1
          AND ($2::timestamptz IS NULL OR timestamp >= $2)
        ORDER BY timestamp
        "#,
    )
    .bind(location_id)
    .bind(since)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(CrowdLog::from).collect())
}

/// Remove a location row; its crowd logs are kept.
pub async fn delete_location(pool: &PgPool, location_id: &str) -> Result<(), sqlx::Error> {
    // ---
    sqlx::query("DELETE FROM locations WHERE id = $1")
        .bind(location_id)
        .execute(pool)
        .await?;

    Ok(())
}
