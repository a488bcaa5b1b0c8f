//! Database schema management for `crowdsense`.
//!
//! Ensures required tables and indexes exist before serving requests.
//! Applied once on startup from `main.rs` when a database is configured.

use anyhow::Result;
use sqlx::PgPool;

// ---

/// Create or update the database schema (idempotent).
///
/// Creates the `locations` table holding the latest state of every monitored
/// site and the append-only `crowd_logs` table of occupancy samples. Safe to
/// call on every startup; no-op if objects already exist.
///
/// Errors are propagated if any SQL execution fails.
pub async fn create_schema(pool: &PgPool) -> Result<()> {
    // ---
    let mut tx = pool.begin().await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS locations (
            id                    TEXT PRIMARY KEY,
            seq                   BIGSERIAL,
            name                  TEXT             NOT NULL,
            city                  TEXT             NOT NULL,
            state                 TEXT,
            category              TEXT             NOT NULL,
            capacity              BIGINT           NOT NULL,
            current_count         BIGINT           NOT NULL,
            latitude              DOUBLE PRECISION NOT NULL,
            longitude             DOUBLE PRECISION NOT NULL,
            average_service_rate  DOUBLE PRECISION NOT NULL,
            updated_at            TIMESTAMPTZ,
            image_url             TEXT
        );
        "#,
    )
    .execute(&mut *tx)
    .await?;

    // Logs outlive their location; no foreign key.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS crowd_logs (
            id           TEXT PRIMARY KEY,
            location_id  TEXT        NOT NULL,
            count        BIGINT      NOT NULL,
            timestamp    TIMESTAMPTZ NOT NULL
        );
        "#,
    )
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_locations_city
            ON locations (city);
        "#,
    )
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_crowd_logs_location_time
            ON crowd_logs (location_id, timestamp);
        "#,
    )
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(())
}
