//! Synthetic occupancy history for locations that have no recorded logs.
//!
//! Follows a fixed daily occupancy curve (quiet overnight, peaks around
//! noon and early evening) with ±15% jitter per sample.

use chrono::{DateTime, Duration, TimeZone, Timelike, Utc};
use rand::Rng;
use uuid::Uuid;

use crate::models::CrowdLog;

// ---

/// Share of capacity typically occupied at each hour of the day.
const HOURLY_PROFILE: [f64; 24] = [
    0.10, 0.05, 0.05, 0.05, 0.08, 0.15, // 00-05
    0.25, 0.40, 0.60, 0.75, 0.85, 0.90, // 06-11
    0.95, 0.85, 0.80, 0.75, 0.80, 0.90, // 12-17
    0.95, 0.85, 0.70, 0.50, 0.30, 0.15, // 18-23
];

pub fn hourly_profile(hour: u32) -> f64 {
    HOURLY_PROFILE[(hour % 24) as usize]
}

/// Build `hours_back + 1` hourly samples ending at `now`, oldest first.
///
/// The profile is looked up in `tz` so the curve follows local time.
pub fn synthesize_history<Tz, R>(
    location_id: &str,
    capacity: u32,
    hours_back: u32,
    now: DateTime<Utc>,
    tz: &Tz,
    rng: &mut R,
) -> Vec<CrowdLog>
where
    Tz: TimeZone,
    R: Rng + ?Sized,
{
    // ---
    (0..=hours_back)
        .rev()
        .map(|i| {
            let timestamp = now - Duration::hours(i64::from(i));
            let hour = timestamp.with_timezone(tz).hour();
            let variation = 0.85 + rng.gen::<f64>() * 0.3;
            let count = (f64::from(capacity) * hourly_profile(hour) * variation).round();

            CrowdLog {
                id: Uuid::new_v4().to_string(),
                location_id: location_id.to_string(),
                count: (count.max(0.0) as u32).min(capacity),
                timestamp,
            }
        })
        .collect()
}
