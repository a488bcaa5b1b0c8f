//! Occupancy classification and wait-time estimation.
//!
//! Two classification policies coexist: the four-tier policy used by the
//! live dashboard and insight engine, and the older three-tier policy still
//! used by the analytics distribution. They are kept separate on purpose.

use chrono::{DateTime, Utc};
use serde::Serialize;

// ---

/// Utilization reported for a location with zero capacity.
pub const ZERO_CAPACITY_UTILIZATION: u32 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CrowdStatus {
    Low,
    Medium,
    High,
    Critical,
}

impl CrowdStatus {
    // ---
    pub fn label(&self) -> &'static str {
        match self {
            Self::Low => "Low Crowd",
            Self::Medium => "Moderate",
            Self::High => "Busy",
            Self::Critical => "Near Capacity",
        }
    }

    /// High or critical.
    pub fn is_congested(&self) -> bool {
        matches!(self, Self::High | Self::Critical)
    }
}

/// Named classification granularity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassificationPolicy {
    /// low ≤ 40, medium ≤ 75, high ≤ 90, critical above.
    FourTier,
    /// low ≤ 40, medium ≤ 75, high above. Never yields `Critical`.
    ThreeTier,
}

impl ClassificationPolicy {
    // ---
    pub fn classify_utilization(&self, utilization: u32) -> CrowdStatus {
        match (self, utilization) {
            (_, 0..=40) => CrowdStatus::Low,
            (_, 41..=75) => CrowdStatus::Medium,
            (Self::ThreeTier, _) => CrowdStatus::High,
            (Self::FourTier, 76..=90) => CrowdStatus::High,
            (Self::FourTier, _) => CrowdStatus::Critical,
        }
    }

    pub fn label(&self, status: CrowdStatus) -> &'static str {
        match (self, status) {
            (Self::ThreeTier, CrowdStatus::High) => "High Crowd",
            _ => status.label(),
        }
    }
}

/// `round(current / capacity * 100)`, unclamped.
///
/// Zero capacity is treated as fully saturated.
pub fn utilization(current: u32, capacity: u32) -> u32 {
    // ---
    if capacity == 0 {
        return ZERO_CAPACITY_UTILIZATION;
    }
    (f64::from(current) / f64::from(capacity) * 100.0).round() as u32
}

/// Four-tier classification of a raw count.
pub fn classify(current: u32, capacity: u32) -> CrowdStatus {
    ClassificationPolicy::FourTier.classify_utilization(utilization(current, capacity))
}

/// Three-tier classification of a raw count.
pub fn classify_three_tier(current: u32, capacity: u32) -> CrowdStatus {
    ClassificationPolicy::ThreeTier.classify_utilization(utilization(current, capacity))
}

/// Estimated wait in whole minutes. A non-positive rate yields 0.
pub fn wait_minutes(current: u32, service_rate: f64) -> u32 {
    // ---
    if !service_rate.is_finite() || service_rate <= 0.0 {
        return 0;
    }
    (f64::from(current) / service_rate).round() as u32
}

pub fn format_wait_time(minutes: u32) -> String {
    // ---
    match minutes {
        0 => "< 1 min".to_string(),
        1..=59 => format!("{minutes} min"),
        _ => {
            let (hours, mins) = (minutes / 60, minutes % 60);
            if mins > 0 {
                format!("{hours}h {mins}m")
            } else {
                format!("{hours}h")
            }
        }
    }
}

pub fn format_time_ago(then: DateTime<Utc>, now: DateTime<Utc>) -> String {
    // ---
    let seconds = (now - then).num_seconds().max(0);
    match seconds {
        0..=59 => format!("{seconds}s ago"),
        60..=3599 => format!("{}m ago", seconds / 60),
        3600..=86399 => format!("{}h ago", seconds / 3600),
        _ => format!("{}d ago", seconds / 86400),
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use chrono::{Duration, TimeZone};

    #[test]
    fn test_four_tier_boundaries() {
        // ---
        let policy = ClassificationPolicy::FourTier;
        assert_eq!(policy.classify_utilization(0), CrowdStatus::Low);
        assert_eq!(policy.classify_utilization(40), CrowdStatus::Low);
        assert_eq!(policy.classify_utilization(41), CrowdStatus::Medium);
        assert_eq!(policy.classify_utilization(75), CrowdStatus::Medium);
        assert_eq!(policy.classify_utilization(76), CrowdStatus::High);
        assert_eq!(policy.classify_utilization(90), CrowdStatus::High);
        assert_eq!(policy.classify_utilization(91), CrowdStatus::Critical);
        assert_eq!(policy.classify_utilization(250), CrowdStatus::Critical);
    }

    #[test]
    fn test_three_tier_boundaries() {
        // ---
        let policy = ClassificationPolicy::ThreeTier;
        assert_eq!(policy.classify_utilization(40), CrowdStatus::Low);
        assert_eq!(policy.classify_utilization(41), CrowdStatus::Medium);
        assert_eq!(policy.classify_utilization(75), CrowdStatus::Medium);
        assert_eq!(policy.classify_utilization(76), CrowdStatus::High);
        assert_eq!(policy.classify_utilization(99), CrowdStatus::High);
        assert_eq!(policy.label(CrowdStatus::High), "High Crowd");
    }

    #[test]
    fn test_classification_is_monotonic() {
        // ---
        for policy in [ClassificationPolicy::FourTier, ClassificationPolicy::ThreeTier] {
            let mut previous = CrowdStatus::Low;
            for util in 0..=200 {
                let status = policy.classify_utilization(util);
                assert!(status >= previous, "{policy:?} regressed at {util}%");
                previous = status;
            }
        }
    }

    #[test]
    fn test_utilization_rounding_and_overflow() {
        // ---
        assert_eq!(utilization(1, 3), 33);
        assert_eq!(utilization(2, 3), 67);
        assert_eq!(utilization(1, 8), 13); // 12.5 rounds up
        assert_eq!(utilization(150, 100), 150);
        assert_eq!(classify(95, 100), CrowdStatus::Critical);
        assert_eq!(classify_three_tier(95, 100), CrowdStatus::High);
    }

    #[test]
    fn test_zero_capacity_is_saturated() {
        // ---
        assert_eq!(utilization(0, 0), 100);
        assert_eq!(utilization(12, 0), 100);
        assert_eq!(classify(0, 0), CrowdStatus::Critical);
        assert_eq!(classify_three_tier(0, 0), CrowdStatus::High);
    }

    #[test]
    fn test_wait_minutes() {
        // ---
        assert_eq!(wait_minutes(100, 0.0), 0);
        assert_eq!(wait_minutes(100, -3.0), 0);
        assert_eq!(wait_minutes(100, f64::NAN), 0);
        assert_eq!(wait_minutes(380, 8.0), 48);
        assert_eq!(wait_minutes(7, 2.0), 4);
        assert_eq!(wait_minutes(1, 5.0), 0);
    }

    #[test]
    fn test_format_wait_time() {
        // ---
        assert_eq!(format_wait_time(0), "< 1 min");
        assert_eq!(format_wait_time(1), "1 min");
        assert_eq!(format_wait_time(59), "59 min");
        assert_eq!(format_wait_time(60), "1h");
        assert_eq!(format_wait_time(135), "2h 15m");
    }

    #[test]
    fn test_format_time_ago() {
        // ---
        let now = Utc.with_ymd_and_hms(2025, 3, 26, 18, 45, 0).unwrap();
        assert_eq!(format_time_ago(now - Duration::seconds(12), now), "12s ago");
        assert_eq!(format_time_ago(now - Duration::minutes(5), now), "5m ago");
        assert_eq!(format_time_ago(now - Duration::hours(3), now), "3h ago");
        assert_eq!(format_time_ago(now - Duration::days(2), now), "2d ago");
        assert_eq!(format_time_ago(now + Duration::seconds(30), now), "0s ago");
    }
}
