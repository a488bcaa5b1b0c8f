//! Data models for the crowd monitoring service.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::status::{self, CrowdStatus};

// ---

/// Kind of site being monitored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LocationCategory {
    Hospital,
    Mall,
    Office,
    University,
    Transport,
    Auditorium,
    Government,
    Restaurant,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown location category '{0}'")]
pub struct CategoryParseError(pub String);

impl LocationCategory {
    // ---
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hospital => "hospital",
            Self::Mall => "mall",
            Self::Office => "office",
            Self::University => "university",
            Self::Transport => "transport",
            Self::Auditorium => "auditorium",
            Self::Government => "government",
            Self::Restaurant => "restaurant",
        }
    }
}

impl fmt::Display for LocationCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LocationCategory {
    type Err = CategoryParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // ---
        match s.trim().to_ascii_lowercase().as_str() {
            "hospital" => Ok(Self::Hospital),
            "mall" => Ok(Self::Mall),
            "office" => Ok(Self::Office),
            "university" => Ok(Self::University),
            "transport" => Ok(Self::Transport),
            "auditorium" => Ok(Self::Auditorium),
            "government" => Ok(Self::Government),
            "restaurant" => Ok(Self::Restaurant),
            other => Err(CategoryParseError(other.to_string())),
        }
    }
}

/// A monitored site.
///
/// Utilization is never stored; it is derived from `current_count` and
/// `capacity` on every read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    // ---
    pub id: String,
    pub name: String,
    pub city: String,
    pub state: String,
    pub category: LocationCategory,
    pub capacity: u32,
    pub current_count: u32,
    pub latitude: f64,
    pub longitude: f64,
    /// People processed per minute.
    pub average_service_rate: f64,
    pub last_updated: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

impl Location {
    // ---
    pub fn utilization(&self) -> u32 {
        status::utilization(self.current_count, self.capacity)
    }

    pub fn status(&self) -> CrowdStatus {
        status::classify(self.current_count, self.capacity)
    }

    pub fn wait_minutes(&self) -> u32 {
        status::wait_minutes(self.current_count, self.average_service_rate)
    }
}

/// Fields supplied when registering a new location.
#[derive(Debug, Clone, Deserialize)]
pub struct NewLocation {
    // ---
    pub name: String,
    pub city: String,
    #[serde(default)]
    pub state: String,
    pub category: LocationCategory,
    pub capacity: u32,
    #[serde(default)]
    pub current_count: u32,
    pub latitude: f64,
    pub longitude: f64,
    pub average_service_rate: f64,
    #[serde(default)]
    pub image_url: Option<String>,
}

impl NewLocation {
    // ---
    pub fn into_location(self, id: String, now: DateTime<Utc>) -> Location {
        Location {
            id,
            name: self.name,
            city: self.city,
            state: self.state,
            category: self.category,
            capacity: self.capacity,
            current_count: self.current_count,
            latitude: self.latitude,
            longitude: self.longitude,
            average_service_rate: self.average_service_rate,
            last_updated: now,
            image_url: self.image_url,
        }
    }
}

/// Partial update of a location; `None` leaves the field untouched.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LocationPatch {
    // ---
    pub name: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub category: Option<LocationCategory>,
    pub capacity: Option<u32>,
    pub current_count: Option<u32>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub average_service_rate: Option<f64>,
    pub image_url: Option<String>,
}

impl LocationPatch {
    // ---
    pub fn apply_to(self, location: &mut Location, now: DateTime<Utc>) {
        if let Some(name) = self.name {
            location.name = name;
        }
        if let Some(city) = self.city {
            location.city = city;
        }
        if let Some(state) = self.state {
            location.state = state;
        }
        if let Some(category) = self.category {
            location.category = category;
        }
        if let Some(capacity) = self.capacity {
            location.capacity = capacity;
        }
        if let Some(count) = self.current_count {
            location.current_count = count;
        }
        if let Some(lat) = self.latitude {
            location.latitude = lat;
        }
        if let Some(lng) = self.longitude {
            location.longitude = lng;
        }
        if let Some(rate) = self.average_service_rate {
            location.average_service_rate = rate;
        }
        if let Some(url) = self.image_url {
            location.image_url = Some(url);
        }
        location.last_updated = now;
    }
}

/// Immutable historical occupancy sample.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CrowdLog {
    // ---
    pub id: String,
    pub location_id: String,
    pub count: u32,
    pub timestamp: DateTime<Utc>,
}

/// Location record as delivered by the external feed or read from the
/// `locations` table (snake_case columns, category in `type`).
#[derive(Debug, Clone, Deserialize, sqlx::FromRow)]
pub struct RawLocationRecord {
    // ---
    pub id: String,
    pub name: String,
    pub city: String,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(rename = "type")]
    #[sqlx(rename = "category")]
    pub category: String,
    pub capacity: i64,
    pub current_count: i64,
    pub latitude: f64,
    pub longitude: f64,
    pub average_service_rate: f64,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub image_url: Option<String>,
}

impl RawLocationRecord {
    /// Normalize into the store's `Location` shape.
    ///
    /// Counts are not clamped against capacity here; only negative values
    /// are floored at zero. A missing `updated_at` is stamped with `now`.
    pub fn to_location(&self, now: DateTime<Utc>) -> Result<Location, CategoryParseError> {
        // ---
        let category = self.category.parse::<LocationCategory>()?;

        Ok(Location {
            id: self.id.clone(),
            name: self.name.clone(),
            city: self.city.clone(),
            state: self.state.clone().unwrap_or_default(),
            category,
            capacity: to_u32(self.capacity),
            current_count: to_u32(self.current_count),
            latitude: self.latitude,
            longitude: self.longitude,
            average_service_rate: self.average_service_rate,
            last_updated: self.updated_at.unwrap_or(now),
            image_url: self.image_url.clone(),
        })
    }
}

fn to_u32(value: i64) -> u32 {
    u32::try_from(value.max(0)).unwrap_or(u32::MAX)
}
