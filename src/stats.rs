//! Aggregate dashboard figures computed from a location snapshot.

use serde::Serialize;

use crate::history::hourly_profile;
use crate::models::Location;
use crate::status::{ClassificationPolicy, CrowdStatus, ZERO_CAPACITY_UTILIZATION};

// ---

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
    pub low: usize,
    pub medium: usize,
    pub high: usize,
    pub critical: usize,
}

impl StatusCounts {
    // ---
    fn record(&mut self, status: CrowdStatus) {
        match status {
            CrowdStatus::Low => self.low += 1,
            CrowdStatus::Medium => self.medium += 1,
            CrowdStatus::High => self.high += 1,
            CrowdStatus::Critical => self.critical += 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CityBreakdown {
    pub city: String,
    pub current: u64,
    pub capacity: u64,
    pub utilization: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BusiestLocation {
    pub id: String,
    pub name: String,
    pub city: String,
    pub utilization: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardStats {
    // ---
    pub total_locations: usize,
    pub total_current: u64,
    pub total_capacity: u64,
    /// Pooled over all locations: total current over total capacity.
    pub average_utilization: u32,
    /// Four-tier classification.
    pub status_counts: StatusCounts,
    /// Three-tier classification used by the analytics distribution.
    pub distribution: StatusCounts,
    /// Locations classified high or critical.
    pub congested: usize,
    pub busiest: Option<BusiestLocation>,
    /// Busiest city first.
    pub cities: Vec<CityBreakdown>,
    /// Typical peak hours of the day, busiest first.
    pub peak_hours: Vec<u32>,
}

fn pooled_utilization(current: u64, capacity: u64) -> u32 {
    // ---
    if capacity == 0 {
        return ZERO_CAPACITY_UTILIZATION;
    }
    (current as f64 / capacity as f64 * 100.0).round() as u32
}

/// The three hours with the highest typical occupancy; earlier hours win ties.
pub fn peak_hours() -> Vec<u32> {
    // ---
    let mut hours: Vec<u32> = (0..24).collect();
    hours.sort_by(|a, b| hourly_profile(*b).total_cmp(&hourly_profile(*a)));
    hours.truncate(3);
    hours
}

pub fn compute_stats(locations: &[Location]) -> DashboardStats {
    // ---
    let mut status_counts = StatusCounts::default();
    let mut distribution = StatusCounts::default();
    let mut cities: Vec<CityBreakdown> = Vec::new();
    let mut busiest: Option<&Location> = None;
    let (mut total_current, mut total_capacity) = (0u64, 0u64);

    for loc in locations {
        let util = loc.utilization();
        total_current += u64::from(loc.current_count);
        total_capacity += u64::from(loc.capacity);

        status_counts.record(ClassificationPolicy::FourTier.classify_utilization(util));
        distribution.record(ClassificationPolicy::ThreeTier.classify_utilization(util));

        // First location wins ties.
        if busiest.map_or(true, |b| util > b.utilization()) {
            busiest = Some(loc);
        }

        match cities.iter_mut().find(|c| c.city == loc.city) {
            Some(entry) => {
                entry.current += u64::from(loc.current_count);
                entry.capacity += u64::from(loc.capacity);
            }
            None => cities.push(CityBreakdown {
                city: loc.city.clone(),
                current: u64::from(loc.current_count),
                capacity: u64::from(loc.capacity),
                utilization: 0,
            }),
        }
    }

    for city in &mut cities {
        city.utilization = pooled_utilization(city.current, city.capacity);
    }
    cities.sort_by(|a, b| b.utilization.cmp(&a.utilization));

    let average_utilization = if locations.is_empty() {
        0
    } else {
        pooled_utilization(total_current, total_capacity)
    };

    DashboardStats {
        total_locations: locations.len(),
        total_current,
        total_capacity,
        average_utilization,
        congested: status_counts.high + status_counts.critical,
        status_counts,
        distribution,
        busiest: busiest.map(|l| BusiestLocation {
            id: l.id.clone(),
            name: l.name.clone(),
            city: l.city.clone(),
            utilization: l.utilization(),
        }),
        cities,
        peak_hours: peak_hours(),
    }
}
