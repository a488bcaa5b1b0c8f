//! Map rendering primitives derived from location state.
//!
//! Heat points spread each location's density over concentric rings so the
//! client can render a smooth gradient. Flow trails connect nearby
//! locations and point from the busier one to the quieter one.

use std::f64::consts::PI;

use serde::Serialize;

use crate::models::Location;
use crate::status::ZERO_CAPACITY_UTILIZATION;

// ---

/// Number of trail groups rotated through by the phase timer.
pub const TRAIL_PHASES: usize = 3;

/// Trails shown at once for a given phase.
pub const MAX_VISIBLE_TRAILS: usize = 5;

/// Pairs further apart than this (in degrees) get no trail.
pub const TRAIL_MAX_DISTANCE: f64 = 2.0;

/// Upper bound on the outermost ring radius, in degrees.
const MAX_SPREAD: f64 = 0.15;

/// Bounding box used for the overlay projection: (min, max) lat then lng.
const OVERLAY_LAT: (f64, f64) = (8.0, 35.0);
const OVERLAY_LNG: (f64, f64) = (68.0, 97.0);

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct HeatPoint {
    pub lat: f64,
    pub lng: f64,
    pub intensity: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TrailDirection {
    Inflow,
    Outflow,
}

/// Position on a 100x100 overlay covering the monitored region.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct OverlayPoint {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Trail {
    // ---
    /// `"{first}-{second}"` in store order.
    pub id: String,
    /// The busier end.
    pub from_id: String,
    pub to_id: String,
    pub from: OverlayPoint,
    pub to: OverlayPoint,
    pub direction: TrailDirection,
    pub intensity: f64,
}

/// Heat cloud for every location, each starting with its centre point.
pub fn heat_points(locations: &[Location]) -> Vec<HeatPoint> {
    // ---
    locations.iter().flat_map(location_heat).collect()
}

fn location_heat(location: &Location) -> Vec<HeatPoint> {
    // ---
    let utilization = location.utilization();
    let intensity = (f64::from(utilization) / 100.0).min(1.0);
    let base_intensity = intensity * 0.8;

    let spread = MAX_SPREAD.min(f64::from(location.capacity) / 20000.0);
    let rings: u32 = if utilization > 60 { 3 } else { 2 };

    let mut points = vec![HeatPoint {
        lat: location.latitude,
        lng: location.longitude,
        intensity,
    }];

    for ring in 1..=rings {
        let radius = spread * f64::from(ring) / f64::from(rings);
        let ring_intensity = base_intensity * (1.0 - f64::from(ring) / f64::from(rings + 1));
        let count = 6 + ring * 2;

        for i in 0..count {
            let angle = 2.0 * PI * f64::from(i) / f64::from(count);
            points.push(HeatPoint {
                lat: location.latitude + radius * angle.cos(),
                lng: location.longitude + radius * angle.sin(),
                intensity: ring_intensity,
            });
        }
    }
    points
}

/// Unrounded utilization percentage used for trail direction and strength.
fn raw_utilization(location: &Location) -> f64 {
    // ---
    if location.capacity == 0 {
        return f64::from(ZERO_CAPACITY_UTILIZATION);
    }
    f64::from(location.current_count) / f64::from(location.capacity) * 100.0
}

pub fn overlay_position(latitude: f64, longitude: f64) -> OverlayPoint {
    // ---
    let x = (longitude - OVERLAY_LNG.0) / (OVERLAY_LNG.1 - OVERLAY_LNG.0) * 100.0;
    let y = 100.0 - (latitude - OVERLAY_LAT.0) / (OVERLAY_LAT.1 - OVERLAY_LAT.0) * 100.0;
    OverlayPoint { x, y }
}

/// Every unordered pair closer than [`TRAIL_MAX_DISTANCE`], in pair order.
pub fn flow_trails(locations: &[Location]) -> Vec<Trail> {
    // ---
    let mut trails = Vec::new();

    for (i, first) in locations.iter().enumerate() {
        for second in &locations[i + 1..] {
            let distance = (first.latitude - second.latitude)
                .hypot(first.longitude - second.longitude);
            if distance >= TRAIL_MAX_DISTANCE {
                continue;
            }

            let (util_first, util_second) = (raw_utilization(first), raw_utilization(second));
            let (from, to, direction) = if util_first > util_second {
                (first, second, TrailDirection::Outflow)
            } else {
                (second, first, TrailDirection::Inflow)
            };

            trails.push(Trail {
                id: format!("{}-{}", first.id, second.id),
                from_id: from.id.clone(),
                to_id: to.id.clone(),
                from: overlay_position(from.latitude, from.longitude),
                to: overlay_position(to.latitude, to.longitude),
                direction,
                intensity: (2.0 * (util_first - util_second).abs() / 100.0).min(1.0),
            });
        }
    }
    trails
}

/// Trails shown for `phase`: those whose index falls in the phase group,
/// capped at [`MAX_VISIBLE_TRAILS`].
pub fn visible_trails(trails: &[Trail], phase: usize) -> Vec<Trail> {
    // ---
    let phase = phase % TRAIL_PHASES;
    trails
        .iter()
        .enumerate()
        .filter(|(index, _)| index % TRAIL_PHASES == phase)
        .map(|(_, trail)| trail.clone())
        .take(MAX_VISIBLE_TRAILS)
        .collect()
}

/// Mean heat of a point cloud; used by the map summary.
pub fn mean_intensity(points: &[HeatPoint]) -> f64 {
    // ---
    if points.is_empty() {
        return 0.0;
    }
    points.iter().map(|p| p.intensity).sum::<f64>() / points.len() as f64
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use crate::models::LocationCategory;
    use chrono::{TimeZone, Utc};

    fn create_test_location(id: &str, current: u32, capacity: u32, lat: f64, lng: f64) -> Location {
        // ---
        Location {
            id: id.to_string(),
            name: format!("Site {id}"),
            city: "Pune".to_string(),
            state: "Maharashtra".to_string(),
            category: LocationCategory::Mall,
            capacity,
            current_count: current,
            latitude: lat,
            longitude: lng,
            average_service_rate: 10.0,
            last_updated: Utc.with_ymd_and_hms(2025, 3, 26, 12, 0, 0).unwrap(),
            image_url: None,
        }
    }

    #[test]
    fn test_heat_ring_counts() {
        // ---
        // util 50: 1 + 8 + 10
        let calm = create_test_location("a", 500, 1000, 18.5, 73.8);
        assert_eq!(heat_points(&[calm]).len(), 19);

        // util 61: 1 + 8 + 10 + 12
        let busy = create_test_location("b", 610, 1000, 18.5, 73.8);
        assert_eq!(heat_points(&[busy]).len(), 31);
    }

    #[test]
    fn test_heat_geometry() {
        // ---
        let loc = create_test_location("a", 900, 1000, 18.5, 73.8);
        let points = heat_points(&[loc]);

        assert_eq!(points[0], HeatPoint { lat: 18.5, lng: 73.8, intensity: 0.9 });

        // Ring 1 of 3: radius 0.05 * 1/3, first point due north (angle 0).
        let first_ring = points[1];
        assert!((first_ring.lat - (18.5 + 0.05 / 3.0)).abs() < 1e-12);
        assert!((first_ring.lng - 73.8).abs() < 1e-12);
        assert!((first_ring.intensity - 0.9 * 0.8 * 0.75).abs() < 1e-12);

        // Outermost ring sits at the full spread radius.
        let outer = points[1 + 8 + 10];
        assert!((outer.lat - (18.5 + 0.05)).abs() < 1e-12);
        assert!((outer.intensity - 0.9 * 0.8 * 0.25).abs() < 1e-12);
    }

    #[test]
    fn test_heat_spread_and_intensity_capped() {
        // ---
        let loc = create_test_location("a", 20000, 10000, 20.0, 75.0);
        let points = heat_points(&[loc]);

        assert_eq!(points[0].intensity, 1.0);
        let outer = points[1 + 8 + 10];
        assert!((outer.lat - (20.0 + MAX_SPREAD)).abs() < 1e-12);
    }

    #[test]
    fn test_trail_direction_and_intensity() {
        // ---
        let quiet = create_test_location("q", 20, 100, 18.5, 73.8);
        let busy = create_test_location("b", 90, 100, 18.6, 73.9);

        let trails = flow_trails(&[quiet.clone(), busy.clone()]);
        assert_eq!(trails.len(), 1);
        assert_eq!(trails[0].id, "q-b");
        assert_eq!(trails[0].from_id, "b");
        assert_eq!(trails[0].to_id, "q");
        assert_eq!(trails[0].direction, TrailDirection::Inflow);
        assert_eq!(trails[0].intensity, 1.0);

        let trails = flow_trails(&[busy, quiet]);
        assert_eq!(trails[0].id, "b-q");
        assert_eq!(trails[0].from_id, "b");
        assert_eq!(trails[0].direction, TrailDirection::Outflow);
    }

    #[test]
    fn test_trail_uses_unrounded_utilization() {
        // ---
        // 1/3 vs 1/4: both round differently but the gap is 8.33 points.
        let a = create_test_location("a", 1, 3, 18.5, 73.8);
        let b = create_test_location("b", 1, 4, 18.5, 73.9);
        let trails = flow_trails(&[a, b]);

        let expected = 2.0 * (100.0 / 3.0 - 25.0) / 100.0;
        assert!((trails[0].intensity - expected).abs() < 1e-12);
    }

    #[test]
    fn test_trail_distance_cutoff() {
        // ---
        let a = create_test_location("a", 10, 100, 18.0, 73.0);
        let near = create_test_location("n", 50, 100, 19.0, 74.0);
        let far = create_test_location("f", 50, 100, 20.0, 73.0);

        let trails = flow_trails(&[a, near, far]);
        let ids: Vec<_> = trails.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["a-n", "n-f"]);
    }

    #[test]
    fn test_visible_trail_rotation() {
        // ---
        let locations: Vec<_> = (0..8)
            .map(|i| create_test_location(&i.to_string(), i * 10, 100, 18.5, 73.8))
            .collect();
        let trails = flow_trails(&locations);
        assert_eq!(trails.len(), 28);

        for phase in 0..TRAIL_PHASES {
            let visible = visible_trails(&trails, phase);
            assert_eq!(visible.len(), MAX_VISIBLE_TRAILS);
            assert_eq!(visible[0], trails[phase]);
            assert_eq!(visible[1], trails[phase + 3]);
        }
        assert_eq!(visible_trails(&trails, 4), visible_trails(&trails, 1));
    }

    #[test]
    fn test_overlay_projection() {
        // ---
        assert_eq!(overlay_position(8.0, 68.0), OverlayPoint { x: 0.0, y: 100.0 });
        assert_eq!(overlay_position(35.0, 97.0), OverlayPoint { x: 100.0, y: 0.0 });
    }
}
