//! Built-in location catalogue used when no database or feed supplies data.

use chrono::{DateTime, Utc};

use crate::models::{Location, LocationCategory};

use LocationCategory::*;

// ---

type SeedRow = (
    &'static str,
    &'static str,
    &'static str,
    LocationCategory,
    u32,
    u32,
    f64,
    f64,
    f64,
);

// (name, city, state, category, capacity, current, lat, lng, service rate)
const SEED_ROWS: &[SeedRow] = &[
    ("Lilavati Hospital", "Mumbai", "Maharashtra", Hospital, 500, 380, 19.0544, 72.8294, 8.0),
    ("Phoenix Palladium Mall", "Mumbai", "Maharashtra", Mall, 3000, 1850, 18.9947, 72.8258, 50.0),
    ("Chhatrapati Shivaji Terminus", "Mumbai", "Maharashtra", Transport, 10000, 7500, 18.9398, 72.8355, 200.0),
    ("AIIMS Hospital", "Delhi", "Delhi", Hospital, 2400, 1920, 28.5672, 77.2100, 30.0),
    ("Select Citywalk", "Delhi", "Delhi", Mall, 4000, 2200, 28.5289, 77.2192, 60.0),
    ("Connaught Place", "Delhi", "Delhi", Mall, 8000, 3200, 28.6315, 77.2167, 100.0),
    ("Delhi University", "Delhi", "Delhi", University, 15000, 8500, 28.6889, 77.2099, 150.0),
    ("Manipal Hospital Whitefield", "Bangalore", "Karnataka", Hospital, 600, 420, 12.9698, 77.7500, 10.0),
    ("Phoenix Marketcity", "Bangalore", "Karnataka", Mall, 5000, 3800, 12.9976, 77.6967, 80.0),
    ("IISc Campus", "Bangalore", "Karnataka", University, 8000, 2400, 13.0219, 77.5671, 80.0),
    ("Embassy Tech Village", "Bangalore", "Karnataka", Office, 20000, 15000, 12.9279, 77.6899, 200.0),
    ("Apollo Hospital", "Chennai", "Tamil Nadu", Hospital, 700, 490, 13.0067, 80.2206, 12.0),
    ("Express Avenue Mall", "Chennai", "Tamil Nadu", Mall, 3500, 1400, 13.0569, 80.2673, 55.0),
    ("Chennai Central Station", "Chennai", "Tamil Nadu", Transport, 12000, 8400, 13.0827, 80.2707, 250.0),
    ("KIMS Hospital", "Hyderabad", "Telangana", Hospital, 450, 180, 17.4239, 78.4738, 8.0),
    ("Inorbit Mall Hyderabad", "Hyderabad", "Telangana", Mall, 4500, 2700, 17.4355, 78.3847, 70.0),
    ("Hitech City IT Park", "Hyderabad", "Telangana", Office, 25000, 18750, 17.4474, 78.3762, 250.0),
    ("AMRI Hospital", "Kolkata", "West Bengal", Hospital, 400, 320, 22.5096, 88.3632, 7.0),
    ("South City Mall", "Kolkata", "West Bengal", Mall, 3000, 2100, 22.5006, 88.3639, 45.0),
    ("Howrah Station", "Kolkata", "West Bengal", Transport, 15000, 13500, 22.5836, 88.3388, 300.0),
    ("Ruby Hall Clinic", "Pune", "Maharashtra", Hospital, 350, 140, 18.5362, 73.8996, 6.0),
    ("Phoenix Marketcity Pune", "Pune", "Maharashtra", Mall, 4000, 2000, 18.5623, 73.9158, 65.0),
    ("Sterling Hospital", "Ahmedabad", "Gujarat", Hospital, 300, 240, 23.0469, 72.5293, 5.0),
    ("Ahmedabad One Mall", "Ahmedabad", "Gujarat", Mall, 3500, 1750, 23.0469, 72.5129, 55.0),
    ("Fortis Hospital Jaipur", "Jaipur", "Rajasthan", Hospital, 280, 196, 26.8504, 75.8043, 5.0),
    ("World Trade Park", "Jaipur", "Rajasthan", Mall, 5000, 3500, 26.8939, 75.8097, 75.0),
];

/// Build the seed table. Ids are `loc-1` .. `loc-N` in catalogue order.
pub fn seed_locations(now: DateTime<Utc>) -> Vec<Location> {
    // ---
    SEED_ROWS
        .iter()
        .enumerate()
        .map(
            |(i, &(name, city, state, category, capacity, current, lat, lng, rate))| Location {
                id: format!("loc-{}", i + 1),
                name: name.to_string(),
                city: city.to_string(),
                state: state.to_string(),
                category,
                capacity,
                current_count: current,
                latitude: lat,
                longitude: lng,
                average_service_rate: rate,
                last_updated: now,
                image_url: None,
            },
        )
        .collect()
}
