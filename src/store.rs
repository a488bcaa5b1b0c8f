//! In-memory location table with bounded crowd logs and change notification.
//!
//! The store is the single source of truth for location state. Every
//! mutation notifies subscribers synchronously before returning, so
//! listeners always observe a fully applied change.

use std::collections::{HashMap, VecDeque};

use chrono::{DateTime, Local, Utc};
use rand::Rng;
use uuid::Uuid;

use crate::history;
use crate::models::{CrowdLog, Location, LocationPatch, NewLocation};

// ---

/// Crowd log entries kept per location.
pub const LOG_RETENTION: usize = 100;

/// Hours of synthetic history generated for a location with no logs.
pub const HISTORY_HOURS: u32 = 24;

/// Largest random-walk step, as a fraction of capacity, in either direction.
pub const SIMULATION_STEP: f64 = 0.05;

pub type SubscriptionId = u64;

type Listener = Box<dyn Fn(&StoreEvent) + Send + Sync>;

/// Change published to subscribers after a mutation.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreEvent {
    Added(String),
    Updated(String),
    Deleted(String),
    Ticked,
    FeedError(String),
}

/// Change delivered by an external feed, keyed by location id.
#[derive(Debug, Clone)]
pub enum FeedEvent {
    Upsert(Location),
    Delete(String),
}

#[derive(Debug, Clone, Default)]
pub struct LocationFilter {
    /// Exact city match.
    pub city: Option<String>,
    /// Case-insensitive substring over name, city and category.
    pub search: Option<String>,
}

impl LocationFilter {
    // ---
    fn matches(&self, location: &Location, needle: Option<&str>) -> bool {
        let city_ok = self.city.as_ref().map_or(true, |c| &location.city == c);
        let search_ok = needle.map_or(true, |n| {
            location.name.to_lowercase().contains(n)
                || location.city.to_lowercase().contains(n)
                || location.category.as_str().contains(n)
        });
        city_ok && search_ok
    }
}

pub struct LocationStore {
    // ---
    locations: Vec<Location>,
    logs: HashMap<String, VecDeque<CrowdLog>>,
    listeners: Vec<(SubscriptionId, Listener)>,
    next_subscription: SubscriptionId,
    feed_error: Option<String>,
    last_update: DateTime<Utc>,
}

impl Default for LocationStore {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl LocationStore {
    // ---
    pub fn new(locations: Vec<Location>) -> Self {
        Self {
            locations,
            logs: HashMap::new(),
            listeners: Vec::new(),
            next_subscription: 1,
            feed_error: None,
            last_update: Utc::now(),
        }
    }

    pub fn locations(&self) -> &[Location] {
        &self.locations
    }

    pub fn snapshot(&self) -> Vec<Location> {
        self.locations.clone()
    }

    pub fn len(&self) -> usize {
        self.locations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locations.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Location> {
        self.locations.iter().find(|l| l.id == id)
    }

    pub fn last_update(&self) -> DateTime<Utc> {
        self.last_update
    }

    pub fn feed_error(&self) -> Option<&str> {
        self.feed_error.as_deref()
    }

    /// Register a listener called after every mutation.
    pub fn subscribe<F>(&mut self, listener: F) -> SubscriptionId
    where
        F: Fn(&StoreEvent) + Send + Sync + 'static,
    {
        // ---
        let id = self.next_subscription;
        self.next_subscription += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        // ---
        let before = self.listeners.len();
        self.listeners.retain(|(sub, _)| *sub != id);
        self.listeners.len() != before
    }

    fn publish(&mut self, event: StoreEvent) {
        // ---
        self.last_update = Utc::now();
        for (_, listener) in &self.listeners {
            listener(&event);
        }
    }

    /// Append a new location with a fresh id. No validation is performed.
    pub fn add_location(&mut self, fields: NewLocation) -> Location {
        // ---
        let id = format!("loc-{}", Uuid::new_v4());
        let location = fields.into_location(id.clone(), Utc::now());
        self.locations.push(location.clone());

        tracing::debug!("Added location {} ({})", location.name, id);
        self.publish(StoreEvent::Added(id));
        location
    }

    /// Set the count of `id`, clamped into `[0, capacity]`, and log it.
    ///
    /// Returns `None` (and changes nothing) for an unknown id.
    pub fn update_count(&mut self, id: &str, new_count: i64) -> Option<Location> {
        // ---
        let now = Utc::now();
        let location = self.locations.iter_mut().find(|l| l.id == id)?;
        location.current_count = clamp_count(new_count, location.capacity);
        location.last_updated = now;

        let updated = location.clone();
        self.append_log(id, updated.current_count, now);
        self.publish(StoreEvent::Updated(id.to_string()));
        Some(updated)
    }

    /// Apply `patch` to `id`, logging the count if it changed.
    pub fn update_location(&mut self, id: &str, patch: LocationPatch) -> Option<Location> {
        // ---
        let now = Utc::now();
        let location = self.locations.iter_mut().find(|l| l.id == id)?;
        let previous = location.current_count;
        patch.apply_to(location, now);

        let updated = location.clone();
        if updated.current_count != previous {
            self.append_log(id, updated.current_count, now);
        }
        self.publish(StoreEvent::Updated(id.to_string()));
        Some(updated)
    }

    /// Remove `id`. Its logs are left in place and never read again.
    pub fn delete_location(&mut self, id: &str) -> bool {
        // ---
        let before = self.locations.len();
        self.locations.retain(|l| l.id != id);
        if self.locations.len() == before {
            return false;
        }

        tracing::debug!("Deleted location {}", id);
        self.publish(StoreEvent::Deleted(id.to_string()));
        true
    }

    /// Locations matching `filter`, in insertion order.
    pub fn get_filtered(&self, filter: &LocationFilter) -> Vec<Location> {
        // ---
        let needle = filter
            .search
            .as_deref()
            .filter(|s| !s.is_empty())
            .map(str::to_lowercase);

        self.locations
            .iter()
            .filter(|l| filter.matches(l, needle.as_deref()))
            .cloned()
            .collect()
    }

    /// Unique cities, sorted.
    pub fn cities(&self) -> Vec<String> {
        // ---
        let mut cities: Vec<String> = self.locations.iter().map(|l| l.city.clone()).collect();
        cities.sort();
        cities.dedup();
        cities
    }

    /// One random-walk step for every location.
    ///
    /// Each count moves by `floor((u - 0.5) * capacity * 0.1)` for a uniform
    /// `u` in `[0, 1)` and is clamped into `[0, capacity]`.
    pub fn simulate_tick<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        // ---
        let now = Utc::now();
        let mut samples = Vec::with_capacity(self.locations.len());

        for location in &mut self.locations {
            let span = f64::from(location.capacity) * SIMULATION_STEP * 2.0;
            let delta = ((rng.gen::<f64>() - 0.5) * span).floor() as i64;
            location.current_count =
                clamp_count(i64::from(location.current_count) + delta, location.capacity);
            location.last_updated = now;
            samples.push((location.id.clone(), location.current_count));
        }

        for (id, count) in samples {
            self.append_log(&id, count, now);
        }

        tracing::debug!("Simulation tick applied to {} locations", self.locations.len());
        self.publish(StoreEvent::Ticked);
    }

    /// Recorded logs for `id`, oldest first.
    ///
    /// A known location without any logs gets a synthetic history which is
    /// stored and returned. Unknown ids yield an empty list.
    pub fn logs_for<R: Rng + ?Sized>(&mut self, id: &str, rng: &mut R) -> Vec<CrowdLog> {
        // ---
        if let Some(logs) = self.logs.get(id).filter(|logs| !logs.is_empty()) {
            return logs.iter().cloned().collect();
        }

        let Some(location) = self.get(id) else {
            return Vec::new();
        };

        let history = history::synthesize_history(
            id,
            location.capacity,
            HISTORY_HOURS,
            Utc::now(),
            &Local,
            rng,
        );
        let mut ring: VecDeque<CrowdLog> = history.iter().cloned().collect();
        while ring.len() > LOG_RETENTION {
            ring.pop_front();
        }
        self.logs.insert(id.to_string(), ring);
        history
    }

    /// Apply an external change; the incoming record wins over local state.
    ///
    /// A changed count on a known location is logged like any other update.
    pub fn apply_feed_event(&mut self, event: FeedEvent) {
        // ---
        match event {
            FeedEvent::Upsert(location) => {
                let id = location.id.clone();
                match self.locations.iter_mut().find(|l| l.id == id) {
                    Some(existing) => {
                        let changed = existing.current_count != location.current_count;
                        let (count, at) = (location.current_count, location.last_updated);
                        *existing = location;
                        if changed {
                            self.append_log(&id, count, at);
                        }
                        self.publish(StoreEvent::Updated(id));
                    }
                    None => {
                        self.locations.push(location);
                        self.publish(StoreEvent::Added(id));
                    }
                }
            }
            FeedEvent::Delete(id) => {
                self.delete_location(&id);
            }
        }
    }

    pub fn set_feed_error(&mut self, message: impl Into<String>) {
        // ---
        let message = message.into();
        self.feed_error = Some(message.clone());
        self.publish(StoreEvent::FeedError(message));
    }

    pub fn clear_feed_error(&mut self) {
        self.feed_error = None;
    }

    /// Most recent recorded log for `id`, if any.
    pub fn latest_log(&self, id: &str) -> Option<&CrowdLog> {
        self.logs.get(id).and_then(VecDeque::back)
    }

    fn append_log(&mut self, id: &str, count: u32, timestamp: DateTime<Utc>) {
        // ---
        let ring = self.logs.entry(id.to_string()).or_default();
        ring.push_back(CrowdLog {
            id: Uuid::new_v4().to_string(),
            location_id: id.to_string(),
            count,
            timestamp,
        });
        while ring.len() > LOG_RETENTION {
            ring.pop_front();
        }
    }
}

fn clamp_count(count: i64, capacity: u32) -> u32 {
    // Bounded by capacity, so the narrowing cast cannot truncate.
    count.clamp(0, i64::from(capacity)) as u32
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use crate::models::LocationCategory;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    fn create_test_location(name: &str, city: &str, current: u32, capacity: u32) -> NewLocation {
        // ---
        NewLocation {
            name: name.to_string(),
            city: city.to_string(),
            state: "Maharashtra".to_string(),
            category: LocationCategory::Mall,
            capacity,
            current_count: current,
            latitude: 19.0,
            longitude: 72.8,
            average_service_rate: 10.0,
            image_url: None,
        }
    }

    fn create_test_store() -> LocationStore {
        // ---
        let mut store = LocationStore::default();
        store.add_location(create_test_location("Phoenix Palladium", "Mumbai", 1850, 3000));
        store.add_location(create_test_location("Ruby Hall Clinic", "Pune", 140, 350));
        store.add_location(create_test_location("Inorbit Mall", "Mumbai", 2700, 4500));
        store
    }

    #[test]
    fn test_add_assigns_unique_ids() {
        // ---
        let mut store = LocationStore::default();
        let a = store.add_location(create_test_location("Twin", "Delhi", 1, 10));
        let b = store.add_location(create_test_location("Twin", "Delhi", 1, 10));

        assert_ne!(a.id, b.id);
        assert!(a.id.starts_with("loc-"));
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_update_count_clamps() {
        // ---
        let mut store = create_test_store();
        let id = store.locations()[1].id.clone();

        assert_eq!(store.update_count(&id, 9_000).unwrap().current_count, 350);
        assert_eq!(store.update_count(&id, -20).unwrap().current_count, 0);
        assert_eq!(store.update_count(&id, 200).unwrap().current_count, 200);
    }

    #[test]
    fn test_update_count_is_idempotent() {
        // ---
        let mut store = create_test_store();
        let id = store.locations()[0].id.clone();

        let once = store.update_count(&id, 99_999).unwrap();
        let twice = store.update_count(&id, 99_999).unwrap();
        assert_eq!(once.current_count, twice.current_count);
        assert_eq!(twice.current_count, twice.capacity);
    }

    #[test]
    fn test_unknown_id_is_noop() {
        // ---
        let mut store = create_test_store();
        let before = store.snapshot();

        assert!(store.update_count("loc-missing", 5).is_none());
        assert!(store.update_location("loc-missing", LocationPatch::default()).is_none());
        assert!(!store.delete_location("loc-missing"));
        assert_eq!(store.snapshot(), before);
    }

    #[test]
    fn test_log_ring_buffer_keeps_latest() {
        // ---
        let mut store = create_test_store();
        let id = store.locations()[1].id.clone();
        let mut rng = ChaCha8Rng::seed_from_u64(1);

        for count in 0..(LOG_RETENTION as i64 + 25) {
            store.update_count(&id, count % 300);
        }

        let logs = store.logs_for(&id, &mut rng);
        assert_eq!(logs.len(), LOG_RETENTION);
        // The first 25 updates (counts 0..25) were evicted.
        assert_eq!(logs[0].count, 25);
        assert_eq!(logs.last().unwrap().count, ((LOG_RETENTION + 24) % 300) as u32);
    }

    #[test]
    fn test_logs_synthesized_when_empty() {
        // ---
        let mut store = create_test_store();
        let id = store.locations()[0].id.clone();
        let mut rng = ChaCha8Rng::seed_from_u64(5);

        let first = store.logs_for(&id, &mut rng);
        assert_eq!(first.len(), HISTORY_HOURS as usize + 1);

        // Second read returns the stored history rather than a new one.
        let second = store.logs_for(&id, &mut rng);
        assert_eq!(first, second);

        assert!(store.logs_for("loc-missing", &mut rng).is_empty());
    }

    #[test]
    fn test_delete_leaves_logs_orphaned() {
        // ---
        let mut store = create_test_store();
        let id = store.locations()[0].id.clone();
        store.update_count(&id, 10);

        assert!(store.delete_location(&id));
        assert!(store.get(&id).is_none());
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_filter_by_city_and_search() {
        // ---
        let store = create_test_store();

        let mumbai = store.get_filtered(&LocationFilter {
            city: Some("Mumbai".to_string()),
            search: None,
        });
        let names: Vec<_> = mumbai.iter().map(|l| l.name.as_str()).collect();
        assert_eq!(names, ["Phoenix Palladium", "Inorbit Mall"]);

        let search = store.get_filtered(&LocationFilter {
            city: None,
            search: Some("CLINIC".to_string()),
        });
        assert_eq!(search.len(), 1);
        assert_eq!(search[0].city, "Pune");

        // Category matches too.
        let by_category = store.get_filtered(&LocationFilter {
            city: Some("Mumbai".to_string()),
            search: Some("mall".to_string()),
        });
        assert_eq!(by_category.len(), 2);

        let none = store.get_filtered(&LocationFilter {
            city: Some("mumbai".to_string()),
            search: None,
        });
        assert!(none.is_empty());
    }

    #[test]
    fn test_filter_round_trip_preserves_order() {
        // ---
        let store = create_test_store();
        let original = store.snapshot();

        let filtered = store.get_filtered(&LocationFilter {
            city: Some("Pune".to_string()),
            search: None,
        });
        assert_eq!(filtered.len(), 1);

        let cleared = store.get_filtered(&LocationFilter::default());
        assert_eq!(cleared, original);

        let empty_search = store.get_filtered(&LocationFilter {
            city: None,
            search: Some(String::new()),
        });
        assert_eq!(empty_search, original);
    }

    #[test]
    fn test_search_text_is_not_trimmed() {
        // ---
        let store = create_test_store();

        let padded = store.get_filtered(&LocationFilter {
            city: None,
            search: Some("  mall ".to_string()),
        });
        assert!(padded.is_empty());

        let inner_space = store.get_filtered(&LocationFilter {
            city: None,
            search: Some("inorbit mall".to_string()),
        });
        assert_eq!(inner_space.len(), 1);
    }

    #[test]
    fn test_simulate_tick_stays_in_bounds() {
        // ---
        let mut store = create_test_store();
        store.add_location(create_test_location("Empty Hall", "Delhi", 0, 40));
        store.add_location(create_test_location("Full Hall", "Delhi", 40, 40));
        store.add_location(create_test_location("Closed Kiosk", "Delhi", 0, 0));
        let mut rng = ChaCha8Rng::seed_from_u64(42);

        for _ in 0..500 {
            store.simulate_tick(&mut rng);
            for loc in store.locations() {
                assert!(loc.current_count <= loc.capacity, "{} escaped", loc.name);
            }
        }
    }

    #[test]
    fn test_simulate_tick_step_is_bounded() {
        // ---
        let mut store = LocationStore::default();
        let loc = store.add_location(create_test_location("Mid", "Delhi", 500, 1000));
        let mut rng = ChaCha8Rng::seed_from_u64(9);

        for _ in 0..200 {
            let before = i64::from(store.get(&loc.id).unwrap().current_count);
            store.simulate_tick(&mut rng);
            let after = i64::from(store.get(&loc.id).unwrap().current_count);
            assert!((after - before).abs() <= 50, "step {before} -> {after}");
        }
    }

    #[test]
    fn test_subscribers_notified_synchronously() {
        // ---
        let mut store = create_test_store();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let sub = store.subscribe(move |event| sink.lock().unwrap().push(event.clone()));

        let id = store.locations()[0].id.clone();
        store.update_count(&id, 5);
        store.simulate_tick(&mut ChaCha8Rng::seed_from_u64(0));
        store.delete_location(&id);

        assert_eq!(
            *seen.lock().unwrap(),
            vec![
                StoreEvent::Updated(id.clone()),
                StoreEvent::Ticked,
                StoreEvent::Deleted(id.clone()),
            ]
        );

        assert!(store.unsubscribe(sub));
        assert!(!store.unsubscribe(sub));
        store.simulate_tick(&mut ChaCha8Rng::seed_from_u64(0));
        assert_eq!(seen.lock().unwrap().len(), 3);
    }

    #[test]
    fn test_noop_does_not_notify() {
        // ---
        let mut store = create_test_store();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        store.subscribe(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        store.update_count("loc-missing", 1);
        store.delete_location("loc-missing");
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_feed_events_last_write_wins() {
        // ---
        let mut store = create_test_store();
        let mut incoming = store.locations()[0].clone();
        incoming.current_count = 3500; // over capacity; feeds are not clamped
        incoming.name = "Phoenix Palladium (feed)".to_string();

        store.apply_feed_event(FeedEvent::Upsert(incoming.clone()));
        assert_eq!(store.len(), 3);
        assert_eq!(store.get(&incoming.id), Some(&incoming));

        let mut fresh = incoming.clone();
        fresh.id = "loc-feed-1".to_string();
        store.apply_feed_event(FeedEvent::Upsert(fresh));
        assert_eq!(store.len(), 4);
        assert_eq!(store.locations()[3].id, "loc-feed-1");

        store.apply_feed_event(FeedEvent::Delete("loc-feed-1".to_string()));
        assert_eq!(store.len(), 3);
    }

    #[test]
    fn test_every_count_change_is_logged() {
        // ---
        let mut store = create_test_store();
        let id = store.locations()[1].id.clone();
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let counts = |store: &mut LocationStore, rng: &mut ChaCha8Rng| {
            store
                .logs_for(&id, rng)
                .iter()
                .map(|l| l.count)
                .collect::<Vec<_>>()
        };

        store.update_count(&id, 20);

        let mut incoming = store.get(&id).unwrap().clone();
        incoming.current_count = 77;
        store.apply_feed_event(FeedEvent::Upsert(incoming));
        assert_eq!(counts(&mut store, &mut rng), [20, 77]);

        let patch = LocationPatch {
            current_count: Some(55),
            ..LocationPatch::default()
        };
        store.update_location(&id, patch);
        assert_eq!(counts(&mut store, &mut rng), [20, 77, 55]);
        assert_eq!(store.latest_log(&id).map(|l| l.count), Some(55));

        // Edits that leave the count alone add nothing.
        let rename = LocationPatch {
            name: Some("Ruby Hall".to_string()),
            ..LocationPatch::default()
        };
        store.update_location(&id, rename);
        let unchanged = store.get(&id).unwrap().clone();
        store.apply_feed_event(FeedEvent::Upsert(unchanged));
        assert_eq!(counts(&mut store, &mut rng), [20, 77, 55]);
    }

    #[test]
    fn test_feed_error_flag() {
        // ---
        let mut store = create_test_store();
        let before = store.snapshot();

        store.set_feed_error("connection refused");
        assert_eq!(store.feed_error(), Some("connection refused"));
        assert_eq!(store.snapshot(), before);

        store.clear_feed_error();
        assert!(store.feed_error().is_none());
    }

    #[test]
    fn test_cities_sorted_unique() {
        // ---
        let store = create_test_store();
        assert_eq!(store.cities(), ["Mumbai", "Pune"]);
    }
}
