//! Shared application context: store, insight board, trail phase and the
//! background timers that drive them.
//!
//! One `AppContext` is built at startup and handed to the router as state.
//! Cloning is cheap; every clone shares the same state. Timers run from
//! [`AppContext::start`] until [`AppContext::shutdown`].

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use anyhow::Result;
use chrono::{Local, Timelike, Utc};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use sqlx::PgPool;
use tokio::sync::{mpsc, Notify};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use crate::config::Config;
use crate::db::{self, DbWrite};
use crate::feed;
use crate::insights::{Insight, InsightBoard};
use crate::models::{CrowdLog, Location, LocationPatch, NewLocation};
use crate::projection::TRAIL_PHASES;
use crate::store::{FeedEvent, LocationStore, SubscriptionId};

// ---

/// Independent random streams drawn from one seed.
const STREAM_SIMULATION: u64 = 1;
const STREAM_INSIGHTS: u64 = 2;

/// Lock a mutex, recovering the data if a previous holder panicked.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner)
}

fn make_rng(seed: Option<u64>, stream: u64) -> ChaCha8Rng {
    // ---
    match seed {
        Some(seed) => {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            rng.set_stream(stream);
            rng
        }
        None => ChaCha8Rng::from_entropy(),
    }
}

/// Snapshot of the insight board served to clients.
#[derive(Debug, Clone, serde::Serialize)]
pub struct InsightSnapshot {
    pub version: u64,
    pub generated_at: chrono::DateTime<Utc>,
    pub insights: Vec<Insight>,
}

#[derive(Clone)]
pub struct AppContext {
    // ---
    config: Arc<Config>,
    store: Arc<Mutex<LocationStore>>,
    board: Arc<Mutex<InsightBoard>>,
    rng: Arc<Mutex<ChaCha8Rng>>,
    trail_phase: Arc<AtomicUsize>,
    changed: Arc<Notify>,
    subscription: SubscriptionId,
    pool: Option<PgPool>,
    writes: Option<mpsc::UnboundedSender<DbWrite>>,
    writer: Arc<Mutex<Option<JoinHandle<()>>>>,
    http: reqwest::Client,
    tasks: Arc<Mutex<Vec<JoinHandle<()>>>>,
}

impl AppContext {
    /// Build the context around `locations` and run a first insight pass.
    ///
    /// With a pool this spawns the database writer, so it must be called
    /// from within a Tokio runtime.
    pub fn new(config: Config, locations: Vec<Location>, pool: Option<PgPool>) -> Self {
        // ---
        let (writes, writer) = match pool.clone() {
            Some(pool) => {
                let (tx, handle) = db::spawn_writer(pool);
                (Some(tx), Some(handle))
            }
            None => (None, None),
        };
        let changed = Arc::new(Notify::new());
        let mut store = LocationStore::new(locations);

        let notify = Arc::clone(&changed);
        let subscription = store.subscribe(move |_event| notify.notify_one());

        let ctx = Self {
            store: Arc::new(Mutex::new(store)),
            board: Arc::new(Mutex::new(InsightBoard::new(make_rng(
                config.rng_seed,
                STREAM_INSIGHTS,
            )))),
            rng: Arc::new(Mutex::new(make_rng(config.rng_seed, STREAM_SIMULATION))),
            trail_phase: Arc::new(AtomicUsize::new(0)),
            changed,
            subscription,
            pool,
            writes,
            writer: Arc::new(Mutex::new(writer)),
            http: reqwest::Client::new(),
            tasks: Arc::new(Mutex::new(Vec::new())),
            config: Arc::new(config),
        };
        ctx.refresh_insights();
        ctx
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Run `f` with exclusive access to the store.
    pub fn with_store<R>(&self, f: impl FnOnce(&mut LocationStore) -> R) -> R {
        f(&mut lock(&self.store))
    }

    pub fn snapshot(&self) -> Vec<Location> {
        lock(&self.store).snapshot()
    }

    pub fn feed_error(&self) -> Option<String> {
        lock(&self.store).feed_error().map(String::from)
    }

    pub fn trail_phase(&self) -> usize {
        self.trail_phase.load(Ordering::Relaxed) % TRAIL_PHASES
    }

    pub fn advance_trail_phase(&self) -> usize {
        // ---
        let previous = self.trail_phase.fetch_add(1, Ordering::Relaxed);
        (previous + 1) % TRAIL_PHASES
    }

    // --- store mutations, mirrored to the database when one is configured

    pub fn add_location(&self, fields: NewLocation) -> Location {
        // ---
        let mut store = lock(&self.store);
        let location = store.add_location(fields);
        self.persist(DbWrite::Upsert(location.clone()));
        location
    }

    pub fn update_count(&self, id: &str, count: i64) -> Option<Location> {
        // ---
        let mut store = lock(&self.store);
        let location = store.update_count(id, count)?;
        if let Some(log) = store.latest_log(id) {
            self.persist(DbWrite::Count(log.clone()));
        }
        Some(location)
    }

    pub fn update_location(&self, id: &str, patch: LocationPatch) -> Option<Location> {
        // ---
        let mut store = lock(&self.store);
        let previous = store.get(id)?.current_count;
        let location = store.update_location(id, patch)?;
        self.persist(DbWrite::Upsert(location.clone()));
        if location.current_count != previous {
            if let Some(log) = store.latest_log(id) {
                self.persist(DbWrite::Log(log.clone()));
            }
        }
        Some(location)
    }

    pub fn delete_location(&self, id: &str) -> bool {
        // ---
        let mut store = lock(&self.store);
        let deleted = store.delete_location(id);
        if deleted {
            self.persist(DbWrite::Delete(id.to_string()));
        }
        deleted
    }

    /// Recorded logs for `id`, oldest first, limited to the last `hours`
    /// when given.
    ///
    /// Persisted logs are preferred when a database is configured and has
    /// any in the window; otherwise the in-memory ring (or a synthetic
    /// history) is used.
    pub async fn logs_within(&self, id: &str, hours: Option<u32>) -> Result<Vec<CrowdLog>> {
        // ---
        let since = hours.map(|h| Utc::now() - chrono::Duration::hours(i64::from(h)));

        if let Some(pool) = &self.pool {
            let stored = db::load_logs(pool, id, since).await?;
            if !stored.is_empty() {
                return Ok(stored);
            }
        }

        let mut logs = self.logs_for(id);
        if let Some(since) = since {
            logs.retain(|log| log.timestamp >= since);
        }
        Ok(logs)
    }

    pub fn logs_for(&self, id: &str) -> Vec<CrowdLog> {
        // ---
        let mut rng = lock(&self.rng);
        lock(&self.store).logs_for(id, &mut *rng)
    }

    pub fn simulate_tick(&self) {
        // ---
        let mut rng = lock(&self.rng);
        lock(&self.store).simulate_tick(&mut *rng);
    }

    /// Queue a write for the database writer; callers hold the store lock,
    /// so queue order matches the order changes were applied.
    fn persist(&self, write: DbWrite) {
        // ---
        let Some(writes) = &self.writes else {
            return;
        };
        if let Err(e) = writes.send(write) {
            tracing::error!("Database writer is gone, dropping {:?}", e.0);
        }
    }

    // --- insights

    /// Regenerate the board from the current snapshot at the local hour.
    pub fn refresh_insights(&self) -> InsightSnapshot {
        // ---
        let snapshot = self.snapshot();
        let hour = Local::now().hour();
        let mut board = lock(&self.board);
        board.regenerate(&snapshot, hour, Utc::now());
        snapshot_of(&board)
    }

    pub fn insights(&self) -> InsightSnapshot {
        snapshot_of(&lock(&self.board))
    }

    /// Refresh on request, after the configured artificial delay.
    pub async fn manual_refresh(&self) -> InsightSnapshot {
        // ---
        tokio::time::sleep(self.config.manual_refresh_delay).await;
        self.refresh_insights()
    }

    // --- feed

    /// Pull the external feed once and apply it; no-op without `FEED_URL`.
    ///
    /// On failure the error flag is set and the current snapshot is kept.
    pub async fn poll_feed(&self) {
        // ---
        let Some(url) = self.config.feed_url.as_deref() else {
            return;
        };

        match feed::fetch_feed(&self.http, url, self.config.feed_max_pages).await {
            Ok(events) => {
                let count = events.len();
                let mut store = lock(&self.store);
                for event in events {
                    self.apply_feed_event(&mut store, event);
                }
                store.clear_feed_error();
                tracing::debug!("Applied {} feed events", count);
            }
            Err(e) => {
                tracing::warn!("Feed poll failed, serving last snapshot: {}", e);
                lock(&self.store).set_feed_error(e.to_string());
            }
        }
    }

    fn apply_feed_event(&self, store: &mut LocationStore, event: FeedEvent) {
        // ---
        match event {
            FeedEvent::Upsert(location) => {
                let id = location.id.clone();
                let log_before = store.latest_log(&id).map(|log| log.id.clone());
                self.persist(DbWrite::Upsert(location.clone()));
                store.apply_feed_event(FeedEvent::Upsert(location));

                let appended = store
                    .latest_log(&id)
                    .filter(|log| Some(&log.id) != log_before.as_ref());
                if let Some(log) = appended {
                    self.persist(DbWrite::Log(log.clone()));
                }
            }
            FeedEvent::Delete(id) => {
                if store.get(&id).is_some() {
                    self.persist(DbWrite::Delete(id.clone()));
                }
                store.apply_feed_event(FeedEvent::Delete(id));
            }
        }
    }

    // --- timers

    /// Spawn the background timers. Calling it twice spawns them twice.
    pub fn start(&self) {
        // ---
        let mut tasks = lock(&self.tasks);

        if self.config.simulation_enabled {
            let ctx = self.clone();
            let period = self.config.simulation_tick;
            tasks.push(tokio::spawn(async move {
                let mut ticker = ticker(period);
                loop {
                    ticker.tick().await;
                    ctx.simulate_tick();
                }
            }));
        }

        let ctx = self.clone();
        let period = self.config.insight_refresh_interval;
        tasks.push(tokio::spawn(async move {
            let mut ticker = ticker(period);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {}
                    _ = ctx.changed.notified() => {}
                }
                ctx.refresh_insights();
            }
        }));

        let ctx = self.clone();
        let period = self.config.trail_phase_interval;
        tasks.push(tokio::spawn(async move {
            let mut ticker = ticker(period);
            loop {
                ticker.tick().await;
                ctx.advance_trail_phase();
            }
        }));

        if self.config.feed_url.is_some() {
            let ctx = self.clone();
            let period = self.config.feed_poll_interval;
            tasks.push(tokio::spawn(async move {
                // First poll right away, then on the interval.
                ctx.poll_feed().await;
                let mut ticker = ticker(period);
                loop {
                    ticker.tick().await;
                    ctx.poll_feed().await;
                }
            }));
        }

        tracing::info!("Started {} background timers", tasks.len());
    }

    /// Stop every timer, detach from the store and let the database
    /// writer drain what is already queued.
    pub async fn shutdown(&self) {
        // ---
        let tasks: Vec<JoinHandle<()>> = lock(&self.tasks).drain(..).collect();
        for task in tasks {
            task.abort();
            // Cancellation is the expected outcome here.
            let _ = task.await;
        }
        lock(&self.store).unsubscribe(self.subscription);
        tracing::info!("Background timers stopped");

        self.persist(DbWrite::Shutdown);
        let writer = lock(&self.writer).take();
        if let Some(writer) = writer {
            if let Err(e) = writer.await {
                tracing::error!("Database writer failed: {}", e);
            }
        }
    }
}

/// Interval whose first tick is one full period away.
fn ticker(period: Duration) -> tokio::time::Interval {
    // ---
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker
}

fn snapshot_of(board: &InsightBoard) -> InsightSnapshot {
    InsightSnapshot {
        version: board.version(),
        generated_at: board.generated_at(),
        insights: board.insights().to_vec(),
    }
}
