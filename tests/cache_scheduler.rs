mod support;

use std::{
    collections::HashMap,
    fmt,
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use refcache::{
    cache::{
        CacheConfig, CacheDefinition, CacheError, CacheInitializer, CacheRefreshScheduler,
        CacheRegistry, EntityCache,
    },
    domain::entities::CountryRecord,
    infra::memory::{MemoryDataSource, MemoryUnitOfWork},
};
use tokio::time::{Instant, sleep};
use tokio_util::sync::CancellationToken;
use tracing::{
    Event, Level, Subscriber,
    field::{Field, Visit},
};
use tracing_subscriber::layer::{Context, Layer, SubscriberExt};

use support::{Fixture, country, fixture, seeded_source};

fn config(countries_secs: u64, currencies_secs: u64) -> CacheConfig {
    let mut config = CacheConfig::default();
    config
        .refresh_periods
        .insert("countries".to_string(), Duration::from_secs(countries_secs));
    config
        .refresh_periods
        .insert("currencies".to_string(), Duration::from_secs(currencies_secs));
    config
}

async fn started(config: &CacheConfig) -> Fixture {
    let fx = fixture(seeded_source(), config);
    CacheInitializer::new(fx.source.clone(), fx.registry.clone())
        .run()
        .await
        .expect("startup succeeds");
    fx
}

fn scheduler(fx: &Fixture, threshold: u32) -> CacheRefreshScheduler<MemoryDataSource> {
    CacheRefreshScheduler::new(fx.source.clone(), fx.registry.clone(), threshold)
}

#[tokio::test(start_paused = true)]
async fn first_refresh_waits_one_full_period() {
    let fx = started(&config(10, 25)).await;
    let handle = scheduler(&fx, 3).spawn(CancellationToken::new());

    sleep(Duration::from_secs(9)).await;
    assert_eq!(fx.caches.countries.status().generation, 1);
    assert_eq!(fx.caches.currencies.status().generation, 1);

    sleep(Duration::from_secs(2)).await;
    assert_eq!(fx.caches.countries.status().generation, 2);
    assert_eq!(fx.caches.currencies.status().generation, 1);

    handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn each_cache_refreshes_on_its_own_period() {
    let fx = started(&config(10, 25)).await;
    let handle = scheduler(&fx, 3).spawn(CancellationToken::new());

    sleep(Duration::from_secs(55)).await;
    let stats = handle.shutdown().await;

    assert_eq!(fx.caches.countries.status().generation, 1 + 5);
    assert_eq!(fx.caches.currencies.status().generation, 1 + 2);
    assert_eq!(
        stats.iter().map(|(name, s)| (*name, s.refreshes)).collect::<Vec<_>>(),
        vec![("countries", 5), ("currencies", 2)]
    );
}

#[tokio::test(start_paused = true)]
async fn refreshed_data_becomes_visible() {
    let fx = started(&config(10, 600)).await;
    let handle = scheduler(&fx, 3).spawn(CancellationToken::new());

    fx.source.insert_rows(vec![country("NO", "Norway")]);
    assert!(fx.caches.countries.get("NO").unwrap().is_none());

    sleep(Duration::from_secs(11)).await;
    assert!(fx.caches.countries.get("NO").unwrap().is_some());
    assert!(fx.caches.countries.get("FR").unwrap().is_none());

    handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn cancellation_stops_loops_promptly() {
    let fx = started(&config(3600, 3600)).await;
    let shutdown = CancellationToken::new();
    let handle = scheduler(&fx, 3).spawn(shutdown.clone());

    sleep(Duration::from_secs(5)).await;
    let cancelled_at = Instant::now();
    shutdown.cancel();
    let stats = handle.join().await;

    assert!(cancelled_at.elapsed() < Duration::from_secs(1));
    assert_eq!(stats.len(), 2);
    assert!(stats.iter().all(|(_, s)| s.refreshes == 0 && s.failures == 0));
}

#[tokio::test(start_paused = true)]
async fn cancellation_interrupts_an_in_flight_refresh() {
    let fx = started(&config(10, 3600)).await;
    fx.source.set_latency(Some(Duration::from_secs(30)));
    let handle = scheduler(&fx, 3).spawn(CancellationToken::new());

    sleep(Duration::from_secs(15)).await;
    let cancelled_at = Instant::now();
    let stats = handle.shutdown().await;

    assert!(cancelled_at.elapsed() < Duration::from_secs(1));
    assert_eq!(fx.caches.countries.status().generation, 1);
    assert!(stats.iter().all(|(_, s)| s.refreshes == 0));
    assert_eq!(fx.source.sessions_open(), 0);
}

#[tokio::test(start_paused = true)]
async fn loop_survives_failed_refreshes() {
    let fx = started(&config(10, 3600)).await;
    fx.source.fail_queries("countries", 3);
    fx.source.insert_rows(vec![country("SE", "Sweden")]);
    let handle = scheduler(&fx, 2).spawn(CancellationToken::new());

    sleep(Duration::from_secs(35)).await;
    assert_eq!(fx.caches.countries.status().generation, 1);
    assert!(fx.caches.countries.get("FR").unwrap().is_some());

    sleep(Duration::from_secs(10)).await;
    assert_eq!(fx.caches.countries.status().generation, 2);
    assert!(fx.caches.countries.get("SE").unwrap().is_some());

    let stats = handle.shutdown().await;
    let (_, countries) = stats
        .iter()
        .find(|(name, _)| *name == "countries")
        .expect("countries loop");
    assert_eq!(countries.failures, 3);
    assert_eq!(countries.refreshes, 1);
}

#[tokio::test(start_paused = true)]
async fn loop_survives_an_unavailable_source() {
    let fx = started(&config(10, 3600)).await;
    fx.source.set_unavailable(true);
    let handle = scheduler(&fx, 3).spawn(CancellationToken::new());

    sleep(Duration::from_secs(25)).await;
    fx.source.set_unavailable(false);
    sleep(Duration::from_secs(10)).await;

    let stats = handle.shutdown().await;
    let (_, countries) = stats
        .iter()
        .find(|(name, _)| *name == "countries")
        .expect("countries loop");
    assert_eq!(countries.failures, 2);
    assert_eq!(countries.refreshes, 1);
}

/// Records level and message of every event emitted by the refresh loop.
#[derive(Clone, Default)]
struct SchedulerEvents(Arc<Mutex<Vec<(Level, String)>>>);

impl SchedulerEvents {
    fn escalation_sequence(&self) -> Vec<(Level, String)> {
        self.0
            .lock()
            .unwrap()
            .iter()
            .filter(|(level, message)| {
                *level != Level::INFO || message == "cache refresh recovered"
            })
            .cloned()
            .collect()
    }
}

impl<S: Subscriber> Layer<S> for SchedulerEvents {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        if event.metadata().module_path() != Some("refcache::cache::scheduler") {
            return;
        }
        let mut message = MessageField::default();
        event.record(&mut message);
        self.0
            .lock()
            .unwrap()
            .push((*event.metadata().level(), message.0));
    }
}

#[derive(Default)]
struct MessageField(String);

impl Visit for MessageField {
    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.0 = format!("{value:?}");
        }
    }
}

#[tokio::test(start_paused = true)]
async fn repeated_failures_escalate_and_success_resets_the_count() {
    let events = SchedulerEvents::default();
    let subscriber = tracing_subscriber::registry().with(events.clone());
    let _guard = tracing::subscriber::set_default(subscriber);

    let fx = started(&config(10, 3600)).await;
    fx.source.fail_queries("countries", 3);
    let handle = scheduler(&fx, 2).spawn(CancellationToken::new());

    // Failures at 10s, 20s and 30s, recovery at 40s.
    sleep(Duration::from_secs(45)).await;
    fx.source.fail_queries("countries", 1);
    // One more failure at 50s starts counting from zero again.
    sleep(Duration::from_secs(10)).await;
    handle.shutdown().await;

    let failed = "cache refresh failed; serving previous snapshot".to_string();
    let escalated = "cache refresh keeps failing; serving stale snapshot".to_string();
    assert_eq!(
        events.escalation_sequence(),
        vec![
            (Level::WARN, failed.clone()),
            (Level::ERROR, escalated.clone()),
            (Level::ERROR, escalated),
            (Level::INFO, "cache refresh recovered".to_string()),
            (Level::WARN, failed),
        ]
    );
}

struct PanicsOnSecondBuild {
    builds: AtomicUsize,
}

impl CacheDefinition for PanicsOnSecondBuild {
    type Row = CountryRecord;
    type Key = String;
    type Value = CountryRecord;

    const NAME: &'static str = "fragile_countries";
    const ENTITY: &'static str = "Country";

    fn build(
        &self,
        rows: Vec<CountryRecord>,
    ) -> Result<HashMap<String, CountryRecord>, CacheError> {
        if self.builds.fetch_add(1, Ordering::SeqCst) == 1 {
            panic!("malformed reference row");
        }
        Ok(rows.into_iter().map(|row| (row.code.clone(), row)).collect())
    }
}

#[tokio::test(start_paused = true)]
async fn a_panicking_refresh_counts_as_a_failure() {
    let source = Arc::new(seeded_source());
    let cache = Arc::new(EntityCache::new(
        PanicsOnSecondBuild {
            builds: AtomicUsize::new(0),
        },
        Duration::from_secs(10),
    ));
    let mut registry: CacheRegistry<MemoryUnitOfWork> = CacheRegistry::new();
    registry.register(cache.clone()).expect("register");
    let registry = Arc::new(registry);
    CacheInitializer::new(source.clone(), registry.clone())
        .run()
        .await
        .expect("startup succeeds");

    let handle = CacheRefreshScheduler::new(source.clone(), registry, 3)
        .spawn(CancellationToken::new());

    // Panic at 10s, successful refreshes at 20s through 60s.
    sleep(Duration::from_secs(65)).await;
    let stats = handle.shutdown().await;

    assert_eq!(cache.status().generation, 1 + 5);
    assert_eq!(stats.len(), 1);
    assert_eq!(stats[0].0, "fragile_countries");
    assert_eq!(stats[0].1.failures, 1);
    assert_eq!(stats[0].1.refreshes, 5);
    assert_eq!(source.sessions_open(), 0);
}
