//! Generic snapshot container for one reference table.

use std::{
    borrow::Borrow,
    collections::HashMap,
    fmt::Display,
    hash::Hash,
    sync::{Arc, RwLock},
    time::{Duration, Instant},
};

use async_trait::async_trait;
use metrics::{counter, gauge, histogram};
use tracing::{debug, info, instrument};

use crate::application::repos::{Entity, EntityQuery, EntitySource};

use super::contract::{CacheStatus, SingletonCache};
use super::error::CacheError;
use super::lock::{rw_read, rw_write};
use super::snapshot::Snapshot;

pub(crate) const METRIC_REFRESH_TOTAL: &str = "refcache_refresh_total";
pub(crate) const METRIC_REFRESH_MS: &str = "refcache_refresh_ms";
pub(crate) const METRIC_ENTRIES: &str = "refcache_entries";
pub(crate) const METRIC_LOOKUP_MISS_TOTAL: &str = "refcache_lookup_miss_total";

/// Describes how one cache loads its rows and turns them into a snapshot.
pub trait CacheDefinition: Send + Sync + 'static {
    type Row: Entity;
    type Key: Eq + Hash + Clone + Display + Send + Sync + 'static;
    type Value: Clone + Send + Sync + 'static;

    /// Cache name, also the key under `cache.refresh_seconds` in configuration.
    const NAME: &'static str;
    /// Entity type name reported by strict lookups that miss.
    const ENTITY: &'static str;

    fn query(&self) -> EntityQuery<Self::Row> {
        EntityQuery::all()
    }

    /// Turn the fetched rows into the keyed contents of a snapshot.
    ///
    /// Must be deterministic and free of side effects.
    fn build(&self, rows: Vec<Self::Row>) -> Result<HashMap<Self::Key, Self::Value>, CacheError>;
}

/// What a lookup does when the key is not in the current snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupMode {
    /// Return `Ok(None)`.
    Lenient,
    /// Return `CacheError::EntityNotFound`.
    Strict,
}

/// Singleton cache over the rows described by `D`.
///
/// Readers clone the current `Arc<Snapshot>` under a read lock and work on it
/// lock-free. Loads run entirely outside the lock; only the reference
/// replacement takes the write lock.
pub struct EntityCache<D: CacheDefinition> {
    definition: D,
    refresh_period: Duration,
    current: RwLock<Option<Arc<Snapshot<D::Key, D::Value>>>>,
}

impl<D: CacheDefinition> EntityCache<D> {
    pub fn new(definition: D, refresh_period: Duration) -> Self {
        Self {
            definition,
            refresh_period,
            current: RwLock::new(None),
        }
    }

    pub fn is_initialized(&self) -> bool {
        rw_read(&self.current, D::NAME, "is_initialized").is_some()
    }

    /// The current snapshot, for callers that need to iterate keys.
    pub fn snapshot(&self) -> Result<Arc<Snapshot<D::Key, D::Value>>, CacheError> {
        rw_read(&self.current, D::NAME, "snapshot")
            .clone()
            .ok_or(CacheError::NotInitialized { cache: D::NAME })
    }

    pub fn lookup<Q>(&self, key: &Q, mode: LookupMode) -> Result<Option<D::Value>, CacheError>
    where
        D::Key: Borrow<Q>,
        Q: Hash + Eq + Display + ?Sized,
    {
        let snapshot = self.snapshot()?;
        match snapshot.get(key) {
            Some(value) => Ok(Some(value.clone())),
            None => {
                counter!(METRIC_LOOKUP_MISS_TOTAL, "cache" => D::NAME).increment(1);
                match mode {
                    LookupMode::Lenient => Ok(None),
                    LookupMode::Strict => Err(CacheError::entity_not_found(D::ENTITY, key)),
                }
            }
        }
    }

    /// Lenient lookup: a missing key is `Ok(None)`.
    pub fn get<Q>(&self, key: &Q) -> Result<Option<D::Value>, CacheError>
    where
        D::Key: Borrow<Q>,
        Q: Hash + Eq + Display + ?Sized,
    {
        self.lookup(key, LookupMode::Lenient)
    }

    /// Strict lookup: a missing key is `CacheError::EntityNotFound`.
    pub fn require<Q>(&self, key: &Q) -> Result<D::Value, CacheError>
    where
        D::Key: Borrow<Q>,
        Q: Hash + Eq + Display + ?Sized,
    {
        self.lookup(key, LookupMode::Strict)?
            .ok_or_else(|| CacheError::entity_not_found(D::ENTITY, key))
    }

    pub fn get_all(&self) -> Result<Vec<D::Value>, CacheError> {
        Ok(self.snapshot()?.values().cloned().collect())
    }

    #[instrument(skip_all, fields(cache = D::NAME))]
    pub async fn initialize<U>(&self, uow: &mut U) -> Result<(), CacheError>
    where
        U: EntitySource<D::Row>,
    {
        if self.is_initialized() {
            return Err(CacheError::AlreadyInitialized { cache: D::NAME });
        }

        let entries = self.load(uow).await?;
        let snapshot = {
            let mut current = rw_write(&self.current, D::NAME, "initialize");
            if current.is_some() {
                return Err(CacheError::AlreadyInitialized { cache: D::NAME });
            }
            let snapshot = Arc::new(Snapshot::new(entries, 1));
            *current = Some(snapshot.clone());
            snapshot
        };

        gauge!(METRIC_ENTRIES, "cache" => D::NAME).set(snapshot.len() as f64);
        info!(
            target = "refcache::cache",
            cache = D::NAME,
            entries = snapshot.len(),
            "cache initialized"
        );
        Ok(())
    }

    #[instrument(skip_all, fields(cache = D::NAME))]
    pub async fn refresh<U>(&self, uow: &mut U) -> Result<(), CacheError>
    where
        U: EntitySource<D::Row>,
    {
        let started_at = Instant::now();
        let result = self.load(uow).await.map(|entries| self.publish(entries));
        let elapsed_ms = started_at.elapsed().as_secs_f64() * 1000.0;

        histogram!(METRIC_REFRESH_MS, "cache" => D::NAME).record(elapsed_ms);
        match result {
            Ok(snapshot) => {
                counter!(METRIC_REFRESH_TOTAL, "cache" => D::NAME, "outcome" => "ok").increment(1);
                gauge!(METRIC_ENTRIES, "cache" => D::NAME).set(snapshot.len() as f64);
                debug!(
                    target = "refcache::cache",
                    cache = D::NAME,
                    entries = snapshot.len(),
                    generation = snapshot.generation(),
                    elapsed_ms,
                    "cache refreshed"
                );
                Ok(())
            }
            Err(err) => {
                counter!(METRIC_REFRESH_TOTAL, "cache" => D::NAME, "outcome" => "error")
                    .increment(1);
                Err(err)
            }
        }
    }

    pub fn status(&self) -> CacheStatus {
        let current = rw_read(&self.current, D::NAME, "status").clone();
        CacheStatus {
            name: D::NAME,
            entity: D::ENTITY,
            initialized: current.is_some(),
            entries: current.as_ref().map_or(0, |snapshot| snapshot.len()),
            generation: current.as_ref().map_or(0, |snapshot| snapshot.generation()),
            refreshed_at: current.as_ref().map(|snapshot| snapshot.refreshed_at()),
            refresh_period: self.refresh_period,
        }
    }

    async fn load<U>(&self, uow: &mut U) -> Result<HashMap<D::Key, D::Value>, CacheError>
    where
        U: EntitySource<D::Row>,
    {
        let query = self.definition.query();
        let rows = uow
            .query(&query)
            .await
            .map_err(|source| CacheError::Load {
                cache: D::NAME,
                source,
            })?;
        self.definition.build(rows)
    }

    fn publish(&self, entries: HashMap<D::Key, D::Value>) -> Arc<Snapshot<D::Key, D::Value>> {
        let mut current = rw_write(&self.current, D::NAME, "publish");
        let generation = current.as_ref().map_or(0, |snapshot| snapshot.generation()) + 1;
        let snapshot = Arc::new(Snapshot::new(entries, generation));
        *current = Some(snapshot.clone());
        snapshot
    }
}

#[async_trait]
impl<D, U> SingletonCache<U> for EntityCache<D>
where
    D: CacheDefinition,
    U: EntitySource<D::Row> + 'static,
{
    fn name(&self) -> &'static str {
        D::NAME
    }

    fn refresh_period(&self) -> Duration {
        self.refresh_period
    }

    async fn initialize(&self, uow: &mut U) -> Result<(), CacheError> {
        EntityCache::initialize(self, uow).await
    }

    async fn refresh(&self, uow: &mut U) -> Result<(), CacheError> {
        EntityCache::refresh(self, uow).await
    }

    fn status(&self) -> CacheStatus {
        EntityCache::status(self)
    }
}
