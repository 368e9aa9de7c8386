//! On-demand refresh of every registered cache.

use std::{sync::Arc, time::Instant};

use tracing::{error, info};

use crate::application::repos::UnitOfWorkFactory;

use super::contract::CacheStatus;
use super::error::CacheError;
use super::registry::CacheRegistry;

/// Forces caches to reload now, for operational tooling.
///
/// Caches are refreshed one after another through a single unit of work and
/// the first failure stops the pass. Caches refreshed before the failure keep
/// their new snapshots; caches after it are not touched.
pub struct BulkRefresher<F: UnitOfWorkFactory> {
    factory: Arc<F>,
    registry: Arc<CacheRegistry<F::UnitOfWork>>,
}

impl<F: UnitOfWorkFactory> Clone for BulkRefresher<F> {
    fn clone(&self) -> Self {
        Self {
            factory: self.factory.clone(),
            registry: self.registry.clone(),
        }
    }
}

impl<F: UnitOfWorkFactory> BulkRefresher<F> {
    pub fn new(factory: Arc<F>, registry: Arc<CacheRegistry<F::UnitOfWork>>) -> Self {
        Self { factory, registry }
    }

    /// Refresh every cache in registration order and return their statuses.
    pub async fn refresh_all(&self) -> Result<Vec<CacheStatus>, CacheError> {
        let started_at = Instant::now();
        info!(
            target = "refcache::refresher",
            caches = self.registry.len(),
            "refreshing all caches"
        );

        let mut uow = self.begin().await?;
        let mut statuses = Vec::with_capacity(self.registry.len());
        for cache in self.registry.iter() {
            if let Err(err) = cache.refresh(&mut uow).await {
                error!(
                    target = "refcache::refresher",
                    cache = cache.name(),
                    refreshed = statuses.len(),
                    error = %err,
                    "bulk refresh aborted"
                );
                return Err(err);
            }
            statuses.push(cache.status());
        }

        info!(
            target = "refcache::refresher",
            caches = statuses.len(),
            elapsed_ms = started_at.elapsed().as_secs_f64() * 1000.0,
            "all caches refreshed"
        );
        Ok(statuses)
    }

    /// Refresh a single cache by name.
    pub async fn refresh_one(&self, name: &str) -> Result<CacheStatus, CacheError> {
        let cache = self
            .registry
            .get(name)
            .ok_or_else(|| CacheError::UnknownCache {
                name: name.to_string(),
            })?;

        let mut uow = self.begin().await?;
        cache.refresh(&mut uow).await?;
        let status = cache.status();
        info!(
            target = "refcache::refresher",
            cache = status.name,
            entries = status.entries,
            generation = status.generation,
            "cache refreshed on demand"
        );
        Ok(status)
    }

    pub fn statuses(&self) -> Vec<CacheStatus> {
        self.registry.statuses()
    }

    async fn begin(&self) -> Result<F::UnitOfWork, CacheError> {
        self.factory
            .begin()
            .await
            .map_err(|source| CacheError::Session { source })
    }
}
