//! Startup pass that populates every registered cache.

use std::{sync::Arc, time::Instant};

use metrics::histogram;
use tracing::{error, info};

use crate::application::repos::UnitOfWorkFactory;

use super::error::CacheError;
use super::registry::CacheRegistry;

pub(crate) const METRIC_INITIALIZE_MS: &str = "refcache_initialize_ms";

/// Initializes all registered caches before the application reports ready.
///
/// Every cache loads through one shared unit of work. The first failure aborts
/// the pass; callers must treat that as a failed startup.
pub struct CacheInitializer<F: UnitOfWorkFactory> {
    factory: Arc<F>,
    registry: Arc<CacheRegistry<F::UnitOfWork>>,
}

impl<F: UnitOfWorkFactory> CacheInitializer<F> {
    pub fn new(factory: Arc<F>, registry: Arc<CacheRegistry<F::UnitOfWork>>) -> Self {
        Self { factory, registry }
    }

    /// Run the pass. Consumes the initializer so it cannot run twice.
    pub async fn run(self) -> Result<(), CacheError> {
        let started_at = Instant::now();
        info!(
            target = "refcache::initializer",
            caches = self.registry.len(),
            "initializing caches"
        );

        let mut uow = self
            .factory
            .begin()
            .await
            .map_err(|source| CacheError::Session { source })?;

        for cache in self.registry.iter() {
            if let Err(err) = cache.initialize(&mut uow).await {
                error!(
                    target = "refcache::initializer",
                    cache = cache.name(),
                    error = %err,
                    "cache initialization failed"
                );
                return Err(err);
            }
        }
        drop(uow);

        let elapsed_ms = started_at.elapsed().as_secs_f64() * 1000.0;
        histogram!(METRIC_INITIALIZE_MS).record(elapsed_ms);
        info!(
            target = "refcache::initializer",
            caches = self.registry.len(),
            elapsed_ms,
            "caches ready"
        );
        Ok(())
    }
}
