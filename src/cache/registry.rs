//! Ordered registry of the process's singleton caches.
//!
//! Populated once by application wiring, then shared read-only by the
//! initializer, the refresh scheduler and the bulk refresher.

use std::sync::Arc;

use super::contract::{CacheStatus, SingletonCache};
use super::error::CacheError;

pub struct CacheRegistry<U: Send + 'static> {
    caches: Vec<Arc<dyn SingletonCache<U>>>,
}

impl<U: Send + 'static> CacheRegistry<U> {
    pub fn new() -> Self {
        Self { caches: Vec::new() }
    }

    /// Add a cache. Names must be unique; they key configuration and metrics.
    pub fn register(&mut self, cache: Arc<dyn SingletonCache<U>>) -> Result<(), CacheError> {
        let name = cache.name();
        if self.get(name).is_some() {
            return Err(CacheError::DuplicateRegistration { cache: name });
        }
        self.caches.push(cache);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn SingletonCache<U>>> {
        self.caches.iter().find(|cache| cache.name() == name)
    }

    /// Caches in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn SingletonCache<U>>> {
        self.caches.iter()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.caches.iter().map(|cache| cache.name()).collect()
    }

    pub fn statuses(&self) -> Vec<CacheStatus> {
        self.caches.iter().map(|cache| cache.status()).collect()
    }

    pub fn len(&self) -> usize {
        self.caches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.caches.is_empty()
    }
}

impl<U: Send + 'static> Default for CacheRegistry<U> {
    fn default() -> Self {
        Self::new()
    }
}
