//! Uniform contract the orchestration layer drives every cache through.

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use time::OffsetDateTime;

use super::error::CacheError;

/// A process-wide cache that can be initialized and refreshed from a unit of
/// work of type `U`, independent of its key and value types.
#[async_trait]
pub trait SingletonCache<U: Send + 'static>: Send + Sync {
    /// Stable name, used for configuration lookups, logs and metrics.
    fn name(&self) -> &'static str;

    fn refresh_period(&self) -> Duration;

    /// Build and publish the first snapshot. Fails if one is already published.
    async fn initialize(&self, uow: &mut U) -> Result<(), CacheError>;

    /// Build and publish a replacement snapshot, initialized or not.
    async fn refresh(&self, uow: &mut U) -> Result<(), CacheError>;

    fn status(&self) -> CacheStatus;
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheStatus {
    pub name: &'static str,
    pub entity: &'static str,
    pub initialized: bool,
    pub entries: usize,
    pub generation: u64,
    pub refreshed_at: Option<OffsetDateTime>,
    pub refresh_period: Duration,
}
