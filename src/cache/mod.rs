//! Reference-data cache engine.
//!
//! Each [`EntityCache`] holds an immutable [`Snapshot`] of one lookup table.
//! Orchestration only sees caches through the [`SingletonCache`] contract:
//!
//! - [`CacheInitializer`] loads every registered cache once at startup;
//! - [`CacheRefreshScheduler`] reloads each cache on its refresh period until shutdown;
//! - [`BulkRefresher`] reloads caches on demand.
//!
//! ## Configuration
//!
//! ```toml
//! [cache]
//! default_refresh_seconds = 300
//! failure_escalation_threshold = 3
//!
//! [cache.refresh_seconds]
//! countries = 3600
//! ```

mod config;
mod contract;
mod entity;
mod error;
mod initializer;
pub(crate) mod lock;
mod refresher;
mod registry;
mod scheduler;
mod snapshot;

pub use config::CacheConfig;
pub use contract::{CacheStatus, SingletonCache};
pub use entity::{CacheDefinition, EntityCache, LookupMode};
pub use error::CacheError;
pub use initializer::CacheInitializer;
pub use refresher::BulkRefresher;
pub use registry::CacheRegistry;
pub use scheduler::{CacheRefreshScheduler, RefreshLoopStats, SchedulerHandle, run_refresh_loop};
pub use snapshot::{DuplicateKeys, Snapshot, index_by};
