//! Background refresh loops, one task per registered cache.

use std::{any::Any, panic::AssertUnwindSafe, sync::Arc};

use futures::{FutureExt, future::join_all};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::application::repos::UnitOfWorkFactory;

use super::contract::SingletonCache;
use super::error::CacheError;
use super::registry::CacheRegistry;

/// Outcome counters of one cache's refresh loop, reported when it stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RefreshLoopStats {
    pub refreshes: u64,
    pub failures: u64,
}

pub struct CacheRefreshScheduler<F: UnitOfWorkFactory> {
    factory: Arc<F>,
    registry: Arc<CacheRegistry<F::UnitOfWork>>,
    escalation_threshold: u32,
}

impl<F: UnitOfWorkFactory> CacheRefreshScheduler<F> {
    pub fn new(
        factory: Arc<F>,
        registry: Arc<CacheRegistry<F::UnitOfWork>>,
        escalation_threshold: u32,
    ) -> Self {
        Self {
            factory,
            registry,
            escalation_threshold,
        }
    }

    /// Start one refresh loop per registered cache. The loops run until
    /// `shutdown` is cancelled.
    pub fn spawn(&self, shutdown: CancellationToken) -> SchedulerHandle {
        let tasks: Vec<_> = self
            .registry
            .iter()
            .map(|cache| {
                let name = cache.name();
                let task = tokio::spawn(run_refresh_loop(
                    cache.clone(),
                    self.factory.clone(),
                    shutdown.clone(),
                    self.escalation_threshold,
                ));
                (name, task)
            })
            .collect();

        SchedulerHandle { shutdown, tasks }
    }
}

pub struct SchedulerHandle {
    shutdown: CancellationToken,
    tasks: Vec<(&'static str, JoinHandle<RefreshLoopStats>)>,
}

impl SchedulerHandle {
    /// Cancel every loop and wait for them to stop.
    pub async fn shutdown(self) -> Vec<(&'static str, RefreshLoopStats)> {
        self.shutdown.cancel();
        self.join().await
    }

    /// Wait for every loop to stop without cancelling them.
    pub async fn join(self) -> Vec<(&'static str, RefreshLoopStats)> {
        let (names, tasks): (Vec<_>, Vec<_>) = self.tasks.into_iter().unzip();
        names
            .into_iter()
            .zip(join_all(tasks).await)
            .filter_map(|(name, joined)| match joined {
                Ok(stats) => Some((name, stats)),
                Err(err) => {
                    error!(
                        target = "refcache::scheduler",
                        cache = name,
                        error = %err,
                        "refresh loop terminated abnormally"
                    );
                    None
                }
            })
            .collect()
    }
}

/// Refresh `cache` every `refresh_period()` until `shutdown` is cancelled.
///
/// The first refresh happens one full period after start. A failed refresh
/// is logged and the loop carries on with the previous snapshot; failures
/// log at error level once `escalation_threshold` of them happen in a row.
/// A refresh that panics counts as a failed one.
pub async fn run_refresh_loop<F: UnitOfWorkFactory>(
    cache: Arc<dyn SingletonCache<F::UnitOfWork>>,
    factory: Arc<F>,
    shutdown: CancellationToken,
    escalation_threshold: u32,
) -> RefreshLoopStats {
    let name = cache.name();
    let period = cache.refresh_period();
    let mut stats = RefreshLoopStats::default();
    let mut consecutive_failures: u32 = 0;

    info!(
        target = "refcache::scheduler",
        cache = name,
        period_secs = period.as_secs_f64(),
        "refresh loop started"
    );

    loop {
        tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            _ = tokio::time::sleep(period) => {}
        }

        let refresh =
            AssertUnwindSafe(refresh_once(factory.as_ref(), cache.as_ref())).catch_unwind();
        let outcome = tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            outcome = refresh => outcome.unwrap_or_else(|payload| {
                Err(CacheError::RefreshPanicked {
                    cache: name,
                    message: panic_message(payload.as_ref()),
                })
            }),
        };

        match outcome {
            Ok(()) => {
                stats.refreshes += 1;
                if consecutive_failures > 0 {
                    info!(
                        target = "refcache::scheduler",
                        cache = name,
                        after_failures = consecutive_failures,
                        "cache refresh recovered"
                    );
                }
                consecutive_failures = 0;
            }
            Err(err) => {
                stats.failures += 1;
                consecutive_failures = consecutive_failures.saturating_add(1);
                if consecutive_failures >= escalation_threshold {
                    error!(
                        target = "refcache::scheduler",
                        cache = name,
                        consecutive_failures,
                        error = %err,
                        "cache refresh keeps failing; serving stale snapshot"
                    );
                } else {
                    warn!(
                        target = "refcache::scheduler",
                        cache = name,
                        consecutive_failures,
                        error = %err,
                        "cache refresh failed; serving previous snapshot"
                    );
                }
            }
        }
    }

    info!(
        target = "refcache::scheduler",
        cache = name,
        refreshes = stats.refreshes,
        failures = stats.failures,
        "refresh loop stopped"
    );
    stats
}

async fn refresh_once<F: UnitOfWorkFactory>(
    factory: &F,
    cache: &dyn SingletonCache<F::UnitOfWork>,
) -> Result<(), CacheError> {
    let mut uow = factory
        .begin()
        .await
        .map_err(|source| CacheError::Session { source })?;
    cache.refresh(&mut uow).await
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
