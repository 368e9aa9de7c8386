//! In-process data source backed by fixture rows.
//!
//! Mirrors the Postgres adapter's contract (one unit of work per pass,
//! released on drop) so that caches can be exercised without a database.

use std::{
    any::Any,
    collections::HashMap,
    sync::{
        Arc, RwLock,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;

use crate::application::repos::{Entity, EntityQuery, EntitySource, RepoError, UnitOfWorkFactory};
use crate::cache::lock::{rw_read, rw_write};

const SOURCE: &str = "infra::memory";

type Table = Arc<dyn Any + Send + Sync>;

#[derive(Default)]
struct MemoryState {
    tables: RwLock<HashMap<&'static str, Table>>,
    failures: RwLock<HashMap<&'static str, usize>>,
    latency: RwLock<Option<Duration>>,
    unavailable: AtomicBool,
    sessions_opened: AtomicUsize,
    sessions_open: AtomicUsize,
    queries: AtomicUsize,
}

#[derive(Clone, Default)]
pub struct MemoryDataSource {
    state: Arc<MemoryState>,
}

impl MemoryDataSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the contents of `R::TABLE`.
    pub fn insert_rows<R: Entity + Clone>(&self, rows: Vec<R>) {
        rw_write(&self.state.tables, SOURCE, "insert_rows").insert(R::TABLE, Arc::new(rows));
    }

    /// Make the next `times` queries against `table` fail.
    pub fn fail_queries(&self, table: &'static str, times: usize) {
        rw_write(&self.state.failures, SOURCE, "fail_queries").insert(table, times);
    }

    /// Delay every query by `latency` before rows are read.
    pub fn set_latency(&self, latency: Option<Duration>) {
        *rw_write(&self.state.latency, SOURCE, "set_latency") = latency;
    }

    /// Refuse to open new units of work.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.state.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn sessions_opened(&self) -> usize {
        self.state.sessions_opened.load(Ordering::SeqCst)
    }

    /// Units of work currently alive.
    pub fn sessions_open(&self) -> usize {
        self.state.sessions_open.load(Ordering::SeqCst)
    }

    pub fn queries_executed(&self) -> usize {
        self.state.queries.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl UnitOfWorkFactory for MemoryDataSource {
    type UnitOfWork = MemoryUnitOfWork;

    async fn begin(&self) -> Result<MemoryUnitOfWork, RepoError> {
        if self.state.unavailable.load(Ordering::SeqCst) {
            return Err(RepoError::unavailable("memory data source is offline"));
        }
        self.state.sessions_opened.fetch_add(1, Ordering::SeqCst);
        self.state.sessions_open.fetch_add(1, Ordering::SeqCst);
        Ok(MemoryUnitOfWork {
            state: self.state.clone(),
        })
    }
}

pub struct MemoryUnitOfWork {
    state: Arc<MemoryState>,
}

impl MemoryUnitOfWork {
    fn take_failure(&self, table: &'static str) -> bool {
        let mut failures = rw_write(&self.state.failures, SOURCE, "take_failure");
        match failures.get_mut(table) {
            Some(remaining) if *remaining > 0 => {
                *remaining -= 1;
                true
            }
            _ => false,
        }
    }
}

#[async_trait]
impl<R> EntitySource<R> for MemoryUnitOfWork
where
    R: Entity + Clone,
{
    async fn query(&mut self, query: &EntityQuery<R>) -> Result<Vec<R>, RepoError> {
        self.state.queries.fetch_add(1, Ordering::SeqCst);

        let latency = *rw_read(&self.state.latency, SOURCE, "latency");
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }

        if self.take_failure(R::TABLE) {
            return Err(RepoError::from_persistence(format!(
                "injected failure reading `{}`",
                R::TABLE
            )));
        }

        let table = rw_read(&self.state.tables, SOURCE, "query")
            .get(R::TABLE)
            .cloned();
        let Some(table) = table else {
            return Ok(Vec::new());
        };
        let rows = table.downcast_ref::<Vec<R>>().ok_or_else(|| {
            RepoError::from_persistence(format!(
                "table `{}` holds rows of a different type",
                R::TABLE
            ))
        })?;

        Ok(rows.iter().filter(|row| query.matches(row)).cloned().collect())
    }
}

impl Drop for MemoryUnitOfWork {
    fn drop(&mut self) {
        self.state.sessions_open.fetch_sub(1, Ordering::SeqCst);
    }
}
