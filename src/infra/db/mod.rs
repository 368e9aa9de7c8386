//! Postgres-backed data source.

mod util;

pub use util::map_sqlx_error;

use std::sync::Arc;

use async_trait::async_trait;
use sqlx::{
    FromRow, Postgres, QueryBuilder,
    pool::PoolConnection,
    postgres::{PgPool, PgPoolOptions, PgRow},
    query,
};

use crate::application::repos::{
    Entity, EntityQuery, EntitySource, FieldValue, RepoError, UnitOfWorkFactory,
};

#[derive(Clone)]
pub struct PostgresDataSource {
    pool: Arc<PgPool>,
}

impl PostgresDataSource {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn connect(url: &str, max_connections: u32) -> Result<PgPool, sqlx::Error> {
        PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await
    }

    pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::Error> {
        sqlx::migrate!("./migrations")
            .run(pool)
            .await
            .map_err(Into::into)
    }

    pub async fn health_check(&self) -> Result<(), sqlx::Error> {
        query("SELECT 1").execute(self.pool()).await.map(|_| ())
    }
}

#[async_trait]
impl UnitOfWorkFactory for PostgresDataSource {
    type UnitOfWork = PgUnitOfWork;

    async fn begin(&self) -> Result<PgUnitOfWork, RepoError> {
        let conn = self.pool.acquire().await.map_err(map_sqlx_error)?;
        Ok(PgUnitOfWork { conn })
    }
}

/// One pooled connection, returned to the pool when dropped.
pub struct PgUnitOfWork {
    conn: PoolConnection<Postgres>,
}

#[async_trait]
impl<R> EntitySource<R> for PgUnitOfWork
where
    R: Entity + for<'r> FromRow<'r, PgRow>,
{
    async fn query(&mut self, query: &EntityQuery<R>) -> Result<Vec<R>, RepoError> {
        let mut qb = select_statement(query);
        qb.build_query_as::<R>()
            .fetch_all(&mut *self.conn)
            .await
            .map_err(map_sqlx_error)
    }
}

fn select_statement<R: Entity>(query: &EntityQuery<R>) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::new("SELECT ");
    qb.push(R::COLUMNS.join(", "));
    qb.push(" FROM ");
    qb.push(R::TABLE);

    for (index, filter) in query.filters().iter().enumerate() {
        qb.push(if index == 0 { " WHERE " } else { " AND " });
        qb.push(filter.column);
        qb.push(" = ");
        match &filter.value {
            FieldValue::Bool(value) => qb.push_bind(*value),
            FieldValue::Int(value) => qb.push_bind(*value),
            FieldValue::Text(value) => qb.push_bind(value.clone()),
        };
    }

    if let Some(column) = query.ordering() {
        qb.push(" ORDER BY ");
        qb.push(column);
    }

    qb
}
