//! Repository traits describing the data-access boundary the caches read through.

use std::{fmt, marker::PhantomData};

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("resource not found")]
    NotFound,
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
    #[error("database timeout")]
    Timeout,
    #[error("data source unavailable: {0}")]
    Unavailable(String),
}

impl RepoError {
    pub fn from_persistence(err: impl fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }

    pub fn unavailable(err: impl fmt::Display) -> Self {
        Self::Unavailable(err.to_string())
    }
}

/// Scalar value a query filter compares a column against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Bool(bool),
    Int(i64),
    Text(String),
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for FieldValue {
    fn from(value: i32) -> Self {
        Self::Int(value.into())
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

/// A row type backed by one relational table.
///
/// `COLUMNS` is the projection selected from `TABLE`; `field` exposes the same
/// columns by name so that sources which cannot push filters down to SQL can
/// still evaluate them.
pub trait Entity: Send + Sync + Unpin + 'static {
    const TABLE: &'static str;
    const COLUMNS: &'static [&'static str];

    fn field(&self, column: &str) -> Option<FieldValue>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filter {
    pub column: &'static str,
    pub value: FieldValue,
}

/// Filter and ordering a cache applies to the rows it loads.
pub struct EntityQuery<R> {
    filters: Vec<Filter>,
    order_by: Option<&'static str>,
    _entity: PhantomData<fn() -> R>,
}

impl<R: Entity> EntityQuery<R> {
    /// Select every row of `R::TABLE`.
    pub fn all() -> Self {
        Self {
            filters: Vec::new(),
            order_by: None,
            _entity: PhantomData,
        }
    }

    /// Keep only rows whose `column` equals `value`.
    pub fn filter_eq(mut self, column: &'static str, value: impl Into<FieldValue>) -> Self {
        self.filters.push(Filter {
            column,
            value: value.into(),
        });
        self
    }

    pub fn order_by(mut self, column: &'static str) -> Self {
        self.order_by = Some(column);
        self
    }

    pub fn filters(&self) -> &[Filter] {
        &self.filters
    }

    pub fn ordering(&self) -> Option<&'static str> {
        self.order_by
    }

    /// Evaluate the filters against an already materialized row.
    pub fn matches(&self, row: &R) -> bool {
        self.filters
            .iter()
            .all(|filter| row.field(filter.column).as_ref() == Some(&filter.value))
    }
}

impl<R> Clone for EntityQuery<R> {
    fn clone(&self) -> Self {
        Self {
            filters: self.filters.clone(),
            order_by: self.order_by,
            _entity: PhantomData,
        }
    }
}

impl<R: Entity> fmt::Debug for EntityQuery<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityQuery")
            .field("table", &R::TABLE)
            .field("filters", &self.filters)
            .field("order_by", &self.order_by)
            .finish()
    }
}

/// Query boundary: materializes the rows of one entity type.
#[async_trait]
pub trait EntitySource<R: Entity>: Send {
    async fn query(&mut self, query: &EntityQuery<R>) -> Result<Vec<R>, RepoError>;
}

/// Hands out scoped units of work.
///
/// A unit of work is released when it is dropped, so every exit path of an
/// initialize or refresh pass gives its connection back.
#[async_trait]
pub trait UnitOfWorkFactory: Send + Sync + 'static {
    type UnitOfWork: Send + 'static;

    async fn begin(&self) -> Result<Self::UnitOfWork, RepoError>;
}
