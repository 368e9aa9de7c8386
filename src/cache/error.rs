use thiserror::Error;

use crate::application::repos::RepoError;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache `{cache}` has not been initialized")]
    NotInitialized { cache: &'static str },
    #[error("cache `{cache}` is already initialized")]
    AlreadyInitialized { cache: &'static str },
    #[error("{entity} `{key}` not found")]
    EntityNotFound { entity: &'static str, key: String },
    #[error("cache `{cache}` received duplicate key `{key}`")]
    DuplicateKey { cache: &'static str, key: String },
    #[error("failed to load cache `{cache}`: {source}")]
    Load {
        cache: &'static str,
        #[source]
        source: RepoError,
    },
    #[error("failed to open unit of work: {source}")]
    Session {
        #[source]
        source: RepoError,
    },
    #[error("cache `{cache}` is registered twice")]
    DuplicateRegistration { cache: &'static str },
    #[error("no cache named `{name}` is registered")]
    UnknownCache { name: String },
    #[error("refresh of cache `{cache}` panicked: {message}")]
    RefreshPanicked { cache: &'static str, message: String },
}

impl CacheError {
    pub fn entity_not_found(entity: &'static str, key: impl ToString) -> Self {
        Self::EntityNotFound {
            entity,
            key: key.to_string(),
        }
    }

    /// Errors that indicate a startup-ordering or wiring defect rather than a
    /// transient data-source condition.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::NotInitialized { .. }
                | Self::AlreadyInitialized { .. }
                | Self::DuplicateRegistration { .. }
        )
    }
}
