use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::warn;

// Guarded values are only ever replaced wholesale, never edited in place.

pub(crate) fn rw_read<'a, T>(
    lock: &'a RwLock<T>,
    cache: &'static str,
    op: &'static str,
) -> RwLockReadGuard<'a, T> {
    match lock.read() {
        Ok(guard) => guard,
        Err(poisoned) => {
            warn!(
                op,
                cache,
                lock_kind = "rwlock.read",
                result = "poisoned_recovered",
                "Recovered from poisoned snapshot lock"
            );
            poisoned.into_inner()
        }
    }
}

pub(crate) fn rw_write<'a, T>(
    lock: &'a RwLock<T>,
    cache: &'static str,
    op: &'static str,
) -> RwLockWriteGuard<'a, T> {
    match lock.write() {
        Ok(guard) => guard,
        Err(poisoned) => {
            warn!(
                op,
                cache,
                lock_kind = "rwlock.write",
                result = "poisoned_recovered",
                "Recovered from poisoned snapshot lock"
            );
            poisoned.into_inner()
        }
    }
}
