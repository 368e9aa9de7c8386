//! Immutable keyed snapshots and the helpers used to build them.

use std::{
    borrow::Borrow,
    collections::{HashMap, hash_map::Entry},
    fmt::Display,
    hash::Hash,
};

use time::OffsetDateTime;

use super::error::CacheError;

/// One published generation of a cache's contents.
///
/// A snapshot is never modified after it is published; refreshing a cache
/// builds a new one and swaps the reference.
#[derive(Debug)]
pub struct Snapshot<K, V> {
    entries: HashMap<K, V>,
    generation: u64,
    refreshed_at: OffsetDateTime,
}

impl<K, V> Snapshot<K, V>
where
    K: Eq + Hash,
{
    pub(crate) fn new(entries: HashMap<K, V>, generation: u64) -> Self {
        Self {
            entries,
            generation,
            refreshed_at: OffsetDateTime::now_utc(),
        }
    }

    pub fn get<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.entries.get(key)
    }

    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.entries.contains_key(key)
    }

    pub fn entries(&self) -> &HashMap<K, V> {
        &self.entries
    }

    pub fn values(&self) -> impl Iterator<Item = &V> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of successful publishes up to and including this one.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn refreshed_at(&self) -> OffsetDateTime {
        self.refreshed_at
    }
}

/// What to do when two rows map to the same key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DuplicateKeys {
    #[default]
    KeepFirst,
    KeepLast,
    Reject,
}

/// Index `rows` by `key_fn`, resolving collisions with `policy`.
pub fn index_by<K, V, I, F>(
    cache: &'static str,
    rows: I,
    policy: DuplicateKeys,
    mut key_fn: F,
) -> Result<HashMap<K, V>, CacheError>
where
    K: Eq + Hash + Display,
    I: IntoIterator<Item = V>,
    F: FnMut(&V) -> K,
{
    let rows = rows.into_iter();
    let mut entries = HashMap::with_capacity(rows.size_hint().0);

    for row in rows {
        match entries.entry(key_fn(&row)) {
            Entry::Vacant(slot) => {
                slot.insert(row);
            }
            Entry::Occupied(mut slot) => match policy {
                DuplicateKeys::KeepFirst => {}
                DuplicateKeys::KeepLast => {
                    slot.insert(row);
                }
                DuplicateKeys::Reject => {
                    return Err(CacheError::DuplicateKey {
                        cache,
                        key: slot.key().to_string(),
                    });
                }
            },
        }
    }

    Ok(entries)
}
