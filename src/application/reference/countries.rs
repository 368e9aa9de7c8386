use std::collections::HashMap;

use crate::application::repos::EntityQuery;
use crate::cache::{CacheDefinition, CacheError, DuplicateKeys, EntityCache, index_by};
use crate::domain::entities::CountryRecord;

/// Active countries keyed by upper-case ISO alpha-2 code.
pub struct Countries;

pub type CountryCache = EntityCache<Countries>;

impl CacheDefinition for Countries {
    type Row = CountryRecord;
    type Key = String;
    type Value = CountryRecord;

    const NAME: &'static str = "countries";
    const ENTITY: &'static str = "Country";

    fn query(&self) -> EntityQuery<CountryRecord> {
        EntityQuery::all().filter_eq("active", true).order_by("code")
    }

    fn build(
        &self,
        rows: Vec<CountryRecord>,
    ) -> Result<HashMap<String, CountryRecord>, CacheError> {
        index_by(Self::NAME, rows, DuplicateKeys::Reject, |row| {
            row.code.to_ascii_uppercase()
        })
    }
}

impl EntityCache<Countries> {
    /// Case-insensitive lenient lookup by alpha-2 code.
    pub fn by_code(&self, code: &str) -> Result<Option<CountryRecord>, CacheError> {
        self.get(code.to_ascii_uppercase().as_str())
    }
}
