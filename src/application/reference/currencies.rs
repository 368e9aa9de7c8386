use std::collections::HashMap;

use serde::Serialize;

use crate::application::repos::EntityQuery;
use crate::cache::{CacheDefinition, CacheError, DuplicateKeys, EntityCache, index_by};
use crate::domain::entities::CurrencyRecord;

/// A currency together with the factor between major and minor units.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CurrencyEntry {
    pub currency: CurrencyRecord,
    /// `10^minor_units`, e.g. 100 for EUR and 1 for JPY.
    pub minor_unit_scale: i64,
}

impl CurrencyEntry {
    /// Convert an amount in minor units into major units.
    pub fn to_major(&self, minor_amount: i64) -> f64 {
        minor_amount as f64 / self.minor_unit_scale as f64
    }
}

/// Active currencies keyed by ISO 4217 code.
pub struct Currencies;

pub type CurrencyCache = EntityCache<Currencies>;

impl CacheDefinition for Currencies {
    type Row = CurrencyRecord;
    type Key = String;
    type Value = CurrencyEntry;

    const NAME: &'static str = "currencies";
    const ENTITY: &'static str = "Currency";

    fn query(&self) -> EntityQuery<CurrencyRecord> {
        EntityQuery::all().filter_eq("active", true).order_by("code")
    }

    fn build(
        &self,
        rows: Vec<CurrencyRecord>,
    ) -> Result<HashMap<String, CurrencyEntry>, CacheError> {
        let entries = rows.into_iter().map(|currency| CurrencyEntry {
            minor_unit_scale: minor_unit_scale(currency.minor_units),
            currency,
        });
        index_by(Self::NAME, entries, DuplicateKeys::KeepFirst, |entry| {
            entry.currency.code.to_ascii_uppercase()
        })
    }
}

impl EntityCache<Currencies> {
    /// Case-insensitive strict lookup by ISO 4217 code.
    pub fn by_code(&self, code: &str) -> Result<CurrencyEntry, CacheError> {
        self.require(code.to_ascii_uppercase().as_str())
    }
}

fn minor_unit_scale(minor_units: i32) -> i64 {
    let exponent = minor_units.clamp(0, 18) as u32;
    10_i64.pow(exponent)
}
