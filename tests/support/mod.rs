#![allow(dead_code)]

use std::sync::Arc;

use refcache::{
    application::reference::{ReferenceCaches, register_reference_caches},
    cache::{CacheConfig, CacheRegistry},
    domain::entities::{CountryRecord, CurrencyRecord},
    infra::memory::{MemoryDataSource, MemoryUnitOfWork},
};

pub fn country(code: &str, name: &str) -> CountryRecord {
    CountryRecord {
        code: code.to_string(),
        alpha3: format!("{code}X"),
        numeric_code: 0,
        name: name.to_string(),
        active: true,
    }
}

pub fn currency(code: &str, minor_units: i32) -> CurrencyRecord {
    CurrencyRecord {
        code: code.to_string(),
        name: code.to_string(),
        minor_units,
        active: true,
    }
}

pub fn seeded_source() -> MemoryDataSource {
    let source = MemoryDataSource::new();
    source.insert_rows(vec![country("FR", "France"), country("JP", "Japan")]);
    source.insert_rows(vec![currency("EUR", 2), currency("JPY", 0)]);
    source
}

pub struct Fixture {
    pub source: Arc<MemoryDataSource>,
    pub registry: Arc<CacheRegistry<MemoryUnitOfWork>>,
    pub caches: ReferenceCaches,
}

pub fn fixture(source: MemoryDataSource, config: &CacheConfig) -> Fixture {
    let mut registry = CacheRegistry::new();
    let caches = register_reference_caches(&mut registry, config).expect("register caches");
    Fixture {
        source: Arc::new(source),
        registry: Arc::new(registry),
        caches,
    }
}
