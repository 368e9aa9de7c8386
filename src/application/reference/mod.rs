//! Reference-data caches shipped with the service.

mod countries;
mod currencies;

use std::sync::Arc;

use crate::application::repos::EntitySource;
use crate::cache::{CacheConfig, CacheDefinition, CacheError, CacheRegistry, EntityCache};
use crate::domain::entities::{CountryRecord, CurrencyRecord};

pub use countries::{Countries, CountryCache};
pub use currencies::{Currencies, CurrencyCache, CurrencyEntry};

/// Typed handles to the registered reference caches.
#[derive(Clone)]
pub struct ReferenceCaches {
    pub countries: Arc<CountryCache>,
    pub currencies: Arc<CurrencyCache>,
}

/// Build every reference cache with its configured period and register it.
pub fn register_reference_caches<U>(
    registry: &mut CacheRegistry<U>,
    config: &CacheConfig,
) -> Result<ReferenceCaches, CacheError>
where
    U: EntitySource<CountryRecord> + EntitySource<CurrencyRecord> + Send + 'static,
{
    let countries = Arc::new(EntityCache::new(
        Countries,
        config.refresh_period(Countries::NAME),
    ));
    let currencies = Arc::new(EntityCache::new(
        Currencies,
        config.refresh_period(Currencies::NAME),
    ));

    registry.register(countries.clone())?;
    registry.register(currencies.clone())?;

    Ok(ReferenceCaches {
        countries,
        currencies,
    })
}
