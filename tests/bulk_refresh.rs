mod support;

use std::{collections::HashMap, sync::Arc, time::Duration};

use refcache::{
    application::{
        reference::register_reference_caches,
        repos::{Entity, FieldValue},
    },
    cache::{
        BulkRefresher, CacheDefinition, CacheError, CacheInitializer, CacheRegistry, EntityCache,
    },
    infra::memory::{MemoryDataSource, MemoryUnitOfWork},
};

use support::{country, currency, seeded_source};

#[derive(Debug, Clone, PartialEq)]
struct Region {
    code: String,
    name: String,
}

impl Entity for Region {
    const TABLE: &'static str = "regions";
    const COLUMNS: &'static [&'static str] = &["code", "name"];

    fn field(&self, column: &str) -> Option<FieldValue> {
        match column {
            "code" => Some(self.code.as_str().into()),
            "name" => Some(self.name.as_str().into()),
            _ => None,
        }
    }
}

struct Regions;

impl CacheDefinition for Regions {
    type Row = Region;
    type Key = String;
    type Value = Region;

    const NAME: &'static str = "regions";
    const ENTITY: &'static str = "Region";

    fn build(&self, rows: Vec<Region>) -> Result<HashMap<String, Region>, CacheError> {
        Ok(rows.into_iter().map(|row| (row.code.clone(), row)).collect())
    }
}

fn region(code: &str) -> Region {
    Region {
        code: code.to_string(),
        name: code.to_lowercase(),
    }
}

struct Harness {
    source: Arc<MemoryDataSource>,
    refresher: BulkRefresher<MemoryDataSource>,
    registry: Arc<CacheRegistry<MemoryUnitOfWork>>,
}

async fn harness() -> Harness {
    let source = seeded_source();
    source.insert_rows(vec![region("EU"), region("APAC")]);

    let mut registry: CacheRegistry<MemoryUnitOfWork> = CacheRegistry::new();
    register_reference_caches(&mut registry, &Default::default()).expect("register");
    registry
        .register(Arc::new(EntityCache::new(Regions, Duration::from_secs(60))))
        .expect("register regions");

    let source = Arc::new(source);
    let registry = Arc::new(registry);
    CacheInitializer::new(source.clone(), registry.clone())
        .run()
        .await
        .expect("startup succeeds");

    Harness {
        refresher: BulkRefresher::new(source.clone(), registry.clone()),
        source,
        registry,
    }
}

fn generations(registry: &CacheRegistry<MemoryUnitOfWork>) -> Vec<(&'static str, u64)> {
    registry
        .statuses()
        .into_iter()
        .map(|status| (status.name, status.generation))
        .collect()
}

#[tokio::test]
async fn refresh_all_reloads_every_cache_in_order() {
    let h = harness().await;
    let sessions_before = h.source.sessions_opened();

    let statuses = h.refresher.refresh_all().await.expect("bulk refresh");

    assert_eq!(
        statuses.iter().map(|s| s.name).collect::<Vec<_>>(),
        vec!["countries", "currencies", "regions"]
    );
    assert!(statuses.iter().all(|s| s.generation == 2));
    assert_eq!(h.source.sessions_opened(), sessions_before + 1);
    assert_eq!(h.source.sessions_open(), 0);
}

#[tokio::test]
async fn refresh_all_stops_at_the_first_failure() {
    let h = harness().await;
    h.source.insert_rows(vec![country("BR", "Brazil")]);
    h.source.insert_rows(vec![currency("BRL", 2)]);
    h.source.fail_queries("currencies", 1);
    let queries_before = h.source.queries_executed();

    let err = h.refresher.refresh_all().await.expect_err("bulk refresh fails");

    assert!(matches!(err, CacheError::Load { cache: "currencies", .. }));
    assert_eq!(
        generations(&h.registry),
        vec![("countries", 2), ("currencies", 1), ("regions", 1)]
    );
    assert_eq!(h.source.queries_executed(), queries_before + 2);
    assert_eq!(h.source.sessions_open(), 0);
}

#[tokio::test]
async fn refresh_one_touches_only_the_named_cache() {
    let h = harness().await;

    let status = h.refresher.refresh_one("regions").await.expect("refresh");

    assert_eq!(status.name, "regions");
    assert_eq!(status.generation, 2);
    assert_eq!(
        generations(&h.registry),
        vec![("countries", 1), ("currencies", 1), ("regions", 2)]
    );
}

#[tokio::test]
async fn refresh_one_rejects_unknown_names() {
    let h = harness().await;

    let err = h.refresher.refresh_one("planets").await.expect_err("unknown");

    assert!(matches!(err, CacheError::UnknownCache { ref name } if name == "planets"));
    assert_eq!(h.source.sessions_opened(), 1);
}

#[tokio::test]
async fn statuses_report_registered_caches() {
    let h = harness().await;

    let statuses = h.refresher.statuses();

    assert_eq!(statuses.len(), 3);
    assert!(statuses.iter().all(|s| s.initialized && s.refreshed_at.is_some()));
    assert_eq!(statuses[2].refresh_period, Duration::from_secs(60));
}
