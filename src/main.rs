use std::{process, sync::Arc};

use refcache::{
    application::{
        error::{AppError, ErrorReport},
        reference::register_reference_caches,
    },
    cache::{
        BulkRefresher, CacheConfig, CacheInitializer, CacheRefreshScheduler, CacheRegistry,
        CacheStatus,
    },
    config,
    infra::{
        db::{PgUnitOfWork, PostgresDataSource},
        error::InfraError,
        telemetry,
    },
};
use tokio_util::sync::CancellationToken;
use tracing::{Dispatch, Level, dispatcher, error, info};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(i32::from(error.exit_code()));
    }
}

fn report_application_error(error: &AppError) {
    let report = ErrorReport::from_error("main", error);
    if dispatcher::has_been_set() {
        error!(error = %report.chain(), "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %report.chain(), "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli().map_err(InfraError::from)?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging)?;

    match command {
        config::Command::Serve(_) => run_serve(settings).await,
        config::Command::Refresh(args) => run_refresh(settings, args).await,
    }
}

struct Runtime {
    source: Arc<PostgresDataSource>,
    registry: Arc<CacheRegistry<PgUnitOfWork>>,
    cache_config: CacheConfig,
}

async fn build_runtime(settings: &config::Settings) -> Result<Runtime, AppError> {
    let database_url = settings
        .database
        .url
        .as_ref()
        .ok_or_else(|| InfraError::configuration("database url is not configured"))?;

    let pool = PostgresDataSource::connect(database_url, settings.database.max_connections.get())
        .await
        .map_err(|err| InfraError::database(err.to_string()))?;

    PostgresDataSource::run_migrations(&pool)
        .await
        .map_err(|err| InfraError::database(err.to_string()))?;

    let source = PostgresDataSource::new(pool);
    source
        .health_check()
        .await
        .map_err(|err| InfraError::database(err.to_string()))?;

    let cache_config = CacheConfig::from(&settings.cache);
    let mut registry: CacheRegistry<PgUnitOfWork> = CacheRegistry::new();
    register_reference_caches(&mut registry, &cache_config)?;

    Ok(Runtime {
        source: Arc::new(source),
        registry: Arc::new(registry),
        cache_config,
    })
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let runtime = build_runtime(&settings).await?;

    CacheInitializer::new(runtime.source.clone(), runtime.registry.clone())
        .run()
        .await?;
    info!(
        target = "refcache::serve",
        caches = ?runtime.registry.names(),
        "application ready"
    );

    let shutdown = CancellationToken::new();
    let scheduler = CacheRefreshScheduler::new(
        runtime.source.clone(),
        runtime.registry.clone(),
        runtime.cache_config.failure_escalation_threshold,
    );
    let handle = scheduler.spawn(shutdown.clone());

    let signal = tokio::signal::ctrl_c().await;
    info!(target = "refcache::serve", "shutdown requested");
    let stats = handle.shutdown().await;
    for (cache, stats) in stats {
        info!(
            target = "refcache::serve",
            cache,
            refreshes = stats.refreshes,
            failures = stats.failures,
            "refresh loop stopped"
        );
    }

    signal.map_err(|err| AppError::from(InfraError::from(err)))
}

async fn run_refresh(
    settings: config::Settings,
    args: config::RefreshArgs,
) -> Result<(), AppError> {
    let runtime = build_runtime(&settings).await?;
    let refresher = BulkRefresher::new(runtime.source, runtime.registry);

    let statuses = match args.cache.as_deref() {
        Some(name) => vec![refresher.refresh_one(name).await?],
        None => refresher.refresh_all().await?,
    };

    for status in &statuses {
        log_status(status);
    }
    Ok(())
}

fn log_status(status: &CacheStatus) {
    info!(
        target = "refcache::refresh",
        cache = status.name,
        entity = status.entity,
        entries = status.entries,
        generation = status.generation,
        refreshed_at = ?status.refreshed_at,
        refresh_period_secs = status.refresh_period.as_secs(),
        "cache status"
    );
}
