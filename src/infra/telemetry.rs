use std::sync::Once;

use metrics::{Unit, describe_counter, describe_gauge, describe_histogram};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::config::{LogFormat, LoggingSettings};

use super::error::InfraError;

static METRIC_DESCRIPTIONS: Once = Once::new();

/// Install a global tracing subscriber using the provided logging settings.
pub fn init(logging: &LoggingSettings) -> Result<(), InfraError> {
    describe_metrics();

    let env_filter = EnvFilter::builder()
        .with_default_directive(logging.level.into())
        .from_env_lossy();

    let fmt_layer = match logging.format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_target(true)
            .boxed(),
        LogFormat::Compact => fmt::layer().compact().with_target(true).boxed(),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(ErrorLayer::default())
        .with(fmt_layer)
        .try_init()
        .map_err(|err| {
            InfraError::telemetry(format!("failed to install tracing subscriber: {err}"))
        })
}

/// Register descriptions for every cache metric with the installed recorder.
pub fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            "refcache_refresh_total",
            Unit::Count,
            "Total number of cache refreshes, labelled by cache and outcome."
        );
        describe_histogram!(
            "refcache_refresh_ms",
            Unit::Milliseconds,
            "Cache refresh latency (fetch, transform and swap) in milliseconds."
        );
        describe_gauge!(
            "refcache_entries",
            Unit::Count,
            "Number of entries in the currently published snapshot."
        );
        describe_counter!(
            "refcache_lookup_miss_total",
            Unit::Count,
            "Total number of lookups for keys absent from the snapshot."
        );
        describe_histogram!(
            "refcache_initialize_ms",
            Unit::Milliseconds,
            "Startup initialization pass latency in milliseconds."
        );
    });
}
