//! Runtime cache configuration.

use std::{collections::HashMap, time::Duration};

const DEFAULT_REFRESH_PERIOD: Duration = Duration::from_secs(300);
const DEFAULT_FAILURE_ESCALATION_THRESHOLD: u32 = 3;

#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Refresh period for caches without an explicit override.
    pub default_refresh_period: Duration,
    /// Per-cache refresh periods, keyed by cache name.
    pub refresh_periods: HashMap<String, Duration>,
    /// Consecutive failed refreshes after which the scheduler logs at error level.
    pub failure_escalation_threshold: u32,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            default_refresh_period: DEFAULT_REFRESH_PERIOD,
            refresh_periods: HashMap::new(),
            failure_escalation_threshold: DEFAULT_FAILURE_ESCALATION_THRESHOLD,
        }
    }
}

impl From<&crate::config::CacheSettings> for CacheConfig {
    fn from(settings: &crate::config::CacheSettings) -> Self {
        Self {
            default_refresh_period: settings.default_refresh_period,
            refresh_periods: settings.refresh_periods.clone(),
            failure_escalation_threshold: settings.failure_escalation_threshold.get(),
        }
    }
}

impl CacheConfig {
    pub fn refresh_period(&self, cache: &str) -> Duration {
        self.refresh_periods
            .get(cache)
            .copied()
            .unwrap_or(self.default_refresh_period)
    }
}
