use std::path::PathBuf;
use std::time::Duration;

use crate::counters::SettleDelays;

#[derive(Clone, Debug)]
pub struct AppConfig {
    /// Name of the counter category the publisher creates and writes into.
    pub category_name: String,

    /// Help text registered with the category.
    pub category_help: String,

    /// Directory receiving the once-per-day record files of the storage
    /// generator. Created on first write.
    pub log_dir: PathBuf,

    // =========================
    // Provisioning
    // =========================
    /// Wait applied after deleting a stale category and after creating the
    /// new one. Some counter subsystems need a moment before the counters can
    /// be opened.
    pub settle: SettleDelays,

    // =========================
    // Workload
    // =========================
    /// Per-request timeout of the API-call generator's HTTP client.
    pub http_timeout: Duration,

    /// Cadence of the aggregator deriving active-task and error-rate counters.
    pub aggregate_every: Duration,

    /// Cadence of the status snapshot printed to stdout.
    pub report_every: Duration,

    /// Whether the reporter appends host CPU/memory/network samples.
    pub host_metrics: bool,

    // =========================
    // Shutdown
    // =========================
    /// How long the runtime waits for blocking CPU workloads still running
    /// after every task has stopped.
    pub shutdown_grace: Duration,

    /// Emit JSON logs instead of the pretty format.
    pub json_logs: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from an arbitrary key lookup; unset or unparsable
    /// values fall back to defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let millis = |key: &str, default: u64| {
            Duration::from_millis(parse_or(lookup(key), default))
        };
        let secs = |key: &str, default: u64| Duration::from_secs(parse_or(lookup(key), default));
        // Tick periods must be non-zero.
        let period = |key: &str, default: u64| millis(key, default).max(Duration::from_millis(1));

        let log_dir = lookup("WORKLOAD_LOG_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| std::env::temp_dir().join("workload-publisher-logs"));

        Self {
            category_name: lookup("COUNTER_CATEGORY")
                .unwrap_or_else(|| "Workload Publisher".to_string()),
            category_help: "Counters published by the synthetic workload publisher".to_string(),
            log_dir,

            settle: SettleDelays {
                after_delete: millis("CATEGORY_DELETE_SETTLE_MS", 2_000),
                after_create: millis("CATEGORY_CREATE_SETTLE_MS", 3_000),
            },

            http_timeout: secs("HTTP_TIMEOUT_SECS", 10),
            aggregate_every: period("AGGREGATE_EVERY_MS", 1_000),
            report_every: period("REPORT_EVERY_MS", 2_000),
            host_metrics: parse_or(lookup("HOST_METRICS"), true),

            shutdown_grace: secs("SHUTDOWN_GRACE_SECS", 5),
            json_logs: lookup("APP_ENV").as_deref() == Some("production"),
        }
    }
}

fn parse_or<T: std::str::FromStr>(raw: Option<String>, default: T) -> T {
    raw.and_then(|v| v.trim().parse().ok()).unwrap_or(default)
}
