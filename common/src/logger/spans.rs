use std::time::Duration;

use tracing::{Span, field};

use super::TraceId;

/// Root span for one publisher run. `category` is filled in once provisioning
/// has picked the counter category.
pub fn root_span(name: &'static str, trace_id: &TraceId) -> Span {
    tracing::info_span!(
        "root",
        name = %name,
        trace_id = %trace_id,
        category = field::Empty
    )
}

/// Child span for a long-running task; inherits `trace_id` from the root.
pub fn child_span(name: &'static str) -> Span {
    tracing::info_span!("task", name = %name)
}

/// Awaits `fut` and emits a `performance` warning when it ran longer than `max`.
pub async fn warn_if_slow<F, T>(label: &'static str, max: Duration, fut: F) -> T
where
    F: std::future::Future<Output = T>,
{
    let start = std::time::Instant::now();
    let out = fut.await;
    let elapsed = start.elapsed();
    if elapsed > max {
        tracing::warn!(
            target: "performance",
            label = label,
            elapsed_ms = elapsed.as_millis() as u64,
            "slow operation detected"
        );
    }
    out
}
