//! Derives composite counters from the shared activity totals.

use std::time::Duration;

use tokio::time::{MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::context::EngineContext;
use crate::counters::ValueCounter;
use crate::error::OperationError;

/// What one aggregation tick published.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AggregateTick {
    pub active_tasks: u64,
    /// `None` when no operation has been recorded yet and the error rate was
    /// left untouched.
    pub error_rate: Option<u64>,
}

/// floor(100 · errors / operations), clamped to `[0, 100]`.
///
/// `None` while there are no operations. Errors can outnumber operations
/// because failed writes and memory churn are not operations, hence the clamp.
pub fn error_rate_percent(errors: u64, operations: u64) -> Option<u64> {
    if operations == 0 {
        return None;
    }
    let pct = (errors as u128 * 100) / operations as u128;
    Some(pct.min(100) as u64)
}

/// Publishes the active-task gauge and, when defined, the error rate.
pub fn aggregate_once(ctx: &EngineContext) -> Result<AggregateTick, OperationError> {
    let snap = ctx.activity.snapshot();

    ctx.counters
        .set(ValueCounter::ActiveTasks, snap.active_tasks)?;

    let error_rate = error_rate_percent(snap.errors, snap.total_operations());
    if let Some(pct) = error_rate {
        ctx.counters.set(ValueCounter::ErrorRate, pct)?;
    }

    Ok(AggregateTick {
        active_tasks: snap.active_tasks,
        error_rate,
    })
}

/// Runs [`aggregate_once`] every `every` until `cancel` fires.
pub async fn run_aggregator(ctx: EngineContext, every: Duration, cancel: CancellationToken) {
    let mut ticker = interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    info!(every_ms = every.as_millis() as u64, "aggregator started");

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        match aggregate_once(&ctx) {
            Ok(tick) => debug!(
                active_tasks = tick.active_tasks,
                error_rate = ?tick.error_rate,
                "aggregates published"
            ),
            Err(e) => warn!(error = %e, "aggregation tick failed; skipping"),
        }
    }

    info!("aggregator stopped");
}
