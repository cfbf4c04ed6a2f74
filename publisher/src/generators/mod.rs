//! Independent producers of simulated activity.
//!
//! Each generator implements one loop iteration; [`run_generator`] owns the
//! loop, the error accounting and the cancellable pause between iterations.

use std::ops::Range;
use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::error::OperationError;
use crate::metrics::ActivityState;

pub mod api;
pub mod cpu;
pub mod memory;
pub mod storage;

pub use api::{ApiCallGenerator, ApiTransport, Endpoint, HttpTransport};
pub use cpu::{CpuTaskGenerator, WorkloadPicker};
pub use memory::{MemoryChurnGenerator, MemoryPool, PoolAction};
pub use storage::{DailyLogSink, LogRecord, StorageWriteGenerator};

#[async_trait]
pub trait Generator: Send {
    fn name(&self) -> &'static str;

    /// One unit of simulated work. Errors are counted by the driver.
    async fn iterate(&mut self, cancel: &CancellationToken) -> Result<(), OperationError>;

    /// Pause before the next iteration.
    fn next_delay(&mut self) -> Duration;
}

/// Drives `generator` until `cancel` fires.
///
/// Cancellation is checked before each iteration and raced against every
/// pause. A failed iteration increments the shared error total and the loop
/// carries on.
pub async fn run_generator<G: Generator>(
    mut generator: G,
    activity: &ActivityState,
    cancel: CancellationToken,
) {
    let name = generator.name();
    info!(generator = name, "generator started");

    let mut iterations = 0u64;
    while !cancel.is_cancelled() {
        if let Err(e) = generator.iterate(&cancel).await {
            activity.record_error();
            debug!(generator = name, error = %e, "iteration failed");
        }
        iterations += 1;

        let delay = generator.next_delay();
        if !sleep_or_cancelled(&cancel, delay).await {
            break;
        }
    }

    info!(generator = name, iterations, "generator stopped");
}

/// Sleeps for `delay`; returns `false` if `cancel` fired first.
pub async fn sleep_or_cancelled(cancel: &CancellationToken, delay: Duration) -> bool {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => false,
        _ = tokio::time::sleep(delay) => true,
    }
}

/// Uniform delay in `range` milliseconds (end exclusive).
pub fn uniform_delay<R: Rng + ?Sized>(rng: &mut R, range: Range<u64>) -> Duration {
    Duration::from_millis(rng.gen_range(range))
}
