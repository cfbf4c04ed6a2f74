use std::time::Duration;

use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use workload::Workload;

use super::{Generator, uniform_delay};
use crate::context::EngineContext;
use crate::counters::{RateCounter, ValueCounter};
use crate::error::OperationError;

const DELAY_MS: std::ops::Range<u64> = 1_000..5_000;

/// Chooses the workload of the next iteration.
pub type WorkloadPicker = fn(&mut StdRng) -> Workload;

pub struct CpuTaskGenerator {
    ctx: EngineContext,
    picker: WorkloadPicker,
    rng: StdRng,
}

impl CpuTaskGenerator {
    pub fn with_picker(ctx: EngineContext, picker: WorkloadPicker) -> Self {
        Self {
            ctx,
            picker,
            rng: StdRng::from_entropy(),
        }
    }
}

#[async_trait]
impl Generator for CpuTaskGenerator {
    fn name(&self) -> &'static str {
        "cpu_tasks"
    }

    async fn iterate(&mut self, cancel: &CancellationToken) -> Result<(), OperationError> {
        let activity = &self.ctx.activity;
        let _task = activity.begin_task();

        activity.record_cpu_task_started();
        self.ctx.counters.increment(RateCounter::CpuTasks)?;

        let work = (self.picker)(&mut self.rng);
        let mut worker_rng = StdRng::seed_from_u64(self.rng.r#gen());
        let started = Instant::now();

        // Off the async workers so other tasks keep their cadence. If the
        // token fires first the blocking job is left to finish on its own.
        let job = tokio::task::spawn_blocking(move || work.run(&mut worker_rng));
        let checksum = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(OperationError::Cancelled),
            res = job => res?,
        };
        let elapsed_ms = started.elapsed().as_millis() as u64;

        let completed = activity.record_cpu_operation_completed();
        self.ctx
            .counters
            .set(ValueCounter::CpuOperationsCompleted, completed)?;
        // Latest sample, not a running average.
        self.ctx
            .counters
            .set(ValueCounter::AverageCalculationTime, elapsed_ms)?;

        debug!(kind = %work.kind, size = work.size, elapsed_ms, checksum, "cpu workload finished");
        Ok(())
    }

    fn next_delay(&mut self) -> Duration {
        uniform_delay(&mut self.rng, DELAY_MS)
    }
}
