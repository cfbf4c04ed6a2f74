//! Lifecycle controller: provision, run every task, shut down, release.
//!
//! Flow:
//! 1) Provision the counter category (fatal on failure).
//! 2) Spawn the shutdown watcher, four generators, the aggregator and the reporter.
//! 3) On the first task exit or the external interrupt, cancel the shared token.
//! 4) Wait until every task has acknowledged, then release the counters.
//!
//! Releasing only after all tasks joined means no producer can write to a
//! released counter.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use common::logger::{TraceId, child_span, root_span};
use tokio::task::JoinSet;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, error, field, info, warn};

use crate::aggregator::run_aggregator;
use crate::config::AppConfig;
use crate::context::EngineContext;
use crate::counters::CounterSubsystem;
use crate::error::PublisherError;
use crate::generators::{
    ApiCallGenerator, ApiTransport, CpuTaskGenerator, DailyLogSink, Generator,
    MemoryChurnGenerator, StorageWriteGenerator, WorkloadPicker, run_generator,
};
use crate::host::HostSampler;
use crate::metrics::ActivitySnapshot;
use crate::reporter::run_reporter;

/// Outcome of a completed run.
#[derive(Clone, Debug)]
pub struct RunSummary {
    pub trace_id: TraceId,
    pub elapsed: Duration,
    /// Final totals, taken after every task stopped.
    pub activity: ActivitySnapshot,
    /// Task whose exit started the shutdown, if one exited before the interrupt.
    pub first_exit: Option<&'static str>,
}

pub struct Publisher {
    config: AppConfig,
    ctx: EngineContext,
    subsystem: Arc<dyn CounterSubsystem>,
    transport: Arc<dyn ApiTransport>,
    picker: WorkloadPicker,
}

impl Publisher {
    pub fn new(
        config: AppConfig,
        subsystem: Arc<dyn CounterSubsystem>,
        transport: Arc<dyn ApiTransport>,
    ) -> Self {
        let ctx = EngineContext::new(config.category_name.clone());
        Self {
            config,
            ctx,
            subsystem,
            transport,
            picker: workload::Workload::random,
        }
    }

    /// Overrides how the CPU-task generator picks its workloads.
    pub fn with_workload_picker(mut self, picker: WorkloadPicker) -> Self {
        self.picker = picker;
        self
    }

    /// Shared state handle, usable for inspection while or after running.
    pub fn context(&self) -> EngineContext {
        self.ctx.clone()
    }

    /// Runs until `shutdown` resolves (or a task exits), then releases the counters.
    pub async fn run<S>(&self, shutdown: S) -> Result<RunSummary, PublisherError>
    where
        S: Future<Output = ()> + Send + 'static,
    {
        let trace_id = TraceId::new();
        let span = root_span("publisher", &trace_id);
        span.record("category", field::display(&self.config.category_name));

        self.run_inner(trace_id, shutdown).instrument(span).await
    }

    async fn run_inner<S>(
        &self,
        trace_id: TraceId,
        shutdown: S,
    ) -> Result<RunSummary, PublisherError>
    where
        S: Future<Output = ()> + Send + 'static,
    {
        let started = Instant::now();

        if let Err(e) = self
            .ctx
            .counters
            .provision(
                self.subsystem.as_ref(),
                &self.config.category_help,
                self.config.settle,
            )
            .await
        {
            self.ctx.counters.release();
            error!(error = %e, "counter provisioning failed");
            return Err(e.into());
        }

        let cancel = CancellationToken::new();
        let watcher = spawn_shutdown_watcher(shutdown, cancel.clone());

        let mut tasks = JoinSet::new();
        self.spawn_tasks(&mut tasks, &cancel);
        info!(tasks = tasks.len(), "publisher running");

        let first_exit = match tasks.join_next().await {
            Some(Ok(name)) if !cancel.is_cancelled() => {
                warn!(task = name, "task exited before shutdown was requested");
                Some(name)
            }
            Some(Ok(_)) => None,
            Some(Err(e)) => {
                error!(error = %e, "task ended abnormally");
                Some("unknown")
            }
            None => None,
        };

        cancel.cancel();

        while let Some(res) = tasks.join_next().await {
            match res {
                Ok(name) => debug!(task = name, "task acknowledged shutdown"),
                Err(e) => warn!(error = %e, "task ended abnormally during shutdown"),
            }
        }
        if let Err(e) = watcher.await {
            debug!(error = %e, "shutdown watcher did not finish cleanly");
        }

        self.ctx.counters.release();

        let summary = RunSummary {
            trace_id,
            elapsed: started.elapsed(),
            activity: self.ctx.activity.snapshot(),
            first_exit,
        };

        info!(
            elapsed_ms = summary.elapsed.as_millis() as u64,
            api_calls = summary.activity.api_calls,
            disk_writes = summary.activity.disk_writes,
            cpu_tasks = summary.activity.cpu_tasks_started,
            errors = summary.activity.errors,
            "publisher stopped"
        );

        Ok(summary)
    }

    fn spawn_tasks(&self, tasks: &mut JoinSet<&'static str>, cancel: &CancellationToken) {
        let ctx = &self.ctx;

        self.spawn_generator(
            tasks,
            ApiCallGenerator::new(ctx.clone(), Arc::clone(&self.transport)),
            cancel,
        );
        self.spawn_generator(
            tasks,
            StorageWriteGenerator::new(ctx.clone(), DailyLogSink::new(&self.config.log_dir)),
            cancel,
        );
        self.spawn_generator(tasks, MemoryChurnGenerator::new(ctx.clone()), cancel);
        self.spawn_generator(
            tasks,
            CpuTaskGenerator::with_picker(ctx.clone(), self.picker),
            cancel,
        );

        let aggregator = run_aggregator(ctx.clone(), self.config.aggregate_every, cancel.clone());
        tasks.spawn(
            async move {
                aggregator.await;
                "aggregator"
            }
            .instrument(child_span("aggregator")),
        );

        let host = self.config.host_metrics.then(HostSampler::new);
        let reporter = run_reporter(ctx.clone(), self.config.report_every, host, cancel.clone());
        tasks.spawn(
            async move {
                reporter.await;
                "reporter"
            }
            .instrument(child_span("reporter")),
        );
    }

    fn spawn_generator<G>(
        &self,
        tasks: &mut JoinSet<&'static str>,
        generator: G,
        cancel: &CancellationToken,
    ) where
        G: Generator + 'static,
    {
        let name = generator.name();
        let activity = Arc::clone(&self.ctx.activity);
        let cancel = cancel.clone();

        tasks.spawn(
            async move {
                run_generator(generator, &activity, cancel).await;
                name
            }
            .instrument(child_span(name)),
        );
    }
}

/// Cancels `cancel` exactly once when `shutdown` resolves. Ends quietly if the
/// token is cancelled by someone else first.
fn spawn_shutdown_watcher<S>(shutdown: S, cancel: CancellationToken) -> tokio::task::JoinHandle<()>
where
    S: Future<Output = ()> + Send + 'static,
{
    tokio::spawn(
        async move {
            tokio::select! {
                _ = shutdown => {
                    info!("shutdown requested");
                    cancel.cancel();
                }
                _ = cancel.cancelled() => {}
            }
        }
        .in_current_span(),
    )
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use reqwest::StatusCode;
    use tracing_test::traced_test;
    use workload::{Workload, WorkloadKind};

    use super::*;
    use crate::counters::{InProcessCounterSubsystem, SettleDelays};
    use crate::error::OperationError;

    struct Unreachable;

    #[async_trait]
    impl ApiTransport for Unreachable {
        async fn get(&self, _url: &str) -> Result<StatusCode, OperationError> {
            Ok(StatusCode::SERVICE_UNAVAILABLE)
        }
    }

    fn publisher(dir: &std::path::Path) -> Publisher {
        let config = AppConfig {
            category_name: "lifecycle unit".into(),
            log_dir: dir.to_path_buf(),
            settle: SettleDelays::NONE,
            host_metrics: false,
            ..AppConfig::default()
        };
        Publisher::new(
            config,
            Arc::new(InProcessCounterSubsystem::new()),
            Arc::new(Unreachable),
        )
        .with_workload_picker(|_| Workload::new(WorkloadKind::Fibonacci, 5))
    }

    #[tokio::test]
    #[traced_test]
    async fn interrupt_is_logged_and_every_task_stops() {
        let dir = tempfile::tempdir().unwrap();
        let publisher = publisher(dir.path());

        let summary = publisher
            .run(tokio::time::sleep(Duration::from_millis(50)))
            .await
            .unwrap();

        assert!(logs_contain("shutdown requested"));
        assert!(logs_contain("publisher stopped"));
        assert!(logs_contain("aggregator stopped"));
        assert_eq!(summary.activity.active_tasks, 0);
        // Every non-2xx answer is an error.
        assert!(summary.activity.errors >= summary.activity.api_calls);
    }

    #[tokio::test]
    async fn counters_are_live_while_running() {
        let dir = tempfile::tempdir().unwrap();
        let publisher = publisher(dir.path());
        let ctx = publisher.context();

        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        let probe = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            let live = ctx.counters.is_provisioned();
            let _ = tx.send(());
            live
        });

        publisher
            .run(async move {
                let _ = rx.await;
            })
            .await
            .unwrap();

        assert!(probe.await.unwrap());
    }
}
