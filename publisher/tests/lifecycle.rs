use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use publisher::Publisher;
use publisher::config::AppConfig;
use publisher::counters::{CounterId, InProcessCounterSubsystem, RateCounter, SettleDelays};
use publisher::error::{OperationError, ProvisioningError, PublisherError};
use publisher::generators::ApiTransport;
use rand::rngs::StdRng;
use reqwest::StatusCode;
use workload::{Workload, WorkloadKind};

struct OkTransport;

#[async_trait]
impl ApiTransport for OkTransport {
    async fn get(&self, _url: &str) -> Result<StatusCode, OperationError> {
        Ok(StatusCode::OK)
    }
}

/// Every request completes after a short latency with a 404.
struct NotFoundTransport;

#[async_trait]
impl ApiTransport for NotFoundTransport {
    async fn get(&self, _url: &str) -> Result<StatusCode, OperationError> {
        tokio::time::sleep(Duration::from_millis(5)).await;
        Ok(StatusCode::NOT_FOUND)
    }
}

fn tiny_workload(_: &mut StdRng) -> Workload {
    Workload::new(WorkloadKind::PrimeCount, 100)
}

fn test_config(category: &str, log_dir: &std::path::Path) -> AppConfig {
    AppConfig {
        category_name: category.to_string(),
        log_dir: log_dir.to_path_buf(),
        settle: SettleDelays::NONE,
        aggregate_every: Duration::from_millis(20),
        report_every: Duration::from_secs(60),
        host_metrics: false,
        ..AppConfig::default()
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn run_provisions_works_and_releases_on_shutdown() {
    let dir = tempfile::tempdir().expect("tempdir");
    let subsystem = Arc::new(InProcessCounterSubsystem::new());

    let publisher = Publisher::new(
        test_config("lifecycle run", dir.path()),
        subsystem.clone(),
        Arc::new(OkTransport),
    )
    .with_workload_picker(tiny_workload);
    let ctx = publisher.context();

    let summary = publisher
        .run(tokio::time::sleep(Duration::from_millis(300)))
        .await
        .expect("run completes");

    assert_eq!(summary.first_exit, None);

    // First iterations are immediate.
    assert!(summary.activity.api_calls >= 1);
    assert!(summary.activity.disk_writes >= 1);
    assert!(summary.activity.cpu_tasks_started >= 1);

    // Every task joined before the counters were released.
    assert_eq!(summary.activity.active_tasks, 0);
    assert!(!ctx.counters.is_provisioned());
    assert_eq!(ctx.counters.value(RateCounter::ApiCalls), None);

    // Values written while running are visible to other subsystem readers.
    let published = subsystem
        .read_category("lifecycle run")
        .expect("category stays registered");
    assert_eq!(
        published.get(CounterId::from(RateCounter::ApiCalls).name()),
        Some(&summary.activity.api_calls)
    );
}

#[tokio::test]
async fn shutdown_before_any_work_still_releases() {
    let dir = tempfile::tempdir().expect("tempdir");

    let publisher = Publisher::new(
        test_config("lifecycle immediate", dir.path()),
        Arc::new(InProcessCounterSubsystem::new()),
        Arc::new(OkTransport),
    )
    .with_workload_picker(tiny_workload);
    let ctx = publisher.context();

    let summary = publisher.run(async {}).await.expect("run completes");

    assert_eq!(summary.activity.active_tasks, 0);
    assert!(!ctx.counters.is_provisioned());
}

#[tokio::test]
async fn denied_provisioning_is_fatal_with_remediation() {
    let dir = tempfile::tempdir().expect("tempdir");

    let publisher = Publisher::new(
        test_config("lifecycle denied", dir.path()),
        Arc::new(InProcessCounterSubsystem::deny_creation()),
        Arc::new(OkTransport),
    );
    let ctx = publisher.context();

    let err = publisher
        .run(std::future::pending::<()>())
        .await
        .expect_err("provisioning must fail");

    match err {
        PublisherError::Provisioning(e @ ProvisioningError::AccessDenied { .. }) => {
            assert!(e.remediation().is_some());
        }
        other => panic!("unexpected error: {other:?}"),
    }

    assert!(!ctx.counters.is_provisioned());
    assert_eq!(ctx.activity.snapshot().api_calls, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn rate_counter_never_decreases_and_gauge_stays_bounded() {
    let dir = tempfile::tempdir().expect("tempdir");

    let publisher = Publisher::new(
        test_config("lifecycle sampled", dir.path()),
        Arc::new(InProcessCounterSubsystem::new()),
        Arc::new(NotFoundTransport),
    )
    .with_workload_picker(tiny_workload);
    let ctx = publisher.context();

    let (stop_tx, mut stop_rx) = tokio::sync::oneshot::channel::<()>();
    let sampler = tokio::spawn(async move {
        let mut samples = Vec::new();
        let mut max_active = 0;
        loop {
            if let Some(v) = ctx.counters.value(RateCounter::ApiCalls) {
                samples.push(v);
            }
            max_active = max_active.max(ctx.activity.active_tasks());

            tokio::select! {
                _ = &mut stop_rx => break,
                _ = tokio::time::sleep(Duration::from_millis(10)) => {}
            }
        }
        (samples, max_active)
    });

    let summary = publisher
        .run(tokio::time::sleep(Duration::from_millis(1_500)))
        .await
        .expect("run completes");
    let _ = stop_tx.send(());
    let (samples, max_active) = sampler.await.expect("sampler task");

    assert!(samples.len() > 10, "too few samples: {}", samples.len());
    assert!(
        samples.windows(2).all(|w| w[0] <= w[1]),
        "rate counter went backwards: {samples:?}"
    );
    assert!(samples.last().copied().unwrap_or_default() <= summary.activity.api_calls);

    // Only the api, storage and cpu generators raise the gauge.
    assert!(max_active <= 3, "gauge reached {max_active}");
    assert_eq!(summary.activity.active_tasks, 0);

    // Every 404 is an error.
    assert!(summary.activity.api_calls >= 1);
    assert!(summary.activity.errors >= summary.activity.api_calls);
}
