use std::sync::Arc;

use common::logger::init_logger;
use publisher::{
    Publisher, RunSummary,
    config::AppConfig,
    counters::InProcessCounterSubsystem,
    error::PublisherError,
    generators::HttpTransport,
    reporter::{format_elapsed, group_thousands},
};

fn main() -> anyhow::Result<()> {
    let cfg = AppConfig::from_env();
    init_logger("workload-publisher", cfg.json_logs);

    tracing::info!(category = %cfg.category_name, log_dir = %cfg.log_dir.display(), "Starting workload publisher...");

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("publisher-worker")
        .build()?;

    let grace = cfg.shutdown_grace;
    let result = runtime.block_on(run(cfg));

    // Abandoned CPU workloads may still occupy blocking threads.
    runtime.shutdown_timeout(grace);

    result
}

async fn run(cfg: AppConfig) -> anyhow::Result<()> {
    println!("Workload Publisher");
    println!("Publishing counters to category '{}'", cfg.category_name);
    println!("Press Ctrl+C to stop...");

    let subsystem = Arc::new(InProcessCounterSubsystem::new());
    let transport =
        Arc::new(HttpTransport::new(cfg.http_timeout).map_err(PublisherError::HttpClient)?);

    let publisher = Publisher::new(cfg, subsystem, transport);

    match publisher.run(shutdown_signal()).await {
        Ok(summary) => {
            print_summary(&summary);
            Ok(())
        }
        Err(PublisherError::Provisioning(e)) => {
            eprintln!("Error: {e}");
            if let Some(hint) = e.remediation() {
                eprintln!("Solution: {hint}");
            }
            Err(e.into())
        }
        Err(e) => Err(e.into()),
    }
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("Shutdown signal received"),
        Err(e) => {
            tracing::error!(error = ?e, "failed to listen for ctrl-c; running until a task exits");
            std::future::pending::<()>().await;
        }
    }
}

fn print_summary(summary: &RunSummary) {
    let a = &summary.activity;

    println!();
    println!("Stopped after {}", format_elapsed(summary.elapsed));
    println!("   API Calls:       {}", group_thousands(a.api_calls));
    println!("   Disk Writes:     {}", group_thousands(a.disk_writes));
    println!("   Bytes Written:   {}", group_thousands(a.bytes_written));
    println!("   CPU Tasks:       {}", group_thousands(a.cpu_tasks_started));
    println!("   Errors:          {}", group_thousands(a.errors));
    println!("Cleanup completed.");
}
