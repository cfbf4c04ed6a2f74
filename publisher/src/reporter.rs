//! Periodic human-readable status snapshot.

use std::fmt::Write as _;
use std::io::Write as _;
use std::time::Duration;

use tokio::time::{Instant, MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::MIB;
use crate::context::EngineContext;
use crate::counters::CounterId;
use crate::host::{HostSampler, HostSnapshot};
use crate::metrics::ActivitySnapshot;

/// Everything one status frame shows.
#[derive(Clone, Debug)]
pub struct StatusView<'a> {
    pub category: &'a str,
    pub elapsed: Duration,
    pub activity: ActivitySnapshot,
    pub counters: Vec<(CounterId, u64)>,
    pub host: Option<HostSnapshot>,
}

/// Renders a status frame. Only reads the published memory scalar, never the pool.
pub fn render_status(view: &StatusView<'_>) -> Result<String, std::fmt::Error> {
    let a = &view.activity;
    let mut out = String::new();

    writeln!(out, "Workload Publisher - RUNNING")?;
    writeln!(out, "Runtime: {}", format_elapsed(view.elapsed))?;
    writeln!(out, "{}", "=".repeat(51))?;
    writeln!(out)?;

    writeln!(out, "ACTIVITY STATISTICS:")?;
    writeln!(out, "   Total API Calls:     {}", group_thousands(a.api_calls))?;
    writeln!(out, "   Total Disk Writes:   {}", group_thousands(a.disk_writes))?;
    writeln!(out, "   Bytes Written:       {}", group_thousands(a.bytes_written))?;
    writeln!(out, "   Memory Allocated:    {} MB", group_thousands(a.memory_mb()))?;
    writeln!(out, "   CPU Tasks Started:   {}", group_thousands(a.cpu_tasks_started))?;
    writeln!(out, "   CPU Operations:      {}", group_thousands(a.cpu_operations_completed))?;
    writeln!(out, "   Active Tasks:        {}", a.active_tasks)?;
    writeln!(out, "   Total Errors:        {}", a.errors)?;
    writeln!(out)?;

    writeln!(out, "PUBLISHED COUNTERS ('{}'):", view.category)?;
    for (id, value) in &view.counters {
        writeln!(out, "   {:<28} {}", id.name(), group_thousands(*value))?;
    }
    writeln!(out)?;

    if let Some(host) = &view.host {
        writeln!(out, "HOST:")?;
        writeln!(out, "   Total CPU Usage:     {:.1} %", host.cpu_percent)?;
        writeln!(
            out,
            "   Available Memory:    {} MB",
            group_thousands(host.available_memory_bytes / MIB as u64)
        )?;
        for disk in &host.disks {
            writeln!(
                out,
                "   Disk {}:  {} / {} MB free ({:.1} % used)",
                disk.mount_point,
                group_thousands(disk.available_bytes / MIB as u64),
                group_thousands(disk.total_bytes / MIB as u64),
                disk.used_percent()
            )?;
        }
        match &host.network {
            Some(net) => match (net.bytes_per_sec, net.packets_per_sec) {
                (Some(bps), Some(pps)) => writeln!(
                    out,
                    "   Network ({}):  {:.2} KB/s, {:.1} packets/s",
                    net.interface,
                    bps / 1024.0,
                    pps
                )?,
                _ => writeln!(out, "   Network ({}):  sampling...", net.interface)?,
            },
            None => writeln!(out, "   Network:             Not Available")?,
        }
        writeln!(out)?;
    }

    writeln!(out, "VIEW THE COUNTERS:")?;
    writeln!(out, "   1. Open your monitoring tool's counter browser")?;
    writeln!(out, "   2. Find the '{}' category", view.category)?;
    writeln!(out, "   3. Add the counters listed above")?;
    writeln!(out)?;
    write!(out, "Press Ctrl+C to stop...")?;

    Ok(out)
}

/// `mm:ss`, minutes keep counting past an hour.
pub fn format_elapsed(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    format!("{:02}:{:02}", secs / 60, secs % 60)
}

/// `1234567` → `1,234,567`.
pub fn group_thousands(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

/// Prints a status frame to stdout every `every` until `cancel` fires.
pub async fn run_reporter(
    ctx: EngineContext,
    every: Duration,
    mut host: Option<HostSampler>,
    cancel: CancellationToken,
) {
    let started = Instant::now();
    let mut ticker = interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    info!(every_ms = every.as_millis() as u64, "reporter started");

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let view = StatusView {
            category: ctx.counters.category(),
            elapsed: started.elapsed(),
            activity: ctx.activity.snapshot(),
            counters: ctx.counters.values(),
            host: host.as_mut().map(HostSampler::sample),
        };

        let frame = match render_status(&view) {
            Ok(frame) => frame,
            Err(e) => {
                warn!(error = %e, "status rendering failed");
                continue;
            }
        };

        if let Err(e) = print_frame(&frame) {
            warn!(error = %e, "status display failed");
        }
    }

    info!("reporter stopped");
}

fn print_frame(frame: &str) -> std::io::Result<()> {
    write_frame(&mut std::io::stdout().lock(), frame)
}

/// Clears the terminal, homes the cursor and writes `frame`.
fn write_frame<W: std::io::Write>(out: &mut W, frame: &str) -> std::io::Result<()> {
    writeln!(out, "\x1b[2J\x1b[H{frame}")?;
    out.flush()
}
