use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Local, NaiveDate, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::{Generator, uniform_delay};
use crate::context::EngineContext;
use crate::counters::{RateCounter, ValueCounter};
use crate::error::OperationError;

const DELAY_MS: std::ops::Range<u64> = 1_000..4_000;
const SLOW_WRITE: Duration = Duration::from_millis(250);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Debug,
    Info,
    Warn,
    Error,
}

impl Severity {
    const ALL: [Severity; 4] = [
        Severity::Debug,
        Severity::Info,
        Severity::Warn,
        Severity::Error,
    ];
}

#[derive(Clone, Debug, Serialize)]
pub struct RecordData {
    pub value: u32,
    pub status: &'static str,
}

/// One synthetic application log record.
#[derive(Clone, Debug, Serialize)]
pub struct LogRecord {
    pub timestamp: DateTime<Utc>,
    pub level: Severity,
    pub message: String,
    pub data: RecordData,
}

impl LogRecord {
    pub fn random<R: Rng + ?Sized>(rng: &mut R) -> Self {
        Self {
            timestamp: Utc::now(),
            level: Severity::ALL[rng.gen_range(0..Severity::ALL.len())],
            message: format!("Sample log message {}", rng.gen_range(1_000..10_000)),
            data: RecordData {
                value: rng.gen_range(1..100),
                status: "Active",
            },
        }
    }

    /// Compact JSON terminated by a newline.
    pub fn to_line(&self) -> Result<Vec<u8>, OperationError> {
        let mut line = serde_json::to_vec(self)?;
        line.push(b'\n');
        Ok(line)
    }
}

/// Append-only destination with one file per local calendar day.
#[derive(Clone, Debug)]
pub struct DailyLogSink {
    dir: PathBuf,
}

impl DailyLogSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, date: NaiveDate) -> PathBuf {
        self.dir.join(format!("app-{}.log", date.format("%Y-%m-%d")))
    }

    pub fn today(&self) -> PathBuf {
        self.path_for(Local::now().date_naive())
    }

    pub async fn append(&self, line: &[u8]) -> Result<(), OperationError> {
        tokio::fs::create_dir_all(&self.dir).await?;

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.today())
            .await?;
        file.write_all(line).await?;
        file.flush().await?;
        Ok(())
    }
}

pub struct StorageWriteGenerator {
    ctx: EngineContext,
    sink: DailyLogSink,
    rng: StdRng,
}

impl StorageWriteGenerator {
    pub fn new(ctx: EngineContext, sink: DailyLogSink) -> Self {
        Self {
            ctx,
            sink,
            rng: StdRng::from_entropy(),
        }
    }
}

#[async_trait]
impl Generator for StorageWriteGenerator {
    fn name(&self) -> &'static str {
        "storage_writes"
    }

    async fn iterate(&mut self, cancel: &CancellationToken) -> Result<(), OperationError> {
        let activity = &self.ctx.activity;
        let _task = activity.begin_task();

        let line = LogRecord::random(&mut self.rng).to_line()?;

        let write = common::logger::warn_if_slow("storage_append", SLOW_WRITE, self.sink.append(&line));
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(OperationError::Cancelled),
            res = write => res?,
        }

        let total = activity.record_write(line.len() as u64);
        self.ctx.counters.increment(RateCounter::DiskWrites)?;
        self.ctx.counters.set(ValueCounter::DiskBytesWritten, total)?;

        debug!(bytes = line.len(), total, "record appended");
        Ok(())
    }

    fn next_delay(&mut self) -> Duration {
        uniform_delay(&mut self.rng, DELAY_MS)
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;

    use super::*;

    #[test]
    fn record_line_is_single_line_json() {
        let mut rng = StdRng::seed_from_u64(17);
        let line = LogRecord::random(&mut rng).to_line().unwrap();

        assert_eq!(line.last(), Some(&b'\n'));
        assert_eq!(line.iter().filter(|b| **b == b'\n').count(), 1);

        let v: serde_json::Value = serde_json::from_slice(&line).unwrap();
        assert!(v["message"].as_str().unwrap().starts_with("Sample log message "));
        assert_eq!(v["data"]["status"], "Active");
        assert!(["DEBUG", "INFO", "WARN", "ERROR"].contains(&v["level"].as_str().unwrap()));
    }

    #[test]
    fn one_file_per_day() {
        let sink = DailyLogSink::new("/tmp/records");
        let day = NaiveDate::from_ymd_opt(2024, 3, 9).unwrap();

        assert_eq!(
            sink.path_for(day),
            PathBuf::from("/tmp/records/app-2024-03-09.log")
        );
        assert_ne!(sink.path_for(day), sink.path_for(day.succ_opt().unwrap()));
    }

    #[tokio::test]
    async fn append_accumulates_lines() {
        let dir = tempfile::tempdir().unwrap();
        let sink = DailyLogSink::new(dir.path().join("nested"));

        sink.append(b"first\n").await.unwrap();
        sink.append(b"second\n").await.unwrap();

        let content = std::fs::read_to_string(sink.today()).unwrap();
        assert_eq!(content, "first\nsecond\n");
    }
}
