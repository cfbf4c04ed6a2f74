use std::fmt;

/// How an external consumer interprets a counter's raw value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CounterKind {
    /// Increment-only; the consumer derives a per-second rate.
    RateOfEvents,
    /// Overwrite-only; latest sample.
    InstantaneousValue,
    /// Overwrite-only; running total.
    CumulativeValue,
    /// Overwrite-only; ratio expressed as a percentage.
    Fraction,
}

/// Static definition handed to the subsystem when the category is created.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CounterSpec {
    pub name: &'static str,
    pub help: &'static str,
    pub kind: CounterKind,
}

/// Counters that may only be incremented.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RateCounter {
    ApiCalls,
    DiskWrites,
    CpuTasks,
}

/// Counters that may only be overwritten.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ValueCounter {
    ApiResponseTime,
    DiskBytesWritten,
    MemoryUsage,
    ActiveTasks,
    ErrorRate,
    CpuOperationsCompleted,
    AverageCalculationTime,
}

/// Any published counter.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CounterId {
    Rate(RateCounter),
    Value(ValueCounter),
}

impl From<RateCounter> for CounterId {
    fn from(c: RateCounter) -> Self {
        CounterId::Rate(c)
    }
}

impl From<ValueCounter> for CounterId {
    fn from(c: ValueCounter) -> Self {
        CounterId::Value(c)
    }
}

impl CounterId {
    /// Every counter in the category, in display order.
    pub const ALL: [CounterId; 10] = [
        CounterId::Rate(RateCounter::ApiCalls),
        CounterId::Value(ValueCounter::ApiResponseTime),
        CounterId::Rate(RateCounter::DiskWrites),
        CounterId::Value(ValueCounter::DiskBytesWritten),
        CounterId::Value(ValueCounter::MemoryUsage),
        CounterId::Value(ValueCounter::ActiveTasks),
        CounterId::Value(ValueCounter::ErrorRate),
        CounterId::Rate(RateCounter::CpuTasks),
        CounterId::Value(ValueCounter::CpuOperationsCompleted),
        CounterId::Value(ValueCounter::AverageCalculationTime),
    ];

    pub fn spec(self) -> CounterSpec {
        use CounterKind::*;

        let (name, help, kind) = match self {
            CounterId::Rate(RateCounter::ApiCalls) => {
                ("API Calls/sec", "Number of API calls per second", RateOfEvents)
            }
            CounterId::Value(ValueCounter::ApiResponseTime) => (
                "Average API Response Time",
                "Response time of the latest API call in milliseconds",
                InstantaneousValue,
            ),
            CounterId::Rate(RateCounter::DiskWrites) => (
                "Disk Writes/sec",
                "Number of disk write operations per second",
                RateOfEvents,
            ),
            CounterId::Value(ValueCounter::DiskBytesWritten) => {
                ("Disk Bytes Written", "Total bytes written to disk", CumulativeValue)
            }
            CounterId::Value(ValueCounter::MemoryUsage) => (
                "Memory Usage (MB)",
                "Current memory usage in megabytes",
                InstantaneousValue,
            ),
            CounterId::Value(ValueCounter::ActiveTasks) => (
                "Active Background Tasks",
                "Number of currently active background tasks",
                InstantaneousValue,
            ),
            CounterId::Value(ValueCounter::ErrorRate) => (
                "Error Rate %",
                "Percentage of operations that resulted in errors",
                Fraction,
            ),
            CounterId::Rate(RateCounter::CpuTasks) => (
                "CPU Tasks/sec",
                "Number of CPU-intensive tasks started per second",
                RateOfEvents,
            ),
            CounterId::Value(ValueCounter::CpuOperationsCompleted) => (
                "CPU Operations Completed",
                "Total number of CPU-intensive operations completed",
                CumulativeValue,
            ),
            CounterId::Value(ValueCounter::AverageCalculationTime) => (
                "Average Calculation Time",
                "Duration of the latest CPU calculation in milliseconds",
                InstantaneousValue,
            ),
        };

        CounterSpec { name, help, kind }
    }

    pub fn name(self) -> &'static str {
        self.spec().name
    }

    pub fn kind(self) -> CounterKind {
        self.spec().kind
    }

    pub fn specs() -> Vec<CounterSpec> {
        Self::ALL.iter().map(|id| id.spec()).collect()
    }
}

impl fmt::Display for CounterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
