pub mod aggregator;
pub mod config;
pub mod context;
pub mod counters;
pub mod error;
pub mod generators;
pub mod host;
pub mod lifecycle;
pub mod metrics;
pub mod reporter;

pub use lifecycle::{Publisher, RunSummary};

/// Bytes per mebibyte; memory counters are published in whole MiB.
pub const MIB: usize = 1024 * 1024;
