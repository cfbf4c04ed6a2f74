//! CPU-bound workloads used to manufacture variable, size-dependent latency.
//!
//! Every workload is synchronous and meant to run on a blocking worker. The
//! returned checksum only exists so the optimizer cannot drop the work.

pub mod fibonacci;
pub mod kind;
pub mod matrix;
pub mod prime;
pub mod sort;

pub use kind::{Workload, WorkloadKind};
