pub mod catalog;
pub mod registry;
pub mod subsystem;

pub use catalog::{CounterId, CounterKind, CounterSpec, RateCounter, ValueCounter};
pub use registry::{CounterRegistry, SettleDelays};
pub use subsystem::{CounterHandle, CounterSubsystem, InProcessCounterSubsystem};
