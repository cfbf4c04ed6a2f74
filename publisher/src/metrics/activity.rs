use std::sync::atomic::{AtomicU64, Ordering};

/// Totals and gauges shared by every generator, the aggregator and the reporter.
///
/// Each field is mutated through a single atomic add/sub; nothing here does
/// read-then-write across fields.
#[derive(Debug, Default)]
pub struct ActivityState {
    api_calls: AtomicU64,
    disk_writes: AtomicU64,
    bytes_written: AtomicU64,
    errors: AtomicU64,
    cpu_tasks_started: AtomicU64,
    cpu_operations_completed: AtomicU64,

    // gauges
    active_tasks: AtomicU64,
    memory_bytes: AtomicU64,
}

/// Point-in-time copy of [`ActivityState`] for display and aggregation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ActivitySnapshot {
    pub api_calls: u64,
    pub disk_writes: u64,
    pub bytes_written: u64,
    pub errors: u64,
    pub cpu_tasks_started: u64,
    pub cpu_operations_completed: u64,
    pub active_tasks: u64,
    pub memory_bytes: u64,
}

impl ActivitySnapshot {
    /// Operations that count toward the error rate.
    pub fn total_operations(&self) -> u64 {
        self.api_calls
            .saturating_add(self.disk_writes)
            .saturating_add(self.cpu_tasks_started)
    }

    pub fn memory_mb(&self) -> u64 {
        self.memory_bytes / crate::MIB as u64
    }
}

impl ActivityState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raises the active-task gauge until the returned guard is dropped.
    #[must_use = "dropping the guard immediately ends the task"]
    pub fn begin_task(&self) -> ActiveTaskGuard<'_> {
        self.active_tasks.fetch_add(1, Ordering::AcqRel);
        ActiveTaskGuard { state: self }
    }

    pub fn active_tasks(&self) -> u64 {
        self.active_tasks.load(Ordering::Acquire)
    }

    pub fn record_api_call(&self) {
        self.api_calls.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Counts one write of `bytes` and returns the new bytes-written total.
    pub fn record_write(&self, bytes: u64) -> u64 {
        self.disk_writes.fetch_add(1, Ordering::Relaxed);
        self.bytes_written.fetch_add(bytes, Ordering::Relaxed) + bytes
    }

    pub fn record_cpu_task_started(&self) {
        self.cpu_tasks_started.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns the new completed-operations total.
    pub fn record_cpu_operation_completed(&self) -> u64 {
        self.cpu_operations_completed.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Memory-pool occupancy computed by its owner after each mutation.
    pub fn publish_memory_bytes(&self, bytes: u64) {
        self.memory_bytes.store(bytes, Ordering::Release);
    }

    pub fn snapshot(&self) -> ActivitySnapshot {
        ActivitySnapshot {
            api_calls: self.api_calls.load(Ordering::Relaxed),
            disk_writes: self.disk_writes.load(Ordering::Relaxed),
            bytes_written: self.bytes_written.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
            cpu_tasks_started: self.cpu_tasks_started.load(Ordering::Relaxed),
            cpu_operations_completed: self.cpu_operations_completed.load(Ordering::Relaxed),
            active_tasks: self.active_tasks.load(Ordering::Acquire),
            memory_bytes: self.memory_bytes.load(Ordering::Acquire),
        }
    }
}

/// Decrements the active-task gauge exactly once, on drop.
///
/// Covers the success, error, cancellation and panic paths alike.
#[derive(Debug)]
pub struct ActiveTaskGuard<'a> {
    state: &'a ActivityState,
}

impl Drop for ActiveTaskGuard<'_> {
    fn drop(&mut self) {
        self.state.active_tasks.fetch_sub(1, Ordering::AcqRel);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use proptest::prelude::*;

    use super::*;

    #[test]
    fn guard_pairs_increment_with_decrement() {
        let state = ActivityState::new();
        {
            let _a = state.begin_task();
            let _b = state.begin_task();
            assert_eq!(state.active_tasks(), 2);
        }
        assert_eq!(state.active_tasks(), 0);
    }

    #[test]
    fn guard_decrements_on_panic() {
        let state = Arc::new(ActivityState::new());
        let s = Arc::clone(&state);

        let result = std::panic::catch_unwind(move || {
            let _g = s.begin_task();
            panic!("boom");
        });

        assert!(result.is_err());
        assert_eq!(state.active_tasks(), 0);
    }

    #[test]
    fn write_returns_running_total() {
        let state = ActivityState::new();

        assert_eq!(state.record_write(100), 100);
        assert_eq!(state.record_write(50), 150);

        let snap = state.snapshot();
        assert_eq!(snap.disk_writes, 2);
        assert_eq!(snap.bytes_written, 150);
    }

    #[test]
    fn total_operations_excludes_completions_and_errors() {
        let state = ActivityState::new();
        state.record_api_call();
        state.record_write(10);
        state.record_cpu_task_started();
        state.record_cpu_operation_completed();
        state.record_error();

        assert_eq!(state.snapshot().total_operations(), 3);
    }

    #[test]
    fn memory_mb_rounds_down() {
        let state = ActivityState::new();
        state.publish_memory_bytes(5 * crate::MIB as u64 + 1_000);
        assert_eq!(state.snapshot().memory_mb(), 5);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn gauge_settles_to_zero_under_concurrency() {
        let state = Arc::new(ActivityState::new());

        let mut tasks = Vec::new();
        for i in 0..16u64 {
            let state = Arc::clone(&state);
            tasks.push(tokio::spawn(async move {
                for j in 0..100u64 {
                    let _g = state.begin_task();
                    if (i + j) % 3 == 0 {
                        state.record_error();
                    }
                    tokio::task::yield_now().await;
                }
            }));
        }
        for t in tasks {
            t.await.unwrap();
        }

        assert_eq!(state.active_tasks(), 0);
    }

    proptest! {
        #[test]
        fn gauge_never_underflows(ops in proptest::collection::vec(any::<bool>(), 0..64)) {
            let state = ActivityState::new();
            let mut guards = Vec::new();

            for begin in ops {
                if begin {
                    guards.push(state.begin_task());
                } else {
                    guards.pop();
                }
                prop_assert_eq!(state.active_tasks(), guards.len() as u64);
            }

            drop(guards);
            prop_assert_eq!(state.active_tasks(), 0);
        }
    }
}
