use std::sync::Arc;

use crate::counters::CounterRegistry;
use crate::metrics::ActivityState;

/// Handles every long-running task shares.
#[derive(Clone)]
pub struct EngineContext {
    pub activity: Arc<ActivityState>,
    pub counters: Arc<CounterRegistry>,
}

impl EngineContext {
    pub fn new(category: impl Into<String>) -> Self {
        Self {
            activity: Arc::new(ActivityState::new()),
            counters: Arc::new(CounterRegistry::new(category)),
        }
    }
}
