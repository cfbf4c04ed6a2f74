use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tracing::{info, instrument, warn};

use super::catalog::{CounterId, RateCounter, ValueCounter};
use super::subsystem::{CounterHandle, CounterSubsystem};
use crate::error::{OperationError, ProvisioningError};

/// Delays applied after category delete/create so the subsystem can settle.
#[derive(Clone, Copy, Debug)]
pub struct SettleDelays {
    pub after_delete: Duration,
    pub after_create: Duration,
}

impl SettleDelays {
    pub const NONE: SettleDelays = SettleDelays {
        after_delete: Duration::ZERO,
        after_create: Duration::ZERO,
    };
}

/// Process-wide table of open counter handles for one category.
///
/// Provisioned and released by the lifecycle controller; shared by every task
/// for value mutation in between. Rate counters can only be incremented and
/// value counters only set, which the `RateCounter`/`ValueCounter` split
/// enforces at compile time.
pub struct CounterRegistry {
    category: String,
    handles: RwLock<HashMap<CounterId, Arc<dyn CounterHandle>>>,
}

impl CounterRegistry {
    pub fn new(category: impl Into<String>) -> Self {
        Self {
            category: category.into(),
            handles: RwLock::new(HashMap::new()),
        }
    }

    pub fn category(&self) -> &str {
        &self.category
    }

    /// Creates (or recreates) the category and opens every counter at 0.
    ///
    /// On failure any handle opened so far is released before returning.
    #[instrument(skip(self, subsystem, help, settle), fields(category = %self.category))]
    pub async fn provision(
        &self,
        subsystem: &dyn CounterSubsystem,
        help: &str,
        settle: SettleDelays,
    ) -> Result<(), ProvisioningError> {
        let result = self.try_provision(subsystem, help, settle).await;
        if result.is_err() {
            self.release();
        }
        result
    }

    async fn try_provision(
        &self,
        subsystem: &dyn CounterSubsystem,
        help: &str,
        settle: SettleDelays,
    ) -> Result<(), ProvisioningError> {
        let category = self.category.as_str();
        let fail = |e| ProvisioningError::from_subsystem(category, e);

        if subsystem.category_exists(category) {
            warn!("counter category already exists; deleting and recreating");
            subsystem.delete_category(category).map_err(fail)?;
            tokio::time::sleep(settle.after_delete).await;
        }

        subsystem
            .create_category(category, help, true, &CounterId::specs())
            .map_err(fail)?;
        tokio::time::sleep(settle.after_create).await;

        for id in CounterId::ALL {
            let handle = subsystem.open_counter(category, id.name()).map_err(fail)?;
            handle.set_raw(0).map_err(fail)?;
            self.handles.write().insert(id, handle);
        }

        info!(counters = CounterId::ALL.len(), "counter category provisioned");
        Ok(())
    }

    pub fn increment(&self, counter: RateCounter) -> Result<(), OperationError> {
        self.handle(counter.into()).increment()?;
        Ok(())
    }

    pub fn set(&self, counter: ValueCounter, value: u64) -> Result<(), OperationError> {
        self.handle(counter.into()).set_raw(value)?;
        Ok(())
    }

    /// Current raw value, or `None` when the registry holds no handle.
    pub fn value(&self, id: impl Into<CounterId>) -> Option<u64> {
        self.handles.read().get(&id.into()).map(|h| h.raw())
    }

    pub fn values(&self) -> Vec<(CounterId, u64)> {
        let handles = self.handles.read();
        CounterId::ALL
            .iter()
            .filter_map(|id| handles.get(id).map(|h| (*id, h.raw())))
            .collect()
    }

    pub fn is_provisioned(&self) -> bool {
        self.handles.read().len() == CounterId::ALL.len()
    }

    /// Drops every open handle. Idempotent and safe after partial provisioning.
    pub fn release(&self) {
        let released = {
            let mut handles = self.handles.write();
            let n = handles.len();
            handles.clear();
            n
        };

        if released > 0 {
            info!(category = %self.category, released, "counter handles released");
        }
    }

    fn handle(&self, id: CounterId) -> Arc<dyn CounterHandle> {
        match self.handles.read().get(&id) {
            Some(h) => Arc::clone(h),
            None => panic!(
                "counter '{id}' in category '{}' mutated while not provisioned",
                self.category
            ),
        }
    }
}
