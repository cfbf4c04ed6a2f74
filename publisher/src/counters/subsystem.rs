//! Boundary to the counter subsystem that makes published values visible to
//! external monitoring tools.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use tracing::{debug, info};

use super::catalog::CounterSpec;
use crate::error::SubsystemError;

/// Writable handle to one counter inside a category.
pub trait CounterHandle: Send + Sync {
    fn set_raw(&self, value: u64) -> Result<(), SubsystemError>;
    fn increment(&self) -> Result<(), SubsystemError>;
    fn raw(&self) -> u64;
}

/// Category registration and counter lookup.
pub trait CounterSubsystem: Send + Sync {
    fn category_exists(&self, name: &str) -> bool;

    fn delete_category(&self, name: &str) -> Result<(), SubsystemError>;

    fn create_category(
        &self,
        name: &str,
        help: &str,
        single_instance: bool,
        specs: &[CounterSpec],
    ) -> Result<(), SubsystemError>;

    fn open_counter(
        &self,
        category: &str,
        counter: &str,
    ) -> Result<Arc<dyn CounterHandle>, SubsystemError>;
}

/// Atomic cell backing one in-process counter.
#[derive(Debug, Default)]
pub struct AtomicCounter {
    value: AtomicU64,
}

impl CounterHandle for AtomicCounter {
    fn set_raw(&self, value: u64) -> Result<(), SubsystemError> {
        self.value.store(value, Ordering::Relaxed);
        Ok(())
    }

    fn increment(&self) -> Result<(), SubsystemError> {
        self.value.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn raw(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }
}

#[derive(Debug)]
struct Category {
    counters: HashMap<String, Arc<AtomicCounter>>,
}

/// In-memory counter subsystem.
///
/// Holds categories for the life of the process. With `deny_creation` every
/// create/delete is rejected the way an unprivileged caller would be.
#[derive(Debug, Default)]
pub struct InProcessCounterSubsystem {
    categories: Mutex<HashMap<String, Category>>,
    deny_creation: bool,
}

impl InProcessCounterSubsystem {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn deny_creation() -> Self {
        Self {
            categories: Mutex::new(HashMap::new()),
            deny_creation: true,
        }
    }

    /// Current raw values of a category, keyed by counter name.
    pub fn read_category(&self, name: &str) -> Option<HashMap<String, u64>> {
        let categories = self.categories.lock();
        categories.get(name).map(|c| {
            c.counters
                .iter()
                .map(|(k, v)| (k.clone(), v.raw()))
                .collect()
        })
    }

    fn check_privilege(&self, op: &str, name: &str) -> Result<(), SubsystemError> {
        if self.deny_creation {
            return Err(SubsystemError::AccessDenied(format!(
                "{op} of category '{name}' requires elevated privileges"
            )));
        }
        Ok(())
    }
}

impl CounterSubsystem for InProcessCounterSubsystem {
    fn category_exists(&self, name: &str) -> bool {
        self.categories.lock().contains_key(name)
    }

    fn delete_category(&self, name: &str) -> Result<(), SubsystemError> {
        self.check_privilege("delete", name)?;

        match self.categories.lock().remove(name) {
            Some(_) => {
                info!(category = %name, "counter category deleted");
                Ok(())
            }
            None => Err(SubsystemError::CategoryNotFound(name.to_string())),
        }
    }

    fn create_category(
        &self,
        name: &str,
        help: &str,
        single_instance: bool,
        specs: &[CounterSpec],
    ) -> Result<(), SubsystemError> {
        self.check_privilege("creation", name)?;

        let counters = specs
            .iter()
            .map(|s| (s.name.to_string(), Arc::new(AtomicCounter::default())))
            .collect();

        self.categories
            .lock()
            .insert(name.to_string(), Category { counters });

        debug!(
            category = %name,
            help,
            single_instance,
            counters = specs.len(),
            "counter category created"
        );
        Ok(())
    }

    fn open_counter(
        &self,
        category: &str,
        counter: &str,
    ) -> Result<Arc<dyn CounterHandle>, SubsystemError> {
        let categories = self.categories.lock();
        let cat = categories
            .get(category)
            .ok_or_else(|| SubsystemError::CategoryNotFound(category.to_string()))?;

        let handle = cat
            .counters
            .get(counter)
            .cloned()
            .ok_or_else(|| SubsystemError::CounterNotFound {
                category: category.to_string(),
                counter: counter.to_string(),
            })?;

        Ok(handle)
    }
}
