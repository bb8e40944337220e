//! Scheduler catalog: maps configured module names to constructors.
//!
//! There is no dynamic loading here. The embedder registers a factory for
//! every scheduler implementation it links in, and the registry asks the
//! catalog to turn each configured entry into a registration.

use loopevents_config::SchedulerSettings;
use loopevents_core::error::SchedulerError;
use loopevents_core::scheduler::{Scheduler, SchedulerRegistration};
use std::collections::HashMap;
use std::sync::Arc;

type Factory = Box<
    dyn Fn(&SchedulerSettings) -> Result<Arc<dyn Scheduler>, SchedulerError> + Send + Sync,
>;

/// Constructors for scheduler implementations, keyed by module name.
#[derive(Default)]
pub struct SchedulerCatalog {
    factories: HashMap<String, Factory>,
}

impl SchedulerCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a constructor for `module`. Replaces any previous one.
    pub fn register<F>(&mut self, module: impl Into<String>, factory: F)
    where
        F: Fn(&SchedulerSettings) -> Result<Arc<dyn Scheduler>, SchedulerError>
            + Send
            + Sync
            + 'static,
    {
        self.factories.insert(module.into(), Box::new(factory));
    }

    pub fn contains(&self, module: &str) -> bool {
        self.factories.contains_key(module)
    }

    /// Known module names, sorted.
    pub fn modules(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.factories.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }

    /// Instantiate one configured scheduler.
    pub fn build(&self, settings: &SchedulerSettings) -> Result<SchedulerRegistration, SchedulerError> {
        let factory = self
            .factories
            .get(&settings.module)
            .ok_or_else(|| SchedulerError::UnknownModule(settings.module.clone()))?;
        let scheduler = factory(settings)?;
        Ok(SchedulerRegistration::new(&settings.id, scheduler).with_config(settings.config.clone()))
    }
}
