//! Scheduler registry: the ordered set of active decision listeners.
//!
//! Registration order matters twice: it is the tie-break order in
//! reduction, and it is the order listeners are reported in. The list is
//! copy-on-write, so a broadcast works on the snapshot it started with
//! while `register`/`unregister` publish a new one.

use loopevents_config::SchedulerSettings;
use loopevents_core::error::SchedulerError;
use loopevents_core::scheduler::SchedulerRegistration;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::catalog::SchedulerCatalog;

/// Holds scheduler registrations in registration order.
pub struct SchedulerRegistry {
    entries: RwLock<Arc<Vec<SchedulerRegistration>>>,
}

impl SchedulerRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(Arc::new(Vec::new())),
        }
    }

    /// Build a registry from an initial list, applying the same duplicate-id
    /// rule as [`register`](Self::register).
    pub fn with_registrations(registrations: impl IntoIterator<Item = SchedulerRegistration>) -> Self {
        let mut entries: Vec<SchedulerRegistration> = Vec::new();
        for registration in registrations {
            upsert(&mut entries, registration);
        }
        Self {
            entries: RwLock::new(Arc::new(entries)),
        }
    }

    /// Build a registry from configured scheduler settings.
    ///
    /// Disabled entries are skipped. An unknown module or a failing factory
    /// aborts construction: a misconfigured session should not start.
    pub fn from_settings(
        settings: &[SchedulerSettings],
        catalog: &SchedulerCatalog,
    ) -> Result<Self, SchedulerError> {
        let mut registrations = Vec::new();
        for entry in settings.iter().filter(|s| s.enabled) {
            registrations.push(catalog.build(entry)?);
        }
        info!(count = registrations.len(), "Scheduler registry built from configuration");
        Ok(Self::with_registrations(registrations))
    }

    /// Register a scheduler.
    ///
    /// A duplicate id replaces the prior entry in its original slot, so the
    /// replacement keeps the tie-break rank of the entry it replaced.
    pub async fn register(&self, registration: SchedulerRegistration) {
        let mut guard = self.entries.write().await;
        let mut next = guard.as_ref().clone();
        let id = registration.id.clone();
        let replaced = upsert(&mut next, registration);
        *guard = Arc::new(next);
        debug!(scheduler = %id, replaced, "Scheduler registered");
    }

    /// Remove a scheduler. Returns whether it was registered.
    pub async fn unregister(&self, id: &str) -> bool {
        let mut guard = self.entries.write().await;
        if !guard.iter().any(|r| r.id == id) {
            return false;
        }
        let next: Vec<_> = guard.iter().filter(|r| r.id != id).cloned().collect();
        *guard = Arc::new(next);
        debug!(scheduler = %id, "Scheduler unregistered");
        true
    }

    /// The current registrations, in registration order.
    ///
    /// The returned snapshot is unaffected by later mutation.
    pub async fn snapshot(&self) -> Arc<Vec<SchedulerRegistration>> {
        self.entries.read().await.clone()
    }

    /// Owned copy of the current registrations, in registration order.
    pub async fn list(&self) -> Vec<SchedulerRegistration> {
        self.snapshot().await.as_ref().clone()
    }

    /// Registered ids, in registration order.
    pub async fn ids(&self) -> Vec<String> {
        self.snapshot().await.iter().map(|r| r.id.clone()).collect()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

impl Default for SchedulerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Insert or replace in place. Returns true when an entry was replaced.
fn upsert(entries: &mut Vec<SchedulerRegistration>, registration: SchedulerRegistration) -> bool {
    match entries.iter_mut().find(|r| r.id == registration.id) {
        Some(slot) => {
            *slot = registration;
            true
        }
        None => {
            entries.push(registration);
            false
        }
    }
}
