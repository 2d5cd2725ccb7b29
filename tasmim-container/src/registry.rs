//! Service registry: named service definitions and their shared instances.
//!
//! Each name maps to a definition [`Value`] (an object, or a lazy value
//! producing one) and a cell holding the instance once it is created.

use std::fmt;

use indexmap::IndexMap;
use once_cell::sync::OnceCell;
use tracing::{debug, trace};

use crate::error::Result;
use crate::value::{Instance, Value};

/// Get-or-create access to named services.
///
/// This is what service lazies see. Separated from the container so the
/// resolver does not depend on it.
pub trait ServiceLocator: Send + Sync {
    fn has(&self, name: &str) -> bool;

    /// Returns the shared instance, creating it on first access.
    fn get(&self, name: &str) -> Result<Instance>;
}

/// Registration entry for a single service.
pub(crate) struct ServiceEntry {
    definition: Value,
    instance: OnceCell<Instance>,
}

impl ServiceEntry {
    pub fn definition(&self) -> &Value {
        &self.definition
    }

    pub fn instance(&self) -> Option<&Instance> {
        self.instance.get()
    }

    /// Returns the instance, running `create` if there is none yet.
    ///
    /// `create` runs at most once per entry, even with concurrent callers.
    pub fn get_or_try_init(&self, create: impl FnOnce() -> Result<Instance>) -> Result<&Instance> {
        self.instance.get_or_try_init(create)
    }
}

impl fmt::Debug for ServiceEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceEntry")
            .field("definition", &self.definition)
            .field("instantiated", &self.instance.get().is_some())
            .finish()
    }
}

/// Stores all service definitions, in registration order.
#[derive(Debug, Default)]
pub(crate) struct ServiceRegistry {
    entries: IndexMap<String, ServiceEntry>,
}

impl ServiceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a definition, replacing any earlier one under `name`
    /// together with its instance.
    pub fn register(&mut self, name: &str, definition: Value) {
        let replaced = self
            .entries
            .insert(
                name.to_string(),
                ServiceEntry {
                    definition,
                    instance: OnceCell::new(),
                },
            )
            .is_some();

        debug!(service = name, replaced, "Registered service");
    }

    pub fn get(&self, name: &str) -> Option<&ServiceEntry> {
        let entry = self.entries.get(name);
        trace!(service = name, found = entry.is_some(), "Service lookup");
        entry
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Names of services whose instance has been created.
    pub fn instantiated(&self) -> impl Iterator<Item = &str> {
        self.entries
            .iter()
            .filter(|(_, entry)| entry.instance().is_some())
            .map(|(name, _)| name.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}
