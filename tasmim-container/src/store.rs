//! Configuration store.
//!
//! Holds what application setup code says about types, keyed by plain
//! type/interface/mixin names:
//! - `params[type][name-or-position]` constructor overrides
//! - `setters[type][method]` setter calls
//! - `mutations[type]` ordered post-construction steps
//! - `values[key]` named values, independent of any type
//! - `types[type]` values used by auto-resolution for typed params
//!
//! Entries are only ever added or overwritten.

use std::collections::HashMap;
use std::fmt;

use indexmap::IndexMap;
use tracing::debug;

use crate::error::{Result, TasmimError};
use crate::key::ParamKey;
use crate::value::Value;

/// Pure storage for explicit configuration.
#[derive(Clone, Default)]
pub struct ConfigStore {
    params: HashMap<String, IndexMap<ParamKey, Value>>,
    setters: HashMap<String, IndexMap<String, Value>>,
    mutations: HashMap<String, Vec<Value>>,
    values: HashMap<String, Value>,
    types: HashMap<String, Value>,
}

impl ConfigStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a constructor parameter override for `class`.
    ///
    /// ```
    /// use tasmim_container::store::ConfigStore;
    ///
    /// let mut store = ConfigStore::new();
    /// store.set_param("Mailer", "host", "smtp.local");
    /// store.set_param("Mailer", 1, 587);
    ///
    /// assert_eq!(store.params("Mailer").map(|p| p.len()), Some(2));
    /// ```
    pub fn set_param(&mut self, class: &str, key: impl Into<ParamKey>, value: impl Into<Value>) {
        let key = key.into();
        debug!(class, param = %key, "Configured param");
        self.params_mut(class).insert(key, value.into());
    }

    /// Sets a setter call for `class` (or an interface or mixin name).
    pub fn set_setter(&mut self, class: &str, method: &str, value: impl Into<Value>) {
        debug!(class, method, "Configured setter");
        self.setters_mut(class).insert(method.to_string(), value.into());
    }

    /// Appends a mutation step for `class` (or an interface or mixin name).
    pub fn add_mutation(&mut self, class: &str, mutation: impl Into<Value>) {
        debug!(class, "Configured mutation");
        self.mutations_mut(class).push(mutation.into());
    }

    /// Sets a named value.
    pub fn set_value(&mut self, key: &str, value: impl Into<Value>) {
        debug!(key, "Configured value");
        self.values.insert(key.to_string(), value.into());
    }

    /// Sets the value auto-resolution uses for params declared as `type_name`.
    pub fn set_type(&mut self, type_name: &str, value: impl Into<Value>) {
        debug!(type_name, "Configured type value");
        self.types.insert(type_name.to_string(), value.into());
    }

    pub fn params(&self, class: &str) -> Option<&IndexMap<ParamKey, Value>> {
        self.params.get(class)
    }

    pub fn setters(&self, class: &str) -> Option<&IndexMap<String, Value>> {
        self.setters.get(class)
    }

    pub fn mutations(&self, class: &str) -> &[Value] {
        self.mutations.get(class).map_or(&[], Vec::as_slice)
    }

    /// Looks up a named value.
    ///
    /// # Errors
    /// [`TasmimError::UnknownConfigurationKey`] if `key` was never set.
    pub fn value(&self, key: &str) -> Result<&Value> {
        self.values
            .get(key)
            .ok_or_else(|| TasmimError::UnknownConfigurationKey { key: key.to_string() })
    }

    pub fn has_value(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn type_value(&self, type_name: &str) -> Option<&Value> {
        self.types.get(type_name)
    }

    /// Direct access to the param map for `class`, created on demand.
    pub fn params_mut(&mut self, class: &str) -> &mut IndexMap<ParamKey, Value> {
        self.params.entry(class.to_string()).or_default()
    }

    /// Direct access to the setter map for `class`, created on demand.
    pub fn setters_mut(&mut self, class: &str) -> &mut IndexMap<String, Value> {
        self.setters.entry(class.to_string()).or_default()
    }

    /// Direct access to the mutation list for `class`, created on demand.
    pub fn mutations_mut(&mut self, class: &str) -> &mut Vec<Value> {
        self.mutations.entry(class.to_string()).or_default()
    }

    pub fn values_mut(&mut self) -> &mut HashMap<String, Value> {
        &mut self.values
    }

    pub fn types_mut(&mut self) -> &mut HashMap<String, Value> {
        &mut self.types
    }
}

impl fmt::Debug for ConfigStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfigStore")
            .field("params", &self.params.len())
            .field("setters", &self.setters.len())
            .field("mutations", &self.mutations.len())
            .field("values", &self.values.len())
            .field("types", &self.types.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn params_keep_insertion_order_and_overwrite() {
        let mut store = ConfigStore::new();
        store.set_param("Mailer", "host", "a");
        store.set_param("Mailer", 0, "b");
        store.set_param("Mailer", "host", "c");

        let params = store.params("Mailer").unwrap();
        let keys: Vec<_> = params.keys().cloned().collect();
        assert_eq!(keys, vec![ParamKey::from("host"), ParamKey::from(0)]);
        assert_eq!(params[&ParamKey::from("host")], Value::from("c"));
    }

    #[test]
    fn mutations_append() {
        let mut store = ConfigStore::new();
        store.add_mutation("Mailer", "first");
        store.add_mutation("Mailer", "second");
        assert_eq!(store.mutations("Mailer"), &[Value::from("first"), Value::from("second")]);
        assert!(store.mutations("Other").is_empty());
    }

    #[test]
    fn unknown_value_key() {
        let store = ConfigStore::new();
        match store.value("db.host").unwrap_err() {
            TasmimError::UnknownConfigurationKey { key } => assert_eq!(key, "db.host"),
            other => panic!("Expected UnknownConfigurationKey, got: {other:?}"),
        }
    }

    #[test]
    fn values_and_types() {
        let mut store = ConfigStore::new();
        store.set_value("db.host", "localhost");
        store.set_type("Clock", "system");
        assert!(store.has_value("db.host"));
        assert_eq!(store.value("db.host").unwrap(), &Value::from("localhost"));
        assert_eq!(store.type_value("Clock"), Some(&Value::from("system")));
    }

    #[test]
    fn setters_overwrite_in_place() {
        let mut store = ConfigStore::new();
        store.set_setter("Mailer", "setA", 1);
        store.set_setter("Mailer", "setB", 2);
        store.set_setter("Mailer", "setA", 3);

        let setters = store.setters("Mailer").unwrap();
        assert_eq!(setters.keys().collect::<Vec<_>>(), vec!["setA", "setB"]);
        assert_eq!(setters["setA"], Value::Int(3));
    }
}
