//! The execution context passed through one workflow run.

use super::ContextValue;
use crate::errors::{ContextError, DataConflictError};
use std::collections::HashMap;
use std::fmt::Write as _;

/// Ordered key-value store shared by all stages of one workflow run.
///
/// Inserting an existing key raises a `DataConflictError`. The context is
/// owned by the orchestrator that runs the operation and is handed to stages
/// as `&mut`, so it never needs interior locking.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExecutionContext {
    entries: HashMap<String, ContextValue>,
    /// Insertion order of keys.
    order: Vec<String>,
    preserve_insertion_order: bool,
}

impl ExecutionContext {
    /// Creates a new empty context.
    ///
    /// With `preserve_insertion_order` the context iterates in insertion
    /// order; otherwise it iterates sorted by key.
    #[must_use]
    pub fn new(preserve_insertion_order: bool) -> Self {
        Self {
            entries: HashMap::new(),
            order: Vec::new(),
            preserve_insertion_order,
        }
    }

    /// Returns true if iteration follows insertion order.
    #[must_use]
    pub const fn preserves_insertion_order(&self) -> bool {
        self.preserve_insertion_order
    }

    /// Inserts a value.
    ///
    /// # Errors
    ///
    /// Returns `DataConflictError` if the key already exists.
    pub fn insert(
        &mut self,
        key: impl Into<String>,
        value: impl Into<ContextValue>,
    ) -> Result<(), DataConflictError> {
        let key = key.into();

        if self.entries.contains_key(&key) {
            return Err(DataConflictError::new(key));
        }

        self.order.push(key.clone());
        self.entries.insert(key, value.into());
        Ok(())
    }

    /// Gets a value.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&ContextValue> {
        self.entries.get(key)
    }

    /// Checks if a key exists.
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    fn require(&self, key: &str) -> Result<&ContextValue, ContextError> {
        self.entries.get(key).ok_or_else(|| ContextError::missing(key))
    }

    /// Gets a string value.
    ///
    /// # Errors
    ///
    /// Returns `ContextError` if the key is absent or not a string.
    pub fn get_str(&self, key: &str) -> Result<&str, ContextError> {
        let value = self.require(key)?;
        value
            .as_str()
            .ok_or_else(|| ContextError::type_mismatch(key, "string", value.kind()))
    }

    /// Gets an integer value.
    ///
    /// # Errors
    ///
    /// Returns `ContextError` if the key is absent or not an integer.
    pub fn get_int(&self, key: &str) -> Result<i64, ContextError> {
        let value = self.require(key)?;
        value
            .as_int()
            .ok_or_else(|| ContextError::type_mismatch(key, "int", value.kind()))
    }

    /// Gets a boolean value.
    ///
    /// # Errors
    ///
    /// Returns `ContextError` if the key is absent or not a boolean.
    pub fn get_bool(&self, key: &str) -> Result<bool, ContextError> {
        let value = self.require(key)?;
        value
            .as_bool()
            .ok_or_else(|| ContextError::type_mismatch(key, "bool", value.kind()))
    }

    /// Gets a list value.
    ///
    /// # Errors
    ///
    /// Returns `ContextError` if the key is absent or not a list.
    pub fn get_list(&self, key: &str) -> Result<&[ContextValue], ContextError> {
        let value = self.require(key)?;
        value
            .as_list()
            .ok_or_else(|| ContextError::type_mismatch(key, "list", value.kind()))
    }

    /// Gets a mutable list value, for stages that accumulate results.
    ///
    /// # Errors
    ///
    /// Returns `ContextError` if the key is absent or not a list.
    pub fn get_list_mut(&mut self, key: &str) -> Result<&mut Vec<ContextValue>, ContextError> {
        match self.entries.get_mut(key) {
            Some(ContextValue::List(items)) => Ok(items),
            Some(other) => Err(ContextError::type_mismatch(key, "list", other.kind())),
            None => Err(ContextError::missing(key)),
        }
    }

    /// Gets a nested context.
    ///
    /// # Errors
    ///
    /// Returns `ContextError` if the key is absent or not a map.
    pub fn get_map(&self, key: &str) -> Result<&Self, ContextError> {
        let value = self.require(key)?;
        value
            .as_map()
            .ok_or_else(|| ContextError::type_mismatch(key, "map", value.kind()))
    }

    /// Returns the keys in iteration order.
    #[must_use]
    pub fn keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self.order.iter().map(String::as_str).collect();
        if !self.preserve_insertion_order {
            keys.sort_unstable();
        }
        keys
    }

    /// Iterates over entries in iteration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ContextValue)> + '_ {
        self.keys()
            .into_iter()
            .filter_map(move |key| self.entries.get_key_value(key))
            .map(|(key, value)| (key.as_str(), value))
    }

    /// Returns the number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the context is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Renders every entry as a `key = value` line.
    #[must_use]
    pub fn dump(&self) -> String {
        let mut out = String::new();
        for (key, value) in self.iter() {
            let _ = writeln!(out, "{key} = {value}");
        }
        out
    }

    /// Logs every entry at debug level.
    pub fn list(&self) {
        tracing::debug!(entries = self.len(), "Execution context");
        for (key, value) in self.iter() {
            tracing::debug!(key, value = %value, "Context entry");
        }
    }
}
