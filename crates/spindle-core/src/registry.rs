//! TaskFunctionRegistry - name → task function mapping with a default alias.
//!
//! Entries live in an arena keyed by a stable `EntryId`; names (including
//! the reserved `"default"`) map to ids. "Is this name the default?" is an
//! id comparison, never a function identity check.
//!
//! Invariants:
//! - at least one entry is registered;
//! - `"default"` always points at an entry that also has a concrete name.

use std::collections::HashMap;

use crate::domain::{
    DEFAULT_TASK_NAME, TaskFunction, TaskFunctionObject, TaskFunctionProperties,
};
use crate::error::SpindleError;
use crate::validation::{check_task_function_name, check_valid_task_function_object_entry};

type EntryId = u64;

pub struct TaskFunctionRegistry {
    entries: HashMap<EntryId, TaskFunctionObject>,
    /// Insertion order; an overwrite keeps the original position.
    names: Vec<(String, EntryId)>,
    next_id: EntryId,
}

impl TaskFunctionRegistry {
    fn empty() -> Self {
        Self {
            entries: HashMap::new(),
            names: Vec::new(),
            next_id: 0,
        }
    }

    /// One function registered as both `"default"` and its derived name.
    pub fn from_single(task_function: TaskFunction) -> Result<Self, SpindleError> {
        let name = task_function.derived_name();
        Self::from_named(vec![(name, TaskFunctionObject::new(task_function))])
    }

    /// A record of named entries; the first one also becomes the default.
    ///
    /// A later entry with an already-seen name overwrites the earlier one.
    pub fn from_named(
        task_functions: Vec<(String, TaskFunctionObject)>,
    ) -> Result<Self, SpindleError> {
        if task_functions.is_empty() {
            return Err(SpindleError::EmptyRegistry);
        }
        let mut registry = Self::empty();
        for (name, entry) in task_functions {
            if name == DEFAULT_TASK_NAME {
                return Err(SpindleError::ReservedName(name));
            }
            if registry.is_empty() {
                check_valid_task_function_object_entry(&name, &entry)?;
                let id = registry.insert_entry(entry);
                registry.names.push((DEFAULT_TASK_NAME.to_string(), id));
                registry.names.push((name, id));
            } else {
                registry.add(&name, entry)?;
            }
        }
        Ok(registry)
    }

    fn insert_entry(&mut self, entry: TaskFunctionObject) -> EntryId {
        let id = self.next_id;
        self.next_id += 1;
        self.entries.insert(id, entry);
        id
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|(n, _)| n == name)
    }

    fn id_of(&self, name: &str) -> Option<EntryId> {
        self.names
            .iter()
            .find_map(|(n, id)| (n == name).then_some(*id))
    }

    fn default_id(&self) -> Option<EntryId> {
        self.id_of(DEFAULT_TASK_NAME)
    }

    /// Point `name` at `id`; returns the id it pointed at before.
    fn bind(&mut self, name: String, id: EntryId) -> Option<EntryId> {
        let previous = match self.position(&name) {
            Some(pos) => Some(std::mem::replace(&mut self.names[pos].1, id)),
            None => {
                self.names.push((name, id));
                None
            }
        };
        if let Some(old) = previous {
            self.collect(old);
        }
        previous
    }

    /// Drop an entry no name refers to anymore.
    fn collect(&mut self, id: EntryId) {
        if !self.names.iter().any(|(_, bound)| *bound == id) {
            self.entries.remove(&id);
        }
    }

    pub fn get(&self, name: &str) -> Option<&TaskFunctionObject> {
        self.id_of(name).and_then(|id| self.entries.get(&id))
    }

    pub fn has(&self, name: &str) -> Result<bool, SpindleError> {
        check_task_function_name(name)?;
        Ok(self.id_of(name).is_some())
    }

    /// Register or overwrite `name`.
    ///
    /// If `name` was the concrete alias of the default, the default follows
    /// it to the new entry.
    pub fn add(&mut self, name: &str, entry: TaskFunctionObject) -> Result<(), SpindleError> {
        check_task_function_name(name)?;
        if name == DEFAULT_TASK_NAME {
            return Err(SpindleError::ReservedName(name.to_string()));
        }
        check_valid_task_function_object_entry(name, &entry)?;

        let aliased_default = self.id_of(name).is_some() && self.id_of(name) == self.default_id();
        let id = self.insert_entry(entry);
        if aliased_default {
            self.bind(DEFAULT_TASK_NAME.to_string(), id);
        }
        self.bind(name.to_string(), id);
        Ok(())
    }

    pub fn remove(&mut self, name: &str) -> Result<(), SpindleError> {
        check_task_function_name(name)?;
        if name == DEFAULT_TASK_NAME {
            return Err(SpindleError::ProtectedEntry {
                name: name.to_string(),
                reason: "it is the reserved default name",
            });
        }
        let Some(pos) = self.position(name) else {
            return Err(SpindleError::TaskFunctionNotFound(name.to_string()));
        };
        let id = self.names[pos].1;
        if Some(id) == self.default_id() {
            return Err(SpindleError::ProtectedEntry {
                name: name.to_string(),
                reason: "it is used as the default task function",
            });
        }
        self.names.remove(pos);
        self.collect(id);
        Ok(())
    }

    pub fn set_default(&mut self, name: &str) -> Result<(), SpindleError> {
        check_task_function_name(name)?;
        if name == DEFAULT_TASK_NAME {
            return Err(SpindleError::ReservedName(name.to_string()));
        }
        let Some(id) = self.id_of(name) else {
            return Err(SpindleError::TaskFunctionNotFound(name.to_string()));
        };
        self.bind(DEFAULT_TASK_NAME.to_string(), id);
        Ok(())
    }

    /// Concrete name the default currently aliases.
    pub fn default_name(&self) -> Option<&str> {
        let default_id = self.default_id()?;
        self.names
            .iter()
            .find(|(n, id)| n != DEFAULT_TASK_NAME && *id == default_id)
            .map(|(n, _)| n.as_str())
    }

    /// `[default, its concrete alias, ...rest in insertion order]`.
    pub fn list_properties(&self) -> Vec<TaskFunctionProperties> {
        let default_name = self.default_name().unwrap_or(DEFAULT_TASK_NAME);
        let mut listed = Vec::with_capacity(self.names.len());
        if let Some(entry) = self.get(DEFAULT_TASK_NAME) {
            listed.push(entry.properties(DEFAULT_TASK_NAME));
        }
        if default_name != DEFAULT_TASK_NAME
            && let Some(entry) = self.get(default_name)
        {
            listed.push(entry.properties(default_name));
        }
        listed.extend(
            self.names
                .iter()
                .filter(|(n, _)| n != DEFAULT_TASK_NAME && n != default_name)
                .filter_map(|(n, id)| self.entries.get(id).map(|e| e.properties(n))),
        );
        listed
    }

    /// Number of names, the default alias included.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}
