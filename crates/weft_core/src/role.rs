//! Named roles
//!
//! A role maps a name to a factory building a behavior [`Chain`]. Variants
//! of a component (a different part inside a list, a different popup kind)
//! are swapped by registering another factory under the same name.

use std::fmt;
use std::rc::Rc;

use rustc_hash::FxHashMap;

use crate::behavior::Chain;
use crate::component::Component;
use crate::error::RuntimeError;
use crate::runtime::Runtime;

/// Builds the behavior chain of a role
pub type RoleFactory = Rc<dyn Fn() -> Chain>;

#[derive(Clone, Default)]
pub struct RoleRegistry {
    roles: FxHashMap<String, RoleFactory>,
}

impl RoleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `factory` under `name`, replacing any previous factory
    pub fn register<F>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn() -> Chain + 'static,
    {
        self.roles.insert(name.into(), Rc::new(factory));
    }

    pub fn resolve(&self, name: &str) -> Option<RoleFactory> {
        self.roles.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.roles.contains_key(name)
    }

    /// Build a component playing `name`
    pub fn create(&self, name: &str, runtime: &mut Runtime) -> Result<Component, RuntimeError> {
        let factory = self
            .roles
            .get(name)
            .ok_or_else(|| RuntimeError::UnknownRole(name.to_string()))?;
        Ok(runtime.create(factory()))
    }
}

impl fmt::Debug for RoleRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&str> = self.roles.keys().map(String::as_str).collect();
        names.sort_unstable();
        f.debug_struct("RoleRegistry").field("roles", &names).finish()
    }
}
