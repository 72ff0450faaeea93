use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::fmt::{self, Debug};
use std::sync::Arc;

use autoassist_model::ToolDescriptor;
use serde::{Deserialize, Serialize};

use super::ToolModule;
use super::object::ToolObject;

/// What to do when a module provides a tool whose name is already taken.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum CollisionPolicy {
    /// The tool loaded last replaces the earlier one, and a warning is
    /// logged.
    #[default]
    Replace,
    /// Registering the module fails.
    Reject,
}

/// The error returned when a module cannot be registered.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// A tool with the same name is already registered.
    #[error("tool `{name}` from module `{module}` is already registered")]
    DuplicateTool {
        /// Name of the tool.
        name: String,
        /// Name of the module that tried to register it again.
        module: String,
    },
}

/// An addressable table of all tools available to the assistant.
///
/// Tools are installed module by module at startup. The registry keeps the
/// load order, so the descriptors advertised to the service are stable
/// across runs.
#[derive(Default)]
pub struct FunctionRegistry {
    tools: HashMap<String, Arc<dyn ToolObject>>,
    order: Vec<String>,
    policy: CollisionPolicy,
}

impl FunctionRegistry {
    /// Creates an empty registry with the given collision policy.
    #[inline]
    pub fn with_policy(policy: CollisionPolicy) -> Self {
        Self {
            policy,
            ..Default::default()
        }
    }

    /// Installs all tools of a module.
    ///
    /// With [`CollisionPolicy::Reject`], nothing from the module is
    /// installed if any of its names collides.
    pub fn register_module(
        &mut self,
        module: ToolModule,
    ) -> Result<(), RegistryError> {
        if self.policy == CollisionPolicy::Reject {
            let mut seen = Vec::with_capacity(module.tools.len());
            for tool in &module.tools {
                let name = tool.name();
                if self.tools.contains_key(name) || seen.contains(&name) {
                    return Err(RegistryError::DuplicateTool {
                        name: name.to_owned(),
                        module: module.name().to_owned(),
                    });
                }
                seen.push(name);
            }
        }

        debug!(
            "registering module `{}` with tools {:?}",
            module.name(),
            module.tool_names()
        );
        let module_name = module.name().to_owned();
        for tool in module.tools {
            let name = tool.name().to_owned();
            match self.tools.entry(name) {
                Entry::Occupied(mut entry) => {
                    warn!(
                        "tool `{}` is redefined by module `{module_name}`, \
                         the earlier definition is replaced",
                        entry.key()
                    );
                    entry.insert(tool);
                }
                Entry::Vacant(entry) => {
                    self.order.push(entry.key().clone());
                    entry.insert(tool);
                }
            }
        }
        Ok(())
    }

    /// Returns the descriptors of all tools, in load order.
    pub fn descriptors(&self) -> Vec<ToolDescriptor> {
        self.order
            .iter()
            .filter_map(|name| self.tools.get(name))
            .map(|tool| tool.descriptor())
            .collect()
    }

    /// Returns the names of all tools, in load order.
    #[inline]
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    /// Returns `true` if a tool with the name is registered.
    #[inline]
    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Returns the number of registered tools.
    #[inline]
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Returns `true` if no tool is registered.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    #[inline]
    pub(crate) fn lookup(&self, name: &str) -> Option<&Arc<dyn ToolObject>> {
        self.tools.get(name)
    }
}

impl Debug for FunctionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionRegistry")
            .field("tools", &self.order)
            .field("policy", &self.policy)
            .finish()
    }
}
