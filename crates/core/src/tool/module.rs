use std::fmt::{self, Debug};
use std::sync::Arc;

use super::object::{ToolObject, ToolObjectImpl};
use super::Tool;

/// A named group of tools that is installed into a
/// [`FunctionRegistry`](super::FunctionRegistry) as a whole.
pub struct ToolModule {
    name: String,
    pub(crate) tools: Vec<Arc<dyn ToolObject>>,
}

impl ToolModule {
    /// Creates an empty module.
    #[inline]
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self {
            name: name.into(),
            tools: vec![],
        }
    }

    /// Adds a tool to the module.
    #[inline]
    pub fn with_tool<T: Tool>(mut self, tool: T) -> Self {
        self.tools.push(Arc::new(ToolObjectImpl(tool)));
        self
    }

    /// Returns the name of the module.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the names of the tools in this module, in insertion order.
    pub fn tool_names(&self) -> Vec<&str> {
        self.tools.iter().map(|tool| tool.name()).collect()
    }
}

impl Debug for ToolModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolModule")
            .field("name", &self.name)
            .field("tools", &self.tool_names())
            .finish()
    }
}
