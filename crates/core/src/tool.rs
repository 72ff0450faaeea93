//! Tool call supports.

mod error;
mod module;
mod object;
mod registry;

use serde::de::DeserializeOwned;
use serde_json::Value;

pub use error::{Error, ErrorKind};
pub use module::ToolModule;
pub use registry::{CollisionPolicy, FunctionRegistry, RegistryError};

/// The result of a tool call.
///
/// An `Ok` value with an empty string is a valid result, it tells the
/// assistant that the tool has nothing to report.
pub type ToolResult = Result<String, Error>;

/// A tool that can be called by the assistant.
///
/// Implementations of this trait should be stateless, and may not maintain
/// any internal state.
///
/// The tool can be context-aware, meaning it can access additional
/// information about the current execution context, such as the directory
/// it stores files in. To do this, make the context an immutable state of
/// the tool, which can be set during initialization, and copy it when
/// executing.
pub trait Tool: Send + Sync + 'static {
    /// The type of input that the tool accepts.
    ///
    /// The parameter schema should describe exactly this type, usually by
    /// deriving it from the type itself.
    type Input: DeserializeOwned;

    /// Returns the name of the tool.
    fn name(&self) -> &str;

    /// Returns the description of the tool.
    fn description(&self) -> &str;

    /// Returns the parameter schema of the tool.
    fn parameter_schema(&self) -> &Value;

    /// Executes the tool with the given input.
    ///
    /// This method must return a future that is fully independent of
    /// `self`, and the future should be cancellation safe.
    fn execute(
        &self,
        input: Self::Input,
    ) -> impl Future<Output = ToolResult> + Send + 'static;
}
