use std::pin::Pin;

use autoassist_model::ToolDescriptor;
use serde_json::{Map, Value};

use super::{Error, Tool, ToolResult};

pub(crate) type BoxedToolFuture =
    Pin<Box<dyn Future<Output = ToolResult> + Send>>;

/// The type-erased form of a [`Tool`], as stored in the registry.
pub(crate) trait ToolObject: Send + Sync + 'static {
    fn name(&self) -> &str;

    fn descriptor(&self) -> ToolDescriptor;

    fn invoke(&self, arguments: Value) -> BoxedToolFuture;
}

pub(crate) struct ToolObjectImpl<T: Tool>(pub T);

impl<T: Tool> ToolObject for ToolObjectImpl<T> {
    #[inline]
    fn name(&self) -> &str {
        self.0.name()
    }

    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor {
            name: self.0.name().to_owned(),
            description: self.0.description().trim().to_owned(),
            parameters: self.0.parameter_schema().clone(),
        }
    }

    fn invoke(&self, arguments: Value) -> BoxedToolFuture {
        // Services may omit the arguments of parameterless tools.
        let arguments = match arguments {
            Value::Null => Value::Object(Map::new()),
            arguments => arguments,
        };
        let input: T::Input = match serde_json::from_value(arguments) {
            Ok(input) => input,
            Err(err) => {
                let reason = format!("{err}");
                return Box::pin(std::future::ready(ToolResult::Err(
                    Error::invalid_input().with_reason(reason),
                )));
            }
        };
        Box::pin(self.0.execute(input))
    }
}
