use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Describes a tool that can be called by the assistant.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ToolDescriptor {
    /// Name of the tool.
    pub name: String,
    /// Description of the tool.
    pub description: String,
    /// Parameters definition of the tool.
    ///
    /// For most services, the parameters should typically be defined by a
    /// [JSON schema](https://json-schema.org/).
    pub parameters: Value,
}

/// A tool that is implemented by the service itself.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HostedTool {
    /// Searching the attached knowledge stores.
    FileSearch,
    /// Running code in a sandbox provided by the service.
    CodeInterpreter,
}

/// The stored configuration of an assistant.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AssistantProfile {
    /// Display name of the assistant.
    pub name: String,
    /// Short description of the assistant.
    pub description: String,
    /// The system instructions.
    pub instructions: String,
    /// The model that runs the assistant.
    pub model: String,
    /// Tools provided by the service.
    pub hosted_tools: Vec<HostedTool>,
    /// Tools implemented locally and called through tool call requests.
    pub tools: Vec<ToolDescriptor>,
    /// Knowledge stores attached to the assistant.
    pub knowledge_store_ids: Vec<String>,
}

/// A user message to append to a conversation.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct NewMessage {
    /// The text content.
    pub content: String,
    /// Extra key-value pairs stored along with the message.
    pub metadata: BTreeMap<String, String>,
}

/// The output of one tool call, sent back to the service.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ToolOutput {
    /// The identifier of the tool call request this output answers.
    pub tool_call_id: String,
    /// The output text.
    pub output: String,
}
