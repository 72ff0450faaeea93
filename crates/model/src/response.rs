use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The status of a run, as reported by the service.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RunStatus {
    /// The run is queued or still being processed.
    InProgress,
    /// The run is paused until the outputs of its tool calls are submitted.
    RequiresAction,
    /// The run has finished successfully.
    Completed,
    /// The run has ended without completing, with a human-readable reason.
    Failed(String),
}

impl RunStatus {
    /// Returns `true` if the run will not change anymore.
    #[inline]
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunStatus::Completed | RunStatus::Failed(_))
    }
}

/// Describes a tool call request from the assistant.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ToolCallRequest {
    /// The unique identifier for the tool call request.
    pub id: String,
    /// The name of the tool to call.
    pub name: String,
    /// The arguments to pass to the tool, usually a JSON object.
    pub arguments: Value,
}

/// A snapshot of a run.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Run {
    /// The identifier of the run.
    pub id: String,
    /// The current status.
    pub status: RunStatus,
    /// Tool calls waiting for outputs. Only non-empty when the status is
    /// [`RunStatus::RequiresAction`].
    pub tool_calls: Vec<ToolCallRequest>,
}

/// Who authored a message in a conversation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageRole {
    /// Authored locally.
    User,
    /// Authored by the assistant.
    Assistant,
}

/// A message stored in a conversation.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConversationMessage {
    /// The identifier of the message.
    pub id: String,
    /// The author.
    pub role: MessageRole,
    /// Text parts of the message, in order.
    pub texts: Vec<String>,
    /// Key-value pairs stored along with the message.
    pub metadata: BTreeMap<String, String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_status() {
        assert!(!RunStatus::InProgress.is_terminal());
        assert!(!RunStatus::RequiresAction.is_terminal());
        assert!(RunStatus::Completed.is_terminal());
        assert!(RunStatus::Failed("expired".to_owned()).is_terminal());
    }
}
