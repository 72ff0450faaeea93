use std::collections::BTreeMap;

use autoassist_model::{
    AssistantProfile, ConversationMessage, HostedTool, MessageRole,
    NewMessage, Run, RunStatus, ToolCallRequest, ToolDescriptor, ToolOutput,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

// ------------------------------
// Types received from the server
// ------------------------------

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct Object {
    pub id: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct Deleted {
    pub deleted: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct ErrorDetail {
    pub message: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    #[serde(default)]
    pub arguments: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct RunToolCall {
    pub id: String,
    pub function: FunctionCall,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct SubmitToolOutputsAction {
    pub tool_calls: Vec<RunToolCall>,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct RequiredAction {
    pub submit_tool_outputs: Option<SubmitToolOutputsAction>,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct LastError {
    pub code: Option<String>,
    pub message: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct IncompleteDetails {
    pub reason: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct RunObject {
    pub id: String,
    pub status: String,
    pub required_action: Option<RequiredAction>,
    pub last_error: Option<LastError>,
    pub incomplete_details: Option<IncompleteDetails>,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct Text {
    pub value: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MessageContent {
    Text {
        text: Text,
    },
    #[serde(other)]
    Other,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct MessageObject {
    pub id: String,
    pub role: String,
    pub content: Vec<MessageContent>,
    #[serde(default)]
    pub metadata: Option<BTreeMap<String, String>>,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct MessageList {
    pub data: Vec<MessageObject>,
    #[serde(default)]
    pub has_more: bool,
    pub last_id: Option<String>,
}

// ------------------------
// Types sent to the server
// ------------------------

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CreateVectorStoreRequest {
    pub name: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
struct FunctionTool {
    name: String,
    description: String,
    parameters: Value,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum Tool {
    FileSearch,
    CodeInterpreter,
    Function { function: FunctionTool },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
struct FileSearchResources {
    vector_store_ids: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
struct ToolResources {
    file_search: FileSearchResources,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct AssistantRequest {
    name: String,
    description: String,
    instructions: String,
    model: String,
    tools: Vec<Tool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_resources: Option<ToolResources>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CreateMessageRequest {
    role: &'static str,
    content: String,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    metadata: BTreeMap<String, String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CreateRunRequest {
    pub assistant_id: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SubmitToolOutputsRequest {
    pub tool_outputs: Vec<ToolOutput>,
}

// -----------
// Conversions
// -----------

pub fn create_assistant_request(
    profile: &AssistantProfile,
) -> AssistantRequest {
    let hosted = profile.hosted_tools.iter().map(|tool| match tool {
        HostedTool::FileSearch => Tool::FileSearch,
        HostedTool::CodeInterpreter => Tool::CodeInterpreter,
    });
    let functions = profile.tools.iter().map(create_tool);
    let tool_resources = if profile.knowledge_store_ids.is_empty() {
        None
    } else {
        Some(ToolResources {
            file_search: FileSearchResources {
                vector_store_ids: profile.knowledge_store_ids.clone(),
            },
        })
    };
    AssistantRequest {
        name: profile.name.clone(),
        description: profile.description.clone(),
        instructions: profile.instructions.clone(),
        model: profile.model.clone(),
        tools: hosted.chain(functions).collect(),
        tool_resources,
    }
}

#[inline]
fn create_tool(tool: &ToolDescriptor) -> Tool {
    Tool::Function {
        function: FunctionTool {
            name: tool.name.clone(),
            description: tool.description.clone(),
            parameters: tool.parameters.clone(),
        },
    }
}

#[inline]
pub fn create_message_request(message: &NewMessage) -> CreateMessageRequest {
    CreateMessageRequest {
        role: "user",
        content: message.content.clone(),
        metadata: message.metadata.clone(),
    }
}

pub fn run_from_object(run: RunObject) -> Run {
    let status = match run.status.as_str() {
        "queued" | "in_progress" | "cancelling" => RunStatus::InProgress,
        "requires_action" => RunStatus::RequiresAction,
        "completed" => RunStatus::Completed,
        other => RunStatus::Failed(failure_reason(other, &run)),
    };
    let tool_calls = match (&status, run.required_action) {
        (RunStatus::RequiresAction, Some(action)) => action
            .submit_tool_outputs
            .map(|outputs| outputs.tool_calls)
            .unwrap_or_default()
            .into_iter()
            .map(|call| ToolCallRequest {
                id: call.id,
                name: call.function.name,
                arguments: parse_arguments(&call.function.arguments),
            })
            .collect(),
        _ => vec![],
    };
    Run {
        id: run.id,
        status,
        tool_calls,
    }
}

fn failure_reason(status: &str, run: &RunObject) -> String {
    if let Some(LastError { code, message }) = &run.last_error {
        match (code, message) {
            (Some(code), Some(message)) => {
                return format!("{status}: {code}: {message}");
            }
            (None, Some(detail)) | (Some(detail), None) => {
                return format!("{status}: {detail}");
            }
            (None, None) => {}
        }
    }
    if let Some(IncompleteDetails {
        reason: Some(reason),
    }) = &run.incomplete_details
    {
        return format!("{status}: {reason}");
    }
    status.to_owned()
}

/// Arguments arrive as a JSON document in a string.
///
/// Empty arguments mean a parameterless call. Anything that is not valid
/// JSON is passed on as a plain string, so the tool reports it as invalid
/// input.
pub fn parse_arguments(arguments: &str) -> Value {
    if arguments.trim().is_empty() {
        return Value::Object(Default::default());
    }
    serde_json::from_str(arguments)
        .unwrap_or_else(|_| Value::String(arguments.to_owned()))
}

pub fn message_from_object(message: MessageObject) -> ConversationMessage {
    let role = if message.role == "assistant" {
        MessageRole::Assistant
    } else {
        MessageRole::User
    };
    let texts = message
        .content
        .into_iter()
        .filter_map(|content| match content {
            MessageContent::Text { text } => Some(text.value),
            MessageContent::Other => None,
        })
        .collect();
    ConversationMessage {
        id: message.id,
        role,
        texts,
        metadata: message.metadata.unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_create_assistant_request() {
        let profile = AssistantProfile {
            name: "Autonomous Assistant".to_owned(),
            description: "Plans and executes tasks.".to_owned(),
            instructions: "OBJECTIVE:\nWrite.".to_owned(),
            model: "gpt-4o-mini".to_owned(),
            hosted_tools: vec![
                HostedTool::FileSearch,
                HostedTool::CodeInterpreter,
            ],
            tools: vec![ToolDescriptor {
                name: "sleep".to_owned(),
                description: "Waits.".to_owned(),
                parameters: json!({ "type": "object" }),
            }],
            knowledge_store_ids: vec!["vs_1".to_owned()],
        };

        let request = serde_json::to_value(create_assistant_request(&profile))
            .unwrap();
        assert_eq!(
            request,
            json!({
                "name": "Autonomous Assistant",
                "description": "Plans and executes tasks.",
                "instructions": "OBJECTIVE:\nWrite.",
                "model": "gpt-4o-mini",
                "tools": [
                    { "type": "file_search" },
                    { "type": "code_interpreter" },
                    {
                        "type": "function",
                        "function": {
                            "name": "sleep",
                            "description": "Waits.",
                            "parameters": { "type": "object" }
                        }
                    }
                ],
                "tool_resources": {
                    "file_search": { "vector_store_ids": ["vs_1"] }
                }
            })
        );
    }

    #[test]
    fn test_run_requiring_action() {
        let run: RunObject = serde_json::from_value(json!({
            "id": "run_1",
            "object": "thread.run",
            "status": "requires_action",
            "required_action": {
                "type": "submit_tool_outputs",
                "submit_tool_outputs": {
                    "tool_calls": [
                        {
                            "id": "call_1",
                            "type": "function",
                            "function": {
                                "name": "read_file",
                                "arguments":
                                    "{\"folder\":\"a\",\"filename\":\"b\"}"
                            }
                        },
                        {
                            "id": "call_2",
                            "type": "function",
                            "function": {
                                "name": "list_folders",
                                "arguments": ""
                            }
                        },
                        {
                            "id": "call_3",
                            "type": "function",
                            "function": {
                                "name": "sleep",
                                "arguments": "{oops"
                            }
                        }
                    ]
                }
            },
            "last_error": null
        }))
        .unwrap();

        let run = run_from_object(run);
        assert_eq!(run.status, RunStatus::RequiresAction);
        assert_eq!(
            run.tool_calls
                .iter()
                .map(|call| call.arguments.clone())
                .collect::<Vec<_>>(),
            [
                json!({ "folder": "a", "filename": "b" }),
                json!({}),
                json!("{oops"),
            ]
        );
    }

    #[test]
    fn test_run_status() {
        let status = |value: Value| {
            run_from_object(serde_json::from_value(value).unwrap()).status
        };

        assert_eq!(
            status(json!({ "id": "run_1", "status": "queued" })),
            RunStatus::InProgress
        );
        assert_eq!(
            status(json!({ "id": "run_1", "status": "cancelling" })),
            RunStatus::InProgress
        );
        assert_eq!(
            status(json!({ "id": "run_1", "status": "completed" })),
            RunStatus::Completed
        );
        assert_eq!(
            status(json!({
                "id": "run_1",
                "status": "failed",
                "last_error": {
                    "code": "rate_limit_exceeded",
                    "message": "Quota exceeded."
                }
            })),
            RunStatus::Failed(
                "failed: rate_limit_exceeded: Quota exceeded.".to_owned()
            )
        );
        assert_eq!(
            status(json!({
                "id": "run_1",
                "status": "incomplete",
                "incomplete_details": { "reason": "max_completion_tokens" }
            })),
            RunStatus::Failed("incomplete: max_completion_tokens".to_owned())
        );
        assert_eq!(
            status(json!({ "id": "run_1", "status": "expired" })),
            RunStatus::Failed("expired".to_owned())
        );
    }

    #[test]
    fn test_message_from_object() {
        let list: MessageList = serde_json::from_value(json!({
            "object": "list",
            "data": [
                {
                    "id": "msg_1",
                    "role": "user",
                    "content": [
                        {
                            "type": "text",
                            "text": { "value": "Hi", "annotations": [] }
                        }
                    ],
                    "metadata": { "timestamp": "2024-05-17 09:03:27.042" }
                },
                {
                    "id": "msg_2",
                    "role": "assistant",
                    "content": [
                        {
                            "type": "image_file",
                            "image_file": { "file_id": "file_1" }
                        },
                        {
                            "type": "text",
                            "text": { "value": "Hello", "annotations": [] }
                        }
                    ],
                    "metadata": {}
                }
            ],
            "first_id": "msg_1",
            "last_id": "msg_2",
            "has_more": false
        }))
        .unwrap();
        assert!(!list.has_more);

        let messages: Vec<_> =
            list.data.into_iter().map(message_from_object).collect();
        assert_eq!(messages[0].role, MessageRole::User);
        assert_eq!(
            messages[0].metadata["timestamp"],
            "2024-05-17 09:03:27.042"
        );
        assert_eq!(messages[1].role, MessageRole::Assistant);
        assert_eq!(messages[1].texts, ["Hello"]);
    }
}
