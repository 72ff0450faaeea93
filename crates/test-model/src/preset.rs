use autoassist_model::ToolCallRequest;
use serde::{Deserialize, Serialize};

/// One observable state of a scripted run.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum PresetStep {
    #[serde(rename = "in_progress")]
    InProgress,
    #[serde(rename = "requires_action")]
    RequiresAction(Vec<ToolCallRequest>),
    #[serde(rename = "completed")]
    Completed,
    #[serde(rename = "failed")]
    Failed(String),
}

/// The preset for one run.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PresetRun {
    /// States the run goes through. Polling advances past `in_progress`
    /// steps, submitting tool outputs advances past `requires_action`
    /// steps. A run without remaining steps is completed.
    pub steps: Vec<PresetStep>,
    /// The assistant message added to the conversation once the run is
    /// completed.
    pub reply: Option<String>,
    /// If set, starting this run fails with a rate limit error for the
    /// first `failures` attempts.
    pub failures: Option<u64>,
}

impl PresetRun {
    /// Creates a `PresetRun` with the specified steps.
    #[inline]
    pub fn with_steps(steps: impl Into<Vec<PresetStep>>) -> Self {
        Self {
            steps: steps.into(),
            reply: None,
            failures: None,
        }
    }

    /// Sets the assistant reply of a completed run.
    #[inline]
    pub fn with_reply<S: Into<String>>(mut self, reply: S) -> Self {
        self.reply = Some(reply.into());
        self
    }

    /// Sets rate-limited attempts before the run can be started.
    #[inline]
    pub fn with_failures(mut self, failures: u64) -> Self {
        self.failures = Some(failures);
        self
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_serialize_deserialize() {
        let preset = PresetRun::with_steps([
            PresetStep::InProgress,
            PresetStep::RequiresAction(vec![ToolCallRequest {
                id: "call_1".to_string(),
                name: "write_file".to_string(),
                arguments: json!({
                    "folder": "notes",
                    "filename": "message.txt",
                    "content": "Hello, world!"
                }),
            }]),
            PresetStep::Completed,
        ])
        .with_reply("Saved.");

        let serialized = serde_json::to_string(&preset).unwrap();
        let deserialized: PresetRun =
            serde_json::from_str(&serialized).unwrap();

        assert_eq!(preset, deserialized);
    }
}
