use autoassist_model::{Run, RunStatus, ToolCallRequest};

/// What the controller has to do next for a run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RunState {
    /// The run is still being processed, poll it again later.
    Polling,
    /// The run waits for the outputs of this batch of tool calls.
    AwaitingToolResults(Vec<ToolCallRequest>),
    /// The run has finished and the turn is over.
    Completed,
    /// The run has ended without completing.
    Failed(String),
}

impl From<Run> for RunState {
    fn from(run: Run) -> Self {
        match run.status {
            RunStatus::InProgress => RunState::Polling,
            RunStatus::RequiresAction => {
                RunState::AwaitingToolResults(run.tool_calls)
            }
            RunStatus::Completed => RunState::Completed,
            RunStatus::Failed(reason) => RunState::Failed(reason),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_from_run() {
        let call = ToolCallRequest {
            id: "call_1".to_owned(),
            name: "sleep".to_owned(),
            arguments: json!({ "duration": 1 }),
        };
        let run = |status| Run {
            id: "run_1".to_owned(),
            status,
            tool_calls: vec![call.clone()],
        };

        assert_eq!(
            RunState::from(run(RunStatus::InProgress)),
            RunState::Polling
        );
        assert_eq!(
            RunState::from(run(RunStatus::RequiresAction)),
            RunState::AwaitingToolResults(vec![call.clone()])
        );
        assert_eq!(
            RunState::from(run(RunStatus::Failed("expired".to_owned()))),
            RunState::Failed("expired".to_owned())
        );
    }
}
