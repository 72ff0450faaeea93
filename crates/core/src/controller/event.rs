use serde_json::Value;

/// Progress of a [`SessionController`](super::SessionController), reported
/// to the event handler installed with
/// [`ControllerBuilder::on_event`](super::ControllerBuilder::on_event).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ControllerEvent {
    /// A turn has started.
    TurnStarted {
        /// The 1-based turn number.
        turn: u64,
    },
    /// A run has been started for the current turn.
    RunStarted {
        /// The identifier of the run.
        run_id: String,
    },
    /// A tool call is about to be executed.
    ToolCallStarted {
        /// The identifier of the request.
        call_id: String,
        /// The name of the tool.
        name: String,
        /// The arguments as received.
        arguments: Value,
    },
    /// A tool call has produced its output.
    ToolCallFinished {
        /// The identifier of the request.
        call_id: String,
        /// The name of the tool.
        name: String,
        /// The size of the returned output.
        bytes: usize,
        /// Whether the output was trimmed to fit the budget.
        truncated: bool,
    },
    /// The outputs of a round have been submitted.
    OutputsSubmitted {
        /// The identifier of the run.
        run_id: String,
        /// The number of outputs.
        count: usize,
    },
    /// The run of the turn has completed.
    TurnCompleted(TurnSummary),
}

/// Statistics of a completed turn.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TurnSummary {
    /// The 1-based turn number.
    pub turn: u64,
    /// The run that answered the turn.
    pub run_id: String,
    /// Rounds of tool calls.
    pub rounds: usize,
    /// Tool calls executed.
    pub calls: usize,
    /// Output bytes returned to the service.
    pub output_bytes: usize,
    /// Outputs that were trimmed or replaced.
    pub truncated: usize,
}
