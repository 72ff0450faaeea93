//! Executes tool call requests and governs the size of their outputs.

use std::sync::Arc;
use std::time::Duration;

use autoassist_model::{ToolCallRequest, ToolOutput};
use tokio::time::timeout;
use tracing::Instrument;

use crate::budget::OutputBudget;
use crate::log_store::LogStore;
use crate::tool::{ErrorKind, FunctionRegistry};

/// The answer to one tool call request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ToolCallResult {
    /// The identifier of the request.
    pub call_id: String,
    /// The output text, possibly truncated.
    pub output: String,
    /// Whether the output was cut or replaced to fit the budget.
    pub truncated: bool,
}

impl From<ToolCallResult> for ToolOutput {
    #[inline]
    fn from(result: ToolCallResult) -> Self {
        ToolOutput {
            tool_call_id: result.call_id,
            output: result.output,
        }
    }
}

/// Resolves tool call requests against a [`FunctionRegistry`] and invokes
/// them one at a time.
///
/// Every failure of a tool is turned into a diagnostic text, so executing a
/// request always produces a result. Outputs are fitted into an
/// [`OutputBudget`] and persisted to a [`LogStore`] before they are
/// returned.
pub struct ToolDispatcher {
    registry: FunctionRegistry,
    log_store: Arc<dyn LogStore>,
    budget: OutputBudget,
    call_timeout: Option<Duration>,
}

impl ToolDispatcher {
    /// Creates a dispatcher with the default budget and no call timeout.
    #[inline]
    pub fn new(
        registry: FunctionRegistry,
        log_store: Arc<dyn LogStore>,
    ) -> Self {
        Self {
            registry,
            log_store,
            budget: Default::default(),
            call_timeout: None,
        }
    }

    /// Replaces the output budget.
    #[inline]
    pub fn with_budget(mut self, budget: OutputBudget) -> Self {
        self.budget = budget;
        self
    }

    /// Limits how long a single tool call may run.
    #[inline]
    pub fn with_call_timeout(mut self, call_timeout: Duration) -> Self {
        self.call_timeout = Some(call_timeout);
        self
    }

    /// Returns the registry requests are resolved against.
    #[inline]
    pub fn registry(&self) -> &FunctionRegistry {
        &self.registry
    }

    /// Returns the output budget.
    #[inline]
    pub fn budget(&self) -> &OutputBudget {
        &self.budget
    }

    /// Starts a new budget period.
    #[inline]
    pub fn reset_budget(&mut self) {
        self.budget.reset();
    }

    /// Executes a tool call request.
    ///
    /// Never fails: unknown tools, invalid arguments, tool errors, panics
    /// and timeouts are all reported in the returned output.
    pub async fn execute(
        &mut self,
        request: ToolCallRequest,
    ) -> ToolCallResult {
        let span = debug_span!("tool dispatch", tool = %request.name);
        self.execute_inner(request).instrument(span).await
    }

    async fn execute_inner(
        &mut self,
        request: ToolCallRequest,
    ) -> ToolCallResult {
        let ToolCallRequest {
            id: call_id,
            name,
            arguments,
        } = request;

        let raw_output = self.invoke(&name, arguments).await;
        let admitted = self.budget.admit(raw_output);
        if admitted.truncated {
            info!(
                "output of {name} ({call_id}) was trimmed to {} bytes",
                admitted.text.len()
            );
        }

        if let Err(err) = self.log_store.append(&name, &admitted.text).await {
            error!("failed to log the output of {name}: {err}");
        }

        ToolCallResult {
            call_id,
            output: admitted.text,
            truncated: admitted.truncated,
        }
    }

    async fn invoke(&self, name: &str, arguments: serde_json::Value) -> String {
        let Some(tool) = self.registry.lookup(name) else {
            warn!("tool not found: {name}");
            return format!("[Error: {name} does not exist]");
        };

        trace!("invoking {name} with args: {arguments:?}");
        let task = tokio::spawn(tool.invoke(arguments));
        let abort_handle = task.abort_handle();
        let joined = match self.call_timeout {
            Some(limit) => match timeout(limit, task).await {
                Ok(joined) => joined,
                Err(_) => {
                    abort_handle.abort();
                    warn!("{name} timed out");
                    return format!(
                        "[Error: {name} timed out after {}s]",
                        limit.as_secs()
                    );
                }
            },
            None => task.await,
        };

        match joined {
            Ok(Ok(output)) => output,
            Ok(Err(err)) => {
                warn!("{name} failed: {err}");
                match err.kind() {
                    ErrorKind::InvalidInput => format!(
                        "[Error: invalid arguments for {name}: {}]",
                        err.reason()
                    ),
                    ErrorKind::TimedOut => {
                        format!("[Error: {name} timed out: {}]", err.reason())
                    }
                    ErrorKind::ExecutionError => {
                        format!("[Error: {name} failed: {}]", err.reason())
                    }
                }
            }
            Err(join_err) => {
                error!("{name} did not finish: {join_err}");
                let reason = if join_err.is_panic() {
                    "the tool panicked"
                } else {
                    "the tool was cancelled"
                };
                format!("[Error: {name} failed: {reason}]")
            }
        }
    }
}
