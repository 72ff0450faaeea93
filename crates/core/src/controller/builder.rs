use std::time::Duration;

use autoassist_model::AssistantService;
use backoff::{ExponentialBackoff, ExponentialBackoffBuilder};
use serde::{Deserialize, Serialize};

use super::{ControllerEvent, DEFAULT_PROMPT, EventHandler, SessionController};
use crate::dispatcher::ToolDispatcher;
use crate::session::Session;

/// When the output budget starts over.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum BudgetScope {
    /// Once per turn, shared by all rounds of tool calls.
    #[default]
    Turn,
    /// Before every round of tool calls.
    Round,
}

/// How long failing service requests are retried.
///
/// Only transient errors are retried, with exponentially growing delays.
/// Requests that may have taken effect despite an error are reconciled
/// with the service before they are sent again, and a run is never started
/// twice after the service became unavailable.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    /// The delay before the first retry.
    pub initial_interval: Duration,
    /// The upper bound of a single delay.
    pub max_interval: Duration,
    /// The total time after which no more retries happen. `None` retries
    /// forever.
    pub max_elapsed_time: Option<Duration>,
}

impl RetryPolicy {
    pub(super) fn backoff(&self) -> ExponentialBackoff {
        ExponentialBackoffBuilder::new()
            .with_initial_interval(self.initial_interval)
            .with_max_interval(self.max_interval)
            .with_max_elapsed_time(self.max_elapsed_time)
            .build()
    }
}

impl Default for RetryPolicy {
    #[inline]
    fn default() -> Self {
        Self {
            initial_interval: Duration::from_millis(500),
            max_interval: Duration::from_secs(8),
            max_elapsed_time: Some(Duration::from_secs(60)),
        }
    }
}

/// [`SessionController`] builder.
pub struct ControllerBuilder<S> {
    pub(super) service: S,
    pub(super) session: Session,
    pub(super) dispatcher: ToolDispatcher,
    pub(super) prompt: String,
    pub(super) poll_interval: Duration,
    pub(super) budget_scope: BudgetScope,
    pub(super) retry_policy: RetryPolicy,
    pub(super) on_event: Option<EventHandler>,
}

impl<S: AssistantService> ControllerBuilder<S> {
    /// Creates a builder for a controller that runs `session` on `service`
    /// and executes tool calls with `dispatcher`.
    #[inline]
    pub fn new(
        service: S,
        session: Session,
        dispatcher: ToolDispatcher,
    ) -> Self {
        Self {
            service,
            session,
            dispatcher,
            prompt: DEFAULT_PROMPT.to_owned(),
            poll_interval: Duration::from_millis(100),
            budget_scope: Default::default(),
            retry_policy: Default::default(),
            on_event: None,
        }
    }

    /// Replaces the prompt sent at the start of every turn.
    #[inline]
    pub fn with_prompt<P: Into<String>>(mut self, prompt: P) -> Self {
        self.prompt = prompt.into();
        self
    }

    /// Sets the delay between two polls of a run in progress.
    #[inline]
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Sets when the output budget starts over.
    #[inline]
    pub fn with_budget_scope(mut self, budget_scope: BudgetScope) -> Self {
        self.budget_scope = budget_scope;
        self
    }

    /// Sets how failing service requests are retried.
    #[inline]
    pub fn with_retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
        self.retry_policy = retry_policy;
        self
    }

    /// Attaches a callback that observes the progress of the controller.
    #[inline]
    pub fn on_event(
        mut self,
        on_event: impl Fn(&ControllerEvent) + Send + Sync + 'static,
    ) -> Self {
        self.on_event = Some(Box::new(on_event));
        self
    }

    /// Builds the controller.
    #[inline]
    pub fn build(self) -> SessionController<S> {
        SessionController::from_builder(self)
    }
}
