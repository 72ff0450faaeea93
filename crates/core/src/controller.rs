mod builder;
mod event;
mod state;
mod stimulus;

use std::error::Error as StdError;
use std::pin::Pin;
use std::time::Duration;

use autoassist_model::{
    AssistantService, ErrorKind, MessageRole, NewMessage, Run, RunStatus,
    ServiceError, ToolCallRequest, ToolOutput,
};
use backoff::ExponentialBackoff;
use backoff::backoff::Backoff;
use backoff::future::retry;
use tracing::Instrument;

use crate::dispatcher::ToolDispatcher;
use crate::session::Session;
pub use builder::{BudgetScope, ControllerBuilder, RetryPolicy};
pub use event::{ControllerEvent, TurnSummary};
pub use state::RunState;
pub use stimulus::{DEFAULT_PROMPT, Stimulus};

type ServiceFuture<T, E> =
    Pin<Box<dyn Future<Output = Result<T, E>> + Send + 'static>>;
type EventHandler = Box<dyn Fn(&ControllerEvent) + Send + Sync>;

/// The error that ends a turn.
#[derive(Debug, thiserror::Error)]
pub enum ControllerError {
    /// The service reported that the run failed.
    #[error("run {run_id} failed: {reason}")]
    RunFailed {
        /// The identifier of the run.
        run_id: String,
        /// The reason given by the service.
        reason: String,
    },
    /// A request to the service failed permanently, or kept failing for
    /// longer than the retry policy allows.
    #[error("failed to {operation}: {source}")]
    Service {
        /// What the controller was trying to do.
        operation: &'static str,
        /// The last error returned by the service.
        source: Box<dyn StdError + Send + Sync>,
    },
}

impl ControllerError {
    fn service<E: ServiceError>(operation: &'static str, err: E) -> Self {
        Self::Service {
            operation,
            source: Box::new(err),
        }
    }
}

/// Drives the turns of a session against an assistant service.
///
/// Each turn appends a stimulus message to the conversation, starts a run
/// and follows it until it is completed. Whenever the run asks for tool
/// outputs, the requested calls are executed one by one through the
/// [`ToolDispatcher`] and their outputs are submitted back in one batch.
pub struct SessionController<S> {
    service: S,
    session: Session,
    dispatcher: ToolDispatcher,
    prompt: String,
    poll_interval: Duration,
    budget_scope: BudgetScope,
    retry_policy: RetryPolicy,
    on_event: Option<EventHandler>,
    turns: u64,
}

impl<S: AssistantService> SessionController<S> {
    /// Returns the session this controller runs in.
    #[inline]
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Returns the dispatcher tool calls are executed with.
    #[inline]
    pub fn dispatcher(&self) -> &ToolDispatcher {
        &self.dispatcher
    }

    /// Returns the number of turns started so far.
    #[inline]
    pub fn turns(&self) -> u64 {
        self.turns
    }

    /// Runs turns back to back, until `max_turns` turns have completed or
    /// a turn fails. Without a limit, only a failure ends the loop.
    pub async fn run(
        &mut self,
        max_turns: Option<u64>,
    ) -> Result<Vec<TurnSummary>, ControllerError> {
        let mut summaries = vec![];
        loop {
            if let Some(max_turns) = max_turns {
                if summaries.len() as u64 >= max_turns {
                    return Ok(summaries);
                }
            }
            let summary = self.run_turn().await?;
            // Unbounded runs don't collect summaries.
            if max_turns.is_some() {
                summaries.push(summary);
            }
        }
    }

    /// Runs a single turn to completion.
    pub async fn run_turn(&mut self) -> Result<TurnSummary, ControllerError> {
        self.turns += 1;
        let span = info_span!("turn", turn = self.turns);
        self.run_turn_inner().instrument(span).await
    }

    async fn run_turn_inner(
        &mut self,
    ) -> Result<TurnSummary, ControllerError> {
        let turn = self.turns;
        self.dispatcher.reset_budget();
        self.emit(ControllerEvent::TurnStarted { turn });

        let conversation_id = self.session.conversation_id.clone();
        let profile_id = self.session.profile_id.clone();

        let message = Stimulus::now(self.prompt.clone()).to_message();
        self.append_stimulus(&conversation_id, &message).await?;

        let mut run = self.start_run(&conversation_id, &profile_id).await?;
        info!("started run {}", run.id);
        self.emit(ControllerEvent::RunStarted {
            run_id: run.id.clone(),
        });

        let mut summary = TurnSummary {
            turn,
            run_id: run.id.clone(),
            rounds: 0,
            calls: 0,
            output_bytes: 0,
            truncated: 0,
        };
        loop {
            let run_id = run.id.clone();
            run = match RunState::from(run) {
                RunState::Polling => {
                    tokio::time::sleep(self.poll_interval).await;
                    self.call("poll the run", |service| {
                        Box::pin(
                            service.retrieve_run(&conversation_id, &run_id),
                        )
                    })
                    .await?
                }
                RunState::AwaitingToolResults(batch) => {
                    let outputs =
                        self.dispatch_batch(batch, &mut summary).await;
                    let count = outputs.len();
                    let run = self
                        .submit_outputs(&conversation_id, &run_id, &outputs)
                        .await?;
                    self.emit(ControllerEvent::OutputsSubmitted {
                        run_id,
                        count,
                    });
                    run
                }
                RunState::Completed => {
                    info!(
                        "run {run_id} completed after {} tool calls",
                        summary.calls
                    );
                    self.emit(ControllerEvent::TurnCompleted(
                        summary.clone(),
                    ));
                    return Ok(summary);
                }
                RunState::Failed(reason) => {
                    error!("run {run_id} failed: {reason}");
                    return Err(ControllerError::RunFailed {
                        run_id,
                        reason,
                    });
                }
            };
        }
    }

    /// Executes a round of tool calls in request order.
    async fn dispatch_batch(
        &mut self,
        batch: Vec<ToolCallRequest>,
        summary: &mut TurnSummary,
    ) -> Vec<ToolOutput> {
        if self.budget_scope == BudgetScope::Round {
            self.dispatcher.reset_budget();
        }
        summary.rounds += 1;
        debug!("round {} with {} tool calls", summary.rounds, batch.len());

        let mut outputs = Vec::with_capacity(batch.len());
        for request in batch {
            let name = request.name.clone();
            self.emit(ControllerEvent::ToolCallStarted {
                call_id: request.id.clone(),
                name: name.clone(),
                arguments: request.arguments.clone(),
            });

            let result = self.dispatcher.execute(request).await;
            summary.calls += 1;
            summary.output_bytes += result.output.len();
            if result.truncated {
                summary.truncated += 1;
            }
            self.emit(ControllerEvent::ToolCallFinished {
                call_id: result.call_id.clone(),
                name,
                bytes: result.output.len(),
                truncated: result.truncated,
            });
            outputs.push(result.into());
        }
        outputs
    }

    /// Appends the stimulus message.
    ///
    /// When the service becomes unavailable, the message may have been
    /// stored anyway, so the conversation is checked before sending it
    /// again.
    async fn append_stimulus(
        &self,
        conversation_id: &str,
        message: &NewMessage,
    ) -> Result<(), ControllerError> {
        const OPERATION: &str = "append the stimulus";
        let mut backoff = self.retry_policy.backoff();
        loop {
            let err = match self
                .service
                .append_message(conversation_id, message)
                .await
            {
                Ok(()) => return Ok(()),
                Err(err) => err,
            };
            if err.kind() == ErrorKind::Unavailable {
                let messages = self
                    .call("list the messages", |service| {
                        Box::pin(service.list_messages(conversation_id))
                    })
                    .await?;
                let stored = messages.iter().any(|stored| {
                    stored.role == MessageRole::User
                        && stored.metadata == message.metadata
                        && stored.texts.first() == Some(&message.content)
                });
                if stored {
                    warn!("the stimulus was stored despite: {err}");
                    return Ok(());
                }
            }
            self.wait_to_retry(OPERATION, err, &mut backoff).await?;
        }
    }

    /// Starts a run of the profile.
    ///
    /// Only rate limited requests are sent again. After any other failure
    /// a run may exist that the controller doesn't know of.
    async fn start_run(
        &self,
        conversation_id: &str,
        profile_id: &str,
    ) -> Result<Run, ControllerError> {
        const OPERATION: &str = "start a run";
        let mut backoff = self.retry_policy.backoff();
        loop {
            match self.service.create_run(conversation_id, profile_id).await {
                Ok(run) => return Ok(run),
                Err(err) if err.kind() == ErrorKind::RateLimitExceeded => {
                    self.wait_to_retry(OPERATION, err, &mut backoff).await?;
                }
                Err(err) => {
                    return Err(ControllerError::service(OPERATION, err));
                }
            }
        }
    }

    /// Submits a batch of tool outputs.
    ///
    /// When the service becomes unavailable, the run is polled first. The
    /// outputs are only sent again if the run still waits for them.
    async fn submit_outputs(
        &self,
        conversation_id: &str,
        run_id: &str,
        outputs: &[ToolOutput],
    ) -> Result<Run, ControllerError> {
        const OPERATION: &str = "submit tool outputs";
        let mut backoff = self.retry_policy.backoff();
        loop {
            let err = match self
                .service
                .submit_tool_outputs(conversation_id, run_id, outputs)
                .await
            {
                Ok(run) => return Ok(run),
                Err(err) => err,
            };
            if err.kind() == ErrorKind::Unavailable {
                let run = self
                    .call("poll the run", |service| {
                        Box::pin(service.retrieve_run(conversation_id, run_id))
                    })
                    .await?;
                if !awaits_outputs(&run, outputs) {
                    warn!("outputs for run {run_id} were taken despite: {err}");
                    return Ok(run);
                }
            }
            self.wait_to_retry(OPERATION, err, &mut backoff).await?;
        }
    }

    /// Sleeps until the next attempt of a failed request, or returns the
    /// error if there is none.
    async fn wait_to_retry(
        &self,
        operation: &'static str,
        err: S::Error,
        backoff: &mut ExponentialBackoff,
    ) -> Result<(), ControllerError> {
        let delay = if err.kind().is_transient() {
            backoff.next_backoff()
        } else {
            None
        };
        let Some(delay) = delay else {
            return Err(ControllerError::service(operation, err));
        };
        warn!("failed to {operation}, retrying: {err}");
        tokio::time::sleep(delay).await;
        Ok(())
    }

    /// Performs a request that is safe to repeat, retrying transient
    /// failures.
    async fn call<T, F>(
        &self,
        operation: &'static str,
        request: F,
    ) -> Result<T, ControllerError>
    where
        F: Fn(&S) -> ServiceFuture<T, S::Error>,
    {
        let service = &self.service;
        let result = retry(self.retry_policy.backoff(), || {
            let fut = request(service);
            async move {
                fut.await.map_err(|err| {
                    if err.kind().is_transient() {
                        warn!("failed to {operation}, retrying: {err}");
                        backoff::Error::transient(err)
                    } else {
                        backoff::Error::permanent(err)
                    }
                })
            }
        })
        .await;
        result.map_err(|err| ControllerError::service(operation, err))
    }

    #[inline]
    fn emit(&self, event: ControllerEvent) {
        if let Some(on_event) = &self.on_event {
            on_event(&event);
        }
    }
}

/// Returns `true` if `run` is still waiting for exactly these outputs.
fn awaits_outputs(run: &Run, outputs: &[ToolOutput]) -> bool {
    run.status == RunStatus::RequiresAction
        && run.tool_calls.len() == outputs.len()
        && run
            .tool_calls
            .iter()
            .zip(outputs)
            .all(|(call, output)| call.id == output.tool_call_id)
}

impl<S> SessionController<S> {
    fn from_builder(builder: ControllerBuilder<S>) -> Self {
        let ControllerBuilder {
            service,
            session,
            dispatcher,
            prompt,
            poll_interval,
            budget_scope,
            retry_policy,
            on_event,
        } = builder;
        Self {
            service,
            session,
            dispatcher,
            prompt,
            poll_interval,
            budget_scope,
            retry_policy,
            on_event,
            turns: 0,
        }
    }
}
