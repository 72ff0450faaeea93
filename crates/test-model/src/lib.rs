//! A local fake assistant service for testing purpose.

mod preset;

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::error::Error as StdError;
use std::fmt::{self, Debug, Display, Formatter};
use std::future::ready;
use std::sync::{Arc, Mutex, MutexGuard};

use autoassist_model::{
    AssistantProfile, AssistantService, ConversationMessage, ErrorKind,
    MessageRole, NewMessage, Run, RunStatus, ServiceError, ToolCallRequest,
    ToolOutput,
};

pub use preset::*;

#[derive(Debug)]
pub struct Error {
    message: String,
    kind: ErrorKind,
}

impl Error {
    fn new(message: impl Into<String>, kind: ErrorKind) -> Self {
        Self {
            message: message.into(),
            kind,
        }
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({:?})", self.message, self.kind)
    }
}

impl StdError for Error {}

impl ServiceError for Error {
    #[inline]
    fn kind(&self) -> ErrorKind {
        self.kind
    }
}

struct ActiveRun {
    conversation_id: String,
    status: RunStatus,
    tool_calls: Vec<ToolCallRequest>,
    remaining: VecDeque<PresetStep>,
    reply: Option<String>,
}

impl ActiveRun {
    fn snapshot(&self, id: &str) -> Run {
        Run {
            id: id.to_owned(),
            status: self.status.clone(),
            tool_calls: self.tool_calls.clone(),
        }
    }
}

#[derive(Default)]
struct State {
    script: VecDeque<PresetRun>,
    runs: HashMap<String, ActiveRun>,
    conversations: HashMap<String, Vec<ConversationMessage>>,
    profiles: HashMap<String, AssistantProfile>,
    knowledge_stores: Vec<String>,
    submissions: Vec<Submission>,
    retrieve_failures: u64,
    lost_appends: u64,
    lost_submissions: u64,
    next_id: u64,
}

impl State {
    fn make_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{prefix}_{}", self.next_id)
    }

    fn conversation(
        &mut self,
        id: &str,
    ) -> Result<&mut Vec<ConversationMessage>, Error> {
        self.conversations
            .get_mut(id)
            .ok_or_else(|| {
                Error::new("no such conversation", ErrorKind::NotFound)
            })
    }

    /// Fails a request that has already taken effect, as if its response
    /// never arrived.
    fn drop_response(&mut self, request: LostResponse) -> Result<(), Error> {
        let lost = match request {
            LostResponse::AppendMessage => &mut self.lost_appends,
            LostResponse::SubmitToolOutputs => &mut self.lost_submissions,
        };
        if *lost == 0 {
            return Ok(());
        }
        *lost -= 1;
        Err(Error::new("connection reset", ErrorKind::Unavailable))
    }

    /// Moves the run to its next scripted step.
    fn advance(&mut self, run_id: &str) {
        let Some(run) = self.runs.get_mut(run_id) else {
            return;
        };
        let step = run.remaining.pop_front().unwrap_or(PresetStep::Completed);
        run.tool_calls.clear();
        run.status = match step {
            PresetStep::InProgress => RunStatus::InProgress,
            PresetStep::RequiresAction(calls) => {
                run.tool_calls = calls;
                RunStatus::RequiresAction
            }
            PresetStep::Completed => RunStatus::Completed,
            PresetStep::Failed(reason) => RunStatus::Failed(reason),
        };
        if run.status != RunStatus::Completed {
            return;
        }
        let Some(reply) = run.reply.take() else {
            return;
        };
        let conversation_id = run.conversation_id.clone();
        let message_id = self.make_id("msg");
        if let Some(messages) = self.conversations.get_mut(&conversation_id) {
            messages.push(ConversationMessage {
                id: message_id,
                role: MessageRole::Assistant,
                texts: vec![reply],
                metadata: BTreeMap::new(),
            });
        }
    }
}

/// A request whose response can get lost after the service has applied it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LostResponse {
    /// `append_message`.
    AppendMessage,
    /// `submit_tool_outputs`.
    SubmitToolOutputs,
}

/// A batch of tool outputs received by the service.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Submission {
    /// The run the outputs were submitted to.
    pub run_id: String,
    /// The outputs, in submission order.
    pub outputs: Vec<ToolOutput>,
}

/// A local fake assistant service for testing purpose.
///
/// Before starting runs, you need to setup the script, which is how each
/// run should behave. Every `create_run` call consumes the next preset. If
/// there are no enough presets in the script, an error will be returned.
///
/// Clones share the same state, so a test can keep one clone for
/// inspection while the code under test owns another.
///
/// # Note
///
/// This type is not optimized for production use, everything is guarded by
/// a single lock. You should only use it for testing.
#[derive(Clone, Default)]
pub struct TestAssistantService {
    state: Arc<Mutex<State>>,
}

impl TestAssistantService {
    #[inline]
    pub fn add_run(&self, preset: PresetRun) {
        self.lock().script.push_back(preset);
    }

    /// Makes the next `failures` calls to `retrieve_run` fail with a
    /// service-unavailable error.
    #[inline]
    pub fn set_retrieve_failures(&self, failures: u64) {
        self.lock().retrieve_failures = failures;
    }

    /// Makes the next `count` requests of the given kind take effect, but
    /// fail with a service-unavailable error.
    pub fn lose_responses(&self, request: LostResponse, count: u64) {
        let mut state = self.lock();
        match request {
            LostResponse::AppendMessage => state.lost_appends = count,
            LostResponse::SubmitToolOutputs => state.lost_submissions = count,
        }
    }

    /// Creates a conversation without going through the async API.
    pub fn seed_conversation(&self) -> String {
        let mut state = self.lock();
        let id = state.make_id("thread");
        state.conversations.insert(id.clone(), vec![]);
        id
    }

    #[inline]
    pub fn submissions(&self) -> Vec<Submission> {
        self.lock().submissions.clone()
    }

    #[inline]
    pub fn messages(&self, conversation_id: &str) -> Vec<ConversationMessage> {
        self.lock()
            .conversations
            .get(conversation_id)
            .cloned()
            .unwrap_or_default()
    }

    #[inline]
    pub fn has_conversation(&self, conversation_id: &str) -> bool {
        self.lock().conversations.contains_key(conversation_id)
    }

    #[inline]
    pub fn profile(&self, profile_id: &str) -> Option<AssistantProfile> {
        self.lock().profiles.get(profile_id).cloned()
    }

    #[inline]
    pub fn knowledge_stores(&self) -> Vec<String> {
        self.lock().knowledge_stores.clone()
    }

    /// Returns the number of presets not consumed yet.
    #[inline]
    pub fn remaining_runs(&self) -> usize {
        self.lock().script.len()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        // A panicking test thread must not hide the state from the others.
        self.state.lock().unwrap_or_else(|err| err.into_inner())
    }
}

impl AssistantService for TestAssistantService {
    type Error = crate::Error;

    fn create_knowledge_store(
        &self,
        _name: &str,
    ) -> impl Future<Output = Result<String, Self::Error>> + Send + 'static
    {
        let mut state = self.lock();
        let id = state.make_id("vs");
        state.knowledge_stores.push(id.clone());
        ready(Ok(id))
    }

    fn create_profile(
        &self,
        profile: &AssistantProfile,
    ) -> impl Future<Output = Result<String, Self::Error>> + Send + 'static
    {
        let mut state = self.lock();
        let id = state.make_id("asst");
        state.profiles.insert(id.clone(), profile.clone());
        ready(Ok(id))
    }

    fn update_profile(
        &self,
        profile_id: &str,
        profile: &AssistantProfile,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'static {
        let mut state = self.lock();
        let result = match state.profiles.get_mut(profile_id) {
            Some(existing) => {
                *existing = profile.clone();
                Ok(())
            }
            None => Err(Error::new("no such profile", ErrorKind::NotFound)),
        };
        ready(result)
    }

    fn create_conversation(
        &self,
    ) -> impl Future<Output = Result<String, Self::Error>> + Send + 'static
    {
        ready(Ok(self.seed_conversation()))
    }

    fn delete_conversation(
        &self,
        conversation_id: &str,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'static {
        let result = match self.lock().conversations.remove(conversation_id) {
            Some(_) => Ok(()),
            None => {
                Err(Error::new("no such conversation", ErrorKind::NotFound))
            }
        };
        ready(result)
    }

    fn append_message(
        &self,
        conversation_id: &str,
        message: &NewMessage,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'static {
        let mut state = self.lock();
        let message_id = state.make_id("msg");
        let result = state.conversation(conversation_id).map(|messages| {
            messages.push(ConversationMessage {
                id: message_id,
                role: MessageRole::User,
                texts: vec![message.content.clone()],
                metadata: message.metadata.clone(),
            });
        });
        let result = result
            .and_then(|()| state.drop_response(LostResponse::AppendMessage));
        ready(result)
    }

    fn list_messages(
        &self,
        conversation_id: &str,
    ) -> impl Future<Output = Result<Vec<ConversationMessage>, Self::Error>>
    + Send
    + 'static {
        let result = self
            .lock()
            .conversation(conversation_id)
            .map(|messages| messages.clone());
        ready(result)
    }

    fn create_run(
        &self,
        conversation_id: &str,
        _profile_id: &str,
    ) -> impl Future<Output = Result<Run, Self::Error>> + Send + 'static {
        let result = 'blk: {
            let mut state = self.lock();
            if let Err(err) = state.conversation(conversation_id) {
                break 'blk Err(err);
            }
            let Some(preset) = state.script.front_mut() else {
                break 'blk Err(Error::new("no enough runs", ErrorKind::Other));
            };
            if let Some(failures) = preset.failures.as_mut() {
                if *failures > 0 {
                    *failures -= 1;
                    break 'blk Err(Error::new(
                        "too many requests",
                        ErrorKind::RateLimitExceeded,
                    ));
                }
            }

            let Some(preset) = state.script.pop_front() else {
                unreachable!("the script was checked above");
            };
            let run_id = state.make_id("run");
            state.runs.insert(
                run_id.clone(),
                ActiveRun {
                    conversation_id: conversation_id.to_owned(),
                    status: RunStatus::InProgress,
                    tool_calls: vec![],
                    remaining: preset.steps.into(),
                    reply: preset.reply,
                },
            );
            state.advance(&run_id);
            Ok(state.runs[&run_id].snapshot(&run_id))
        };
        ready(result)
    }

    fn retrieve_run(
        &self,
        _conversation_id: &str,
        run_id: &str,
    ) -> impl Future<Output = Result<Run, Self::Error>> + Send + 'static {
        let result = 'blk: {
            let mut state = self.lock();
            if state.retrieve_failures > 0 {
                state.retrieve_failures -= 1;
                break 'blk Err(Error::new(
                    "service unavailable",
                    ErrorKind::Unavailable,
                ));
            }
            let Some(run) = state.runs.get(run_id) else {
                break 'blk Err(Error::new("no such run", ErrorKind::NotFound));
            };
            if run.status == RunStatus::InProgress {
                state.advance(run_id);
            }
            Ok(state.runs[run_id].snapshot(run_id))
        };
        ready(result)
    }

    fn submit_tool_outputs(
        &self,
        _conversation_id: &str,
        run_id: &str,
        outputs: &[ToolOutput],
    ) -> impl Future<Output = Result<Run, Self::Error>> + Send + 'static {
        let result = 'blk: {
            let mut state = self.lock();
            let Some(run) = state.runs.get(run_id) else {
                break 'blk Err(Error::new("no such run", ErrorKind::NotFound));
            };
            if run.status != RunStatus::RequiresAction {
                break 'blk Err(Error::new(
                    "run is not waiting for tool outputs",
                    ErrorKind::Other,
                ));
            }
            state.submissions.push(Submission {
                run_id: run_id.to_owned(),
                outputs: outputs.to_vec(),
            });
            state.advance(run_id);
            if let Err(err) =
                state.drop_response(LostResponse::SubmitToolOutputs)
            {
                break 'blk Err(err);
            }
            Ok(state.runs[run_id].snapshot(run_id))
        };
        ready(result)
    }
}

impl Debug for TestAssistantService {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestAssistantService").finish_non_exhaustive()
    }
}
