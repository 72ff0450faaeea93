use std::error::Error;

use crate::error::ErrorKind;
use crate::request::{AssistantProfile, NewMessage, ToolOutput};
use crate::response::{ConversationMessage, Run};

/// The error type for an assistant service.
pub trait ServiceError: Error + Send + Sync + 'static {
    /// Returns the kind of this error.
    fn kind(&self) -> ErrorKind;
}

/// A remote service that keeps assistant profiles and conversations, and
/// executes runs of a profile against a conversation.
///
/// Once the service is created, it should behave like a stateless object.
/// All state that matters lives on the remote side and is addressed by the
/// identifiers returned from the `create_*` methods.
///
/// Every returned future must be fully independent of `self`, so callers
/// can hold it across other calls to the same service.
pub trait AssistantService: Send + Sync {
    /// The error type that may be returned by the service.
    type Error: ServiceError;

    /// Creates a knowledge store that profiles can attach as a searchable
    /// resource, and returns its identifier.
    fn create_knowledge_store(
        &self,
        name: &str,
    ) -> impl Future<Output = Result<String, Self::Error>> + Send + 'static;

    /// Creates a capability profile and returns its identifier.
    fn create_profile(
        &self,
        profile: &AssistantProfile,
    ) -> impl Future<Output = Result<String, Self::Error>> + Send + 'static;

    /// Replaces the definition of an existing profile.
    fn update_profile(
        &self,
        profile_id: &str,
        profile: &AssistantProfile,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'static;

    /// Creates an empty conversation and returns its identifier.
    fn create_conversation(
        &self,
    ) -> impl Future<Output = Result<String, Self::Error>> + Send + 'static;

    /// Deletes a conversation with all of its messages.
    fn delete_conversation(
        &self,
        conversation_id: &str,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'static;

    /// Appends a user message to the conversation.
    fn append_message(
        &self,
        conversation_id: &str,
        message: &NewMessage,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'static;

    /// Lists all messages of the conversation, oldest first.
    fn list_messages(
        &self,
        conversation_id: &str,
    ) -> impl Future<Output = Result<Vec<ConversationMessage>, Self::Error>>
    + Send
    + 'static;

    /// Starts a run of the profile on the conversation.
    fn create_run(
        &self,
        conversation_id: &str,
        profile_id: &str,
    ) -> impl Future<Output = Result<Run, Self::Error>> + Send + 'static;

    /// Fetches the latest state of a run.
    fn retrieve_run(
        &self,
        conversation_id: &str,
        run_id: &str,
    ) -> impl Future<Output = Result<Run, Self::Error>> + Send + 'static;

    /// Answers all tool calls of a run that requires action, in one batch.
    fn submit_tool_outputs(
        &self,
        conversation_id: &str,
        run_id: &str,
        outputs: &[ToolOutput],
    ) -> impl Future<Output = Result<Run, Self::Error>> + Send + 'static;
}
