use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{self, Display, Formatter};
use std::future::ready;
use std::sync::{Arc, Mutex};

use autoassist_model::{
    AssistantProfile, AssistantService, ConversationMessage, ErrorKind,
    MessageRole, NewMessage, Run, RunStatus, ServiceError, ToolOutput,
};

#[derive(Debug)]
struct FakeServiceError(ErrorKind);

impl Display for FakeServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

impl Error for FakeServiceError {}

impl ServiceError for FakeServiceError {
    fn kind(&self) -> ErrorKind {
        self.0
    }
}

/// Echoes every appended message back as an assistant message, and
/// completes runs immediately.
#[derive(Default)]
struct FakeService {
    messages: Arc<Mutex<Vec<ConversationMessage>>>,
}

impl AssistantService for FakeService {
    type Error = FakeServiceError;

    fn create_knowledge_store(
        &self,
        _name: &str,
    ) -> impl Future<Output = Result<String, Self::Error>> + Send + 'static
    {
        ready(Ok("vs_0".to_owned()))
    }

    fn create_profile(
        &self,
        _profile: &AssistantProfile,
    ) -> impl Future<Output = Result<String, Self::Error>> + Send + 'static
    {
        ready(Ok("asst_0".to_owned()))
    }

    fn update_profile(
        &self,
        _profile_id: &str,
        _profile: &AssistantProfile,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'static {
        ready(Err(FakeServiceError(ErrorKind::NotFound)))
    }

    fn create_conversation(
        &self,
    ) -> impl Future<Output = Result<String, Self::Error>> + Send + 'static
    {
        ready(Ok("thread_0".to_owned()))
    }

    fn delete_conversation(
        &self,
        _conversation_id: &str,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'static {
        ready(Ok(()))
    }

    fn append_message(
        &self,
        _conversation_id: &str,
        message: &NewMessage,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'static {
        let mut messages = self.messages.lock().unwrap();
        let id = messages.len();
        messages.push(ConversationMessage {
            id: format!("msg_{id}"),
            role: MessageRole::Assistant,
            texts: vec![format!("You said {}", message.content)],
            metadata: BTreeMap::new(),
        });
        ready(Ok(()))
    }

    fn list_messages(
        &self,
        _conversation_id: &str,
    ) -> impl Future<Output = Result<Vec<ConversationMessage>, Self::Error>>
    + Send
    + 'static {
        let messages = Arc::clone(&self.messages);
        async move { Ok(messages.lock().unwrap().clone()) }
    }

    fn create_run(
        &self,
        _conversation_id: &str,
        _profile_id: &str,
    ) -> impl Future<Output = Result<Run, Self::Error>> + Send + 'static {
        ready(Ok(Run {
            id: "run_0".to_owned(),
            status: RunStatus::Completed,
            tool_calls: vec![],
        }))
    }

    fn retrieve_run(
        &self,
        _conversation_id: &str,
        run_id: &str,
    ) -> impl Future<Output = Result<Run, Self::Error>> + Send + 'static {
        ready(Ok(Run {
            id: run_id.to_owned(),
            status: RunStatus::Completed,
            tool_calls: vec![],
        }))
    }

    fn submit_tool_outputs(
        &self,
        _conversation_id: &str,
        _run_id: &str,
        _outputs: &[ToolOutput],
    ) -> impl Future<Output = Result<Run, Self::Error>> + Send + 'static {
        ready(Err(FakeServiceError(ErrorKind::Other)))
    }
}

mod tests {
    use super::*;

    #[tokio::test]
    async fn test_conversation() {
        let service = FakeService::default();
        let thread_id = service.create_conversation().await.unwrap();
        service
            .append_message(
                &thread_id,
                &NewMessage {
                    content: "Good morning".to_owned(),
                    metadata: BTreeMap::new(),
                },
            )
            .await
            .unwrap();

        let run = service.create_run(&thread_id, "asst_0").await.unwrap();
        assert!(run.status.is_terminal());

        // The future must not borrow the service.
        let list_fut = service.list_messages(&thread_id);
        drop(service);
        let messages = list_fut.await.unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].texts, vec!["You said Good morning"]);
    }

    #[tokio::test]
    async fn test_error() {
        let service = FakeService::default();
        let err = service
            .submit_tool_outputs("thread_0", "run_0", &[])
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Other);
        assert!(!err.kind().is_transient());
    }
}
