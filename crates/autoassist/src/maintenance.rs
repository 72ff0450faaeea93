//! Commands that look after the session between runs.

use std::error::Error as StdError;
use std::io;
use std::path::{Path, PathBuf};

use autoassist_core::env_store::{EnvStore, EnvStoreError};
use autoassist_core::session::{
    CONVERSATION_ID_KEY, PROFILE_ID_KEY, SessionState,
};
use autoassist_model::{
    AssistantService, ConversationMessage, ErrorKind, MessageRole,
    ServiceError, ToolDescriptor,
};
use tokio::fs;

use crate::config::AppConfig;
use crate::profile::build_profile;

/// The error returned by a maintenance command.
#[derive(Debug, thiserror::Error)]
pub enum MaintenanceError {
    /// A request to the service failed.
    #[error("failed to {operation}: {source}")]
    Service {
        /// What was being done.
        operation: &'static str,
        /// The error returned by the service.
        source: Box<dyn StdError + Send + Sync>,
    },
    /// The identifier store could not be updated.
    #[error(transparent)]
    Store(#[from] EnvStoreError),
    /// A local directory could not be cleared.
    #[error("failed to clear {}: {source}", path.display())]
    Io {
        /// The directory.
        path: PathBuf,
        /// The underlying error.
        source: io::Error,
    },
    /// The remote object the command works on was never created.
    #[error("{0} is not set, run the assistant first")]
    MissingIdentifier(&'static str),
}

impl MaintenanceError {
    fn service<E: ServiceError>(
        operation: &'static str,
    ) -> impl FnOnce(E) -> Self {
        move |err| Self::Service {
            operation,
            source: Box::new(err),
        }
    }
}

/// Starts over: deletes the conversation, forgets its identifier, and
/// empties the logs and outputs directories.
///
/// The profile and the knowledge store are kept. A conversation that is
/// already gone on the remote side is not an error.
pub async fn reset<S: AssistantService>(
    service: &S,
    store: &mut EnvStore,
    config: &AppConfig,
) -> Result<(), MaintenanceError> {
    if let Some(conversation_id) = SessionState::load(store).conversation_id
    {
        match service.delete_conversation(&conversation_id).await {
            Ok(()) => info!("conversation {conversation_id} deleted"),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                warn!("conversation {conversation_id} was already deleted");
            }
            Err(err) => {
                return Err(MaintenanceError::Service {
                    operation: "delete the conversation",
                    source: Box::new(err),
                });
            }
        }
    }
    if store.remove(CONVERSATION_ID_KEY).is_some() {
        store.save()?;
    }

    clear_dir(&config.logs_dir).await?;
    clear_dir(&config.outputs_dir).await?;
    Ok(())
}

/// Removes a directory with everything in it and creates it again empty.
async fn clear_dir(path: &Path) -> Result<(), MaintenanceError> {
    let io_error = |source| MaintenanceError::Io {
        path: path.to_owned(),
        source,
    };
    match fs::remove_dir_all(path).await {
        Ok(()) => {}
        Err(err) if err.kind() == io::ErrorKind::NotFound => {}
        Err(err) => return Err(io_error(err)),
    }
    fs::create_dir_all(path).await.map_err(io_error)
}

/// Pushes the current definition of the profile to the service, and
/// returns the identifier of the updated profile.
pub async fn update_profile<S: AssistantService>(
    service: &S,
    store: &EnvStore,
    config: &AppConfig,
    tools: Vec<ToolDescriptor>,
) -> Result<String, MaintenanceError> {
    let state = SessionState::load(store);
    let Some(profile_id) = state.profile_id else {
        return Err(MaintenanceError::MissingIdentifier(PROFILE_ID_KEY));
    };
    let profile =
        build_profile(config, tools, state.knowledge_store_id.as_deref());
    service
        .update_profile(&profile_id, &profile)
        .await
        .map_err(MaintenanceError::service("update the assistant"))?;
    info!("assistant {profile_id} updated");
    Ok(profile_id)
}

/// Fetches all messages of the conversation, oldest first.
pub async fn history<S: AssistantService>(
    service: &S,
    store: &EnvStore,
) -> Result<Vec<ConversationMessage>, MaintenanceError> {
    let Some(conversation_id) = SessionState::load(store).conversation_id
    else {
        return Err(MaintenanceError::MissingIdentifier(CONVERSATION_ID_KEY));
    };
    service
        .list_messages(&conversation_id)
        .await
        .map_err(MaintenanceError::service("list the messages"))
}

/// Formats the conversation as a transcript.
///
/// Stimuli are shown by the time they were sent, replies in full.
pub fn render_history(messages: &[ConversationMessage]) -> String {
    let mut lines = vec![];
    for message in messages {
        match message.role {
            MessageRole::User => {
                let stamp = message
                    .metadata
                    .get("timestamp")
                    .or_else(|| message.texts.first());
                lines.push(stamp.cloned().unwrap_or_default());
            }
            MessageRole::Assistant => {
                for text in &message.texts {
                    lines.push(format!("\nASSISTANT: {text}"));
                }
            }
        }
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use autoassist_core::session::KNOWLEDGE_STORE_ID_KEY;
    use autoassist_model::AssistantProfile;
    use autoassist_test_model::TestAssistantService;

    use super::*;

    fn message(
        role: MessageRole,
        text: &str,
        timestamp: Option<&str>,
    ) -> ConversationMessage {
        ConversationMessage {
            id: "msg".to_owned(),
            role,
            texts: vec![text.to_owned()],
            metadata: timestamp
                .map(|timestamp| {
                    BTreeMap::from([(
                        "timestamp".to_owned(),
                        timestamp.to_owned(),
                    )])
                })
                .unwrap_or_default(),
        }
    }

    #[tokio::test]
    async fn test_reset() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig {
            outputs_dir: dir.path().join("outputs"),
            logs_dir: dir.path().join("logs"),
            ..Default::default()
        };
        std::fs::create_dir_all(config.outputs_dir.join("notes")).unwrap();
        std::fs::write(config.outputs_dir.join("notes/a.txt"), "a").unwrap();

        let service = TestAssistantService::default();
        let conversation_id = service.seed_conversation();
        let env_file = dir.path().join(".env");
        std::fs::write(
            &env_file,
            format!("ASSISTANT_ID=asst_1\nTHREAD_ID={conversation_id}\n"),
        )
        .unwrap();

        let mut store = EnvStore::open(&env_file).unwrap();
        reset(&service, &mut store, &config).await.unwrap();

        assert!(!service.has_conversation(&conversation_id));
        let store = EnvStore::open(&env_file).unwrap();
        assert_eq!(store.get(PROFILE_ID_KEY), Some("asst_1"));
        assert_eq!(store.get(CONVERSATION_ID_KEY), None);
        for dir in [&config.outputs_dir, &config.logs_dir] {
            assert_eq!(std::fs::read_dir(dir).unwrap().count(), 0);
        }

        // Resetting twice is fine.
        let mut store = EnvStore::open(&env_file).unwrap();
        reset(&service, &mut store, &config).await.unwrap();
    }

    #[tokio::test]
    async fn test_update_profile() {
        let dir = tempfile::tempdir().unwrap();
        let env_file = dir.path().join(".env");
        let service = TestAssistantService::default();
        let config = AppConfig::default();

        let store = EnvStore::open(&env_file).unwrap();
        let err = update_profile(&service, &store, &config, vec![])
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            MaintenanceError::MissingIdentifier(PROFILE_ID_KEY)
        ));

        let outdated = AssistantProfile {
            name: "old".to_owned(),
            description: String::new(),
            instructions: String::new(),
            model: "old-model".to_owned(),
            hosted_tools: vec![],
            tools: vec![],
            knowledge_store_ids: vec![],
        };
        let profile_id = service.create_profile(&outdated).await.unwrap();
        std::fs::write(
            &env_file,
            format!(
                "{PROFILE_ID_KEY}={profile_id}\n\
                 {KNOWLEDGE_STORE_ID_KEY}=vs_9\n"
            ),
        )
        .unwrap();

        let store = EnvStore::open(&env_file).unwrap();
        let updated = update_profile(&service, &store, &config, vec![])
            .await
            .unwrap();
        assert_eq!(updated, profile_id);
        let profile = service.profile(&profile_id).unwrap();
        assert_eq!(profile.model, config.model);
        assert_eq!(profile.knowledge_store_ids, ["vs_9"]);
    }

    #[test]
    fn test_render_history() {
        let messages = [
            message(
                MessageRole::User,
                "2024-05-01 10:00: What next?",
                Some("2024-05-01 10:00:00.123"),
            ),
            message(MessageRole::Assistant, "I wrote the digest.", None),
            message(MessageRole::User, "2024-05-01 10:05: What next?", None),
        ];
        assert_eq!(
            render_history(&messages),
            "2024-05-01 10:00:00.123\n\
             \n\
             ASSISTANT: I wrote the digest.\n\
             2024-05-01 10:05: What next?"
        );
    }
}
