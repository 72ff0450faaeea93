use std::error::Error as StdError;

use autoassist_core::env_store::{EnvStore, EnvStoreError};
use autoassist_core::session::{Session, SessionState};
use autoassist_model::{AssistantService, ToolDescriptor};

use crate::config::AppConfig;
use crate::profile::{KNOWLEDGE_STORE_NAME, build_profile};

/// The error returned when the session cannot be prepared.
#[derive(Debug, thiserror::Error)]
pub enum BootstrapError {
    /// A request to the service failed.
    #[error("failed to {operation}: {source}")]
    Service {
        /// What was being created.
        operation: &'static str,
        /// The error returned by the service.
        source: Box<dyn StdError + Send + Sync>,
    },
    /// The identifiers could not be persisted.
    #[error(transparent)]
    Store(#[from] EnvStoreError),
}

impl BootstrapError {
    fn service<E: StdError + Send + Sync + 'static>(
        operation: &'static str,
    ) -> impl FnOnce(E) -> Self {
        move |err| Self::Service {
            operation,
            source: Box::new(err),
        }
    }
}

/// Makes sure the remote objects of the session exist.
///
/// Identifiers found in `store` are reused as they are. Missing ones are
/// created in dependency order (knowledge store, profile, conversation)
/// and written back to the store right away, so a failure halfway doesn't
/// lose the objects created so far.
pub async fn bootstrap<S: AssistantService>(
    service: &S,
    store: &mut EnvStore,
    config: &AppConfig,
    tools: &[ToolDescriptor],
) -> Result<Session, BootstrapError> {
    let mut state = SessionState::load(store);
    let knowledge_store_id =
        ensure_knowledge_store(service, store, &mut state).await?;

    let profile_id = match state.profile_id.clone() {
        Some(id) => id,
        None => {
            let profile = build_profile(
                config,
                tools.to_vec(),
                Some(&knowledge_store_id),
            );
            let id = service
                .create_profile(&profile)
                .await
                .map_err(BootstrapError::service("create the assistant"))?;
            info!("assistant created: {id}");
            state.profile_id = Some(id.clone());
            persist(&state, store)?;
            id
        }
    };

    let conversation_id = match state.conversation_id.clone() {
        Some(id) => id,
        None => {
            let id = service.create_conversation().await.map_err(
                BootstrapError::service("create the conversation"),
            )?;
            info!("conversation created: {id}");
            state.conversation_id = Some(id.clone());
            persist(&state, store)?;
            id
        }
    };

    Ok(Session {
        profile_id,
        conversation_id,
    })
}

async fn ensure_knowledge_store<S: AssistantService>(
    service: &S,
    store: &mut EnvStore,
    state: &mut SessionState,
) -> Result<String, BootstrapError> {
    if let Some(id) = &state.knowledge_store_id {
        return Ok(id.clone());
    }
    let id = service
        .create_knowledge_store(KNOWLEDGE_STORE_NAME)
        .await
        .map_err(BootstrapError::service("create the knowledge store"))?;
    info!("knowledge store created: {id}");
    state.knowledge_store_id = Some(id.clone());
    persist(state, store)?;
    Ok(id)
}

fn persist(
    state: &SessionState,
    store: &mut EnvStore,
) -> Result<(), EnvStoreError> {
    state.store(store);
    store.save()
}
