//! Identifiers of the remote objects a session runs against.

use crate::env_store::EnvStore;

/// Key of the capability profile identifier.
pub const PROFILE_ID_KEY: &str = "ASSISTANT_ID";
/// Key of the conversation identifier.
pub const CONVERSATION_ID_KEY: &str = "THREAD_ID";
/// Key of the knowledge store identifier.
pub const KNOWLEDGE_STORE_ID_KEY: &str = "VECTOR_STORE_ID";

/// The persisted identifiers, any of which may not have been created yet.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SessionState {
    /// The capability profile.
    pub profile_id: Option<String>,
    /// The conversation.
    pub conversation_id: Option<String>,
    /// The knowledge store attached to the profile.
    pub knowledge_store_id: Option<String>,
}

impl SessionState {
    /// Reads the identifiers from a store. Empty values count as absent.
    pub fn load(store: &EnvStore) -> Self {
        let read = |key| {
            store
                .get(key)
                .filter(|value| !value.is_empty())
                .map(str::to_owned)
        };
        Self {
            profile_id: read(PROFILE_ID_KEY),
            conversation_id: read(CONVERSATION_ID_KEY),
            knowledge_store_id: read(KNOWLEDGE_STORE_ID_KEY),
        }
    }

    /// Writes all present identifiers into a store, leaving other keys as
    /// they are.
    pub fn store(&self, store: &mut EnvStore) {
        let entries = [
            (PROFILE_ID_KEY, &self.profile_id),
            (CONVERSATION_ID_KEY, &self.conversation_id),
            (KNOWLEDGE_STORE_ID_KEY, &self.knowledge_store_id),
        ];
        for (key, value) in entries {
            if let Some(value) = value {
                store.set(key, value.as_str());
            }
        }
    }

    /// Returns the session, if both the profile and the conversation
    /// exist.
    pub fn session(&self) -> Option<Session> {
        Some(Session {
            profile_id: self.profile_id.clone()?,
            conversation_id: self.conversation_id.clone()?,
        })
    }
}

/// A persistent remote conversation and the profile that answers in it.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Session {
    /// The capability profile.
    pub profile_id: String,
    /// The conversation.
    pub conversation_id: String,
}
