use std::sync::Arc;

use autoassist_core::log_store::FsLogStore;
use autoassist_core::session::Session;
use autoassist_core::tool::{FunctionRegistry, RegistryError};
use autoassist_core::{ControllerBuilder, ToolDispatcher};
use autoassist_model::AssistantService;

use crate::config::AppConfig;
use crate::tools::{
    CORE_MODULE, DuckDuckGoBackend, SearchBackend, WEB_MODULE, core_module,
    web_module,
};

/// The error returned when the tools cannot be assembled.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The configuration names a module that doesn't exist.
    #[error("unknown tool module `{0}`")]
    UnknownModule(String),
    /// A module could not be registered.
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

/// Assembles the parts of a session from the configuration.
///
/// The tools are built first, because their descriptors are needed to
/// create the capability profile before a controller can run.
pub struct SessionBuilder<'a> {
    config: &'a AppConfig,
    search_backend: Arc<dyn SearchBackend>,
}

impl<'a> SessionBuilder<'a> {
    /// Creates a builder for the given configuration.
    #[inline]
    pub fn new(config: &'a AppConfig) -> Self {
        Self {
            config,
            search_backend: Arc::new(DuckDuckGoBackend::new()),
        }
    }

    /// Replaces the engine used by the `web_search` tool.
    #[inline]
    pub fn with_search_backend<B: SearchBackend + 'static>(
        mut self,
        search_backend: B,
    ) -> Self {
        self.search_backend = Arc::new(search_backend);
        self
    }

    /// Installs the configured tool modules, in order.
    pub fn build_registry(&self) -> Result<FunctionRegistry, SessionError> {
        let mut registry =
            FunctionRegistry::with_policy(self.config.collision_policy);
        for name in &self.config.modules {
            let module = match name.as_str() {
                CORE_MODULE => core_module(&self.config.outputs_dir),
                WEB_MODULE => web_module(Arc::clone(&self.search_backend)),
                _ => return Err(SessionError::UnknownModule(name.clone())),
            };
            registry.register_module(module)?;
        }
        Ok(registry)
    }

    /// Builds a dispatcher over the configured tools, logging into the
    /// configured directory.
    pub fn build_dispatcher(&self) -> Result<ToolDispatcher, SessionError> {
        let registry = self.build_registry()?;
        let log_store = Arc::new(FsLogStore::new(&self.config.logs_dir));
        let mut dispatcher = ToolDispatcher::new(registry, log_store)
            .with_budget(self.config.output_budget());
        if let Some(call_timeout) = self.config.tool_timeout() {
            dispatcher = dispatcher.with_call_timeout(call_timeout);
        }
        Ok(dispatcher)
    }

    /// Prepares a controller for `session`, configured with the prompt,
    /// the poll interval and the budget scope.
    pub fn build_controller<S: AssistantService>(
        &self,
        service: S,
        session: Session,
        dispatcher: ToolDispatcher,
    ) -> ControllerBuilder<S> {
        ControllerBuilder::new(service, session, dispatcher)
            .with_prompt(self.config.prompt.clone())
            .with_poll_interval(self.config.poll_interval())
            .with_budget_scope(self.config.budget_scope)
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use autoassist_core::tool::CollisionPolicy;
    use autoassist_model::ToolCallRequest;
    use autoassist_test_model::{PresetRun, PresetStep, TestAssistantService};
    use serde_json::json;

    use super::*;
    use crate::tools::{SearchError, SearchResult};

    struct NoSearch;

    #[async_trait]
    impl SearchBackend for NoSearch {
        async fn search(
            &self,
            _query: &str,
        ) -> Result<Vec<SearchResult>, SearchError> {
            Err(SearchError::Other("offline".to_owned()))
        }
    }

    #[test]
    fn test_registry_follows_the_configuration() {
        let config = AppConfig::default();
        let registry = SessionBuilder::new(&config).build_registry().unwrap();
        let names: Vec<_> = registry.names().collect();
        assert_eq!(
            names,
            [
                "write_file",
                "read_file",
                "list_folders",
                "list_files",
                "sleep",
                "fetch_content",
                "web_search",
            ]
        );

        let config = AppConfig {
            modules: vec!["core".to_owned(), "shell".to_owned()],
            ..Default::default()
        };
        let err = SessionBuilder::new(&config).build_registry().unwrap_err();
        assert!(matches!(
            err,
            SessionError::UnknownModule(ref name) if name == "shell"
        ));

        let config = AppConfig {
            modules: vec!["core".to_owned(), "core".to_owned()],
            collision_policy: CollisionPolicy::Reject,
            ..Default::default()
        };
        let err = SessionBuilder::new(&config).build_registry().unwrap_err();
        assert!(matches!(err, SessionError::Registry(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_turn_with_file_tools() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig {
            outputs_dir: dir.path().join("outputs"),
            logs_dir: dir.path().join("logs"),
            ..Default::default()
        };
        let builder =
            SessionBuilder::new(&config).with_search_backend(NoSearch);

        let service = TestAssistantService::default();
        service.add_run(
            PresetRun::with_steps([
                PresetStep::RequiresAction(vec![ToolCallRequest {
                    id: "call_1".to_owned(),
                    name: "write_file".to_owned(),
                    arguments: json!({
                        "content": "Synthwave is back.",
                        "folder": "insights",
                        "filename": "trends.md",
                    }),
                }]),
                PresetStep::RequiresAction(vec![ToolCallRequest {
                    id: "call_2".to_owned(),
                    name: "read_file".to_owned(),
                    arguments: json!({
                        "folder": "insights",
                        "filename": "trends.md",
                    }),
                }]),
            ])
            .with_reply("Noted."),
        );
        let session = Session {
            profile_id: "asst_1".to_owned(),
            conversation_id: service.seed_conversation(),
        };

        let dispatcher = builder.build_dispatcher().unwrap();
        let mut controller = builder
            .build_controller(service.clone(), session, dispatcher)
            .build();
        let summary = controller.run_turn().await.unwrap();
        assert_eq!(summary.rounds, 2);

        let submissions = service.submissions();
        assert_eq!(submissions[0].outputs[0].output, "");
        assert_eq!(submissions[1].outputs[0].output, "Synthwave is back.");

        // Every output is logged, even the empty one.
        let logs = std::fs::read_dir(&config.logs_dir).unwrap().count();
        assert_eq!(logs, 2);
    }
}
