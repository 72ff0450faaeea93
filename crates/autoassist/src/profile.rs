use autoassist_model::{AssistantProfile, HostedTool, ToolDescriptor};

use crate::config::AppConfig;

/// Name of the knowledge store created for the assistant.
pub const KNOWLEDGE_STORE_NAME: &str = "AA vector store";

const PROFILE_NAME: &str = "Autonomous Assistant";
const PROFILE_DESCRIPTION: &str = "An AI assistant that plans and executes \
                                   tasks to achieve the given objective";

/// Builds the capability profile of the assistant.
///
/// The instructions list every local tool with its description, followed by
/// the objective.
pub fn build_profile(
    config: &AppConfig,
    tools: Vec<ToolDescriptor>,
    knowledge_store_id: Option<&str>,
) -> AssistantProfile {
    AssistantProfile {
        name: PROFILE_NAME.to_owned(),
        description: PROFILE_DESCRIPTION.to_owned(),
        instructions: instructions(&config.objective, &tools),
        model: config.model.clone(),
        hosted_tools: vec![HostedTool::FileSearch, HostedTool::CodeInterpreter],
        tools,
        knowledge_store_ids: knowledge_store_id
            .map(|id| vec![id.to_owned()])
            .unwrap_or_default(),
    }
}

fn instructions(objective: &str, tools: &[ToolDescriptor]) -> String {
    let mut text = String::from(
        "You are an AI assistant that plans and executes tasks to achieve \
         the given objective.\n\
         After each step, evaluate the result and decide the next best \
         action.\n\n\
         You have access to the following functions:\n",
    );
    for tool in tools {
        text.push_str(&format!("{}: {}\n", tool.name, tool.description));
    }
    text.push_str(
        "\nConsidering what you already know, think thoroughly and \
         critically about what additional information you need and which \
         function to call next.\n\n\
         OBJECTIVE:\n",
    );
    text.push_str(objective.trim());
    text
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_profile() {
        let config = AppConfig {
            objective: "\nWrite a weekly digest.\n".to_owned(),
            ..Default::default()
        };
        let tools = vec![ToolDescriptor {
            name: "sleep".to_owned(),
            description: "Do nothing for the given period.".to_owned(),
            parameters: json!({ "type": "object" }),
        }];

        let profile = build_profile(&config, tools, Some("vs_1"));
        assert_eq!(profile.name, "Autonomous Assistant");
        assert_eq!(profile.model, "gpt-4o-mini");
        assert_eq!(profile.knowledge_store_ids, ["vs_1"]);
        assert_eq!(profile.tools.len(), 1);
        assert!(profile.instructions.contains(
            "functions:\nsleep: Do nothing for the given period.\n\n"
        ));
        assert!(
            profile
                .instructions
                .ends_with("OBJECTIVE:\nWrite a weekly digest.")
        );

        let profile = build_profile(&config, vec![], None);
        assert!(profile.knowledge_store_ids.is_empty());
    }
}
