//! System prompt generation.

use crate::tools::ToolRegistry;

/// Builds the leading system message for every backend call.
pub trait PromptGenerator: Send + Sync {
    fn system_prompt(
        &self,
        instructions: Option<&str>,
        tools: Option<&dyn ToolRegistry>,
    ) -> Option<String>;
}

/// Uses the agent's instructions verbatim, followed by a tool list.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultPromptGenerator;

impl PromptGenerator for DefaultPromptGenerator {
    fn system_prompt(
        &self,
        instructions: Option<&str>,
        tools: Option<&dyn ToolRegistry>,
    ) -> Option<String> {
        let mut sections = Vec::new();
        if let Some(instructions) = instructions.filter(|s| !s.trim().is_empty()) {
            sections.push(instructions.trim().to_string());
        }

        let definitions = tools.map(|registry| registry.definitions()).unwrap_or_default();
        if !definitions.is_empty() {
            let listing = definitions
                .iter()
                .map(|d| format!("- {}: {}", d.name, d.description))
                .collect::<Vec<_>>()
                .join("\n");
            sections.push(format!("You can call these tools:\n{listing}"));
        }

        if sections.is_empty() {
            None
        } else {
            Some(sections.join("\n\n"))
        }
    }
}
