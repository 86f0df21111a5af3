//! Selects an `AgentAdapter` for a request by upstream URL.

use crate::traits::AgentAdapter;
use std::sync::Arc;

pub struct AdapterRegistry {
    adapters: Vec<Arc<dyn AgentAdapter>>,
}

impl AdapterRegistry {
    pub fn new(adapters: Vec<Arc<dyn AgentAdapter>>) -> Self {
        Self { adapters }
    }

    pub fn resolve(&self, url: &str) -> Option<Arc<dyn AgentAdapter>> {
        self.adapters.iter().find(|a| a.can_handle(url)).cloned()
    }
}

/// A small/auxiliary model the client itself targets (e.g. Haiku as a
/// sub-agent). These requests bypass injection and orchestration entirely.
pub fn is_sub_agent_model(model: &str) -> bool {
    let lower = model.to_ascii_lowercase();
    lower.contains("haiku") || lower.contains("mini")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::anthropic::AnthropicAdapter;
    use crate::openai_compat::OpenAiCompatAdapter;

    #[test]
    fn resolves_anthropic_then_openai() {
        let registry = AdapterRegistry::new(vec![
            Arc::new(AnthropicAdapter::new("https://api.anthropic.com").unwrap()),
            Arc::new(OpenAiCompatAdapter::new("https://api.openai.com/v1").unwrap()),
        ]);
        assert!(registry
            .resolve("https://api.anthropic.com/v1/messages")
            .is_some());
        assert!(registry
            .resolve("https://api.openai.com/v1/chat/completions")
            .is_some());
        assert!(registry.resolve("https://example.com/unknown").is_none());
    }

    #[test]
    fn sub_agent_bypass_matches_haiku_and_mini() {
        assert!(is_sub_agent_model("claude-3-5-haiku-20241022"));
        assert!(is_sub_agent_model("gpt-4o-mini"));
        assert!(!is_sub_agent_model("claude-3-5-sonnet-20241022"));
    }
}
