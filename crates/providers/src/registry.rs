//! Provider registry: resolves a helper role name to a configured adapter.

use crate::anthropic::AnthropicProvider;
use crate::openai_compat::OpenAiCompatProvider;
use crate::traits::LlmProvider;
use grov_domain::config::{AuxLlmConfig, ProviderKind};
use grov_domain::Result;
use std::collections::HashMap;
use std::sync::Arc;

/// Holds one adapter instance per configured helper role. A role absent
/// from config has no entry here — callers fall back to heuristics rather
/// than treating that as an error.
pub struct ProviderRegistry {
    by_role: HashMap<String, Arc<dyn LlmProvider>>,
}

impl ProviderRegistry {
    pub fn from_config(config: &AuxLlmConfig) -> Result<Self> {
        let mut by_role = HashMap::new();

        for (role, pc) in &config.roles {
            let provider: Arc<dyn LlmProvider> = match pc.kind {
                ProviderKind::Anthropic => Arc::new(AnthropicProvider::from_config(pc)?),
                ProviderKind::OpenaiCompat => Arc::new(OpenAiCompatProvider::from_config(pc)?),
            };
            tracing::info!(role = %role, provider_id = %pc.id, "registered aux LLM provider");
            by_role.insert(role.clone(), provider);
        }

        Ok(Self { by_role })
    }

    pub fn for_role(&self, role: &str) -> Option<Arc<dyn LlmProvider>> {
        self.by_role.get(role).cloned()
    }

    pub fn is_available(&self, role: &str) -> bool {
        self.by_role.contains_key(role)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_yields_no_roles() {
        let registry = ProviderRegistry::from_config(&AuxLlmConfig::default()).unwrap();
        assert!(!registry.is_available("drift"));
        assert!(registry.for_role("drift").is_none());
    }
}
