//! Recovery-alignment check: did the model follow a previously issued
//! correction or forced-recovery plan?

use crate::helpers::parse_strict_json;
use grov_domain::session::Step;
use grov_providers::{ChatRequest, ProviderRegistry};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

const ROLE: &str = "recovery";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecoveryVerdict {
    pub aligned: bool,
    pub reason: String,
}

pub struct RecoveryChecker {
    registry: Arc<ProviderRegistry>,
}

impl RecoveryChecker {
    pub fn new(registry: Arc<ProviderRegistry>) -> Self {
        Self { registry }
    }

    pub fn is_available(&self) -> bool {
        self.registry.is_available(ROLE)
    }

    pub async fn check(&self, plan: &str, step: &Step) -> RecoveryVerdict {
        if let Some(provider) = self.registry.for_role(ROLE) {
            let prompt = format!(
                "A coding session was told to follow this recovery plan:\n{plan}\n\n\
                 It then took this action: kind={}, files={:?}, reasoning={}\n\n\
                 Did the action follow the plan? Respond with JSON only: \
                 {{\"aligned\": bool, \"reason\": short string}}.",
                step.kind,
                step.files,
                step.reasoning.as_deref().unwrap_or("(none)")
            );
            let req = ChatRequest {
                system: None,
                prompt,
                json_mode: true,
                max_tokens: Some(200),
            };
            match provider.chat(req).await {
                Ok(resp) => {
                    if let Some(verdict) = parse_strict_json::<RecoveryVerdict>(&resp.content) {
                        return verdict;
                    }
                    tracing::warn!("recovery helper returned unparseable JSON, using fallback");
                }
                Err(err) => {
                    tracing::warn!(error = %err, "recovery helper call failed, using fallback");
                }
            }
        }
        fallback_verdict()
    }
}

/// With no recovery checker configured, stay conservative: keep escalation
/// running rather than prematurely declaring the session back on track.
fn fallback_verdict() -> RecoveryVerdict {
    RecoveryVerdict {
        aligned: false,
        reason: "heuristic fallback: no recovery helper configured".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use grov_domain::config::AuxLlmConfig;
    use chrono::Utc;

    fn step() -> Step {
        Step {
            id: 1,
            session_id: "s1".to_string(),
            kind: "edit".to_string(),
            files: vec!["a.ts".to_string()],
            folders: Vec::new(),
            command: None,
            reasoning: Some("fixed the thing".to_string()),
            drift_score: 9,
            is_validated: true,
            is_key_decision: false,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn fallback_defaults_to_unaligned() {
        let registry = Arc::new(ProviderRegistry::from_config(&AuxLlmConfig::default()).unwrap());
        let checker = RecoveryChecker::new(registry);
        assert!(!checker.is_available());
        let verdict = checker.check("revert the refactor", &step()).await;
        assert!(!verdict.aligned);
    }
}
