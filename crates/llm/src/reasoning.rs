//! Reasoning and decision extraction, run once at task close to build the
//! durable record promoted into team memory.

use crate::helpers::parse_strict_json;
use grov_domain::session::{Decision, Step};
use grov_providers::{ChatRequest, ProviderRegistry};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

const ROLE: &str = "reasoning";
const MAX_CONCLUSIONS: usize = 10;
const MAX_DECISIONS: usize = 5;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ReasoningExtract {
    /// Up to 10 entries, each prefixed "CONCLUSION:" or "INSIGHT:".
    pub conclusions: Vec<String>,
    /// Up to 5 choice/reason pairs.
    pub decisions: Vec<Decision>,
}

pub struct ReasoningExtractor {
    registry: Arc<ProviderRegistry>,
}

impl ReasoningExtractor {
    pub fn new(registry: Arc<ProviderRegistry>) -> Self {
        Self { registry }
    }

    pub fn is_available(&self) -> bool {
        self.registry.is_available(ROLE)
    }

    pub async fn extract(&self, steps: &[Step]) -> ReasoningExtract {
        if let Some(provider) = self.registry.for_role(ROLE) {
            let log = steps
                .iter()
                .map(|s| {
                    format!(
                        "- {} on {:?}: {}",
                        s.kind,
                        s.files,
                        s.reasoning.as_deref().unwrap_or("(no reasoning recorded)")
                    )
                })
                .collect::<Vec<_>>()
                .join("\n");

            let prompt = format!(
                "Review this log of actions taken to complete a coding task and extract \
                 the durable knowledge worth remembering for future related tasks. Respond \
                 with JSON only: {{\"conclusions\": [up to {MAX_CONCLUSIONS} strings, each \
                 prefixed \"CONCLUSION:\" or \"INSIGHT:\"], \"decisions\": [up to \
                 {MAX_DECISIONS} objects {{\"choice\": string, \"reason\": string}}]}}.\n\n\
                 Action log:\n{log}"
            );
            let req = ChatRequest {
                system: None,
                prompt,
                json_mode: true,
                max_tokens: Some(800),
            };
            match provider.chat(req).await {
                Ok(resp) => {
                    if let Some(mut extract) = parse_strict_json::<ReasoningExtract>(&resp.content)
                    {
                        extract.conclusions.truncate(MAX_CONCLUSIONS);
                        extract.decisions.truncate(MAX_DECISIONS);
                        return extract;
                    }
                    tracing::warn!("reasoning helper returned unparseable JSON, using fallback");
                }
                Err(err) => {
                    tracing::warn!(error = %err, "reasoning helper call failed, using fallback");
                }
            }
        }
        fallback_extract(steps)
    }
}

/// With no reasoning helper configured, derive conclusions straight from
/// the steps that were themselves already flagged as key decisions.
fn fallback_extract(steps: &[Step]) -> ReasoningExtract {
    let conclusions = steps
        .iter()
        .filter_map(|s| s.reasoning.as_ref())
        .map(|r| format!("INSIGHT: {r}"))
        .take(MAX_CONCLUSIONS)
        .collect();

    let decisions = steps
        .iter()
        .filter(|s| s.is_key_decision)
        .filter_map(|s| {
            s.reasoning.as_ref().map(|reason| Decision {
                choice: s.kind.clone(),
                reason: reason.clone(),
            })
        })
        .take(MAX_DECISIONS)
        .collect();

    ReasoningExtract {
        conclusions,
        decisions,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use grov_domain::config::AuxLlmConfig;
    use chrono::Utc;

    fn step(reasoning: &str, key_decision: bool) -> Step {
        Step {
            id: 1,
            session_id: "s1".to_string(),
            kind: "edit".to_string(),
            files: vec!["a.ts".to_string()],
            folders: Vec::new(),
            command: None,
            reasoning: Some(reasoning.to_string()),
            drift_score: 9,
            is_validated: true,
            is_key_decision: key_decision,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn fallback_pulls_decisions_from_key_decision_steps_only() {
        let registry = Arc::new(ProviderRegistry::from_config(&AuxLlmConfig::default()).unwrap());
        let extractor = ReasoningExtractor::new(registry);
        let steps = vec![
            step("picked postgres over sqlite", true),
            step("renamed a variable", false),
        ];
        let extract = extractor.extract(&steps).await;
        assert_eq!(extract.decisions.len(), 1);
        assert_eq!(extract.decisions[0].reason, "picked postgres over sqlite");
        assert_eq!(extract.conclusions.len(), 2);
    }
}
