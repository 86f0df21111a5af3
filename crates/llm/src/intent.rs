//! First-prompt intent extraction.

use crate::helpers::parse_strict_json;
use grov_providers::{ChatRequest, ProviderRegistry};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

const ROLE: &str = "intent";

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Intent {
    pub goal: String,
    pub expected_scope: Vec<String>,
    pub constraints: Vec<String>,
    pub success_criteria: Option<String>,
    pub keywords: Vec<String>,
}

pub struct IntentExtractor {
    registry: Arc<ProviderRegistry>,
}

impl IntentExtractor {
    pub fn new(registry: Arc<ProviderRegistry>) -> Self {
        Self { registry }
    }

    pub fn is_available(&self) -> bool {
        self.registry.is_available(ROLE)
    }

    pub async fn extract(&self, first_user_message: &str) -> Intent {
        if let Some(provider) = self.registry.for_role(ROLE) {
            let prompt = format!(
                "Extract structured intent from this coding task request. Respond with \
                 JSON only, matching exactly this shape: {{\"goal\": string (<=2 sentences), \
                 \"expected_scope\": [file or folder paths], \"constraints\": [strings, both \
                 things to avoid and things required], \"success_criteria\": string or null, \
                 \"keywords\": [lowercase strings]}}.\n\nRequest:\n{first_user_message}"
            );
            let req = ChatRequest {
                system: None,
                prompt,
                json_mode: true,
                max_tokens: Some(512),
            };
            match provider.chat(req).await {
                Ok(resp) => {
                    if let Some(intent) = parse_strict_json::<Intent>(&resp.content) {
                        return intent;
                    }
                    tracing::warn!("intent helper returned unparseable JSON, using fallback");
                }
                Err(err) => {
                    tracing::warn!(error = %err, "intent helper call failed, using fallback");
                }
            }
        }
        fallback_intent(first_user_message)
    }
}

const STOP_WORDS: &[&str] = &[
    "the", "a", "an", "to", "of", "in", "on", "for", "and", "is", "add", "please", "with",
    "that", "this", "it", "be", "as", "at", "by", "from", "we", "you", "i",
];

fn fallback_intent(message: &str) -> Intent {
    Intent {
        goal: message.chars().take(200).collect(),
        expected_scope: extract_file_like_tokens(message),
        constraints: Vec::new(),
        success_criteria: None,
        keywords: extract_keywords(message),
    }
}

fn extract_file_like_tokens(text: &str) -> Vec<String> {
    let re = regex::Regex::new(r"[A-Za-z0-9_./-]+\.[A-Za-z0-9]{1,5}\b").expect("valid regex");
    let mut seen = std::collections::BTreeSet::new();
    re.find_iter(text)
        .map(|m| m.as_str().to_string())
        .filter(|tok| seen.insert(tok.clone()))
        .collect()
}

fn extract_keywords(text: &str) -> Vec<String> {
    let re = regex::Regex::new(r"[A-Za-z][A-Za-z0-9_-]{2,}").expect("valid regex");
    let mut seen = std::collections::BTreeSet::new();
    re.find_iter(text)
        .map(|m| m.as_str().to_ascii_lowercase())
        .filter(|w| !STOP_WORDS.contains(&w.as_str()))
        .filter(|w| seen.insert(w.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use grov_domain::config::AuxLlmConfig;

    #[tokio::test]
    async fn fallback_extracts_file_like_tokens_and_keywords() {
        let registry = Arc::new(ProviderRegistry::from_config(&AuxLlmConfig::default()).unwrap());
        let extractor = IntentExtractor::new(registry);
        assert!(!extractor.is_available());

        let intent = extractor
            .extract("please add rate limiting to src/middleware/rate-limit.ts")
            .await;
        assert!(intent.expected_scope.contains(&"src/middleware/rate-limit.ts".to_string()));
        assert!(intent.keywords.contains(&"rate".to_string()));
        assert!(!intent.keywords.contains(&"please".to_string()));
    }
}
