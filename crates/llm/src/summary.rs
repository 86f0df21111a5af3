//! Pre-emptive summary generation for atomic CLEAR resets.
//!
//! Computed ahead of the hard context-window threshold so the reset itself
//! is a single cheap substitution rather than a blocking LLM call on the
//! request that crosses the limit.

use grov_domain::session::{Session, Step};
use grov_providers::{ChatRequest, ProviderRegistry};
use std::sync::Arc;

const ROLE: &str = "summary";

pub struct SummaryGenerator {
    registry: Arc<ProviderRegistry>,
}

impl SummaryGenerator {
    pub fn new(registry: Arc<ProviderRegistry>) -> Self {
        Self { registry }
    }

    pub fn is_available(&self) -> bool {
        self.registry.is_available(ROLE)
    }

    pub async fn generate(&self, session: &Session, steps: &[Step]) -> String {
        if let Some(provider) = self.registry.for_role(ROLE) {
            let prompt = build_prompt(session, steps);
            let req = ChatRequest {
                system: None,
                prompt,
                json_mode: false,
                max_tokens: Some(2000),
            };
            match provider.chat(req).await {
                Ok(resp) => return resp.content,
                Err(err) => {
                    tracing::warn!(error = %err, "summary helper call failed, using fallback");
                }
            }
        }
        fallback_summary(session, steps)
    }
}

fn build_prompt(session: &Session, steps: &[Step]) -> String {
    let step_log = steps
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

    format!(
        "Summarize this coding session so work can continue after its conversation \
         history is cleared. Preserve:\n\
         1. The current goal or plan being worked on\n\
         2. Key decisions made\n\
         3. Files modified and why\n\
         4. Open questions or threads\n\
         5. Current state and next steps\n\n\
         Be concise but preserve all actionable context. Write in present tense.\n\
         Omit greetings and pleasantries. Focus on substance.\n\n\
         GOAL: {}\n\
         CONSTRAINTS: {:?}\n\
         ACTION LOG:\n{step_log}",
        session.goal, session.constraints
    )
}

/// With no summary helper configured, fall back to a terse mechanical
/// digest of the goal and the files the session actually touched.
fn fallback_summary(session: &Session, steps: &[Step]) -> String {
    let mut files: Vec<&str> = Vec::new();
    for step in steps {
        for f in &step.files {
            if !files.contains(&f.as_str()) {
                files.push(f);
            }
        }
    }
    format!(
        "Goal: {}\nFiles modified: {}\nSteps taken: {}\n\
         (heuristic fallback summary: no summary helper configured)",
        session.goal,
        if files.is_empty() {
            "none".to_string()
        } else {
            files.join(", ")
        },
        steps.len()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use grov_domain::config::AuxLlmConfig;
    use grov_domain::session::{SessionKind, SessionMode, SessionStatus};
    use chrono::Utc;

    fn session() -> Session {
        Session {
            id: "s1".to_string(),
            project_path: "/proj".to_string(),
            goal: "add rate limiting".to_string(),
            expected_scope: vec![],
            constraints: vec![],
            keywords: vec![],
            kind: SessionKind::Main,
            parent_id: None,
            status: SessionStatus::Active,
            mode: SessionMode::Normal,
            escalation: 0,
            waiting_for_recovery: false,
            last_checked_at: Utc::now(),
            context_tokens: 0,
            pending_correction: None,
            pending_forced_recovery: None,
            pending_clear_summary: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            request_count: 1,
        }
    }

    fn step() -> Step {
        Step {
            id: 1,
            session_id: "s1".to_string(),
            kind: "edit".to_string(),
            files: vec!["src/middleware.ts".to_string()],
            folders: Vec::new(),
            command: None,
            reasoning: Some("added a token bucket".to_string()),
            drift_score: 9,
            is_validated: true,
            is_key_decision: true,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn fallback_summary_mentions_goal_and_files() {
        let registry = Arc::new(ProviderRegistry::from_config(&AuxLlmConfig::default()).unwrap());
        let generator = SummaryGenerator::new(registry);
        assert!(!generator.is_available());
        let summary = generator.generate(&session(), &[step()]).await;
        assert!(summary.contains("add rate limiting"));
        assert!(summary.contains("src/middleware.ts"));
    }
}
