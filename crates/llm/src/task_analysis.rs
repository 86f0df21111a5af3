//! End-of-turn task-state classification.

use crate::helpers::parse_strict_json;
use grov_domain::session::{Session, Step};
use grov_providers::{ChatRequest, ProviderRegistry};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

const ROLE: &str = "task_analysis";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    Information,
    Planning,
    Implementation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskAction {
    Continue,
    NewTask,
    Subtask,
    ParallelTask,
    TaskComplete,
    SubtaskComplete,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskAnalysis {
    pub task_type: TaskType,
    pub action: TaskAction,
    pub task_id: Option<String>,
    pub current_goal: Option<String>,
    pub parent_task_id: Option<String>,
    pub reasoning: String,
    pub step_reasoning: Option<String>,
}

pub struct TaskAnalyzer {
    registry: Arc<ProviderRegistry>,
}

impl TaskAnalyzer {
    pub fn new(registry: Arc<ProviderRegistry>) -> Self {
        Self { registry }
    }

    pub fn is_available(&self) -> bool {
        self.registry.is_available(ROLE)
    }

    pub async fn analyze(
        &self,
        session: Option<&Session>,
        latest_user_message: &str,
        recent_steps: &[Step],
        assistant_final_text: &str,
    ) -> TaskAnalysis {
        if let Some(provider) = self.registry.for_role(ROLE) {
            let steps_summary = recent_steps
                .iter()
                .map(|s| format!("- {} ({:?})", s.kind, s.files))
                .collect::<Vec<_>>()
                .join("\n");
            let session_summary = session
                .map(|s| format!("active session goal=\"{}\" status={:?}", s.goal, s.status))
                .unwrap_or_else(|| "no active session".to_string());

            let prompt = format!(
                "Classify this turn of a coding task. Respond with JSON only matching: \
                 {{\"task_type\": \"information\"|\"planning\"|\"implementation\", \
                 \"action\": \"continue\"|\"new_task\"|\"subtask\"|\"parallel_task\"|\"task_complete\"|\"subtask_complete\", \
                 \"task_id\": string or null, \"current_goal\": string or null, \
                 \"parent_task_id\": string or null, \"reasoning\": string, \
                 \"step_reasoning\": string or null}}.\n\n\
                 Informational turns close as soon as a substantive answer is given. \
                 Planning turns only close on explicit user confirmation. Implementation \
                 turns only close once the model stops making modifications and signals \
                 success. A topic change relative to the session goal means new_task.\n\n\
                 Session: {session_summary}\n\
                 Latest user message: {latest_user_message}\n\
                 Recent steps:\n{steps_summary}\n\
                 Assistant's final text: {assistant_final_text}"
            );
            let req = ChatRequest {
                system: None,
                prompt,
                json_mode: true,
                max_tokens: Some(512),
            };
            match provider.chat(req).await {
                Ok(resp) => {
                    if let Some(analysis) = parse_strict_json::<TaskAnalysis>(&resp.content) {
                        return analysis;
                    }
                    tracing::warn!("task_analysis helper returned unparseable JSON, using fallback");
                }
                Err(err) => {
                    tracing::warn!(error = %err, "task_analysis helper call failed, using fallback");
                }
            }
        }
        fallback_analysis(session)
    }
}

/// With no LLM configured the proxy never blocks: keep the turn open under
/// the current session (or open one if none exists) and let drift checking
/// and the user's own signals govern the lifecycle instead.
fn fallback_analysis(session: Option<&Session>) -> TaskAnalysis {
    TaskAnalysis {
        task_type: TaskType::Implementation,
        action: if session.is_some() {
            TaskAction::Continue
        } else {
            TaskAction::NewTask
        },
        task_id: session.map(|s| s.id.clone()),
        current_goal: None,
        parent_task_id: None,
        reasoning: "heuristic fallback: no task_analysis helper configured".to_string(),
        step_reasoning: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use grov_domain::config::AuxLlmConfig;

    #[tokio::test]
    async fn fallback_opens_new_task_when_no_session() {
        let registry = Arc::new(ProviderRegistry::from_config(&AuxLlmConfig::default()).unwrap());
        let analyzer = TaskAnalyzer::new(registry);
        let analysis = analyzer.analyze(None, "add logging", &[], "done").await;
        assert_eq!(analysis.action, TaskAction::NewTask);
    }
}
