//! Goal-drift scoring.

use crate::helpers::parse_strict_json;
use grov_domain::config::DriftConfig;
use grov_domain::session::{Session, Step};
use grov_providers::{ChatRequest, ProviderRegistry};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

const ROLE: &str = "drift";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriftResult {
    /// 0-10, 10 = perfectly aligned with the session goal.
    pub score: u8,
    pub drift_type: String,
    pub diagnostic: String,
    pub recovery_plan: Option<Vec<String>>,
}

/// What the session's mode/escalation should become after this score, per
/// the banding thresholds in `DriftConfig`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriftBand {
    /// score >= realign_score: realign to normal.
    Realigned,
    /// drift_score <= score < realign_score: save correction, mode unchanged.
    Caution,
    /// score < drift_score, escalation below forced_escalation: mode=drifted.
    Drifted,
    /// score < drift_score, escalation >= forced_escalation - 1 (about to
    /// reach forced_escalation after this increment): mode=forced.
    Forced,
}

pub fn band_for_score(score: u8, escalation: u32, config: &DriftConfig) -> DriftBand {
    if score >= config.realign_score {
        DriftBand::Realigned
    } else if score >= config.drift_score {
        DriftBand::Caution
    } else if escalation + 1 >= config.forced_escalation {
        DriftBand::Forced
    } else {
        DriftBand::Drifted
    }
}

pub struct DriftChecker {
    registry: Arc<ProviderRegistry>,
}

impl DriftChecker {
    pub fn new(registry: Arc<ProviderRegistry>) -> Self {
        Self { registry }
    }

    pub fn is_available(&self) -> bool {
        self.registry.is_available(ROLE)
    }

    pub async fn check(
        &self,
        session: &Session,
        recent_steps: &[Step],
        latest_user_message: &str,
    ) -> DriftResult {
        if let Some(provider) = self.registry.for_role(ROLE) {
            let steps_summary = recent_steps
                .iter()
                .map(|s| format!("- {} on {:?}: {}", s.kind, s.files, s.reasoning.as_deref().unwrap_or("")))
                .collect::<Vec<_>>()
                .join("\n");

            let prompt = format!(
                "Score how well recent actions stay aligned with the session goal. \
                 Respond with JSON only: {{\"score\": integer 0-10 (10=perfectly aligned), \
                 \"drift_type\": string, \"diagnostic\": short string, \
                 \"recovery_plan\": [ordered strings] or null}}.\n\n\
                 Goal: {}\nConstraints: {:?}\nRecent actions:\n{steps_summary}\n\
                 Latest user message: {latest_user_message}",
                session.goal, session.constraints
            );
            let req = ChatRequest {
                system: None,
                prompt,
                json_mode: true,
                max_tokens: Some(400),
            };
            match provider.chat(req).await {
                Ok(resp) => {
                    if let Some(result) = parse_strict_json::<DriftResult>(&resp.content) {
                        return result;
                    }
                    tracing::warn!("drift helper returned unparseable JSON, using fallback");
                }
                Err(err) => {
                    tracing::warn!(error = %err, "drift helper call failed, using fallback");
                }
            }
        }
        fallback_drift_result()
    }
}

/// With no drift checker configured, assume alignment rather than blocking
/// the user's request on an unavailable auxiliary model.
fn fallback_drift_result() -> DriftResult {
    DriftResult {
        score: 8,
        drift_type: "none".to_string(),
        diagnostic: "heuristic fallback: no drift helper configured".to_string(),
        recovery_plan: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> DriftConfig {
        DriftConfig::default()
    }

    #[test]
    fn bands_realign_at_or_above_threshold() {
        assert_eq!(band_for_score(8, 0, &config()), DriftBand::Realigned);
        assert_eq!(band_for_score(10, 5, &config()), DriftBand::Realigned);
    }

    #[test]
    fn bands_caution_in_middle_range() {
        assert_eq!(band_for_score(6, 0, &config()), DriftBand::Caution);
    }

    #[test]
    fn bands_drifted_below_threshold_with_low_escalation() {
        assert_eq!(band_for_score(3, 0, &config()), DriftBand::Drifted);
    }

    #[test]
    fn bands_forced_once_escalation_would_cross_threshold() {
        assert_eq!(band_for_score(3, 2, &config()), DriftBand::Forced);
    }
}
