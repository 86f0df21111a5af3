use crate::injection;
use crate::report::{DynamicBlockReport, StaticBlockReport};
use crate::truncation;
use grov_domain::session::{Decision, TeamMemoryEntry};
use std::collections::HashSet;
use std::hash::{Hash, Hasher};

/// Per-session record of dynamic-block content already injected, so each
/// subsequent first-type request only carries the delta. Owned by the
/// session orchestrator's per-session actor state for the session's
/// lifetime; never persisted.
#[derive(Debug, Clone, Default)]
pub struct TrackingRecord {
    injected_files: HashSet<String>,
    injected_step_ids: HashSet<i64>,
    injected_reasoning_hashes: HashSet<u64>,
}

impl TrackingRecord {
    pub fn new() -> Self {
        Self::default()
    }

    fn reasoning_hash(choice: &str, reason: &str) -> u64 {
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        choice.hash(&mut hasher);
        reason.hash(&mut hasher);
        hasher.finish()
    }
}

/// Builds the memoized static (team-memory) block, computed once per
/// session on the first request.
pub struct StaticBlockBuilder {
    pub file_reasoning_max: usize,
    pub related_tasks_max: usize,
    pub total_max_chars: usize,
}

impl StaticBlockBuilder {
    pub fn new(file_reasoning_max: usize, related_tasks_max: usize, total_max_chars: usize) -> Self {
        Self {
            file_reasoning_max,
            related_tasks_max,
            total_max_chars,
        }
    }

    /// `file_reasoning` and `related_tasks` must already be ranked (file
    /// overlap, then keyword overlap) and drawn only from past sessions —
    /// the current session's own steps never appear here.
    pub fn build(
        &self,
        file_reasoning: &[(String, String)],
        related_tasks: &[TeamMemoryEntry],
    ) -> (String, StaticBlockReport) {
        let file_reasoning_dropped = file_reasoning.len().saturating_sub(self.file_reasoning_max);
        let file_entries: Vec<String> = file_reasoning
            .iter()
            .take(self.file_reasoning_max)
            .map(|(path, reasoning)| injection::format_file_reasoning(path, reasoning))
            .collect();

        let related_tasks_dropped = related_tasks.len().saturating_sub(self.related_tasks_max);
        let task_entries: Vec<String> = related_tasks
            .iter()
            .take(self.related_tasks_max)
            .map(|t| injection::format_related_task(&t.goal, &t.reasoning_trace))
            .collect();

        let file_reasoning_included = file_entries.len();
        let related_tasks_included = task_entries.len();

        let block = injection::format_static_block(&file_entries, &task_entries);
        let (block, truncated_total_cap) = truncation::truncate_to_chars(&block, self.total_max_chars);

        let report = StaticBlockReport {
            file_reasoning_included,
            file_reasoning_dropped,
            related_tasks_included,
            related_tasks_dropped,
            total_chars: block.len(),
            truncated_total_cap,
        };

        (block, report)
    }
}

/// Builds the per-turn dynamic (delta) block, appended to the last user
/// message on every first-type request.
pub struct DynamicBlockBuilder {
    pub max_decisions_per_turn: usize,
}

impl DynamicBlockBuilder {
    pub fn new(max_decisions_per_turn: usize) -> Self {
        Self {
            max_decisions_per_turn,
        }
    }

    pub fn build(
        &self,
        tracking: &mut TrackingRecord,
        newly_edited_files: &[String],
        new_decisions: &[(i64, Decision)],
        pending_correction: Option<&str>,
        pending_forced_recovery: Option<&str>,
    ) -> (String, DynamicBlockReport) {
        let mut lines = Vec::new();

        let mut edited_files_included = 0;
        let mut edited_files_suppressed = 0;
        for file in newly_edited_files {
            if tracking.injected_files.insert(file.clone()) {
                lines.push(injection::format_edited(file));
                edited_files_included += 1;
            } else {
                edited_files_suppressed += 1;
            }
        }

        let mut decisions_included = 0;
        let mut decisions_dropped_over_cap = 0;
        let mut decisions_suppressed = 0;
        for (step_id, decision) in new_decisions {
            let hash = TrackingRecord::reasoning_hash(&decision.choice, &decision.reason);
            if tracking.injected_step_ids.contains(step_id)
                || tracking.injected_reasoning_hashes.contains(&hash)
            {
                decisions_suppressed += 1;
                continue;
            }
            if decisions_included >= self.max_decisions_per_turn {
                decisions_dropped_over_cap += 1;
                continue;
            }
            tracking.injected_step_ids.insert(*step_id);
            tracking.injected_reasoning_hashes.insert(hash);
            lines.push(injection::format_decision(&decision.choice, &decision.reason));
            decisions_included += 1;
        }

        let correction_included = pending_correction.is_some();
        if let Some(text) = pending_correction {
            lines.push(injection::format_drift(text));
        }

        let forced_recovery_included = pending_forced_recovery.is_some();
        if let Some(text) = pending_forced_recovery {
            lines.push(injection::format_forced_recovery(text));
        }

        let block = lines.join("\n");

        let report = DynamicBlockReport {
            edited_files_included,
            edited_files_suppressed,
            decisions_included,
            decisions_dropped_over_cap,
            decisions_suppressed,
            correction_included,
            forced_recovery_included,
            total_chars: block.len(),
        };

        (block, report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn team_memory_entry(goal: &str) -> TeamMemoryEntry {
        TeamMemoryEntry {
            id: 1,
            project_path: "/proj".into(),
            original_query: goal.into(),
            goal: goal.into(),
            reasoning_trace: vec!["used sqlite for durability".into()],
            decisions: vec![],
            files_touched: vec!["src/store.rs".into()],
            tags: vec![],
            status: "completed".into(),
            promoted_at: Utc::now(),
        }
    }

    #[test]
    fn static_block_excludes_entries_beyond_cap() {
        let builder = StaticBlockBuilder::new(1, 1, 10_000);
        let file_reasoning = vec![
            ("a.rs".to_string(), "x".to_string()),
            ("b.rs".to_string(), "y".to_string()),
        ];
        let tasks = vec![team_memory_entry("task one"), team_memory_entry("task two")];
        let (block, report) = builder.build(&file_reasoning, &tasks);
        assert_eq!(report.file_reasoning_included, 1);
        assert_eq!(report.file_reasoning_dropped, 1);
        assert_eq!(report.related_tasks_included, 1);
        assert!(block.contains("[GROV CONTEXT]"));
    }

    #[test]
    fn dynamic_block_suppresses_already_seen_file() {
        let builder = DynamicBlockBuilder::new(3);
        let mut tracking = TrackingRecord::new();

        let (block, report) = builder.build(
            &mut tracking,
            &["src/main.rs".to_string()],
            &[],
            None,
            None,
        );
        assert_eq!(report.edited_files_included, 1);
        assert!(block.contains("[EDITED: src/main.rs]"));

        let (block2, report2) = builder.build(
            &mut tracking,
            &["src/main.rs".to_string()],
            &[],
            None,
            None,
        );
        assert_eq!(report2.edited_files_included, 0);
        assert_eq!(report2.edited_files_suppressed, 1);
        assert!(block2.is_empty());
    }

    #[test]
    fn dynamic_block_caps_decisions_per_turn() {
        let builder = DynamicBlockBuilder::new(1);
        let mut tracking = TrackingRecord::new();
        let decisions = vec![
            (
                1,
                Decision {
                    choice: "use sqlite".into(),
                    reason: "simplicity".into(),
                },
            ),
            (
                2,
                Decision {
                    choice: "use postgres".into(),
                    reason: "scale".into(),
                },
            ),
        ];
        let (_, report) = builder.build(&mut tracking, &[], &decisions, None, None);
        assert_eq!(report.decisions_included, 1);
        assert_eq!(report.decisions_dropped_over_cap, 1);
    }

    #[test]
    fn dynamic_block_includes_correction_and_recovery() {
        let builder = DynamicBlockBuilder::new(3);
        let mut tracking = TrackingRecord::new();
        let (block, report) = builder.build(
            &mut tracking,
            &[],
            &[],
            Some("scope creep detected"),
            Some("revert unrelated files"),
        );
        assert!(report.correction_included);
        assert!(report.forced_recovery_included);
        assert!(block.contains("[DRIFT: scope creep detected]"));
        assert!(block.contains("[FORCED RECOVERY: revert unrelated files]"));
    }
}
