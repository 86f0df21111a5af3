//! Formatters for the static and dynamic injection blocks.
//!
//! The framing strings here are a stable contract: the adapter's raw-byte
//! injector treats them as opaque text, but anything downstream that greps
//! transcripts for `[GROV CONTEXT]` or `[DECISION:` depends on these exact
//! tags not moving.

pub const STATIC_BLOCK_OPEN: &str = "[GROV CONTEXT]";
pub const STATIC_BLOCK_CLOSE: &str = "[END GROV CONTEXT]";

/// Format one file-level reasoning entry inside the static block.
pub fn format_file_reasoning(file_path: &str, reasoning: &str) -> String {
    format!("- {file_path}: {reasoning}")
}

/// Format one related-past-task entry inside the static block.
pub fn format_related_task(goal: &str, reasoning_trace: &[String]) -> String {
    if reasoning_trace.is_empty() {
        format!("- {goal}")
    } else {
        format!("- {goal} ({})", reasoning_trace.join("; "))
    }
}

/// Assemble the static block from pre-ranked, pre-capped entries.
pub fn format_static_block(file_entries: &[String], task_entries: &[String]) -> String {
    let mut body = String::new();
    if !file_entries.is_empty() {
        body.push_str("Relevant file history:\n");
        body.push_str(&file_entries.join("\n"));
        body.push('\n');
    }
    if !task_entries.is_empty() {
        if !body.is_empty() {
            body.push('\n');
        }
        body.push_str("Related past work:\n");
        body.push_str(&task_entries.join("\n"));
        body.push('\n');
    }
    format!("{STATIC_BLOCK_OPEN}\n{body}{STATIC_BLOCK_CLOSE}")
}

/// Tag a newly-edited file in the dynamic block.
pub fn format_edited(file_path: &str) -> String {
    format!("[EDITED: {file_path}]")
}

/// Tag a newly-produced key decision in the dynamic block.
pub fn format_decision(choice: &str, reason: &str) -> String {
    format!("[DECISION: {choice} because {reason}]")
}

/// Tag a pending drift correction in the dynamic block.
pub fn format_drift(diagnostic: &str) -> String {
    format!("[DRIFT: {diagnostic}]")
}

/// Tag a pending forced-recovery instruction in the dynamic block.
pub fn format_forced_recovery(plan: &str) -> String {
    format!("[FORCED RECOVERY: {plan}]")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn static_block_is_framed() {
        let block = format_static_block(&["- a.rs: x".into()], &[]);
        assert!(block.starts_with(STATIC_BLOCK_OPEN));
        assert!(block.ends_with(STATIC_BLOCK_CLOSE));
    }

    #[test]
    fn empty_static_block_still_framed() {
        let block = format_static_block(&[], &[]);
        assert_eq!(block, format!("{STATIC_BLOCK_OPEN}\n{STATIC_BLOCK_CLOSE}"));
    }

    #[test]
    fn dynamic_tags_match_contract() {
        assert_eq!(format_edited("src/main.rs"), "[EDITED: src/main.rs]");
        assert_eq!(
            format_decision("use sqlite", "simplicity"),
            "[DECISION: use sqlite because simplicity]"
        );
        assert_eq!(format_drift("scope creep"), "[DRIFT: scope creep]");
        assert_eq!(
            format_forced_recovery("revert unrelated files"),
            "[FORCED RECOVERY: revert unrelated files]"
        );
    }
}
