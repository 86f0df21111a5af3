//! Ranks team-memory candidates before they reach `StaticBlockBuilder`.
//!
//! `grov-contextpack` expects its inputs already ordered by file overlap
//! then keyword overlap — it does no ranking of its own, by design, since
//! ranking depends on the store's query shape. This is that ranking.

use std::collections::HashSet;

use grov_domain::session::TeamMemoryEntry;

/// Order `entries` by how many `expected_scope` files they touched, then
/// by how many `keywords` appear in their goal/tags. Ties keep the
/// store's existing order (most recently promoted first).
pub fn rank_related_tasks(
    entries: Vec<TeamMemoryEntry>,
    expected_scope: &[String],
    keywords: &[String],
) -> Vec<TeamMemoryEntry> {
    let scope: HashSet<&str> = expected_scope.iter().map(String::as_str).collect();
    let kw: HashSet<String> = keywords.iter().map(|k| k.to_lowercase()).collect();

    let mut scored: Vec<(usize, usize, TeamMemoryEntry)> = entries
        .into_iter()
        .map(|entry| {
            let file_overlap = entry
                .files_touched
                .iter()
                .filter(|f| scope.contains(f.as_str()))
                .count();
            let haystack = format!("{} {}", entry.goal, entry.tags.join(" ")).to_lowercase();
            let keyword_overlap = kw.iter().filter(|k| haystack.contains(k.as_str())).count();
            (file_overlap, keyword_overlap, entry)
        })
        .collect();

    scored.sort_by(|a, b| (b.0, b.1).cmp(&(a.0, a.1)));
    scored.into_iter().map(|(_, _, e)| e).collect()
}

/// Gather file-reasoning entries for every file in `expected_scope`,
/// de-duplicated and ordered by scope position (the order the caller's
/// own task names its files, which is the only ranking signal available
/// once the query is already scoped to those exact paths).
pub fn gather_file_reasoning(
    store: &grov_store::Store,
    project_path: &str,
    expected_scope: &[String],
) -> grov_domain::Result<Vec<(String, String)>> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for file in expected_scope {
        for (path, reasoning) in store.get_file_reasoning_by_path_pattern(project_path, file)? {
            if seen.insert(path.clone()) {
                out.push((path, reasoning));
            }
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn entry(goal: &str, files: &[&str], tags: &[&str]) -> TeamMemoryEntry {
        TeamMemoryEntry {
            id: 1,
            project_path: "/proj".into(),
            original_query: goal.into(),
            goal: goal.into(),
            reasoning_trace: vec![],
            decisions: vec![],
            files_touched: files.iter().map(|s| s.to_string()).collect(),
            tags: tags.iter().map(|s| s.to_string()).collect(),
            status: "completed".into(),
            promoted_at: Utc::now(),
        }
    }

    #[test]
    fn ranks_file_overlap_above_keyword_only() {
        let entries = vec![
            entry("unrelated task", &[], &["auth"]),
            entry("touched the store", &["src/store.rs"], &[]),
        ];
        let ranked = rank_related_tasks(entries, &["src/store.rs".to_string()], &["auth".to_string()]);
        assert_eq!(ranked[0].goal, "touched the store");
    }

    #[test]
    fn ranks_keyword_overlap_as_tiebreak() {
        let entries = vec![
            entry("task a", &[], &[]),
            entry("task b about caching", &[], &["caching"]),
        ];
        let ranked = rank_related_tasks(entries, &[], &["caching".to_string()]);
        assert_eq!(ranked[0].goal, "task b about caching");
    }
}
