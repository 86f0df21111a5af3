/// Truncate `content` to the first `max_chars` characters (at a valid UTF-8
/// boundary), appending `\n\n[TRUNCATED]\n` if anything was cut.
pub fn truncate_to_chars(content: &str, max_chars: usize) -> (String, bool) {
    if content.len() <= max_chars {
        return (content.to_string(), false);
    }
    let boundary = content.floor_char_boundary(max_chars);
    let mut result = content[..boundary].to_string();
    result.push_str("\n\n[TRUNCATED]\n");
    (result, true)
}

/// Accumulate `chunks` into `total_max_chars`, in order. Chunks that fully
/// fit are kept as-is; the chunk that crosses the cap is truncated; anything
/// after it is dropped. Returns the number of chunks dropped.
pub fn cap_total_chars(chunks: &mut Vec<String>, total_max_chars: usize) -> usize {
    let mut accumulated: usize = 0;
    let mut cut_at = chunks.len();

    for (i, chunk) in chunks.iter_mut().enumerate() {
        let len = chunk.len();
        if accumulated + len <= total_max_chars {
            accumulated += len;
            continue;
        }
        if accumulated < total_max_chars {
            let remaining = total_max_chars - accumulated;
            let boundary = chunk.floor_char_boundary(remaining);
            chunk.truncate(boundary);
            chunk.push_str("\n[TRUNCATED_TOTAL_CAP]\n");
            accumulated = total_max_chars;
            cut_at = i + 1;
        } else {
            cut_at = i;
        }
        break;
    }

    let dropped = chunks.len() - cut_at;
    chunks.truncate(cut_at);
    dropped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_truncation_when_under_limit() {
        let (result, truncated) = truncate_to_chars("hello world", 100);
        assert_eq!(result, "hello world");
        assert!(!truncated);
    }

    #[test]
    fn truncates_at_limit() {
        let (result, truncated) = truncate_to_chars("abcdefghij", 5);
        assert!(truncated);
        assert!(result.starts_with("abcde"));
        assert!(result.contains("[TRUNCATED]"));
    }

    #[test]
    fn cap_keeps_everything_under_budget() {
        let mut chunks = vec!["aaaa".to_string(), "bbbb".to_string()];
        let dropped = cap_total_chars(&mut chunks, 100);
        assert_eq!(dropped, 0);
        assert_eq!(chunks.len(), 2);
    }

    #[test]
    fn cap_truncates_crossing_chunk_and_drops_rest() {
        let mut chunks = vec!["aaaa".to_string(), "bbbbbb".to_string(), "cccc".to_string()];
        let dropped = cap_total_chars(&mut chunks, 8);
        assert_eq!(dropped, 1);
        assert_eq!(chunks.len(), 2);
        assert!(chunks[1].contains("[TRUNCATED_TOTAL_CAP]"));
    }
}
