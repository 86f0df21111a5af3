//! Byte-level injection into a JSON request body without re-serializing it.
//!
//! Every insertion keeps the original bytes untouched up to the insertion
//! point: re-serializing with `serde_json` would reorder keys and collapse
//! whitespace, which breaks the upstream provider's prefix-based prompt
//! cache. These functions therefore work directly on `&[u8]`, scanning for
//! brackets and string boundaries by hand.
//!
//! Intentionally dependency-free (no `serde_json` here) so the round-trip
//! laws can be unit-tested in complete isolation from the rest of the crate.

/// Insert a new `{"type":"text","text":"…"}` element at the end of the
/// top-level `"system":[...]` array. The inserted block never carries a
/// `cache_control` marker. Returns the body unchanged if `text` is empty
/// (round-trip law: re-injecting an empty string is a no-op) or if the
/// `system` array can't be located.
pub fn inject_into_system(raw: &[u8], text: &str) -> Vec<u8> {
    if text.is_empty() {
        return raw.to_vec();
    }
    let Some(key_pos) = find_first(raw, b"\"system\":", 0) else {
        return raw.to_vec();
    };
    let Some(open) = skip_ws_to(raw, key_pos + b"\"system\":".len()) else {
        return raw.to_vec();
    };
    if raw[open] != b'[' {
        return raw.to_vec();
    }
    let Some(close) = find_matching_close(raw, open) else {
        return raw.to_vec();
    };
    insert_text_element(raw, open, close, text)
}

/// Append text to the content of the last message with `"role":"user"`.
/// If content is a JSON string, the text is appended (escaped) before the
/// closing quote. If content is an array, a new text element is appended.
/// Returns the body unchanged if the search fails or `text` is empty.
pub fn inject_into_last_user_message(raw: &[u8], text: &str) -> Vec<u8> {
    if text.is_empty() {
        return raw.to_vec();
    }
    let Some(role_pos) = find_last(raw, b"\"role\":\"user\"") else {
        return raw.to_vec();
    };
    let Some(content_key) = find_first(raw, b"\"content\":", role_pos) else {
        return raw.to_vec();
    };
    let Some(value_start) = skip_ws_to(raw, content_key + b"\"content\":".len()) else {
        return raw.to_vec();
    };

    match raw[value_start] {
        b'"' => {
            let Some(close_quote) = find_string_end(raw, value_start) else {
                return raw.to_vec();
            };
            let escaped = escape_json_string(text);
            splice(raw, close_quote, close_quote, escaped.as_bytes())
        }
        b'[' => {
            let Some(close) = find_matching_close(raw, value_start) else {
                return raw.to_vec();
            };
            insert_text_element(raw, value_start, close, text)
        }
        _ => raw.to_vec(),
    }
}

/// Append a pre-serialized tool definition object to the top-level
/// `"tools":[...]` array, creating the array (as a new top-level key) if
/// it doesn't already exist. `tool_def_json` must be a valid JSON object
/// literal; it is spliced in verbatim.
pub fn inject_tool_into_raw(raw: &[u8], tool_def_json: &str) -> Vec<u8> {
    if let Some(key_pos) = find_first(raw, b"\"tools\":", 0) {
        let Some(open) = skip_ws_to(raw, key_pos + b"\"tools\":".len()) else {
            return raw.to_vec();
        };
        if raw[open] != b'[' {
            return raw.to_vec();
        }
        let Some(close) = find_matching_close(raw, open) else {
            return raw.to_vec();
        };
        return insert_raw_element(raw, open, close, tool_def_json);
    }

    let Some(root_open) = raw.iter().position(|&b| b == b'{') else {
        return raw.to_vec();
    };
    let insertion = format!("\"tools\":[{tool_def_json}],");
    splice(raw, root_open + 1, root_open + 1, insertion.as_bytes())
}

// ── shared primitives ────────────────────────────────────────────────

/// Insert `{"type":"text","text":"<escaped text>"}` as the last element of
/// the array spanning `[open, close]` (inclusive indices of `[` and `]`).
fn insert_text_element(raw: &[u8], open: usize, close: usize, text: &str) -> Vec<u8> {
    let escaped = escape_json_string(text);
    let element = format!("{{\"type\":\"text\",\"text\":\"{escaped}\"}}");
    insert_raw_element(raw, open, close, &element)
}

/// Insert a verbatim JSON fragment as the last element of the array
/// spanning `[open, close]`, adding a leading comma unless the array is
/// currently empty.
fn insert_raw_element(raw: &[u8], open: usize, close: usize, element: &str) -> Vec<u8> {
    let is_empty = raw[open + 1..close].iter().all(u8::is_ascii_whitespace);
    let insertion = if is_empty {
        element.to_string()
    } else {
        format!(",{element}")
    };
    splice(raw, close, close, insertion.as_bytes())
}

/// Build `raw[..from] + insertion + raw[to..]`.
fn splice(raw: &[u8], from: usize, to: usize, insertion: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(raw.len() + insertion.len());
    out.extend_from_slice(&raw[..from]);
    out.extend_from_slice(insertion);
    out.extend_from_slice(&raw[to..]);
    out
}

/// Escape `\`, `"`, and newlines for embedding in a JSON string literal.
fn escape_json_string(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            _ => out.push(ch),
        }
    }
    out
}

fn skip_ws_to(raw: &[u8], mut i: usize) -> Option<usize> {
    while i < raw.len() && raw[i].is_ascii_whitespace() {
        i += 1;
    }
    if i < raw.len() {
        Some(i)
    } else {
        None
    }
}

fn find_first(haystack: &[u8], needle: &[u8], from: usize) -> Option<usize> {
    if from >= haystack.len() || needle.is_empty() {
        return None;
    }
    haystack[from..]
        .windows(needle.len())
        .position(|w| w == needle)
        .map(|p| p + from)
}

fn find_last(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    haystack
        .windows(needle.len())
        .rposition(|w| w == needle)
}

/// Given the index of an opening quote, find the index of the matching
/// closing quote, treating `\` as an escape for the following byte.
fn find_string_end(raw: &[u8], open_idx: usize) -> Option<usize> {
    let mut i = open_idx + 1;
    while i < raw.len() {
        match raw[i] {
            b'\\' => i += 2,
            b'"' => return Some(i),
            _ => i += 1,
        }
    }
    None
}

/// Given the index of an opening `[` or `{`, find the index of its
/// matching close, skipping over string literals (and their escapes)
/// wholesale when counting bracket depth.
fn find_matching_close(raw: &[u8], open_idx: usize) -> Option<usize> {
    let open = raw[open_idx];
    let close = match open {
        b'[' => b']',
        b'{' => b'}',
        _ => return None,
    };
    let mut depth = 0i32;
    let mut in_string = false;
    let mut i = open_idx;
    while i < raw.len() {
        let b = raw[i];
        if in_string {
            if b == b'\\' {
                i += 2;
                continue;
            }
            if b == b'"' {
                in_string = false;
            }
        } else if b == b'"' {
            in_string = true;
        } else if b == open {
            depth += 1;
        } else if b == close {
            depth -= 1;
            if depth == 0 {
                return Some(i);
            }
        }
        i += 1;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn s(bytes: &[u8]) -> &str {
        std::str::from_utf8(bytes).unwrap()
    }

    #[test]
    fn inject_into_empty_system_array() {
        let raw = br#"{"system":[],"messages":[]}"#;
        let out = inject_into_system(raw, "hello");
        assert_eq!(
            s(&out),
            r#"{"system":[{"type":"text","text":"hello"}],"messages":[]}"#
        );
    }

    #[test]
    fn inject_into_nonempty_system_array_appends_with_comma() {
        let raw = br#"{"system":[{"type":"text","text":"first"}],"messages":[]}"#;
        let out = inject_into_system(raw, "second");
        assert_eq!(
            s(&out),
            r#"{"system":[{"type":"text","text":"first"},{"type":"text","text":"second"}],"messages":[]}"#
        );
    }

    #[test]
    fn system_array_survives_nested_brackets_in_strings() {
        let raw = br#"{"system":[{"type":"text","text":"has a ] bracket and a \" quote"}],"messages":[]}"#;
        let out = inject_into_system(raw, "tail");
        assert!(s(&out).ends_with(r#"{"type":"text","text":"tail"}],"messages":[]}"#));
    }

    #[test]
    fn empty_text_is_a_no_op_round_trip() {
        let raw = br#"{"system":[{"type":"text","text":"first"}],"messages":[]}"#;
        let out = inject_into_system(raw, "");
        assert_eq!(out, raw.to_vec());
    }

    #[test]
    fn injecting_then_removing_last_element_restores_original() {
        let raw = br#"{"system":[{"type":"text","text":"first"}],"messages":[]}"#;
        let injected = inject_into_system(raw, "second");
        // Remove the last array element the same way a human would author it:
        // everything from the comma before the injected object up to its closing brace.
        let injected_str = s(&injected);
        let marker = r#",{"type":"text","text":"second"}"#;
        let without = injected_str.replacen(marker, "", 1);
        assert_eq!(without.as_bytes(), raw);
    }

    #[test]
    fn inject_into_last_user_message_string_content() {
        let raw = br#"{"messages":[{"role":"user","content":"hi"},{"role":"assistant","content":"ok"}]}"#;
        let out = inject_into_last_user_message(raw, " there");
        // only the first user message exists, so it is the "last" one found
        assert_eq!(
            s(&out),
            r#"{"messages":[{"role":"user","content":"hi there"},{"role":"assistant","content":"ok"}]}"#
        );
    }

    #[test]
    fn inject_into_last_user_message_picks_last_occurrence() {
        let raw = br#"{"messages":[{"role":"user","content":"first"},{"role":"assistant","content":"ok"},{"role":"user","content":"second"}]}"#;
        let out = inject_into_last_user_message(raw, "!");
        assert!(s(&out).contains(r#""content":"second!""#));
        assert!(s(&out).contains(r#""content":"first""#));
    }

    #[test]
    fn inject_into_last_user_message_array_content() {
        let raw = br#"{"messages":[{"role":"user","content":[{"type":"text","text":"hi"}]}]}"#;
        let out = inject_into_last_user_message(raw, "delta");
        assert_eq!(
            s(&out),
            r#"{"messages":[{"role":"user","content":[{"type":"text","text":"hi"},{"type":"text","text":"delta"}]}]}"#
        );
    }

    #[test]
    fn inject_into_last_user_message_escapes_quotes_and_backslashes() {
        let raw = br#"{"messages":[{"role":"user","content":"hi"}]}"#;
        let out = inject_into_last_user_message(raw, "say \"hi\" \\ ok");
        assert_eq!(
            s(&out),
            r#"{"messages":[{"role":"user","content":"hisay \"hi\" \\ ok"}]}"#
        );
    }

    #[test]
    fn inject_into_last_user_message_missing_role_is_unchanged() {
        let raw = br#"{"messages":[{"role":"assistant","content":"ok"}]}"#;
        let out = inject_into_last_user_message(raw, "x");
        assert_eq!(out, raw.to_vec());
    }

    #[test]
    fn inject_tool_appends_to_existing_array() {
        let raw = br#"{"tools":[{"name":"a"}]}"#;
        let out = inject_tool_into_raw(raw, r#"{"name":"b"}"#);
        assert_eq!(s(&out), r#"{"tools":[{"name":"a"},{"name":"b"}]}"#);
    }

    #[test]
    fn inject_tool_creates_missing_array() {
        let raw = br#"{"messages":[]}"#;
        let out = inject_tool_into_raw(raw, r#"{"name":"b"}"#);
        assert_eq!(s(&out), r#"{"tools":[{"name":"b"}],"messages":[]}"#);
    }
}
