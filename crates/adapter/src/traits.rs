//! The adapter capability used by the proxy to isolate vendor quirks.

use grov_domain::usage::TokenUsage;
use grov_domain::Result;
use reqwest::header::HeaderMap;
use serde_json::Value;

/// One turn of conversation history, extracted from a request body.
#[derive(Debug, Clone)]
pub struct HistoryTurn {
    pub role: String,
    pub text: String,
}

/// A modifying action normalized out of a parsed response, independent of
/// vendor wire format. Matches the shape `grov-store::NewStep` expects.
#[derive(Debug, Clone, Default)]
pub struct ParsedAction {
    pub kind: String,
    pub files: Vec<String>,
    pub folders: Vec<String>,
    pub command: Option<String>,
    pub reasoning: Option<String>,
}

/// Result of forwarding a request upstream.
pub struct ForwardResult {
    pub status: u16,
    pub headers: HeaderMap,
    /// Normalized JSON body, present whenever the response could be parsed
    /// (both plain JSON and assembled-from-event-stream responses).
    pub body_object: Option<Value>,
    /// The exact bytes received from upstream, preserved for verbatim
    /// replay to the caller when the response was an event-stream.
    pub raw_body_bytes: Vec<u8>,
    pub was_event_stream: bool,
}

/// Per-vendor plug isolating wire-format quirks from the rest of the proxy.
#[async_trait::async_trait]
pub trait AgentAdapter: Send + Sync {
    fn can_handle(&self, url: &str) -> bool;

    async fn forward(&self, body_bytes: &[u8], headers: &HeaderMap) -> Result<ForwardResult>;

    fn extract_project_path(&self, body: &Value) -> Option<String>;
    fn extract_goal(&self, body: &Value) -> Option<String>;
    fn extract_conversation_history(&self, body: &Value) -> Vec<HistoryTurn>;

    fn is_valid_response(&self, body: &Value) -> bool;
    /// True iff the turn yielded no further tool call.
    fn is_end_turn(&self, body: &Value) -> bool;
    fn parse_actions(&self, body: &Value) -> Vec<ParsedAction>;
    fn extract_text_content(&self, body: &Value) -> String;
    fn extract_token_usage(&self, body: &Value) -> TokenUsage;

    /// Logical-body helpers used on non-cache paths (e.g. CLEAR reset,
    /// where a brand-new body is assembled rather than byte-patched).
    fn inject_memory(&self, body: &Value, text: &str) -> Value;
    fn inject_delta(&self, body: &Value, text: &str) -> Value;
    fn build_continue_body(
        &self,
        body: &Value,
        assistant_content: &Value,
        tool_result: &str,
        tool_id: &str,
    ) -> Value;

    /// Allow-list response headers safe to pass through to the caller.
    fn filter_response_headers(&self, headers: &HeaderMap) -> HeaderMap;
}

/// Headers safe to forward from the upstream response to the caller.
/// Everything else is dropped, including anything vendor-auth related.
pub const RESPONSE_HEADER_ALLOW_PREFIXES: &[&str] = &["x-ratelimit-", "anthropic-ratelimit-"];
pub const RESPONSE_HEADER_ALLOW_EXACT: &[&str] = &["request-id", "retry-after"];

pub fn filter_headers(headers: &HeaderMap) -> HeaderMap {
    let mut out = HeaderMap::new();
    for (name, value) in headers.iter() {
        let lower = name.as_str().to_ascii_lowercase();
        let allowed = RESPONSE_HEADER_ALLOW_EXACT.contains(&lower.as_str())
            || RESPONSE_HEADER_ALLOW_PREFIXES
                .iter()
                .any(|prefix| lower.starts_with(prefix));
        if allowed {
            out.insert(name.clone(), value.clone());
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_headers_keeps_allow_listed_only() {
        let mut headers = HeaderMap::new();
        headers.insert("x-ratelimit-remaining", "10".parse().unwrap());
        headers.insert("request-id", "abc".parse().unwrap());
        headers.insert("set-cookie", "session=1".parse().unwrap());
        headers.insert("authorization", "Bearer secret".parse().unwrap());

        let filtered = filter_headers(&headers);
        assert!(filtered.contains_key("x-ratelimit-remaining"));
        assert!(filtered.contains_key("request-id"));
        assert!(!filtered.contains_key("set-cookie"));
        assert!(!filtered.contains_key("authorization"));
    }
}
