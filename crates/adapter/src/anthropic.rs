//! Adapter for Anthropic's Messages API wire format.

use crate::traits::{filter_headers, AgentAdapter, ForwardResult, HistoryTurn, ParsedAction};
use grov_domain::usage::TokenUsage;
use grov_domain::{Error, Result};
use reqwest::header::HeaderMap;
use serde_json::{json, Value};

pub struct AnthropicAdapter {
    client: reqwest::Client,
    upstream_base: String,
}

impl AnthropicAdapter {
    pub fn new(upstream_base: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| Error::Http(e.to_string()))?;
        Ok(Self {
            client,
            upstream_base: upstream_base.into().trim_end_matches('/').to_string(),
        })
    }

    fn messages(body: &Value) -> &[Value] {
        body.get("messages")
            .and_then(|m| m.as_array())
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    /// Join every text block of a message's content, whichever shape it is.
    fn message_text(message: &Value) -> String {
        match message.get("content") {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Array(parts)) => parts
                .iter()
                .filter_map(|p| p.get("text").and_then(|t| t.as_str()))
                .collect::<Vec<_>>()
                .join("\n"),
            _ => String::new(),
        }
    }

    fn action_kind_for_tool(tool_name: &str) -> &'static str {
        let lower = tool_name.to_ascii_lowercase();
        if lower.contains("edit") {
            "edit"
        } else if lower.contains("write") || lower.contains("create") {
            "write"
        } else if lower.contains("bash") || lower.contains("run") || lower.contains("command") {
            "run_command"
        } else if lower.contains("read") {
            "read"
        } else if lower.contains("grep") || lower.contains("search") || lower.contains("glob") {
            "search"
        } else {
            "other"
        }
    }

    fn files_from_input(input: &Value) -> Vec<String> {
        let mut files = Vec::new();
        for key in ["file_path", "path", "filename"] {
            if let Some(s) = input.get(key).and_then(|v| v.as_str()) {
                files.push(s.to_string());
            }
        }
        if let Some(arr) = input.get("paths").and_then(|v| v.as_array()) {
            files.extend(arr.iter().filter_map(|v| v.as_str().map(str::to_string)));
        }
        files
    }
}

#[async_trait::async_trait]
impl AgentAdapter for AnthropicAdapter {
    fn can_handle(&self, url: &str) -> bool {
        url.contains("anthropic.com") || url.contains("/v1/messages")
    }

    async fn forward(&self, body_bytes: &[u8], headers: &HeaderMap) -> Result<ForwardResult> {
        let url = format!("{}/v1/messages", self.upstream_base);

        let mut req = self.client.post(&url).body(body_bytes.to_vec());
        for (name, value) in headers.iter() {
            if name == reqwest::header::HOST || name == reqwest::header::CONTENT_LENGTH {
                continue;
            }
            req = req.header(name, value);
        }

        let resp = req.send().await.map_err(|e| {
            if e.is_timeout() {
                Error::Timeout(e.to_string())
            } else {
                Error::Http(e.to_string())
            }
        })?;

        let status = resp.status().as_u16();
        let content_type = resp
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();
        let was_event_stream = content_type.contains("text/event-stream");
        let response_headers = filter_headers(resp.headers());

        let raw_body_bytes = resp
            .bytes()
            .await
            .map_err(|e| Error::Http(e.to_string()))?
            .to_vec();

        let body_object = if was_event_stream {
            parse_sse_into_message(&raw_body_bytes)
        } else {
            serde_json::from_slice(&raw_body_bytes).ok()
        };

        Ok(ForwardResult {
            status,
            headers: response_headers,
            body_object,
            raw_body_bytes,
            was_event_stream,
        })
    }

    fn extract_project_path(&self, body: &Value) -> Option<String> {
        body.get("metadata")
            .and_then(|m| m.get("project_path"))
            .and_then(|v| v.as_str())
            .map(str::to_string)
    }

    fn extract_goal(&self, body: &Value) -> Option<String> {
        Self::messages(body)
            .iter()
            .find(|m| m.get("role").and_then(|r| r.as_str()) == Some("user"))
            .map(Self::message_text)
            .filter(|s| !s.is_empty())
    }

    fn extract_conversation_history(&self, body: &Value) -> Vec<HistoryTurn> {
        Self::messages(body)
            .iter()
            .map(|m| HistoryTurn {
                role: m
                    .get("role")
                    .and_then(|r| r.as_str())
                    .unwrap_or("unknown")
                    .to_string(),
                text: Self::message_text(m),
            })
            .collect()
    }

    fn is_valid_response(&self, body: &Value) -> bool {
        body.get("content").and_then(|c| c.as_array()).is_some() && body.get("error").is_none()
    }

    fn is_end_turn(&self, body: &Value) -> bool {
        body.get("stop_reason").and_then(|v| v.as_str()) != Some("tool_use")
    }

    fn parse_actions(&self, body: &Value) -> Vec<ParsedAction> {
        let Some(blocks) = body.get("content").and_then(|c| c.as_array()) else {
            return Vec::new();
        };

        let mut actions = Vec::new();
        let mut pending_reasoning: Vec<&str> = Vec::new();

        for block in blocks {
            match block.get("type").and_then(|t| t.as_str()) {
                Some("text") => {
                    if let Some(text) = block.get("text").and_then(|t| t.as_str()) {
                        pending_reasoning.push(text);
                    }
                }
                Some("tool_use") => {
                    let tool_name = block.get("name").and_then(|n| n.as_str()).unwrap_or("");
                    let input = block.get("input").cloned().unwrap_or(Value::Null);
                    let files = Self::files_from_input(&input);
                    let command = input
                        .get("command")
                        .and_then(|v| v.as_str())
                        .map(str::to_string);

                    actions.push(ParsedAction {
                        kind: Self::action_kind_for_tool(tool_name).to_string(),
                        files,
                        folders: Vec::new(),
                        command,
                        reasoning: if pending_reasoning.is_empty() {
                            None
                        } else {
                            Some(pending_reasoning.join(" "))
                        },
                    });
                }
                _ => {}
            }
        }

        actions
    }

    fn extract_text_content(&self, body: &Value) -> String {
        body.get("content")
            .and_then(|c| c.as_array())
            .map(|blocks| {
                blocks
                    .iter()
                    .filter_map(|b| b.get("text").and_then(|t| t.as_str()))
                    .collect::<Vec<_>>()
                    .join("\n")
            })
            .unwrap_or_default()
    }

    fn extract_token_usage(&self, body: &Value) -> TokenUsage {
        let Some(usage) = body.get("usage") else {
            return TokenUsage::default();
        };
        TokenUsage {
            input_tokens: usage.get("input_tokens").and_then(|v| v.as_u64()).unwrap_or(0),
            output_tokens: usage
                .get("output_tokens")
                .and_then(|v| v.as_u64())
                .unwrap_or(0),
            cache_creation_input_tokens: usage
                .get("cache_creation_input_tokens")
                .and_then(|v| v.as_u64())
                .unwrap_or(0),
            cache_read_input_tokens: usage
                .get("cache_read_input_tokens")
                .and_then(|v| v.as_u64())
                .unwrap_or(0),
        }
    }

    fn inject_memory(&self, body: &Value, text: &str) -> Value {
        let mut out = body.clone();
        out["system"] = json!([{"type": "text", "text": text}]);
        out
    }

    fn inject_delta(&self, body: &Value, text: &str) -> Value {
        let mut out = body.clone();
        let messages = out["messages"].as_array_mut().expect("messages must be an array");
        messages.push(json!({"role": "user", "content": text}));
        out
    }

    fn build_continue_body(
        &self,
        body: &Value,
        assistant_content: &Value,
        tool_result: &str,
        tool_id: &str,
    ) -> Value {
        let mut out = body.clone();
        let messages = out["messages"].as_array_mut().expect("messages must be an array");
        messages.push(json!({"role": "assistant", "content": assistant_content}));
        messages.push(json!({
            "role": "user",
            "content": [{
                "type": "tool_result",
                "tool_use_id": tool_id,
                "content": tool_result,
            }]
        }));
        out
    }

    fn filter_response_headers(&self, headers: &HeaderMap) -> HeaderMap {
        filter_headers(headers)
    }
}

/// Assemble a single normalized JSON body from a raw SSE byte stream.
/// Anthropic streams `message_start`/`content_block_delta`/`message_delta`/
/// `message_stop` events; this folds them into the same shape a
/// non-streaming response would have, for downstream parsing.
fn parse_sse_into_message(raw: &[u8]) -> Option<Value> {
    let text = std::str::from_utf8(raw).ok()?;
    let mut message = json!({"content": [], "usage": {}});
    let mut current_text = String::new();
    let mut current_block_open = false;

    for line in text.lines() {
        let Some(data) = line.strip_prefix("data: ") else {
            continue;
        };
        let Ok(event): std::result::Result<Value, _> = serde_json::from_str(data) else {
            continue;
        };
        match event.get("type").and_then(|t| t.as_str()) {
            Some("message_start") => {
                if let Some(inner) = event.get("message") {
                    if let Some(usage) = inner.get("usage") {
                        message["usage"] = usage.clone();
                    }
                    if let Some(model) = inner.get("model") {
                        message["model"] = model.clone();
                    }
                }
            }
            Some("content_block_start") => {
                current_block_open = true;
                current_text.clear();
            }
            Some("content_block_delta") => {
                if let Some(text_delta) = event
                    .get("delta")
                    .and_then(|d| d.get("text"))
                    .and_then(|t| t.as_str())
                {
                    current_text.push_str(text_delta);
                }
            }
            Some("content_block_stop") => {
                if current_block_open && !current_text.is_empty() {
                    message["content"]
                        .as_array_mut()
                        .unwrap()
                        .push(json!({"type": "text", "text": current_text}));
                }
                current_block_open = false;
                current_text.clear();
            }
            Some("message_delta") => {
                if let Some(stop_reason) = event
                    .get("delta")
                    .and_then(|d| d.get("stop_reason"))
                {
                    message["stop_reason"] = stop_reason.clone();
                }
                if let Some(usage) = event.get("usage") {
                    for (k, v) in usage.as_object().into_iter().flatten() {
                        message["usage"][k] = v.clone();
                    }
                }
            }
            _ => {}
        }
    }

    Some(message)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn adapter() -> AnthropicAdapter {
        AnthropicAdapter::new("https://api.anthropic.com").unwrap()
    }

    #[test]
    fn can_handle_matches_anthropic_urls() {
        let a = adapter();
        assert!(a.can_handle("https://api.anthropic.com/v1/messages"));
        assert!(!a.can_handle("https://api.openai.com/v1/chat/completions"));
    }

    #[test]
    fn extract_goal_uses_first_user_message() {
        let a = adapter();
        let body = json!({"messages": [{"role": "user", "content": "add rate limiting"}]});
        assert_eq!(a.extract_goal(&body), Some("add rate limiting".to_string()));
    }

    #[test]
    fn is_end_turn_false_when_tool_use() {
        let a = adapter();
        let body = json!({"stop_reason": "tool_use"});
        assert!(!a.is_end_turn(&body));
        let body2 = json!({"stop_reason": "end_turn"});
        assert!(a.is_end_turn(&body2));
    }

    #[test]
    fn parse_actions_extracts_edit_with_reasoning() {
        let a = adapter();
        let body = json!({
            "content": [
                {"type": "text", "text": "I decided to add a null check."},
                {"type": "tool_use", "name": "str_replace_edit", "input": {"file_path": "src/a.rs"}}
            ]
        });
        let actions = a.parse_actions(&body);
        assert_eq!(actions.len(), 1);
        assert_eq!(actions[0].kind, "edit");
        assert_eq!(actions[0].files, vec!["src/a.rs"]);
        assert_eq!(
            actions[0].reasoning.as_deref(),
            Some("I decided to add a null check.")
        );
    }

    #[test]
    fn extract_token_usage_reads_cache_fields() {
        let a = adapter();
        let body = json!({"usage": {
            "input_tokens": 10,
            "output_tokens": 5,
            "cache_creation_input_tokens": 2,
            "cache_read_input_tokens": 100
        }});
        let usage = a.extract_token_usage(&body);
        assert_eq!(usage.input_tokens, 10);
        assert_eq!(usage.cache_read_input_tokens, 100);
    }

    #[test]
    fn extract_token_usage_defaults_when_missing() {
        let a = adapter();
        let usage = a.extract_token_usage(&json!({}));
        assert_eq!(usage.input_tokens, 0);
    }

    #[test]
    fn sse_assembly_joins_text_deltas_and_stop_reason() {
        let raw = b"data: {\"type\":\"message_start\",\"message\":{\"usage\":{\"input_tokens\":5}}}\n\n\
data: {\"type\":\"content_block_start\"}\n\n\
data: {\"type\":\"content_block_delta\",\"delta\":{\"text\":\"hel\"}}\n\n\
data: {\"type\":\"content_block_delta\",\"delta\":{\"text\":\"lo\"}}\n\n\
data: {\"type\":\"content_block_stop\"}\n\n\
data: {\"type\":\"message_delta\",\"delta\":{\"stop_reason\":\"end_turn\"},\"usage\":{\"output_tokens\":2}}\n\n";
        let body = parse_sse_into_message(raw).unwrap();
        assert_eq!(body["content"][0]["text"], "hello");
        assert_eq!(body["stop_reason"], "end_turn");
        assert_eq!(body["usage"]["output_tokens"], 2);
    }
}
