//! Adapter for OpenAI-compatible `/chat/completions` wire format.

use crate::traits::{filter_headers, AgentAdapter, ForwardResult, HistoryTurn, ParsedAction};
use grov_domain::usage::TokenUsage;
use grov_domain::{Error, Result};
use reqwest::header::HeaderMap;
use serde_json::{json, Value};

pub struct OpenAiCompatAdapter {
    client: reqwest::Client,
    upstream_base: String,
}

impl OpenAiCompatAdapter {
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
}

#[async_trait::async_trait]
impl AgentAdapter for OpenAiCompatAdapter {
    fn can_handle(&self, url: &str) -> bool {
        url.contains("/chat/completions")
    }

    async fn forward(&self, body_bytes: &[u8], headers: &HeaderMap) -> Result<ForwardResult> {
        let url = format!("{}/chat/completions", self.upstream_base);

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
            None
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
        body.get("choices").and_then(|c| c.as_array()).is_some() && body.get("error").is_none()
    }

    fn is_end_turn(&self, body: &Value) -> bool {
        body.get("choices")
            .and_then(|c| c.as_array())
            .and_then(|c| c.first())
            .and_then(|c| c.get("finish_reason"))
            .and_then(|v| v.as_str())
            != Some("tool_calls")
    }

    fn parse_actions(&self, body: &Value) -> Vec<ParsedAction> {
        let Some(choice) = body
            .get("choices")
            .and_then(|c| c.as_array())
            .and_then(|c| c.first())
        else {
            return Vec::new();
        };
        let Some(tool_calls) = choice
            .get("message")
            .and_then(|m| m.get("tool_calls"))
            .and_then(|t| t.as_array())
        else {
            return Vec::new();
        };
        let reasoning = choice
            .get("message")
            .and_then(|m| m.get("content"))
            .and_then(|c| c.as_str())
            .filter(|s| !s.is_empty())
            .map(str::to_string);

        tool_calls
            .iter()
            .map(|call| {
                let name = call
                    .get("function")
                    .and_then(|f| f.get("name"))
                    .and_then(|v| v.as_str())
                    .unwrap_or("");
                let args: Value = call
                    .get("function")
                    .and_then(|f| f.get("arguments"))
                    .and_then(|v| v.as_str())
                    .and_then(|s| serde_json::from_str(s).ok())
                    .unwrap_or(Value::Null);
                let files = args
                    .get("file_path")
                    .or_else(|| args.get("path"))
                    .and_then(|v| v.as_str())
                    .map(|s| vec![s.to_string()])
                    .unwrap_or_default();

                ParsedAction {
                    kind: action_kind_for_tool(name).to_string(),
                    files,
                    folders: Vec::new(),
                    command: args
                        .get("command")
                        .and_then(|v| v.as_str())
                        .map(str::to_string),
                    reasoning: reasoning.clone(),
                }
            })
            .collect()
    }

    fn extract_text_content(&self, body: &Value) -> String {
        body.get("choices")
            .and_then(|c| c.as_array())
            .and_then(|c| c.first())
            .and_then(|c| c.get("message"))
            .and_then(|m| m.get("content"))
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .to_string()
    }

    fn extract_token_usage(&self, body: &Value) -> TokenUsage {
        let Some(usage) = body.get("usage") else {
            return TokenUsage::default();
        };
        TokenUsage {
            input_tokens: usage.get("prompt_tokens").and_then(|v| v.as_u64()).unwrap_or(0),
            output_tokens: usage
                .get("completion_tokens")
                .and_then(|v| v.as_u64())
                .unwrap_or(0),
            ..Default::default()
        }
    }

    fn inject_memory(&self, body: &Value, text: &str) -> Value {
        let mut out = body.clone();
        let messages = out["messages"].as_array_mut().expect("messages must be an array");
        messages.retain(|m| m.get("role").and_then(|r| r.as_str()) != Some("system"));
        messages.insert(0, json!({"role": "system", "content": text}));
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
            "role": "tool",
            "tool_call_id": tool_id,
            "content": tool_result,
        }));
        out
    }

    fn filter_response_headers(&self, headers: &HeaderMap) -> HeaderMap {
        filter_headers(headers)
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

#[cfg(test)]
mod tests {
    use super::*;

    fn adapter() -> OpenAiCompatAdapter {
        OpenAiCompatAdapter::new("https://api.openai.com/v1").unwrap()
    }

    #[test]
    fn can_handle_matches_chat_completions() {
        let a = adapter();
        assert!(a.can_handle("https://api.openai.com/v1/chat/completions"));
        assert!(!a.can_handle("https://api.anthropic.com/v1/messages"));
    }

    #[test]
    fn is_end_turn_false_on_tool_calls_finish_reason() {
        let a = adapter();
        let body = json!({"choices": [{"finish_reason": "tool_calls"}]});
        assert!(!a.is_end_turn(&body));
        let body2 = json!({"choices": [{"finish_reason": "stop"}]});
        assert!(a.is_end_turn(&body2));
    }

    #[test]
    fn parse_actions_reads_tool_calls() {
        let a = adapter();
        let body = json!({"choices": [{
            "message": {
                "content": "updating the file",
                "tool_calls": [{
                    "function": {"name": "edit_file", "arguments": "{\"file_path\":\"src/a.rs\"}"}
                }]
            }
        }]});
        let actions = a.parse_actions(&body);
        assert_eq!(actions.len(), 1);
        assert_eq!(actions[0].kind, "edit");
        assert_eq!(actions[0].files, vec!["src/a.rs"]);
    }
}
