use grov_domain::usage::TokenUsage;
use grov_domain::Result;

/// A single-shot completion request for an auxiliary helper call. No tool
/// use, no streaming — helpers need one short turn of text in, text out.
#[derive(Debug, Clone, Default)]
pub struct ChatRequest {
    /// System prompt, if any.
    pub system: Option<String>,
    /// The single user turn.
    pub prompt: String,
    /// When `true`, ask the provider to constrain output to valid JSON.
    pub json_mode: bool,
    /// Maximum tokens in the response. `None` lets the provider choose.
    pub max_tokens: Option<u32>,
}

#[derive(Debug, Clone)]
pub struct ChatResponse {
    pub content: String,
    pub usage: TokenUsage,
    pub model: String,
}

/// Trait every auxiliary-model adapter implements.
///
/// Implementations translate a [`ChatRequest`] into the wire format of one
/// vendor's completion endpoint and parse the reply back into a
/// [`ChatResponse`]. No tool calling, streaming, or embeddings — helper
/// roles only ever need one short completion.
#[async_trait::async_trait]
pub trait LlmProvider: Send + Sync {
    async fn chat(&self, req: ChatRequest) -> Result<ChatResponse>;

    /// The config id this provider instance was built from.
    fn provider_id(&self) -> &str;
}
