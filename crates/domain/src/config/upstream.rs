use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Upstream LLM provider being proxied
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// The provider the proxy sits in front of. Distinct from the auxiliary
/// LLM roles used for drift/intent/summary — this is the one whose
/// prompt cache the injector must not disturb.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamConfig {
    #[serde(default = "d_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub kind: UpstreamKind,
    /// Env var holding the upstream API key. Resolved at startup; if
    /// unset, requests are forwarded without an auth header and the
    /// upstream will itself reject them.
    #[serde(default = "d_key_env")]
    pub api_key_env: String,
    #[serde(default = "d_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: d_base_url(),
            kind: UpstreamKind::Anthropic,
            api_key_env: d_key_env(),
            timeout_ms: d_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum UpstreamKind {
    #[default]
    Anthropic,
    OpenaiCompat,
}

fn d_base_url() -> String {
    "https://api.anthropic.com".into()
}
fn d_key_env() -> String {
    "GROV_UPSTREAM_API_KEY".into()
}
fn d_timeout_ms() -> u64 {
    120_000
}
