pub mod anthropic;
pub mod credential_cache;
pub mod openai_compat;
pub mod registry;
pub mod traits;
mod util;

pub use credential_cache::CredentialCache;
pub use registry::ProviderRegistry;
pub use traits::{ChatRequest, ChatResponse, LlmProvider};
pub use util::resolve_api_key;
