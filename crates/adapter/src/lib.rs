pub mod anthropic;
pub mod openai_compat;
pub mod rawinject;
pub mod registry;
pub mod traits;

pub use registry::{is_sub_agent_model, AdapterRegistry};
pub use traits::{AgentAdapter, ForwardResult, HistoryTurn, ParsedAction};
