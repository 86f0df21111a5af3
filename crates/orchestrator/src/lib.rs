pub mod lifecycle;
pub mod lock;
pub mod resolution;
pub mod warmup;

pub use lifecycle::{apply, LifecycleOutcome};
pub use lock::ProjectLockMap;
pub use resolution::resolve_session;
pub use warmup::is_warmup_or_noop;
