use std::sync::Arc;

use grov_adapter::AdapterRegistry;
use grov_domain::config::Config;
use grov_llm::{DriftChecker, IntentExtractor, ReasoningExtractor, RecoveryChecker, SummaryGenerator, TaskAnalyzer};
use grov_orchestrator::ProjectLockMap;
use grov_providers::ProviderRegistry;
use grov_store::Store;

use crate::session_cache::SessionCacheMap;

/// Shared application state passed to every request handler.
///
/// Fields are grouped by concern:
/// - **Core services** — config, durable store, upstream adapter registry
/// - **Auxiliary LLM helpers** — intent, task analysis, drift, recovery,
///   reasoning, summary, all backed by the same aux provider registry
/// - **Orchestration** — per-project locking
#[derive(Clone)]
pub struct AppState {
    // ── Core services ───────────────────────────────────────────────
    pub config: Arc<Config>,
    pub store: Arc<Store>,
    pub adapters: Arc<AdapterRegistry>,

    // ── Auxiliary LLM helpers ────────────────────────────────────────
    pub intent: Arc<IntentExtractor>,
    pub task_analysis: Arc<TaskAnalyzer>,
    pub drift: Arc<DriftChecker>,
    pub recovery: Arc<RecoveryChecker>,
    pub reasoning: Arc<ReasoningExtractor>,
    pub summary: Arc<SummaryGenerator>,

    // ── Orchestration ─────────────────────────────────────────────────
    pub locks: Arc<ProjectLockMap>,
    /// Per-session memoized static block, dynamic-block tracking record,
    /// last message count, and cached drift result. Never persisted.
    pub session_cache: Arc<SessionCacheMap>,

    /// SHA-256 of the configured admin bearer token, read once at startup.
    /// `None` means admin endpoints are disabled.
    pub admin_token_hash: Option<Arc<[u8]>>,

    /// Process start time, for `/health`'s `uptime_seconds`.
    pub started_at: std::time::Instant,
}

impl AppState {
    pub fn new(
        config: Arc<Config>,
        store: Arc<Store>,
        adapters: Arc<AdapterRegistry>,
        aux_llm: Arc<ProviderRegistry>,
        admin_token_hash: Option<Vec<u8>>,
    ) -> Self {
        Self {
            config,
            store,
            adapters,
            intent: Arc::new(IntentExtractor::new(aux_llm.clone())),
            task_analysis: Arc::new(TaskAnalyzer::new(aux_llm.clone())),
            drift: Arc::new(DriftChecker::new(aux_llm.clone())),
            recovery: Arc::new(RecoveryChecker::new(aux_llm.clone())),
            reasoning: Arc::new(ReasoningExtractor::new(aux_llm.clone())),
            summary: Arc::new(SummaryGenerator::new(aux_llm)),
            locks: Arc::new(ProjectLockMap::new()),
            session_cache: Arc::new(SessionCacheMap::new()),
            admin_token_hash: admin_token_hash.map(Arc::from),
            started_at: std::time::Instant::now(),
        }
    }
}
