use serde::Serialize;

/// Structured trace events emitted across the Grov proxy.
///
/// Enabled via `--debug`, written as one JSON object per line alongside the
/// always-on compact console summary.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event")]
pub enum TraceEvent {
    RequestReceived {
        req_id: String,
        session_key: String,
        classification: String,
        message_count: usize,
    },
    ResponseForwarded {
        req_id: String,
        status: u16,
        was_event_stream: bool,
        duration_ms: u64,
    },
    InjectionApplied {
        req_id: String,
        session_id: String,
        static_bytes: usize,
        dynamic_bytes: usize,
        static_cached: bool,
    },
    SessionResolved {
        session_key: String,
        session_id: String,
        is_new: bool,
        reactivated: bool,
    },
    SessionTransition {
        session_id: String,
        from_status: String,
        action: String,
        to_status: String,
    },
    DriftScored {
        session_id: String,
        score: u8,
        mode: String,
        escalation: u32,
    },
    ClearTriggered {
        session_id: String,
        context_tokens: u64,
        threshold: u64,
    },
    TeamMemoryPromoted {
        session_id: String,
        project_path: String,
        decisions: usize,
        reasoning_entries: usize,
    },
}

impl TraceEvent {
    pub fn emit(&self) {
        let json = serde_json::to_string(self).unwrap_or_default();
        tracing::info!(trace_event = %json, "grov_event");
    }
}
