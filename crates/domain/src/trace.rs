use serde::Serialize;

/// Structured trace events emitted across all tutorgate crates.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event")]
pub enum TraceEvent {
    AccessResolved {
        user_id: String,
        class_id: Option<String>,
        source: String,
        model: String,
        tokens_remaining: Option<u32>,
    },
    AccessDenied {
        user_id: String,
        class_id: Option<String>,
        reason: String,
    },
    QuotaSpent {
        user_id: String,
        tokens_remaining: u32,
    },
    ClassQuerySpent {
        user_id: String,
        class_id: String,
        queries_used: u32,
        query_limit: u32,
    },
    LlmRequest {
        provider: String,
        model: String,
        protocol: String,
        candidates: u32,
        duration_ms: u64,
        ok: bool,
    },
    CleanupRewrite {
        marker: String,
    },
    HelpQueryCompleted {
        sufficient: bool,
        candidates: usize,
        cleaned: bool,
    },
    ChatTurnAppended {
        chat_id: String,
        role: String,
        turns: usize,
    },
    AnalysisUpdated {
        chat_id: String,
        objectives: usize,
    },
    AnalysisSkipped {
        chat_id: String,
        reason: String,
    },
}

impl TraceEvent {
    pub fn emit(&self) {
        let json = serde_json::to_string(self).unwrap_or_default();
        tracing::info!(trace_event = %json, "tg_event");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_are_tagged_by_variant() {
        let ev = TraceEvent::QuotaSpent {
            user_id: "u1".into(),
            tokens_remaining: 3,
        };
        let v: serde_json::Value = serde_json::to_value(&ev).unwrap();
        assert_eq!(v["event"], "QuotaSpent");
        assert_eq!(v["tokens_remaining"], 3);
    }
}
