//! The single-shot help pipeline.
//!
//! ```text
//!   ┌─ sufficiency check ──────────────────────────────┐
//!   │                                                  ├─► QueryRecord
//!   └─ main answer (n candidates) ─► select_best ─► cleanup? ┘
//! ```
//!
//! The two branches run concurrently, each under its own child token.
//! Cleanup starts as soon as the main answer is known.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use tg_domain::access::ResolvedAccess;
use tg_domain::config::{HelpConfig, LlmConfig};
use tg_domain::error::{Result, ERROR_PREFIX};
use tg_domain::trace::TraceEvent;
use tg_providers::{CompletionParams, ProviderRegistry};

use crate::llm::{base_params, LlmHandle};
use crate::prompts::Protocol;
use crate::scoring::{leakage_marker, select_best, AvoidSet};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Types
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// What the student submitted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HelpInputs {
    #[serde(default)]
    pub language: String,
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub error: String,
    #[serde(default)]
    pub issue: String,
    /// Instructor-provided context for the class or assignment.
    #[serde(default)]
    pub context: Option<String>,
}

/// How the model judged the query's level of detail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Sufficiency {
    Sufficient,
    /// The model asked for more information.
    NeedsClarification(String),
}

impl Sufficiency {
    /// Read a sufficiency reply. A translated provider failure counts as
    /// sufficient so the main answer is shown on its own.
    pub fn judge(text: &str) -> Self {
        let ok = text.ends_with("OK")
            || text.contains("OK.")
            || text.contains("```")
            || text.contains("is sufficient for me")
            || text.starts_with(ERROR_PREFIX);
        if ok {
            Sufficiency::Sufficient
        } else {
            Sufficiency::NeedsClarification(text.to_owned())
        }
    }
}

/// A completed help query. Built once by the pipeline, never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryRecord {
    #[serde(flatten)]
    pub inputs: HelpInputs,
    /// The clarification request, when the query lacked detail.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub insufficient: Option<String>,
    pub main: String,
    /// Raw provider payloads in call order: main, cleanup (if any),
    /// sufficiency. Failed calls are stored as `{"error": detail}`.
    pub responses: Vec<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topics: Option<Vec<String>>,
}

impl QueryRecord {
    pub fn sufficiency(&self) -> Sufficiency {
        match &self.insufficient {
            Some(text) => Sufficiency::NeedsClarification(text.clone()),
            None => Sufficiency::Sufficient,
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// HelpPipeline
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Clone)]
pub struct HelpPipeline {
    registry: ProviderRegistry,
    defaults: CompletionParams,
    candidates: u32,
}

struct MainAnswer {
    text: String,
    responses: Vec<Value>,
    candidates: usize,
    cleaned: bool,
}

impl HelpPipeline {
    pub fn new(registry: ProviderRegistry, llm: &LlmConfig, help: &HelpConfig) -> Self {
        Self {
            registry,
            defaults: base_params(llm),
            candidates: help.candidates,
        }
    }

    fn handle(&self, access: &ResolvedAccess) -> Result<LlmHandle> {
        LlmHandle::from_registry(&self.registry, access, self.defaults.clone())
    }

    /// Run one help query end to end.
    ///
    /// Provider failures become the text of the step they happened in.
    /// The only errors are cancellation and a missing provider client.
    pub async fn run_help_query(
        &self,
        access: &ResolvedAccess,
        inputs: HelpInputs,
        avoid: &AvoidSet,
        cancel: &CancellationToken,
    ) -> Result<QueryRecord> {
        let llm = self.handle(access)?;
        let main_cancel = cancel.child_token();
        let sufficiency_cancel = cancel.child_token();

        let check = Protocol::Sufficiency { inputs: &inputs };
        let (main, sufficiency) = tokio::join!(
            self.main_answer(&llm, &inputs, avoid, &main_cancel),
            llm.get_completion(&check, &sufficiency_cancel),
        );
        let MainAnswer {
            text: main,
            mut responses,
            candidates,
            cleaned,
        } = main?;
        let sufficiency = sufficiency?;

        let judged = Sufficiency::judge(sufficiency.text());
        responses.push(sufficiency.raw);

        TraceEvent::HelpQueryCompleted {
            sufficient: judged == Sufficiency::Sufficient,
            candidates,
            cleaned,
        }
        .emit();

        let insufficient = match judged {
            Sufficiency::Sufficient => None,
            Sufficiency::NeedsClarification(text) => Some(text),
        };

        Ok(QueryRecord {
            inputs,
            insufficient,
            main,
            responses,
            topics: None,
        })
    }

    async fn main_answer(
        &self,
        llm: &LlmHandle,
        inputs: &HelpInputs,
        avoid: &AvoidSet,
        cancel: &CancellationToken,
    ) -> Result<MainAnswer> {
        let protocol = Protocol::MainAnswer {
            inputs,
            avoid,
            candidates: self.candidates,
        };
        let response = llm.get_completion(&protocol, cancel).await?;
        let best = select_best(&response.candidates, avoid)
            .map(|c| c.text.clone())
            .unwrap_or_default();
        let candidates = response.candidates.len();
        let mut responses = vec![response.raw];

        let Some(marker) = leakage_marker(&best) else {
            return Ok(MainAnswer {
                text: best,
                responses,
                candidates,
                cleaned: false,
            });
        };

        tracing::debug!(marker, "main answer looks like code, rewriting");
        TraceEvent::CleanupRewrite {
            marker: marker.to_owned(),
        }
        .emit();

        let cleanup = llm
            .get_completion(&Protocol::Cleanup { text: &best }, cancel)
            .await?;
        let text = cleanup.text().to_owned();
        responses.push(cleanup.raw);

        Ok(MainAnswer {
            text,
            responses,
            candidates,
            cleaned: true,
        })
    }

    /// Ask which concepts the student struggled with.
    ///
    /// Anything that is not a JSON array of strings (including a
    /// translated provider failure) yields an empty list.
    pub async fn extract_topics(
        &self,
        access: &ResolvedAccess,
        record: &QueryRecord,
        cancel: &CancellationToken,
    ) -> Result<Vec<String>> {
        let llm = self.handle(access)?;
        let protocol = Protocol::Topics {
            inputs: &record.inputs,
            main: &record.main,
        };
        let response = llm.get_completion(&protocol, cancel).await?;
        match serde_json::from_str::<Vec<String>>(response.text()) {
            Ok(topics) => Ok(topics),
            Err(e) => {
                tracing::warn!(error = %e, "topics reply was not a JSON string array");
                Ok(Vec::new())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ok_replies_are_sufficient() {
        for text in [
            "OK",
            "OK.",
            "That is OK. I can help.",
            "Your query is sufficient for me to help.",
            "```python\n```",
            "Error (RateLimitError).  The system is receiving too many requests right now.",
        ] {
            assert_eq!(Sufficiency::judge(text), Sufficiency::Sufficient, "{text}");
        }
    }

    #[test]
    fn anything_else_is_a_clarification() {
        let text = "Could you share the full error message you are seeing?";
        assert_eq!(
            Sufficiency::judge(text),
            Sufficiency::NeedsClarification(text.into())
        );
        // The prefix must open the reply, not merely appear in it.
        assert!(matches!(
            Sufficiency::judge("Please paste the Error (the whole thing)"),
            Sufficiency::NeedsClarification(_)
        ));
    }

    #[test]
    fn record_serializes_flat_and_omits_empty_fields() {
        let record = QueryRecord {
            inputs: HelpInputs {
                language: "python".into(),
                issue: "why?".into(),
                ..HelpInputs::default()
            },
            insufficient: None,
            main: "Because.".into(),
            responses: vec![],
            topics: None,
        };
        let v = serde_json::to_value(&record).unwrap();
        assert_eq!(v["language"], "python");
        assert!(v.get("insufficient").is_none());
        assert!(v.get("topics").is_none());
        let back: QueryRecord = serde_json::from_value(v).unwrap();
        assert_eq!(back, record);
    }
}
