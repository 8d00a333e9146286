use serde_json::{Map, Value};
use tg_domain::access::Credential;
use tg_domain::error::Result;
use tg_domain::message::Message;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Request / Response types
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Sampling parameters for one completion call.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionParams {
    pub temperature: f32,
    pub max_tokens: u32,
    /// Number of candidate completions to request.
    pub n: u32,
    /// Ask for a single JSON object as the response text.
    pub json_mode: bool,
    /// Provider-specific body fields, passed through as-is. Keys here
    /// override the fields above.
    pub extra: Map<String, Value>,
}

impl Default for CompletionParams {
    fn default() -> Self {
        Self {
            temperature: 0.25,
            max_tokens: 2000,
            n: 1,
            json_mode: false,
            extra: Map::new(),
        }
    }
}

impl CompletionParams {
    pub fn with_n(mut self, n: u32) -> Self {
        self.n = n;
        self
    }

    pub fn json(mut self) -> Self {
        self.json_mode = true;
        self
    }
}

/// A provider-agnostic chat completion request.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub messages: Vec<Message>,
    pub model: String,
    pub credential: Credential,
    pub params: CompletionParams,
}

/// Why the model stopped producing a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinishReason {
    Stop,
    /// `max_tokens` was reached; the text carries a truncation note.
    Length,
    /// The call failed; the text is a translated error message.
    Error,
}

impl FinishReason {
    pub fn from_wire(s: Option<&str>) -> Self {
        match s {
            Some("length") => FinishReason::Length,
            _ => FinishReason::Stop,
        }
    }
}

/// One response variant.
#[derive(Debug, Clone)]
pub struct CandidateCompletion {
    /// Trimmed response text.
    pub text: String,
    pub finish_reason: FinishReason,
    /// The provider's `choice` object this candidate came from.
    pub raw: Value,
}

impl CandidateCompletion {
    pub fn new(text: impl Into<String>, finish_reason: FinishReason) -> Self {
        Self {
            text: text.into(),
            finish_reason,
            raw: Value::Null,
        }
    }
}

/// Appended to candidates cut off by the output-token limit.
pub const LENGTH_EXCEEDED_NOTE: &str = "\n\n[error: maximum length exceeded]";

#[derive(Debug, Clone)]
pub struct CompletionResponse {
    /// At least one candidate, in provider order.
    pub candidates: Vec<CandidateCompletion>,
    /// Full provider payload.
    pub raw: Value,
}

impl CompletionResponse {
    /// The first candidate's text (the only one when `n == 1`).
    pub fn text(&self) -> &str {
        self.candidates.first().map(|c| c.text.as_str()).unwrap_or("")
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Core client trait
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Trait that every completion backend must implement.
///
/// Failures are returned as [`tg_domain::error::Error::Provider`] carrying a
/// classified [`tg_domain::error::ProviderError`]; translating them into
/// user-facing text is the caller's job.
#[async_trait::async_trait]
pub trait CompletionClient: Send + Sync {
    async fn complete(&self, req: &CompletionRequest) -> Result<CompletionResponse>;

    /// A short identifier for logs and trace events.
    fn client_id(&self) -> &str;
}
