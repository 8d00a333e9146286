use std::fmt;

use crate::access::AccessDenied;

/// Prefix shared by every translated provider failure message.
///
/// Downstream protocol steps sniff for it to tell an upstream failure apart
/// from genuine model output.
pub const ERROR_PREFIX: &str = "Error (";

/// Shared error type used across all tutorgate crates.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("access denied: {0}")]
    Access(#[from] AccessDenied),

    #[error("provider: {0}")]
    Provider(#[from] ProviderError),

    #[error("unparseable model output: {0}")]
    Parse(String),

    #[error("store: {0}")]
    Store(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("cancelled")]
    Cancelled,

    #[error("config: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, Error>;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Provider failures
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Classification of a failed completion call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderErrorKind {
    /// The request did not complete in time.
    Timeout,
    /// Too many requests right now; retrying later may work.
    RateLimited,
    /// The credential's billing quota is exhausted.
    QuotaExceeded,
    /// The credential was rejected.
    AuthInvalid,
    /// The prompt exceeded the model's context window.
    RequestTooLarge,
    /// Any other 4xx rejection of the request.
    BadRequest,
    /// Everything else (5xx, transport failures, malformed payloads).
    Other,
}

/// A failed completion call, with the untranslated provider detail.
#[derive(Debug, Clone)]
pub struct ProviderError {
    pub kind: ProviderErrorKind,
    /// HTTP status when the provider answered at all.
    pub status: Option<u16>,
    /// Raw provider detail. Logged, never shown to students.
    pub detail: String,
}

const COMMON_ERROR_TAIL: &str = "Something went wrong with this query.  The error has been logged, and we'll work on it.  For now, please try again.";

impl ProviderError {
    pub fn new(kind: ProviderErrorKind, status: Option<u16>, detail: impl Into<String>) -> Self {
        Self {
            kind,
            status,
            detail: detail.into(),
        }
    }

    /// The error type name embedded in the user-facing message.
    pub fn type_name(&self) -> &'static str {
        match self.kind {
            ProviderErrorKind::Timeout => "APITimeoutError",
            ProviderErrorKind::RateLimited | ProviderErrorKind::QuotaExceeded => "RateLimitError",
            // A 400 that rejects the key is reported the way the provider framed it.
            ProviderErrorKind::AuthInvalid if self.status == Some(400) => "BadRequestError",
            ProviderErrorKind::AuthInvalid => "AuthenticationError",
            ProviderErrorKind::RequestTooLarge | ProviderErrorKind::BadRequest => {
                "BadRequestError"
            }
            ProviderErrorKind::Other => "APIError",
        }
    }

    /// Fixed, human-readable message for this failure.
    ///
    /// Every variant starts with [`ERROR_PREFIX`].
    pub fn user_message(&self) -> String {
        let body = match self.kind {
            ProviderErrorKind::Timeout => {
                "The system timed out producing the response.  Please try again."
            }
            ProviderErrorKind::RateLimited => {
                "The system is receiving too many requests right now.  Please try again in one minute."
            }
            ProviderErrorKind::QuotaExceeded => {
                "The API key for this class has exceeded its current quota (https://platform.openai.com/docs/guides/rate-limits/usage-tiers).  The instructor should check their API plan and billing details.  Possibly the key is in the free tier, which does not cover the models used here."
            }
            ProviderErrorKind::AuthInvalid => {
                "The API key set by the instructor for this class is invalid.  A valid API key is needed for this application to work."
            }
            ProviderErrorKind::RequestTooLarge => {
                "Your query is too long for the model to process.  Please reduce the length of your input."
            }
            ProviderErrorKind::BadRequest | ProviderErrorKind::Other => COMMON_ERROR_TAIL,
        };
        format!("{ERROR_PREFIX}{}).  {body}", self.type_name())
    }
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status {
            Some(status) => write!(f, "{:?} (HTTP {status}): {}", self.kind, self.detail),
            None => write!(f, "{:?}: {}", self.kind, self.detail),
        }
    }
}

impl std::error::Error for ProviderError {}
