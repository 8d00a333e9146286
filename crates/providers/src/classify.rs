//! Classification of non-success provider responses.

use tg_domain::error::{ProviderError, ProviderErrorKind};

/// Classify an HTTP error response from an OpenAI-compatible endpoint.
///
/// `body` is the raw response text; the provider's wording decides the
/// subtype for 400 and 429 responses.
pub fn classify_http_error(status: u16, body: &str) -> ProviderError {
    let kind = match status {
        408 | 504 => ProviderErrorKind::Timeout,
        429 if body.contains("exceeded your current quota") => ProviderErrorKind::QuotaExceeded,
        429 => ProviderErrorKind::RateLimited,
        401 | 403 => ProviderErrorKind::AuthInvalid,
        400 if body.contains("API key not valid") => ProviderErrorKind::AuthInvalid,
        400 if body.contains("maximum context length") => ProviderErrorKind::RequestTooLarge,
        400 => ProviderErrorKind::BadRequest,
        413 => ProviderErrorKind::RequestTooLarge,
        _ => ProviderErrorKind::Other,
    };
    ProviderError::new(kind, Some(status), body)
}
