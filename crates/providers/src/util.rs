//! Shared utility functions for provider adapters.

use tg_domain::access::Credential;
use tg_domain::config::AuthConfig;
use tg_domain::error::{Error, ProviderError, ProviderErrorKind, Result};

/// Convert a [`reqwest::Error`] into the domain [`Error`] type.
///
/// Timeouts map to [`ProviderErrorKind::Timeout`]; every other transport
/// failure maps to [`ProviderErrorKind::Other`].
pub(crate) fn from_reqwest(e: reqwest::Error) -> Error {
    let kind = if e.is_timeout() {
        ProviderErrorKind::Timeout
    } else {
        ProviderErrorKind::Other
    };
    let status = e.status().map(|s| s.as_u16());
    Error::Provider(ProviderError::new(kind, status, e.to_string()))
}

/// Resolve the system API key from an [`AuthConfig`].
///
/// Precedence:
/// 1. `key` field (plaintext, logs a warning)
/// 2. `env` field (reads environment variable)
/// 3. Error
pub fn resolve_api_key(auth: &AuthConfig) -> Result<Credential> {
    if let Some(ref key) = auth.key {
        tracing::warn!(
            "API key loaded from plaintext config field 'key'; prefer 'env' instead"
        );
        return Ok(Credential::new(key.clone()));
    }

    if let Some(ref env_var) = auth.env {
        return std::env::var(env_var).map(Credential::new).map_err(|_| {
            Error::Config(format!(
                "environment variable '{env_var}' not set or not valid UTF-8"
            ))
        });
    }

    Err(Error::Config(
        "no API key configured: set 'key' or 'env' in [system.auth]".into(),
    ))
}
