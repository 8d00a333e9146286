//! Model access types: per-class layered configuration, the resolver's
//! output, and the expected access-policy failures.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::ProviderKind;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Credentials and models
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// An opaque provider API key. `Debug` and `Display` never reveal it.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Credential(String);

impl Credential {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Empty or whitespace-only keys count as "no key".
    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(***)")
    }
}

/// Which provider endpoint and model to call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelSpec {
    pub provider: ProviderKind,
    pub model: String,
}

impl ModelSpec {
    pub fn new(provider: ProviderKind, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
        }
    }
}

impl fmt::Display for ModelSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.provider.as_str(), self.model)
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Class configuration
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// One source of class access settings (an LTI consumer or a user-created
/// class). Absent fields defer to the next layer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessLayer {
    #[serde(default)]
    pub credential: Option<Credential>,
    #[serde(default)]
    pub model: Option<ModelSpec>,
}

/// Stored access policy for one class.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassAccessConfig {
    pub class_id: String,
    pub enabled: bool,
    /// Settings from the linked LTI consumer, if the class is LTI-backed.
    #[serde(default)]
    pub consumer: Option<AccessLayer>,
    /// Settings owned by the class creator, if the class is user-created.
    #[serde(default)]
    pub user_class: Option<AccessLayer>,
    /// Per-student query cap for this class. `None` = uncapped.
    #[serde(default)]
    pub query_limit: Option<u32>,
}

/// The class config after layering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EffectiveClassConfig {
    pub enabled: bool,
    pub credential: Option<Credential>,
    pub model: Option<ModelSpec>,
    pub query_limit: Option<u32>,
}

impl ClassAccessConfig {
    /// Coalesce the consumer layer over the user-class layer, field by field.
    pub fn effective(&self) -> EffectiveClassConfig {
        let consumer = self.consumer.as_ref();
        let user_class = self.user_class.as_ref();
        EffectiveClassConfig {
            enabled: self.enabled,
            credential: consumer
                .and_then(|l| l.credential.clone())
                .or_else(|| user_class.and_then(|l| l.credential.clone())),
            model: consumer
                .and_then(|l| l.model.clone())
                .or_else(|| user_class.and_then(|l| l.model.clone())),
            query_limit: self.query_limit,
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Resolver output
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Where a [`ResolvedAccess`] came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessSource {
    /// System credential, explicitly requested.
    System,
    /// Class (consumer or user-class) credential.
    Class,
    /// System credential for a locally-authenticated user.
    Local,
    /// System credential, metered against the user's free quota.
    Quota,
}

impl AccessSource {
    pub fn as_str(self) -> &'static str {
        match self {
            AccessSource::System => "system",
            AccessSource::Class => "class",
            AccessSource::Local => "local",
            AccessSource::Quota => "quota",
        }
    }
}

/// A ready-to-use credential and model for one request. Never persisted.
#[derive(Debug, Clone)]
pub struct ResolvedAccess {
    pub model: ModelSpec,
    pub credential: Credential,
    /// Quota left after this call; `None` when the request is not metered.
    pub tokens_remaining: Option<u32>,
    pub source: AccessSource,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Access-policy failures
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Expected, user-facing reasons a request cannot get model access.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AccessDenied {
    #[error("class is disabled")]
    ClassDisabled,
    #[error("no credential configured")]
    NoCredential,
    /// Free quota exhausted, or the class's per-student cap reached
    /// (`class_limit` is then the cap).
    #[error("no tokens remaining")]
    NoTokensRemaining { class_limit: Option<u32> },
}

impl AccessDenied {
    /// The distinct message shown for each condition.
    pub fn user_message(&self) -> String {
        match self {
            AccessDenied::ClassDisabled => {
                "Error: The current class is archived or disabled.".into()
            }
            AccessDenied::NoCredential => {
                "Error: No API key set.  An API key must be set by the instructor before this page can be used.".into()
            }
            AccessDenied::NoTokensRemaining { class_limit: None } => {
                "You have used all of your free queries.  If you are using this application in a class, please connect using the link from your class for continued access.  Otherwise, you can create a class and add an API key or contact us if you want to continue using this application.".into()
            }
            AccessDenied::NoTokensRemaining { class_limit: Some(max) } => format!(
                "You have reached the maximum limit of {max} queries. Please contact your instructor."
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layer(key: Option<&str>, model: Option<&str>) -> AccessLayer {
        AccessLayer {
            credential: key.map(Credential::new),
            model: model.map(|m| ModelSpec::new(ProviderKind::Openai, m)),
        }
    }

    #[test]
    fn consumer_fields_win_over_user_class() {
        let cfg = ClassAccessConfig {
            class_id: "c1".into(),
            enabled: true,
            consumer: Some(layer(Some("consumer-key"), Some("gpt-4.1"))),
            user_class: Some(layer(Some("user-key"), Some("gpt-4.1-mini"))),
            query_limit: None,
        };
        let eff = cfg.effective();
        assert_eq!(eff.credential.unwrap().expose(), "consumer-key");
        assert_eq!(eff.model.unwrap().model, "gpt-4.1");
    }

    #[test]
    fn coalesce_is_per_field_not_per_layer() {
        let cfg = ClassAccessConfig {
            class_id: "c1".into(),
            enabled: true,
            consumer: Some(layer(None, Some("gpt-4.1"))),
            user_class: Some(layer(Some("user-key"), Some("gpt-4.1-mini"))),
            query_limit: None,
        };
        let eff = cfg.effective();
        assert_eq!(eff.credential.unwrap().expose(), "user-key");
        assert_eq!(eff.model.unwrap().model, "gpt-4.1");
    }

    #[test]
    fn credential_debug_is_redacted() {
        let c = Credential::new("sk-live-123");
        assert_eq!(format!("{c:?}"), "Credential(***)");
    }

    #[test]
    fn access_messages_are_distinct() {
        let msgs = [
            AccessDenied::ClassDisabled.user_message(),
            AccessDenied::NoCredential.user_message(),
            AccessDenied::NoTokensRemaining { class_limit: None }.user_message(),
            AccessDenied::NoTokensRemaining { class_limit: Some(30) }.user_message(),
        ];
        for (i, a) in msgs.iter().enumerate() {
            for b in &msgs[i + 1..] {
                assert_ne!(a, b);
            }
        }
        assert!(msgs[3].contains("30 queries"));
    }
}
