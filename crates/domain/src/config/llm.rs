use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Provider kinds
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Every supported provider speaks the OpenAI chat-completions dialect;
/// they differ only in endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    #[default]
    Openai,
    Google,
}

impl ProviderKind {
    pub const ALL: [ProviderKind; 2] = [ProviderKind::Openai, ProviderKind::Google];

    pub fn as_str(self) -> &'static str {
        match self {
            ProviderKind::Openai => "openai",
            ProviderKind::Google => "google",
        }
    }

    pub fn default_base_url(self) -> &'static str {
        match self {
            ProviderKind::Openai => "https://api.openai.com/v1",
            ProviderKind::Google => "https://generativelanguage.googleapis.com/v1beta/openai",
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// System default access
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// The system credential and model, used for local users, quota users,
/// and explicit system-key requests.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemConfig {
    #[serde(default)]
    pub provider: ProviderKind,
    #[serde(default = "d_system_model")]
    pub model: String,
    #[serde(default)]
    pub auth: AuthConfig,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            provider: ProviderKind::default(),
            model: d_system_model(),
            auth: AuthConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Env var containing the key.
    #[serde(default = "d_auth_env")]
    pub env: Option<String>,
    /// Direct key (for config-only setups; prefer env).
    #[serde(default)]
    pub key: Option<String>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            env: d_auth_env(),
            key: None,
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Completion transport
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Per-request timeout. `None` leaves the HTTP client unbounded.
    #[serde(default)]
    pub timeout_ms: Option<u64>,
    #[serde(default = "d_temperature")]
    pub temperature: f32,
    #[serde(default = "d_max_tokens")]
    pub max_tokens: u32,
    /// Endpoint override for `openai` (proxies, test doubles).
    #[serde(default)]
    pub openai_base_url: Option<String>,
    /// Endpoint override for `google`.
    #[serde(default)]
    pub google_base_url: Option<String>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            timeout_ms: None,
            temperature: d_temperature(),
            max_tokens: d_max_tokens(),
            openai_base_url: None,
            google_base_url: None,
        }
    }
}

impl LlmConfig {
    pub fn base_url(&self, kind: ProviderKind) -> &str {
        let over = match kind {
            ProviderKind::Openai => self.openai_base_url.as_deref(),
            ProviderKind::Google => self.google_base_url.as_deref(),
        };
        over.unwrap_or_else(|| kind.default_base_url())
    }
}

// ── serde default helpers ───────────────────────────────────────────

fn d_system_model() -> String {
    "gpt-4.1-mini".into()
}
fn d_auth_env() -> Option<String> {
    Some("OPENAI_API_KEY".into())
}
fn d_temperature() -> f32 {
    0.25
}
fn d_max_tokens() -> u32 {
    2000
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_falls_back_to_provider_default() {
        let cfg = LlmConfig::default();
        assert_eq!(cfg.base_url(ProviderKind::Openai), "https://api.openai.com/v1");
        assert!(cfg
            .base_url(ProviderKind::Google)
            .starts_with("https://generativelanguage.googleapis.com/"));
    }

    #[test]
    fn base_url_override_wins() {
        let cfg = LlmConfig {
            openai_base_url: Some("http://127.0.0.1:9999/v1".into()),
            ..LlmConfig::default()
        };
        assert_eq!(cfg.base_url(ProviderKind::Openai), "http://127.0.0.1:9999/v1");
        assert_eq!(
            cfg.base_url(ProviderKind::Google),
            ProviderKind::Google.default_base_url()
        );
    }

    #[test]
    fn provider_kind_parses_snake_case() {
        let kind: ProviderKind = serde_json::from_str(r#""google""#).unwrap();
        assert_eq!(kind, ProviderKind::Google);
    }
}
