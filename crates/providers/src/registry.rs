//! Provider registry.
//!
//! Holds one completion client per [`ProviderKind`]. Clients carry no
//! credential, so a single registry serves every tenant.

use crate::openai_compat::OpenAiCompatClient;
use crate::traits::CompletionClient;
use std::collections::HashMap;
use std::sync::Arc;
use tg_domain::config::{LlmConfig, ProviderKind};
use tg_domain::error::{Error, Result};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// ProviderRegistry
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Default, Clone)]
pub struct ProviderRegistry {
    clients: HashMap<ProviderKind, Arc<dyn CompletionClient>>,
}

impl ProviderRegistry {
    /// Build a client for every supported provider kind.
    ///
    /// Clients that fail to initialize are logged and skipped rather than
    /// aborting startup; requests routed to them fail with a config error.
    pub fn from_config(config: &LlmConfig) -> Self {
        let mut clients: HashMap<ProviderKind, Arc<dyn CompletionClient>> = HashMap::new();

        for kind in ProviderKind::ALL {
            match OpenAiCompatClient::from_config(kind, config) {
                Ok(client) => {
                    tracing::debug!(
                        provider = kind.as_str(),
                        base_url = %config.base_url(kind),
                        "registered completion client"
                    );
                    clients.insert(kind, Arc::new(client));
                }
                Err(e) => {
                    tracing::warn!(
                        provider = kind.as_str(),
                        error = %e,
                        "failed to initialize completion client, skipping"
                    );
                }
            }
        }

        Self { clients }
    }

    /// Register (or replace) the client for `kind`.
    pub fn with_client(mut self, kind: ProviderKind, client: Arc<dyn CompletionClient>) -> Self {
        self.clients.insert(kind, client);
        self
    }

    /// Look up the client for a provider kind.
    pub fn get(&self, kind: ProviderKind) -> Result<Arc<dyn CompletionClient>> {
        self.clients.get(&kind).cloned().ok_or_else(|| {
            Error::Config(format!("no completion client for provider '{}'", kind.as_str()))
        })
    }

    /// Number of registered clients.
    pub fn len(&self) -> usize {
        self.clients.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_config_registers_every_kind() {
        let registry = ProviderRegistry::from_config(&LlmConfig::default());
        assert_eq!(registry.len(), ProviderKind::ALL.len());
        assert_eq!(registry.get(ProviderKind::Google).unwrap().client_id(), "google");
    }

    #[test]
    fn missing_kind_is_a_config_error() {
        let registry = ProviderRegistry::default();
        assert!(registry.is_empty());
        assert!(matches!(registry.get(ProviderKind::Openai), Err(Error::Config(_))));
    }
}
