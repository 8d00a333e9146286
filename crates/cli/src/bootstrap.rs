//! App construction shared by every subcommand that talks to a model.

use std::sync::Arc;

use anyhow::Context;

use tg_access::{
    AccessResolver, CredentialStore, MemoryCredentialStore, SqliteCredentialStore, SystemAccess,
};
use tg_domain::access::ModelSpec;
use tg_domain::config::{Config, ConfigSeverity};
use tg_engine::tutor::{ChatStore, JsonChatStore, TutorRunner};
use tg_engine::{AvoidSet, HelpPipeline};
use tg_providers::util::resolve_api_key;
use tg_providers::ProviderRegistry;

/// Everything a command needs, wired from one [`Config`].
#[derive(Clone)]
pub struct App {
    pub config: Arc<Config>,
    pub resolver: AccessResolver,
    pub help: HelpPipeline,
    pub tutor: TutorRunner,
    pub avoid: AvoidSet,
}

/// Validate config and initialize every subsystem.
pub async fn build_app(config: Arc<Config>) -> anyhow::Result<App> {
    // ── Config validation ────────────────────────────────────────────
    let issues = config.validate();
    for issue in &issues {
        match issue.severity {
            ConfigSeverity::Warning => tracing::warn!("config: {issue}"),
            ConfigSeverity::Error => tracing::error!("config: {issue}"),
        }
    }
    let error_count = issues
        .iter()
        .filter(|i| i.severity == ConfigSeverity::Error)
        .count();
    if error_count > 0 {
        anyhow::bail!("config validation failed with {error_count} error(s)");
    }

    // ── Access store ─────────────────────────────────────────────────
    let store = build_credential_store(&config).await?;

    let credential = match resolve_api_key(&config.system.auth) {
        Ok(credential) => Some(credential),
        Err(e) => {
            tracing::warn!(error = %e, "no system API key; system-credential requests will be denied");
            None
        }
    };
    let system = SystemAccess {
        model: ModelSpec::new(config.system.provider, config.system.model.clone()),
        credential,
    };
    let resolver = AccessResolver::new(store, system);

    // ── LLM providers ────────────────────────────────────────────────
    let registry = ProviderRegistry::from_config(&config.llm);
    tracing::info!(providers = registry.len(), "LLM providers ready");

    // ── Pipelines ────────────────────────────────────────────────────
    let help = HelpPipeline::new(registry.clone(), &config.llm, &config.help);

    let chats: Arc<dyn ChatStore> = Arc::new(
        JsonChatStore::open(&config.tutor.chat_dir)
            .with_context(|| format!("opening chat directory {}", config.tutor.chat_dir.display()))?,
    );
    tracing::info!(path = %config.tutor.chat_dir.display(), "chat store ready");
    let tutor = TutorRunner::new(registry, &config.llm, chats);

    let avoid = AvoidSet::parse(&config.help.avoid);
    tracing::debug!(terms = avoid.len(), "help avoid set loaded");

    Ok(App {
        config,
        resolver,
        help,
        tutor,
        avoid,
    })
}

/// SQLite when `store.sqlite_path` is set, in-memory otherwise. Configured
/// classes are upserted either way.
async fn build_credential_store(config: &Config) -> anyhow::Result<Arc<dyn CredentialStore>> {
    let classes = &config.store.classes;
    match &config.store.sqlite_path {
        Some(path) => {
            let store = SqliteCredentialStore::open(path, config.store.default_tokens)
                .with_context(|| format!("opening credential store {}", path.display()))?;
            for class in classes {
                store
                    .put_class(class.clone())
                    .await
                    .with_context(|| format!("seeding class '{}'", class.class_id))?;
            }
            tracing::info!(path = %path.display(), classes = classes.len(), "sqlite credential store ready");
            Ok(Arc::new(store))
        }
        None => {
            let store = MemoryCredentialStore::new(config.store.default_tokens);
            for class in classes {
                store.put_class(class.clone());
            }
            tracing::info!(classes = classes.len(), "in-memory credential store ready");
            Ok(Arc::new(store))
        }
    }
}
