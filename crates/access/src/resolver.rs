//! Model access resolution.
//!
//! [`AccessResolver::resolve`] decides, for one request, which credential and
//! model to use and whether the request is metered. Precedence, first match
//! wins:
//!
//! 1. explicit system-credential request
//! 2. active class (consumer layer coalesced over user-class layer)
//! 3. locally-authenticated user
//! 4. free-standing user, metered against their quota balance

use std::sync::Arc;

use tg_domain::access::{
    AccessDenied, AccessSource, Credential, EffectiveClassConfig, ModelSpec, ResolvedAccess,
};
use tg_domain::error::{Error, Result};
use tg_domain::tenant::{AuthProviderKind, TenantContext};
use tg_domain::trace::TraceEvent;

use crate::store::CredentialStore;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Types
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResolveOptions {
    /// Skip every tenant check and use the system default.
    pub use_system_credential: bool,
    /// Consume one unit of the governing counter (quota or class limit).
    pub spend_quota: bool,
}

impl ResolveOptions {
    pub fn spending() -> Self {
        Self {
            use_system_credential: false,
            spend_quota: true,
        }
    }

    pub fn system() -> Self {
        Self {
            use_system_credential: true,
            spend_quota: false,
        }
    }
}

/// The system-wide default model and credential.
#[derive(Debug, Clone)]
pub struct SystemAccess {
    pub model: ModelSpec,
    /// `None` when no system key is configured; system paths then fail
    /// with [`AccessDenied::NoCredential`].
    pub credential: Option<Credential>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// AccessResolver
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Clone)]
pub struct AccessResolver {
    store: Arc<dyn CredentialStore>,
    system: SystemAccess,
}

impl AccessResolver {
    pub fn new(store: Arc<dyn CredentialStore>, system: SystemAccess) -> Self {
        Self { store, system }
    }

    /// Resolve the access that governs one request from `ctx`.
    ///
    /// The only side effects are the counter writes made when
    /// `opts.spend_quota` is set, at most one per call.
    pub async fn resolve(&self, ctx: &TenantContext, opts: ResolveOptions) -> Result<ResolvedAccess> {
        let outcome = self.resolve_inner(ctx, opts).await;
        match &outcome {
            Ok(access) => TraceEvent::AccessResolved {
                user_id: ctx.user_id.clone(),
                class_id: ctx.class_id.clone(),
                source: access.source.as_str().into(),
                model: access.model.to_string(),
                tokens_remaining: access.tokens_remaining,
            }
            .emit(),
            Err(Error::Access(denied)) => {
                tracing::info!(
                    user_id = %ctx.user_id,
                    class_id = ?ctx.class_id,
                    reason = %denied,
                    "access denied"
                );
                TraceEvent::AccessDenied {
                    user_id: ctx.user_id.clone(),
                    class_id: ctx.class_id.clone(),
                    reason: denied.to_string(),
                }
                .emit();
            }
            Err(e) => tracing::error!(user_id = %ctx.user_id, error = %e, "access resolution failed"),
        }
        outcome
    }

    async fn resolve_inner(&self, ctx: &TenantContext, opts: ResolveOptions) -> Result<ResolvedAccess> {
        if opts.use_system_credential {
            return self.system_access(AccessSource::System, None);
        }

        if let Some(class_id) = ctx.class_id.as_deref() {
            let config = self
                .store
                .class_config(class_id)
                .await?
                .ok_or_else(|| Error::NotFound(format!("class '{class_id}'")))?;
            return self
                .class_access(ctx, class_id, config.effective(), opts.spend_quota)
                .await;
        }

        if ctx.auth_provider == AuthProviderKind::Local {
            return self.system_access(AccessSource::Local, None);
        }

        let remaining = if opts.spend_quota {
            // A lost race against a concurrent spend lands here as `None`.
            let after = self
                .store
                .decrement_quota_if_positive(&ctx.user_id)
                .await?
                .ok_or(AccessDenied::NoTokensRemaining { class_limit: None })?;
            TraceEvent::QuotaSpent {
                user_id: ctx.user_id.clone(),
                tokens_remaining: after,
            }
            .emit();
            after
        } else {
            let balance = self.store.quota_balance(&ctx.user_id).await?;
            if balance == 0 {
                return Err(AccessDenied::NoTokensRemaining { class_limit: None }.into());
            }
            balance
        };

        self.system_access(AccessSource::Quota, Some(remaining))
    }

    async fn class_access(
        &self,
        ctx: &TenantContext,
        class_id: &str,
        config: EffectiveClassConfig,
        spend: bool,
    ) -> Result<ResolvedAccess> {
        if !config.enabled {
            return Err(AccessDenied::ClassDisabled.into());
        }

        let credential = match config.credential {
            Some(c) if !c.is_blank() => c,
            _ => return Err(AccessDenied::NoCredential.into()),
        };

        if let (Some(limit), true) = (config.query_limit, ctx.is_student()) {
            let denied = AccessDenied::NoTokensRemaining {
                class_limit: Some(limit),
            };
            if spend {
                let used = self
                    .store
                    .increment_class_queries_below(class_id, &ctx.user_id, limit)
                    .await?
                    .ok_or(denied)?;
                TraceEvent::ClassQuerySpent {
                    user_id: ctx.user_id.clone(),
                    class_id: class_id.to_string(),
                    queries_used: used,
                    query_limit: limit,
                }
                .emit();
            } else if self.store.class_queries_used(class_id, &ctx.user_id).await? >= limit {
                return Err(denied.into());
            }
        }

        Ok(ResolvedAccess {
            model: config.model.unwrap_or_else(|| self.system.model.clone()),
            credential,
            tokens_remaining: None,
            source: AccessSource::Class,
        })
    }

    fn system_access(&self, source: AccessSource, tokens_remaining: Option<u32>) -> Result<ResolvedAccess> {
        let credential = match &self.system.credential {
            Some(c) if !c.is_blank() => c.clone(),
            _ => return Err(AccessDenied::NoCredential.into()),
        };
        Ok(ResolvedAccess {
            model: self.system.model.clone(),
            credential,
            tokens_remaining,
            source,
        })
    }
}
