//! Access guard for command handlers.
//!
//! [`with_access`] resolves the tenant's model access and only then runs the
//! handler. An access-policy denial is not an error: it is returned as
//! [`Guarded::Denied`] so the caller can show the user-facing message.

use std::future::Future;

use tg_access::{AccessResolver, ResolveOptions};
use tg_domain::access::{AccessDenied, ResolvedAccess};
use tg_domain::error::Error;
use tg_domain::tenant::TenantContext;

#[derive(Debug)]
pub enum Guarded<T> {
    Allowed(T),
    Denied(AccessDenied),
}

pub async fn with_access<F, Fut, T>(
    resolver: &AccessResolver,
    ctx: &TenantContext,
    opts: ResolveOptions,
    handler: F,
) -> anyhow::Result<Guarded<T>>
where
    F: FnOnce(ResolvedAccess) -> Fut,
    Fut: Future<Output = anyhow::Result<T>>,
{
    match resolver.resolve(ctx, opts).await {
        Ok(access) => handler(access).await.map(Guarded::Allowed),
        Err(Error::Access(denied)) => Ok(Guarded::Denied(denied)),
        Err(e) => Err(e.into()),
    }
}
