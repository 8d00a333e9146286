use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tg_access::ResolveOptions;
use tg_cli::bootstrap::build_app;
use tg_cli::guard::{with_access, Guarded};
use tg_domain::access::{AccessDenied, AccessLayer, AccessSource, ClassAccessConfig, Credential};
use tg_domain::config::Config;
use tg_domain::tenant::{AuthProviderKind, ClassRole, TenantContext};

fn class(id: &str, enabled: bool, query_limit: Option<u32>) -> ClassAccessConfig {
    ClassAccessConfig {
        class_id: id.into(),
        enabled,
        consumer: Some(AccessLayer {
            credential: Some(Credential::new("sk-class")),
            model: None,
        }),
        user_class: None,
        query_limit,
    }
}

fn config_in(dir: &Path) -> Config {
    let mut config = Config::default();
    config.system.auth.key = Some("sk-system".into());
    config.tutor.chat_dir = dir.join("chats");
    config.store.sqlite_path = Some(dir.join("access.db"));
    config.store.classes = vec![class("cs1", true, Some(1)), class("old", false, None)];
    config
}

fn student(class_id: &str) -> TenantContext {
    TenantContext::user("stu-1", AuthProviderKind::Lti).in_class(class_id, ClassRole::Student)
}

#[tokio::test]
async fn seeded_class_governs_access_and_limit() {
    let dir = tempfile::tempdir().unwrap();
    let app = build_app(Arc::new(config_in(dir.path()))).await.unwrap();
    let calls = AtomicUsize::new(0);
    let system_model = app.config.system.model.clone();

    let first = with_access(&app.resolver, &student("cs1"), ResolveOptions::spending(), |access| {
        calls.fetch_add(1, Ordering::SeqCst);
        async move {
            assert_eq!(access.source, AccessSource::Class);
            assert_eq!(access.credential.expose(), "sk-class");
            // No class model: the system default applies.
            assert_eq!(access.model.model, system_model);
            Ok(())
        }
    })
    .await
    .unwrap();
    assert!(matches!(first, Guarded::Allowed(())));

    let second = with_access(&app.resolver, &student("cs1"), ResolveOptions::spending(), |_| {
        calls.fetch_add(1, Ordering::SeqCst);
        async { Ok(()) }
    })
    .await
    .unwrap();
    match second {
        Guarded::Denied(denied) => {
            assert_eq!(denied, AccessDenied::NoTokensRemaining { class_limit: Some(1) });
            assert!(denied.user_message().contains("maximum limit of 1 queries"));
        }
        Guarded::Allowed(()) => panic!("class limit was not enforced"),
    }
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn disabled_class_is_denied_without_running_the_handler() {
    let dir = tempfile::tempdir().unwrap();
    let app = build_app(Arc::new(config_in(dir.path()))).await.unwrap();

    let outcome: Guarded<()> =
        with_access(&app.resolver, &student("old"), ResolveOptions::default(), |_| async {
            Err(anyhow::anyhow!("handler must not run"))
        })
        .await
        .unwrap();
    assert!(matches!(outcome, Guarded::Denied(AccessDenied::ClassDisabled)));
}

#[tokio::test]
async fn unknown_class_is_an_error_not_a_denial() {
    let dir = tempfile::tempdir().unwrap();
    let app = build_app(Arc::new(config_in(dir.path()))).await.unwrap();

    let result: anyhow::Result<Guarded<()>> =
        with_access(&app.resolver, &student("nope"), ResolveOptions::default(), |_| async { Ok(()) })
            .await;
    assert!(result.unwrap_err().to_string().contains("class 'nope'"));
}

#[tokio::test]
async fn handler_errors_propagate() {
    let dir = tempfile::tempdir().unwrap();
    let app = build_app(Arc::new(config_in(dir.path()))).await.unwrap();
    let local = TenantContext::user("staff", AuthProviderKind::Local);

    let result: anyhow::Result<Guarded<()>> =
        with_access(&app.resolver, &local, ResolveOptions::default(), |access| async move {
            assert_eq!(access.source, AccessSource::Local);
            anyhow::bail!("handler failed")
        })
        .await;
    assert_eq!(result.unwrap_err().to_string(), "handler failed");
}

#[tokio::test]
async fn seeded_classes_survive_a_restart() {
    let dir = tempfile::tempdir().unwrap();
    build_app(Arc::new(config_in(dir.path()))).await.unwrap();

    // Same database, no classes in config: the stored policy still applies.
    let mut config = config_in(dir.path());
    config.store.classes.clear();
    let app = build_app(Arc::new(config)).await.unwrap();
    let outcome = with_access(&app.resolver, &student("old"), ResolveOptions::default(), |_| async {
        Ok(())
    })
    .await
    .unwrap();
    assert!(matches!(outcome, Guarded::Denied(AccessDenied::ClassDisabled)));
}

#[tokio::test]
async fn invalid_config_refuses_to_start() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = config_in(dir.path());
    config.help.candidates = 0;
    let err = build_app(Arc::new(config)).await.err().unwrap();
    assert!(err.to_string().contains("config validation failed with 1 error(s)"));
}
