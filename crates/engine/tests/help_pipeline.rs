mod common;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Barrier, Notify};
use tokio_util::sync::CancellationToken;

use tg_domain::error::{Error, ProviderErrorKind};
use tg_engine::{AvoidSet, HelpInputs, Sufficiency};

use common::*;

fn inputs() -> HelpInputs {
    HelpInputs {
        language: "python".into(),
        code: "for i in range(10)\n    print(i)".into(),
        error: "SyntaxError: expected ':'".into(),
        issue: "What is wrong with my loop?".into(),
        context: None,
    }
}

#[tokio::test]
async fn fenced_main_answer_is_cleaned_exactly_once() {
    let client = Arc::new(
        ScriptedClient::new()
            .on(SUFFICIENCY, Reply::text("OK."))
            .on(CLEANUP, Reply::text("Look at the end of your `for` line."))
            .on(
                MAIN,
                Reply::texts(&[
                    "Add a colon:\n```python\nfor i in range(10):\n```",
                    "It should look like `for i in range(10):` with ```",
                ]),
            ),
    );
    let pipeline = help_pipeline(client.clone());

    let record = pipeline
        .run_help_query(&access(), inputs(), &AvoidSet::default(), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(client.calls_mentioning(CLEANUP), 1);
    assert!(!record.main.contains("```"));
    assert_eq!(record.main, "Look at the end of your `for` line.");
    assert_eq!(record.insufficient, None);
    // main, cleanup, sufficiency
    assert_eq!(record.responses.len(), 3);
}

#[tokio::test]
async fn clean_main_answer_skips_cleanup() {
    let client = Arc::new(
        ScriptedClient::new()
            .on(SUFFICIENCY, Reply::text("OK."))
            .on(MAIN, Reply::texts(&["```x```", "Python blocks need a colon."])),
    );
    let record = help_pipeline(client.clone())
        .run_help_query(&access(), inputs(), &AvoidSet::default(), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(record.main, "Python blocks need a colon.");
    assert_eq!(client.calls_mentioning(CLEANUP), 0);
    assert_eq!(record.responses.len(), 2);
}

#[tokio::test]
async fn clarification_keeps_both_texts() {
    let clarification = "Which line does the error point to?";
    let client = Arc::new(
        ScriptedClient::new()
            .on(SUFFICIENCY, Reply::text(clarification))
            .on(MAIN, Reply::text("Python blocks need a colon.")),
    );
    let record = help_pipeline(client)
        .run_help_query(&access(), inputs(), &AvoidSet::default(), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(record.insufficient.as_deref(), Some(clarification));
    assert_eq!(record.main, "Python blocks need a colon.");
    assert_eq!(
        record.sufficiency(),
        Sufficiency::NeedsClarification(clarification.into())
    );
}

#[tokio::test]
async fn failed_sufficiency_check_fails_open() {
    let client = Arc::new(
        ScriptedClient::new()
            .on(SUFFICIENCY, Reply::Fail(ProviderErrorKind::RateLimited))
            .on(MAIN, Reply::text("Python blocks need a colon.")),
    );
    let record = help_pipeline(client)
        .run_help_query(&access(), inputs(), &AvoidSet::default(), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(record.insufficient, None);
    assert_eq!(record.main, "Python blocks need a colon.");
    assert_eq!(record.responses[1]["error"], "scripted failure");
}

#[tokio::test]
async fn failed_main_answer_becomes_translated_text() {
    let client = Arc::new(
        ScriptedClient::new()
            .on(SUFFICIENCY, Reply::text("OK."))
            .on(MAIN, Reply::Fail(ProviderErrorKind::Timeout)),
    );
    let record = help_pipeline(client.clone())
        .run_help_query(&access(), inputs(), &AvoidSet::default(), &CancellationToken::new())
        .await
        .unwrap();

    assert!(record.main.starts_with("Error (APITimeoutError)."));
    assert!(!record.main.contains("scripted failure"));
    assert_eq!(client.calls_mentioning(CLEANUP), 0);
}

#[tokio::test]
async fn avoid_terms_steer_candidate_choice() {
    let client = Arc::new(
        ScriptedClient::new()
            .on(SUFFICIENCY, Reply::text("OK."))
            .on(
                MAIN,
                Reply::texts(&["You could use eval() or eval() here.", "Convert with int()."]),
            ),
    );
    let avoid = AvoidSet::parse("eval()\n");
    let record = help_pipeline(client.clone())
        .run_help_query(&access(), inputs(), &avoid, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(record.main, "Convert with int().");
    let main_req = client
        .calls()
        .into_iter()
        .find(|r| r.messages.iter().any(|m| m.content.contains(MAIN)))
        .unwrap();
    assert_eq!(main_req.params.n, 2);
    assert!(main_req.messages[2].content.contains("`eval()`"));
}

#[tokio::test]
async fn sufficiency_and_main_run_concurrently() {
    // Both requests must be in flight at once to pass the barrier.
    let barrier = Arc::new(Barrier::new(2));
    let client = Arc::new(
        ScriptedClient::new()
            .on(
                SUFFICIENCY,
                Reply::AfterBarrier(barrier.clone(), Box::new(Reply::text("OK."))),
            )
            .on(
                MAIN,
                Reply::AfterBarrier(barrier, Box::new(Reply::text("Use a colon."))),
            ),
    );
    let pipeline = help_pipeline(client);
    let access = access();
    let avoid = AvoidSet::default();
    let cancel = CancellationToken::new();
    let run = pipeline.run_help_query(&access, inputs(), &avoid, &cancel);
    let record = tokio::time::timeout(Duration::from_secs(5), run)
        .await
        .expect("branches were not concurrent")
        .unwrap();
    assert_eq!(record.main, "Use a colon.");
}

#[tokio::test]
async fn cleanup_does_not_wait_for_sufficiency() {
    // The sufficiency reply is released only once cleanup has started.
    let cleanup_started = Arc::new(Notify::new());
    let client = Arc::new(
        ScriptedClient::new()
            .on(
                SUFFICIENCY,
                Reply::AfterSignal(cleanup_started.clone(), Box::new(Reply::text("OK."))),
            )
            .on(
                CLEANUP,
                Reply::Signal(cleanup_started, Box::new(Reply::text("Check the loop header."))),
            )
            .on(MAIN, Reply::text("```for i in range(10):```")),
    );
    let pipeline = help_pipeline(client);
    let access = access();
    let avoid = AvoidSet::default();
    let cancel = CancellationToken::new();
    let run = pipeline.run_help_query(&access, inputs(), &avoid, &cancel);
    let record = tokio::time::timeout(Duration::from_secs(5), run)
        .await
        .expect("cleanup waited on the sufficiency branch")
        .unwrap();
    assert_eq!(record.main, "Check the loop header.");
}

#[tokio::test]
async fn cancellation_produces_no_record() {
    let client = Arc::new(
        ScriptedClient::new()
            .on(SUFFICIENCY, Reply::Hang)
            .on(MAIN, Reply::Hang),
    );
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        trigger.cancel();
    });

    let result = help_pipeline(client)
        .run_help_query(&access(), inputs(), &AvoidSet::default(), &cancel)
        .await;
    assert!(matches!(result, Err(Error::Cancelled)));
}

#[tokio::test]
async fn topics_parse_or_fall_back_to_empty() {
    let good = Arc::new(
        ScriptedClient::new()
            .on(TOPICS, Reply::text(r#"["Python block syntax","for loops"]"#))
            .on(SUFFICIENCY, Reply::text("OK."))
            .on(MAIN, Reply::text("Use a colon.")),
    );
    let pipeline = help_pipeline(good);
    let cancel = CancellationToken::new();
    let record = pipeline
        .run_help_query(&access(), inputs(), &AvoidSet::default(), &cancel)
        .await
        .unwrap();
    let topics = pipeline.extract_topics(&access(), &record, &cancel).await.unwrap();
    assert_eq!(topics, vec!["Python block syntax", "for loops"]);

    let prose = Arc::new(ScriptedClient::new().on(TOPICS, Reply::text("Loops, mostly.")));
    let topics = help_pipeline(prose)
        .extract_topics(&access(), &record, &cancel)
        .await
        .unwrap();
    assert!(topics.is_empty());

    let failing = Arc::new(ScriptedClient::new().on(TOPICS, Reply::Fail(ProviderErrorKind::Other)));
    let topics = help_pipeline(failing)
        .extract_topics(&access(), &record, &cancel)
        .await
        .unwrap();
    assert!(topics.is_empty());
}
