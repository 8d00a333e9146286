//! Scripted in-process completion client for engine tests.

#![allow(dead_code)]

use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::json;
use tokio::sync::{Barrier, Notify};

use tg_domain::access::{AccessSource, Credential, ModelSpec, ResolvedAccess};
use tg_domain::config::{HelpConfig, LlmConfig, ProviderKind};
use tg_domain::error::{Error, ProviderError, ProviderErrorKind, Result};
use tg_engine::tutor::{ChatStore, MemoryChatStore, TutorRunner};
use tg_engine::HelpPipeline;
use tg_providers::{
    CandidateCompletion, CompletionClient, CompletionRequest, CompletionResponse, FinishReason,
    ProviderRegistry,
};

/// How the fake answers a matching request.
#[derive(Clone)]
pub enum Reply {
    /// One candidate per text.
    Texts(Vec<String>),
    Fail(ProviderErrorKind),
    /// Never answers.
    Hang,
    /// Wait until every party reaches the barrier, then reply.
    AfterBarrier(Arc<Barrier>, Box<Reply>),
    /// Wait for a signal, then reply.
    AfterSignal(Arc<Notify>, Box<Reply>),
    /// Send a signal, then reply.
    Signal(Arc<Notify>, Box<Reply>),
}

impl Reply {
    pub fn text(t: &str) -> Self {
        Reply::Texts(vec![t.to_owned()])
    }

    pub fn texts(ts: &[&str]) -> Self {
        Reply::Texts(ts.iter().map(|t| (*t).to_owned()).collect())
    }
}

struct Rule {
    needle: String,
    reply: Reply,
}

/// Answers each request with the first rule whose needle appears in any of
/// the request's messages, and records every request it sees.
#[derive(Default)]
pub struct ScriptedClient {
    rules: Vec<Rule>,
    calls: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(mut self, needle: &str, reply: Reply) -> Self {
        self.rules.push(Rule {
            needle: needle.to_owned(),
            reply,
        });
        self
    }

    pub fn calls(&self) -> Vec<CompletionRequest> {
        self.calls.lock().clone()
    }

    /// Number of requests whose messages mention `needle`.
    pub fn calls_mentioning(&self, needle: &str) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|req| mentions(req, needle))
            .count()
    }

    fn reply_for(&self, req: &CompletionRequest) -> Option<Reply> {
        self.rules
            .iter()
            .find(|rule| mentions(req, &rule.needle))
            .map(|rule| rule.reply.clone())
    }
}

fn mentions(req: &CompletionRequest, needle: &str) -> bool {
    req.messages.iter().any(|m| m.content.contains(needle))
}

async fn answer(reply: Reply) -> Result<CompletionResponse> {
    let mut reply = reply;
    loop {
        reply = match reply {
            Reply::Texts(texts) => {
                let candidates: Vec<CandidateCompletion> = texts
                    .iter()
                    .enumerate()
                    .map(|(i, t)| CandidateCompletion {
                        text: t.clone(),
                        finish_reason: FinishReason::Stop,
                        raw: json!({ "index": i, "message": { "content": t } }),
                    })
                    .collect();
                let raw = json!({ "object": "chat.completion", "choices": texts });
                return Ok(CompletionResponse { candidates, raw });
            }
            Reply::Fail(kind) => {
                return Err(Error::Provider(ProviderError::new(
                    kind,
                    Some(500),
                    "scripted failure",
                )))
            }
            Reply::Hang => std::future::pending().await,
            Reply::AfterBarrier(barrier, next) => {
                barrier.wait().await;
                *next
            }
            Reply::AfterSignal(notify, next) => {
                notify.notified().await;
                *next
            }
            Reply::Signal(notify, next) => {
                notify.notify_one();
                *next
            }
        };
    }
}

#[async_trait::async_trait]
impl CompletionClient for ScriptedClient {
    async fn complete(&self, req: &CompletionRequest) -> Result<CompletionResponse> {
        self.calls.lock().push(req.clone());
        match self.reply_for(req) {
            Some(reply) => answer(reply).await,
            None => Err(Error::Provider(ProviderError::new(
                ProviderErrorKind::Other,
                None,
                "no scripted reply",
            ))),
        }
    }

    fn client_id(&self) -> &str {
        "scripted"
    }
}

// ── Fixtures ────────────────────────────────────────────────────────

pub fn access() -> ResolvedAccess {
    ResolvedAccess {
        model: ModelSpec::new(ProviderKind::Openai, "gpt-test"),
        credential: Credential::new("sk-test"),
        tokens_remaining: None,
        source: AccessSource::Class,
    }
}

pub fn registry(client: Arc<ScriptedClient>) -> ProviderRegistry {
    ProviderRegistry::default().with_client(ProviderKind::Openai, client)
}

pub fn help_pipeline(client: Arc<ScriptedClient>) -> HelpPipeline {
    HelpPipeline::new(registry(client), &LlmConfig::default(), &HelpConfig::default())
}

pub fn tutor_runner(client: Arc<ScriptedClient>) -> (TutorRunner, Arc<MemoryChatStore>) {
    let store = Arc::new(MemoryChatStore::new());
    let dyn_store: Arc<dyn ChatStore> = store.clone();
    (
        TutorRunner::new(registry(client), &LlmConfig::default(), dyn_store),
        store,
    )
}

// Needles that identify each protocol's request.
pub const SUFFICIENCY: &str = "evaluate whether a student's query";
pub const MAIN: &str = "How would you respond to the student";
pub const CLEANUP: &str = "Rewritten:";
pub const TOPICS: &str = "JSON-formatted array";
pub const ANALYSIS: &str = "Respond with a JSON object containing analysis items";
pub const GUIDED: &str = "following a plan that has been defined by the instructor";
pub const INQUIRY: &str = "The topic of this chat from the student is";
