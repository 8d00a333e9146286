//! One round of a tutoring chat.
//!
//! A round appends the student's message (if any), asks the model for the
//! tutor's reply, and for guided chats refreshes the progress analysis.
//! Every state change is persisted before the next model call is made.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use tg_domain::access::ResolvedAccess;
use tg_domain::config::LlmConfig;
use tg_domain::error::{Error, Result};
use tg_domain::message::Role;
use tg_domain::tenant::TenantContext;
use tg_domain::trace::TraceEvent;
use tg_providers::{CompletionParams, ProviderRegistry};

use super::session::{ChatMode, ChatSession, GuidedTutor, ProgressAnalysis};
use super::store::ChatStore;
use crate::llm::{base_params, LlmHandle};
use crate::prompts::Protocol;

/// What happened to the progress analysis during a round.
///
/// Analysis is best-effort: its failures are reported here and never fail
/// the round itself.
#[derive(Debug)]
pub enum AnalysisOutcome {
    /// Inquiry chats have no analysis.
    NotApplicable,
    Updated,
    /// The stored analysis was left exactly as it was.
    Skipped(Error),
}

#[derive(Debug)]
pub struct TurnOutcome {
    pub session: ChatSession,
    pub analysis: AnalysisOutcome,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// TutorRunner
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Clone)]
pub struct TutorRunner {
    registry: ProviderRegistry,
    defaults: CompletionParams,
    store: Arc<dyn ChatStore>,
}

impl TutorRunner {
    pub fn new(registry: ProviderRegistry, llm: &LlmConfig, store: Arc<dyn ChatStore>) -> Self {
        Self {
            registry,
            defaults: base_params(llm),
            store,
        }
    }

    pub fn store(&self) -> &Arc<dyn ChatStore> {
        &self.store
    }

    /// Bind a completion handle for `access` with this runner's defaults.
    pub fn handle(&self, access: &ResolvedAccess) -> Result<LlmHandle> {
        LlmHandle::from_registry(&self.registry, access, self.defaults.clone())
    }

    /// Start an open-ended chat and let the tutor open it.
    pub async fn create_inquiry_chat(
        &self,
        access: &ResolvedAccess,
        ctx: &TenantContext,
        topic: &str,
        context: Option<String>,
        cancel: &CancellationToken,
    ) -> Result<TurnOutcome> {
        let session = ChatSession::inquiry(ctx.user_id.clone(), ctx.class_id.clone(), topic, context);
        self.start(access, session, cancel).await
    }

    /// Start a chat following `tutor`'s rubric and let the tutor open it.
    pub async fn create_guided_chat(
        &self,
        access: &ResolvedAccess,
        ctx: &TenantContext,
        tutor: &GuidedTutor,
        cancel: &CancellationToken,
    ) -> Result<TurnOutcome> {
        let session = ChatSession::guided(ctx.user_id.clone(), ctx.class_id.clone(), tutor);
        self.start(access, session, cancel).await
    }

    async fn start(
        &self,
        access: &ResolvedAccess,
        session: ChatSession,
        cancel: &CancellationToken,
    ) -> Result<TurnOutcome> {
        self.store.create(&session).await?;
        tracing::info!(
            chat_id = %session.id,
            user_id = %session.user_id,
            mode = session.mode.as_str(),
            objectives = session.objectives.len(),
            "chat created"
        );
        self.run_turn(access, &session.id, None, cancel).await
    }

    /// Run one round of the chat `chat_id`.
    ///
    /// A failed tutor completion still appends an assistant turn holding
    /// the translated error text. Only cancellation and storage failures
    /// are returned as errors.
    pub async fn run_turn(
        &self,
        access: &ResolvedAccess,
        chat_id: &str,
        user_message: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<TurnOutcome> {
        let llm = self.handle(access)?;
        let mut session = self.store.load(chat_id).await?;

        if let Some(text) = user_message {
            self.append(&mut session, Role::User, text.to_owned()).await?;
        }

        let protocol = match session.mode {
            ChatMode::Inquiry => Protocol::InquiryTutor { session: &session },
            ChatMode::Guided => Protocol::GuidedTutor { session: &session },
        };
        let response = llm.get_completion(&protocol, cancel).await?;
        let reply = response.text().to_owned();
        session.usages.push(response.raw);
        self.append(&mut session, Role::Assistant, reply).await?;

        let analysis = match session.mode {
            ChatMode::Inquiry => AnalysisOutcome::NotApplicable,
            ChatMode::Guided => self.analyze(&llm, &mut session, cancel).await,
        };

        Ok(TurnOutcome { session, analysis })
    }

    async fn append(&self, session: &mut ChatSession, role: Role, content: String) -> Result<()> {
        session.push_turn(role, content);
        self.store.save(session).await?;
        TraceEvent::ChatTurnAppended {
            chat_id: session.id.clone(),
            role: role.as_str().to_owned(),
            turns: session.messages.len(),
        }
        .emit();
        Ok(())
    }

    async fn analyze(
        &self,
        llm: &LlmHandle,
        session: &mut ChatSession,
        cancel: &CancellationToken,
    ) -> AnalysisOutcome {
        let response = match llm
            .try_completion(&Protocol::Analysis { session: &*session }, cancel)
            .await
        {
            Ok(response) => response,
            Err(e) => return skipped(session, e),
        };

        let parsed = ProgressAnalysis::parse(response.text());
        session.usages.push(response.raw);

        let analysis = match parsed {
            Ok(analysis) => analysis,
            Err(e) => {
                // The usage is still worth keeping.
                if let Err(save) = self.store.save(session).await {
                    tracing::warn!(chat_id = %session.id, error = %save, "failed to save chat usage");
                }
                return skipped(session, e);
            }
        };

        let objectives = analysis.progress.len();
        let previous = session.analysis.replace(analysis);
        if let Err(e) = self.store.save(session).await {
            session.analysis = previous;
            return skipped(session, e);
        }

        TraceEvent::AnalysisUpdated {
            chat_id: session.id.clone(),
            objectives,
        }
        .emit();
        AnalysisOutcome::Updated
    }
}

fn skipped(session: &ChatSession, err: Error) -> AnalysisOutcome {
    tracing::warn!(chat_id = %session.id, error = %err, "progress analysis skipped");
    TraceEvent::AnalysisSkipped {
        chat_id: session.id.clone(),
        reason: err.to_string(),
    }
    .emit();
    AnalysisOutcome::Skipped(err)
}
