//! A completion client bound to one resolved access.
//!
//! [`LlmHandle`] is what the pipelines talk to. It carries the credential
//! and model picked by the access resolver, applies the configured sampling
//! defaults, races every call against a cancellation token, and records one
//! `LlmRequest` trace event per provider call.

use std::sync::Arc;
use std::time::Instant;

use tokio_util::sync::CancellationToken;

use tg_domain::access::{Credential, ModelSpec, ResolvedAccess};
use tg_domain::config::LlmConfig;
use tg_domain::error::{Error, ProviderError, ProviderErrorKind, Result};
use tg_domain::message::Message;
use tg_domain::trace::TraceEvent;
use tg_providers::{
    CandidateCompletion, CompletionClient, CompletionParams, CompletionRequest, CompletionResponse,
    FinishReason, ProviderRegistry,
};

use crate::prompts::Protocol;

/// Sampling defaults taken from `[llm]`.
pub fn base_params(config: &LlmConfig) -> CompletionParams {
    CompletionParams {
        temperature: config.temperature,
        max_tokens: config.max_tokens,
        ..CompletionParams::default()
    }
}

#[derive(Clone)]
pub struct LlmHandle {
    client: Arc<dyn CompletionClient>,
    model: ModelSpec,
    credential: Credential,
    defaults: CompletionParams,
}

impl LlmHandle {
    pub fn new(client: Arc<dyn CompletionClient>, access: &ResolvedAccess, defaults: CompletionParams) -> Self {
        Self {
            client,
            model: access.model.clone(),
            credential: access.credential.clone(),
            defaults,
        }
    }

    /// Bind the registry's client for `access.model.provider`.
    pub fn from_registry(
        registry: &ProviderRegistry,
        access: &ResolvedAccess,
        defaults: CompletionParams,
    ) -> Result<Self> {
        let client = registry.get(access.model.provider)?;
        Ok(Self::new(client, access, defaults))
    }

    /// Run one protocol. Provider failures are returned as errors.
    pub async fn try_completion(
        &self,
        protocol: &Protocol<'_>,
        cancel: &CancellationToken,
    ) -> Result<CompletionResponse> {
        let params = protocol.completion_params(&self.defaults);
        self.call(protocol.name(), protocol.build_messages(), params, cancel)
            .await
    }

    /// Run one protocol, turning any failure other than cancellation into a
    /// single error-shaped candidate whose text is the translated message.
    pub async fn get_completion(
        &self,
        protocol: &Protocol<'_>,
        cancel: &CancellationToken,
    ) -> Result<CompletionResponse> {
        match self.try_completion(protocol, cancel).await {
            Ok(response) => Ok(response),
            Err(Error::Cancelled) => Err(Error::Cancelled),
            Err(Error::Provider(e)) => Ok(self.error_response(protocol.name(), e)),
            Err(e) => Ok(self.error_response(
                protocol.name(),
                ProviderError::new(ProviderErrorKind::Other, None, e.to_string()),
            )),
        }
    }

    /// Run a protocol with follow-up prompts: each prompt is sent after the
    /// model's previous reply, in one growing conversation. Returns the last
    /// response. Failures propagate.
    pub async fn try_multi_completion(
        &self,
        protocol: &Protocol<'_>,
        cancel: &CancellationToken,
    ) -> Result<CompletionResponse> {
        let params = protocol.completion_params(&self.defaults);
        let mut messages = protocol.build_messages();
        let mut response = self
            .call(protocol.name(), messages.clone(), params.clone(), cancel)
            .await?;

        for prompt in protocol.follow_up_prompts() {
            messages.push(Message::assistant(response.text()));
            messages.push(Message::user(prompt));
            response = self
                .call(protocol.name(), messages.clone(), params.clone(), cancel)
                .await?;
        }
        Ok(response)
    }

    async fn call(
        &self,
        protocol: &'static str,
        messages: Vec<Message>,
        params: CompletionParams,
        cancel: &CancellationToken,
    ) -> Result<CompletionResponse> {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let candidates = params.n;
        let req = CompletionRequest {
            messages,
            model: self.model.model.clone(),
            credential: self.credential.clone(),
            params,
        };

        let started = Instant::now();
        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::debug!(protocol, model = %self.model, "completion cancelled");
                return Err(Error::Cancelled);
            }
            r = self.client.complete(&req) => r,
        };

        TraceEvent::LlmRequest {
            provider: self.client.client_id().to_owned(),
            model: self.model.model.clone(),
            protocol: protocol.to_owned(),
            candidates,
            duration_ms: started.elapsed().as_millis() as u64,
            ok: outcome.is_ok(),
        }
        .emit();

        outcome
    }

    fn error_response(&self, protocol: &'static str, err: ProviderError) -> CompletionResponse {
        tracing::error!(
            protocol,
            model = %self.model,
            kind = ?err.kind,
            status = ?err.status,
            detail = %err.detail,
            "completion failed"
        );
        let raw = serde_json::json!({ "error": err.detail });
        let candidate = CandidateCompletion {
            text: err.user_message(),
            finish_reason: FinishReason::Error,
            raw: raw.clone(),
        };
        CompletionResponse {
            candidates: vec![candidate],
            raw,
        }
    }
}
