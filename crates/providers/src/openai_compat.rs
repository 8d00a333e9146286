//! OpenAI-compatible adapter.
//!
//! Works with OpenAI and with Google's OpenAI-compatible Gemini endpoint;
//! anything else that follows the chat completions contract works too.

use crate::classify::classify_http_error;
use crate::traits::{
    CandidateCompletion, CompletionClient, CompletionRequest, CompletionResponse, FinishReason,
    LENGTH_EXCEEDED_NOTE,
};
use crate::util::from_reqwest;
use serde_json::Value;
use std::time::Duration;
use tg_domain::config::{LlmConfig, ProviderKind};
use tg_domain::error::{Error, ProviderError, ProviderErrorKind, Result};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Adapter struct
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A completion client for one OpenAI-compatible endpoint.
///
/// Holds no credential: every request carries the key resolved for its
/// tenant, sent as `Authorization: Bearer <key>`.
pub struct OpenAiCompatClient {
    id: String,
    base_url: String,
    client: reqwest::Client,
}

impl OpenAiCompatClient {
    pub fn new(id: impl Into<String>, base_url: &str, timeout: Option<Duration>) -> Result<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(t) = timeout {
            builder = builder.timeout(t);
        }
        let client = builder.build().map_err(from_reqwest)?;
        Ok(Self {
            id: id.into(),
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    /// Build the client for `kind` using the endpoint and timeout in `cfg`.
    pub fn from_config(kind: ProviderKind, cfg: &LlmConfig) -> Result<Self> {
        Self::new(
            kind.as_str(),
            cfg.base_url(kind),
            cfg.timeout_ms.map(Duration::from_millis),
        )
    }

    // ── Internal: build the JSON body ─────────────────────────────

    fn build_body(req: &CompletionRequest) -> Value {
        let messages: Vec<Value> = req
            .messages
            .iter()
            .map(|m| {
                serde_json::json!({
                    "role": m.role.as_str(),
                    "content": m.content,
                })
            })
            .collect();

        let p = &req.params;
        let mut body = serde_json::json!({
            "model": req.model,
            "messages": messages,
            "temperature": p.temperature,
            "max_tokens": p.max_tokens,
        });
        if p.n > 1 {
            body["n"] = serde_json::json!(p.n);
        }
        if p.json_mode {
            body["response_format"] = serde_json::json!({"type": "json_object"});
        }
        for (k, v) in &p.extra {
            body[k.as_str()] = v.clone();
        }
        body
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Response deserialization helpers
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn parse_choice(choice: &Value) -> CandidateCompletion {
    let mut text = choice
        .get("message")
        .and_then(|m| m.get("content"))
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .to_string();

    let finish_reason =
        FinishReason::from_wire(choice.get("finish_reason").and_then(|v| v.as_str()));
    if finish_reason == FinishReason::Length {
        text.push_str(LENGTH_EXCEEDED_NOTE);
    }

    CandidateCompletion {
        text: text.trim().to_string(),
        finish_reason,
        raw: choice.clone(),
    }
}

pub(crate) fn parse_completion_response(body: Value) -> Result<CompletionResponse> {
    let candidates: Vec<CandidateCompletion> = body
        .get("choices")
        .and_then(|c| c.as_array())
        .map(|a| a.iter().map(parse_choice).collect())
        .unwrap_or_default();

    if candidates.is_empty() {
        return Err(Error::Provider(ProviderError::new(
            ProviderErrorKind::Other,
            None,
            "no choices in response",
        )));
    }

    Ok(CompletionResponse {
        candidates,
        raw: body,
    })
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Trait implementation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[async_trait::async_trait]
impl CompletionClient for OpenAiCompatClient {
    async fn complete(&self, req: &CompletionRequest) -> Result<CompletionResponse> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = Self::build_body(req);

        tracing::debug!(
            provider = %self.id,
            url = %url,
            model = %req.model,
            n = req.params.n,
            "chat completion request"
        );

        let resp = self
            .client
            .post(&url)
            .bearer_auth(req.credential.expose())
            .json(&body)
            .send()
            .await
            .map_err(from_reqwest)?;

        let status = resp.status();
        let resp_text = resp.text().await.map_err(from_reqwest)?;

        if !status.is_success() {
            return Err(Error::Provider(classify_http_error(
                status.as_u16(),
                &resp_text,
            )));
        }

        let resp_json: Value = serde_json::from_str(&resp_text).map_err(|e| {
            Error::Provider(ProviderError::new(
                ProviderErrorKind::Other,
                Some(status.as_u16()),
                format!("malformed response body: {e}"),
            ))
        })?;
        parse_completion_response(resp_json)
    }

    fn client_id(&self) -> &str {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::CompletionParams;
    use tg_domain::access::Credential;
    use tg_domain::message::Message;

    fn request(params: CompletionParams) -> CompletionRequest {
        CompletionRequest {
            messages: vec![Message::system("sys"), Message::user("hi")],
            model: "gpt-4.1-mini".into(),
            credential: Credential::new("sk-x"),
            params,
        }
    }

    #[test]
    fn body_carries_defaults_and_omits_single_n() {
        let body = OpenAiCompatClient::build_body(&request(CompletionParams::default()));
        assert_eq!(body["max_tokens"], 2000);
        assert!((body["temperature"].as_f64().unwrap() - 0.25).abs() < 1e-6);
        assert!(body.get("n").is_none());
        assert!(body.get("response_format").is_none());
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "hi");
    }

    #[test]
    fn extra_args_override_defaults() {
        let mut params = CompletionParams::default().with_n(2).json();
        params
            .extra
            .insert("max_tokens".into(), serde_json::json!(500));
        let body = OpenAiCompatClient::build_body(&request(params));
        assert_eq!(body["n"], 2);
        assert_eq!(body["max_tokens"], 500);
        assert_eq!(body["response_format"]["type"], "json_object");
    }

    #[test]
    fn length_finish_appends_note_and_trims() {
        let body = serde_json::json!({
            "choices": [
                {"message": {"content": "  partial answer  "}, "finish_reason": "length"},
                {"message": {"content": "\nfull answer\n"}, "finish_reason": "stop"}
            ]
        });
        let resp = parse_completion_response(body).unwrap();
        assert_eq!(
            resp.candidates[0].text,
            "partial answer  \n\n[error: maximum length exceeded]"
        );
        assert_eq!(resp.candidates[0].finish_reason, FinishReason::Length);
        assert_eq!(resp.candidates[1].text, "full answer");
    }

    #[test]
    fn missing_choices_is_a_provider_error() {
        let err = parse_completion_response(serde_json::json!({"object": "error"})).unwrap_err();
        assert!(matches!(err, Error::Provider(ref p) if p.kind == ProviderErrorKind::Other));
    }
}
