//! OpenAI-compatible backend (Chat Completions).
//!
//! Works with any endpoint that follows the OpenAI API format (e.g. Ollama,
//! vLLM) via `base_url`.

use std::time::{Duration, Instant};

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use civicbridge_config::ProviderConfig;

use crate::BoxFuture;
use crate::context::ContextSnippet;
use crate::query::Query;
use crate::secret::Credential;

use super::error::retry_after;
use super::prompt::system_prompt;
use super::{Provider, ProviderError};

pub const OPENAI_API_URL: &str = "https://api.openai.com/v1/chat/completions";
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";

/// OpenAI provider. Enabled while it holds an API key.
pub struct OpenAiProvider {
    client: Client,
    name: String,
    credential: Credential,
    base_url: String,
    model: String,
    timeout: Duration,
}

impl OpenAiProvider {
    /// Create a provider against the public OpenAI endpoint.
    pub fn new(api_key: Option<&str>) -> Self {
        Self {
            client: Client::new(),
            name: "OpenAI".to_string(),
            credential: Credential::new(api_key),
            base_url: OPENAI_API_URL.to_string(),
            model: DEFAULT_OPENAI_MODEL.to_string(),
            timeout: Duration::from_secs(30),
        }
    }

    /// Build from a `[[providers]]` entry, applying its overrides.
    pub fn from_config(config: &ProviderConfig) -> Self {
        let mut provider = Self::new(config.credential())
            .with_name(&config.name)
            .with_timeout(Duration::from_secs(config.timeout_secs));
        if let Some(ref model) = config.model {
            provider = provider.with_model(model);
        }
        if let Some(ref base_url) = config.base_url {
            provider = provider.with_base_url(base_url);
        }
        provider
    }

    /// Set the name used for routing and history.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Set the model identifier.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Full chat-completions URL.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Set the per-request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn build_request_body(&self, query: &Query, context: &ContextSnippet) -> OpenAiRequest {
        OpenAiRequest {
            model: self.model.clone(),
            messages: vec![
                OpenAiMessage {
                    role: "system".to_string(),
                    content: Some(system_prompt(query, context)),
                },
                OpenAiMessage {
                    role: "user".to_string(),
                    content: Some(query.text().to_string()),
                },
            ],
        }
    }

    /// Extract `choices[0].message.content`.
    fn parse_response(body: &str) -> Result<String, ProviderError> {
        let resp: OpenAiResponse = serde_json::from_str(body)
            .map_err(|e| ProviderError::MalformedResponse(e.to_string()))?;

        let choice = resp
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::MalformedResponse("no choices in response".to_string()))?;

        match choice.message.content {
            Some(text) if !text.trim().is_empty() => Ok(text),
            _ => Err(ProviderError::MalformedResponse(
                "empty message content".to_string(),
            )),
        }
    }
}

impl Provider for OpenAiProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn enabled(&self) -> bool {
        self.credential.is_set()
    }

    fn process<'a>(
        &'a self,
        query: &'a Query,
        context: &'a ContextSnippet,
    ) -> BoxFuture<'a, Result<String, ProviderError>> {
        Box::pin(async move {
            let key = self
                .credential
                .get()
                .ok_or_else(|| ProviderError::Disabled(self.name.clone()))?;
            let body = self.build_request_body(query, context);

            debug!(provider = %self.name, model = %body.model, "OpenAI chat request");
            let started = Instant::now();

            let resp = self
                .client
                .post(&self.base_url)
                .header("authorization", format!("Bearer {}", key.expose()))
                .timeout(self.timeout)
                .json(&body)
                .send()
                .await
                .map_err(|e| ProviderError::from_reqwest(&e))?;

            let status = resp.status();
            if !status.is_success() {
                let retry_after = retry_after(resp.headers());
                let error_body = resp.text().await.unwrap_or_default();
                return Err(ProviderError::from_status(
                    status.as_u16(),
                    error_body,
                    retry_after,
                ));
            }

            let text = resp.text().await.map_err(|e| ProviderError::from_reqwest(&e))?;
            let answer = Self::parse_response(&text)?;
            info!(
                provider = %self.name,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "OpenAI call completed"
            );
            Ok(answer)
        })
    }

    fn reload(&self, config: &ProviderConfig) {
        let enabled = self.credential.replace(config.credential());
        debug!(provider = %self.name, enabled, "credential reloaded");
    }
}

// ── OpenAI API types (private) ──────────────────────────────────────────

#[derive(Debug, Serialize)]
struct OpenAiRequest {
    model: String,
    messages: Vec<OpenAiMessage>,
}

#[derive(Debug, Serialize, Deserialize)]
struct OpenAiMessage {
    #[serde(default)]
    role: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAiResponse {
    #[serde(default)]
    choices: Vec<OpenAiChoice>,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoice {
    message: OpenAiMessage,
}
