//! Google Gemini backend (`generateContent`).

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
use super::prompt::build_prompt;
use super::{Provider, ProviderError};

pub const GEMINI_API_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-pro";

/// Gemini provider. Enabled while it holds an API key.
pub struct GeminiProvider {
    client: Client,
    name: String,
    credential: Credential,
    base_url: String,
    model: String,
    timeout: Duration,
}

impl GeminiProvider {
    /// Create a provider against the public Gemini endpoint.
    pub fn new(api_key: Option<&str>) -> Self {
        Self {
            client: Client::new(),
            name: "Gemini".to_string(),
            credential: Credential::new(api_key),
            base_url: GEMINI_API_URL.to_string(),
            model: DEFAULT_GEMINI_MODEL.to_string(),
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

    /// Point at a different API root (tests, proxies).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Set the per-request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.base_url, self.model)
    }

    fn build_request_body(prompt: String) -> GeminiRequest {
        GeminiRequest {
            contents: vec![GeminiContent {
                parts: vec![GeminiPart { text: Some(prompt) }],
            }],
        }
    }

    /// Extract `candidates[0].content.parts[0].text`.
    fn parse_response(body: &str) -> Result<String, ProviderError> {
        let resp: GeminiResponse = serde_json::from_str(body)
            .map_err(|e| ProviderError::MalformedResponse(e.to_string()))?;

        let candidate = resp
            .candidates
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::MalformedResponse("no candidates in response".to_string()))?;

        let text = candidate
            .content
            .and_then(|c| c.parts.into_iter().next())
            .and_then(|p| p.text)
            .ok_or_else(|| ProviderError::MalformedResponse("no text part in candidate".to_string()))?;

        if text.trim().is_empty() {
            return Err(ProviderError::MalformedResponse("empty text".to_string()));
        }
        Ok(text)
    }
}

impl Provider for GeminiProvider {
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
            let body = Self::build_request_body(build_prompt(query, context));

            debug!(provider = %self.name, model = %self.model, "Gemini request");
            let started = Instant::now();

            let resp = self
                .client
                .post(self.endpoint())
                .header("x-goog-api-key", key.expose())
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
                "Gemini call completed"
            );
            Ok(answer)
        })
    }

    fn reload(&self, config: &ProviderConfig) {
        let enabled = self.credential.replace(config.credential());
        debug!(provider = %self.name, enabled, "credential reloaded");
    }
}

// ── Gemini API types (private) ──────────────────────────────────────────

#[derive(Serialize)]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
}

#[derive(Serialize, Deserialize, Default)]
struct GeminiContent {
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Serialize, Deserialize, Default)]
struct GeminiPart {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
}

#[derive(Deserialize, Default)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Deserialize, Default)]
struct GeminiCandidate {
    #[serde(default)]
    content: Option<GeminiContent>,
}
