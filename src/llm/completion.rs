//! Completion gateway
//!
//! One POST per call: no retries, no caching, no local fallback text.

use crate::llm::config::CompletionConfig;
use crate::utils::http::{build_client, rejection};
use crate::{FranklinError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Turns a user utterance into assistant text
#[async_trait]
pub trait CompletionGateway: Send + Sync {
    async fn complete(&self, user_text: &str) -> Result<String>;
}

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    persona: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    message: Option<String>,
    error: Option<String>,
}

/// Interpret a completion response body.
///
/// Non-2xx statuses become `RemoteRejected` (or `InvalidResponse` when the body
/// is empty); a 2xx without a non-blank `message` is `InvalidResponse`.
pub fn parse_completion_response(status: u16, body: &str) -> Result<String> {
    if !(200..300).contains(&status) {
        return Err(rejection(status, body));
    }

    let parsed: CompletionResponse = serde_json::from_str(body)
        .map_err(|e| FranklinError::InvalidResponse(format!("Malformed completion body: {}", e)))?;

    match parsed.message {
        Some(message) if !message.trim().is_empty() => Ok(message),
        _ => Err(FranklinError::InvalidResponse(match parsed.error {
            Some(error) => format!("No message in completion response: {}", error),
            None => "No message in completion response".to_string(),
        })),
    }
}

/// Completion gateway backed by an HTTP chat function
pub struct HttpCompletionGateway {
    client: reqwest::Client,
    config: CompletionConfig,
    persona_prompt: Option<String>,
}

impl HttpCompletionGateway {
    pub fn new(config: CompletionConfig, persona_prompt: Option<String>) -> Result<Self> {
        if config.endpoint.trim().is_empty() {
            return Err(FranklinError::ConfigError(
                "Completion endpoint is required".into(),
            ));
        }

        Ok(Self {
            client: build_client(config.timeout)?,
            config,
            persona_prompt,
        })
    }
}

#[async_trait]
impl CompletionGateway for HttpCompletionGateway {
    async fn complete(&self, user_text: &str) -> Result<String> {
        debug!("Requesting completion from {}", self.config.endpoint);

        let mut request = self.client.post(&self.config.endpoint).json(&CompletionRequest {
            message: user_text,
            persona: self.persona_prompt.as_deref(),
        });
        if let Some(token) = &self.config.auth_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;

        let result = parse_completion_response(status, &body);
        match &result {
            Ok(text) => debug!("Completion received ({} chars)", text.len()),
            Err(e) => warn!("Completion failed: {}", e),
        }
        result
    }
}
