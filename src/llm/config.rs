//! Completion backend configuration

use std::time::Duration;

/// Default chat function on a locally served backend
pub const DEFAULT_COMPLETION_URL: &str = "http://localhost:54321/functions/v1/benjamin-ai-chat";

/// Configuration for the completion gateway
#[derive(Clone, Debug)]
pub struct CompletionConfig {
    /// Endpoint receiving `{ "message": ... }` POSTs
    pub endpoint: String,

    /// Bearer token required by the hosting platform, if any
    pub auth_token: Option<String>,

    /// Request timeout; expiry is reported as a network error
    pub timeout: Duration,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_COMPLETION_URL.to_string(),
            auth_token: None,
            timeout: Duration::from_secs(30),
        }
    }
}

impl CompletionConfig {
    /// Create a configuration for the given endpoint
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            ..Default::default()
        }
    }

    /// Set the bearer token
    pub fn with_auth_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = Some(token.into());
        self
    }

    /// Set the request timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_completion_config_builder() {
        let config = CompletionConfig::new("https://chat.example.com")
            .with_auth_token("anon")
            .with_timeout(Duration::from_secs(5));

        assert_eq!(config.endpoint, "https://chat.example.com");
        assert_eq!(config.auth_token.as_deref(), Some("anon"));
        assert_eq!(config.timeout, Duration::from_secs(5));
    }
}
