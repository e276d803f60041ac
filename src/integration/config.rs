//! Configuration for the integration layer
//!
//! Provides centralized configuration for all components.

use crate::llm::{CompletionConfig, Persona};
use crate::speech::SynthesisConfig;
use crate::{FranklinError, Result};
use std::time::Duration;

/// Configuration for the complete conversation
#[derive(Clone, Debug)]
pub struct AppConfig {
    /// Who the assistant is
    pub persona: Persona,

    /// Completion gateway configuration
    pub completion: CompletionConfig,

    /// Synthesis gateway configuration
    pub synthesis: SynthesisConfig,

    /// Initial voice preference
    pub voice_enabled: bool,

    /// Whether to speak the greeting when the session opens
    pub speak_greeting: bool,

    /// Whether to open the audio device (silent playback otherwise)
    pub enable_audio_output: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            persona: Persona::default(),
            completion: CompletionConfig::default(),
            synthesis: SynthesisConfig::default(),
            voice_enabled: true,
            speak_greeting: true,
            enable_audio_output: true,
        }
    }
}

impl AppConfig {
    /// Load configuration from the process environment, reading `.env` first.
    ///
    /// - `FRANKLIN_CHAT_URL`: completion endpoint
    /// - `FRANKLIN_CHAT_TOKEN`: bearer token for the hosting platform
    /// - `FRANKLIN_VOICE_URL`: synthesis relay endpoint (direct provider access when unset)
    /// - `FRANKLIN_VOICE_TOKEN`: bearer token for the relay, defaults to the chat token
    /// - `ELEVENLABS_API_KEY`: provider credential
    /// - `ELEVENLABS_BASE_URL`: provider base URL
    /// - `FRANKLIN_PERSONA_PROMPT`: persona prompt sent with completions
    /// - `FRANKLIN_VOICE_ENABLED`: initial voice preference ("true"/"false")
    /// - `FRANKLIN_HTTP_TIMEOUT_SECS`: timeout for both gateways
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut config = Self::default();

        if let Some(url) = get("FRANKLIN_CHAT_URL") {
            config.completion.endpoint = url;
        }
        let chat_token = get("FRANKLIN_CHAT_TOKEN");
        config.completion.auth_token = chat_token.clone();

        config.synthesis.api_key = get("ELEVENLABS_API_KEY");
        if let Some(base) = get("ELEVENLABS_BASE_URL") {
            config.synthesis.base_url = base;
        }
        if let Some(relay) = get("FRANKLIN_VOICE_URL") {
            let token = get("FRANKLIN_VOICE_TOKEN").or(chat_token);
            config.synthesis = config.synthesis.with_relay(relay, token);
        }

        if let Some(prompt) = get("FRANKLIN_PERSONA_PROMPT") {
            config.persona = config.persona.with_prompt(prompt);
        }

        if let Some(raw) = get("FRANKLIN_VOICE_ENABLED") {
            config.voice_enabled = parse_bool(&raw).ok_or_else(|| {
                FranklinError::ConfigError(format!("Invalid FRANKLIN_VOICE_ENABLED: {}", raw))
            })?;
        }

        if let Some(raw) = get("FRANKLIN_HTTP_TIMEOUT_SECS") {
            let secs: u64 = raw.trim().parse().map_err(|_| {
                FranklinError::ConfigError(format!("Invalid FRANKLIN_HTTP_TIMEOUT_SECS: {}", raw))
            })?;
            config = config.with_timeout(Duration::from_secs(secs));
        }

        config.validate()?;
        Ok(config)
    }

    /// Set the persona
    pub fn with_persona(mut self, persona: Persona) -> Self {
        self.persona = persona;
        self
    }

    /// Apply one timeout to both gateways
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.completion.timeout = timeout;
        self.synthesis.timeout = timeout;
        self
    }

    /// Start with voice replies turned off
    pub fn without_voice(mut self) -> Self {
        self.voice_enabled = false;
        self
    }

    /// Do not speak the greeting on open
    pub fn without_greeting_voice(mut self) -> Self {
        self.speak_greeting = false;
        self
    }

    /// Disable audio output (silent playback)
    pub fn without_audio_output(mut self) -> Self {
        self.enable_audio_output = false;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if !is_http_url(&self.completion.endpoint) {
            return Err(FranklinError::ConfigError(format!(
                "Completion endpoint must be an http(s) URL: {:?}",
                self.completion.endpoint
            )));
        }

        match &self.synthesis.relay_url {
            Some(url) if !is_http_url(url) => {
                return Err(FranklinError::ConfigError(format!(
                    "Voice relay must be an http(s) URL: {:?}",
                    url
                )));
            }
            None if !is_http_url(&self.synthesis.base_url) => {
                return Err(FranklinError::ConfigError(format!(
                    "Synthesis base URL must be an http(s) URL: {:?}",
                    self.synthesis.base_url
                )));
            }
            _ => {}
        }

        if self.persona.greeting.trim().is_empty() {
            return Err(FranklinError::ConfigError("Greeting must not be empty".into()));
        }

        if self.completion.timeout.is_zero() || self.synthesis.timeout.is_zero() {
            return Err(FranklinError::ConfigError("Timeouts must be non-zero".into()));
        }

        Ok(())
    }
}

fn is_http_url(url: &str) -> bool {
    let url = url.trim();
    url.starts_with("http://") || url.starts_with("https://")
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
