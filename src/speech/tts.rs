//! Text-to-speech against the ElevenLabs HTTP API
//!
//! The voice is fixed configuration; callers only choose the text.

use crate::messages::AudioPayload;
use crate::utils::http::{build_client, rejection};
use crate::{FranklinError, Result};
use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, info, warn};

pub const DEFAULT_BASE_URL: &str = "https://api.elevenlabs.io";

/// "Brian": mature and authoritative
pub const DEFAULT_VOICE_ID: &str = "nPczCjzI2devNBz1zQrb";

pub const DEFAULT_MODEL_ID: &str = "eleven_multilingual_v2";

const XI_API_KEY_HEADER: &str = "xi-api-key";
const AUDIO_MPEG: &str = "audio/mpeg";

/// Voice identity and expressiveness settings
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct VoiceProfile {
    #[serde(skip)]
    pub voice_id: String,

    #[serde(skip)]
    pub model_id: String,

    pub stability: f32,

    pub similarity_boost: f32,

    pub style: f32,

    pub use_speaker_boost: bool,
}

impl Default for VoiceProfile {
    fn default() -> Self {
        Self {
            voice_id: DEFAULT_VOICE_ID.to_string(),
            model_id: DEFAULT_MODEL_ID.to_string(),
            stability: 0.75,
            similarity_boost: 0.85,
            style: 0.4,
            use_speaker_boost: true,
        }
    }
}

impl VoiceProfile {
    /// Use another voice with the default settings
    pub fn with_voice(mut self, voice_id: impl Into<String>) -> Self {
        self.voice_id = voice_id.into();
        self
    }

    pub fn with_model(mut self, model_id: impl Into<String>) -> Self {
        self.model_id = model_id.into();
        self
    }
}

/// Configuration for the synthesis gateway
#[derive(Clone, Debug)]
pub struct SynthesisConfig {
    /// Provider API base URL
    pub base_url: String,

    /// Provider credential; absence yields `MissingCredential` at call time
    pub api_key: Option<String>,

    /// When set, synthesis goes through this relay function instead of the provider
    pub relay_url: Option<String>,

    /// Bearer token for the relay function
    pub relay_token: Option<String>,

    /// Voice used for every request
    pub voice: VoiceProfile,

    /// Request timeout
    pub timeout: Duration,
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: None,
            relay_url: None,
            relay_token: None,
            voice: VoiceProfile::default(),
            timeout: Duration::from_secs(30),
        }
    }
}

impl SynthesisConfig {
    /// Direct provider access with the given key
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Route synthesis through a relay function
    pub fn with_relay(mut self, url: impl Into<String>, token: Option<String>) -> Self {
        self.relay_url = Some(url.into());
        self.relay_token = token;
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_voice(mut self, voice: VoiceProfile) -> Self {
        self.voice = voice;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Renders text as encoded audio
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    async fn synthesize(&self, text: &str, voice: &VoiceProfile) -> Result<AudioPayload>;
}

#[derive(Debug, Serialize)]
struct TextToSpeechRequest<'a> {
    text: &'a str,
    model_id: &'a str,
    voice_settings: &'a VoiceProfile,
}

/// Direct ElevenLabs client
pub struct ElevenLabsSynthesizer {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl ElevenLabsSynthesizer {
    pub fn new(config: &SynthesisConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .as_ref()
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty());

        if api_key.is_none() {
            info!("No ElevenLabs API key configured, voice replies will be unavailable");
        }

        Ok(Self {
            client: build_client(config.timeout)?,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    fn endpoint(&self, voice: &VoiceProfile) -> String {
        format!("{}/v1/text-to-speech/{}", self.base_url, voice.voice_id)
    }
}

#[async_trait]
impl SpeechSynthesizer for ElevenLabsSynthesizer {
    async fn synthesize(&self, text: &str, voice: &VoiceProfile) -> Result<AudioPayload> {
        let api_key = self.api_key.as_deref().ok_or_else(|| {
            FranklinError::MissingCredential("ELEVENLABS_API_KEY is not configured".into())
        })?;

        debug!(
            "Synthesizing {} chars with voice {}",
            text.len(),
            voice.voice_id
        );

        let response = self
            .client
            .post(self.endpoint(voice))
            .header(XI_API_KEY_HEADER, api_key)
            .header(ACCEPT, AUDIO_MPEG)
            .json(&TextToSpeechRequest {
                text,
                model_id: &voice.model_id,
                voice_settings: voice,
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await?;
            let err = rejection(status.as_u16(), &body);
            warn!("ElevenLabs API error: {}", err);
            return Err(err);
        }

        let mime = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or(AUDIO_MPEG)
            .to_string();
        let bytes = response.bytes().await?;

        if bytes.is_empty() {
            return Err(FranklinError::InvalidResponse(
                "Synthesis returned no audio".into(),
            ));
        }

        debug!("Synthesized {} bytes of {}", bytes.len(), mime);
        Ok(AudioPayload::new(bytes.to_vec(), mime))
    }
}
