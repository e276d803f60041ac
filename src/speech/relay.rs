//! Synthesis through a hosted relay function.
//!
//! The relay owns the provider credential and voice; it answers
//! `{ "audioContent": <base64> }` or `{ "error": ... }` with a non-2xx status.

use crate::messages::AudioPayload;
use crate::speech::tts::{SpeechSynthesizer, VoiceProfile};
use crate::utils::http::{build_client, rejection};
use crate::{FranklinError, Result};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Debug, Serialize)]
struct RelayRequest<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RelayResponse {
    audio_content: Option<String>,
}

/// Interpret a relay response body
pub fn parse_relay_response(status: u16, body: &str) -> Result<AudioPayload> {
    if !(200..300).contains(&status) {
        return Err(match rejection(status, body) {
            // The relay reports its own missing key as a plain 500
            FranklinError::RemoteRejected { message, .. }
                if message.to_lowercase().contains("api key not configured") =>
            {
                FranklinError::MissingCredential(message)
            }
            other => other,
        });
    }

    let parsed: RelayResponse = serde_json::from_str(body)
        .map_err(|e| FranklinError::InvalidResponse(format!("Malformed relay body: {}", e)))?;

    let encoded = parsed
        .audio_content
        .filter(|c| !c.is_empty())
        .ok_or_else(|| FranklinError::InvalidResponse("No audioContent in relay response".into()))?;

    let bytes = STANDARD
        .decode(encoded.trim())
        .map_err(|e| FranklinError::InvalidResponse(format!("audioContent is not base64: {}", e)))?;

    Ok(AudioPayload::mpeg(bytes))
}

pub struct RelaySynthesizer {
    client: reqwest::Client,
    endpoint: String,
    auth_token: Option<String>,
}

impl RelaySynthesizer {
    pub fn new(endpoint: String, auth_token: Option<String>, timeout: Duration) -> Result<Self> {
        if endpoint.trim().is_empty() {
            return Err(FranklinError::ConfigError("Relay endpoint is required".into()));
        }

        Ok(Self {
            client: build_client(timeout)?,
            endpoint,
            auth_token,
        })
    }
}

#[async_trait]
impl SpeechSynthesizer for RelaySynthesizer {
    async fn synthesize(&self, text: &str, voice: &VoiceProfile) -> Result<AudioPayload> {
        // Voice selection lives on the relay side
        debug!(
            "Requesting relay synthesis ({} chars, local profile {} ignored)",
            text.len(),
            voice.voice_id
        );

        let mut request = self.client.post(&self.endpoint).json(&RelayRequest { text });
        if let Some(token) = &self.auth_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;

        let result = parse_relay_response(status, &body);
        if let Err(e) = &result {
            warn!("Relay synthesis failed: {}", e);
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decodes_audio_content() {
        let body = format!(r#"{{"audioContent":"{}"}}"#, STANDARD.encode([1u8, 2, 3, 4]));
        let payload = parse_relay_response(200, &body).unwrap();
        assert_eq!(payload.bytes, vec![1, 2, 3, 4]);
        assert_eq!(payload.mime, "audio/mpeg");
    }

    #[test]
    fn test_missing_key_on_relay() {
        let err = parse_relay_response(500, r#"{"error":"ElevenLabs API key not configured"}"#)
            .unwrap_err();
        assert!(matches!(err, FranklinError::MissingCredential(_)));
    }

    #[test]
    fn test_generic_relay_failure() {
        let err =
            parse_relay_response(500, r#"{"error":"Failed to generate speech"}"#).unwrap_err();
        assert!(matches!(err, FranklinError::RemoteRejected { status: 500, .. }));
    }

    #[test]
    fn test_bad_base64() {
        let err = parse_relay_response(200, r#"{"audioContent":"not base64!!"}"#).unwrap_err();
        assert!(matches!(err, FranklinError::InvalidResponse(_)));
    }

    #[test]
    fn test_missing_audio_content() {
        let err = parse_relay_response(200, r#"{}"#).unwrap_err();
        assert!(matches!(err, FranklinError::InvalidResponse(_)));
    }
}
