//! Speech synthesis gateways
//!
//! This module provides:
//! - `ElevenLabsSynthesizer`, which calls the text-to-speech provider directly
//! - `RelaySynthesizer`, which calls a hosted function that holds the provider key

pub mod relay;
pub mod tts;

use std::sync::Arc;

pub use relay::{parse_relay_response, RelaySynthesizer};
pub use tts::{ElevenLabsSynthesizer, SpeechSynthesizer, SynthesisConfig, VoiceProfile};

use crate::Result;

/// Build the synthesizer selected by the configuration.
///
/// A relay URL wins over direct provider access. A missing provider key is not
/// an error here; it is reported as `MissingCredential` when synthesis runs.
pub fn build_synthesizer(config: &SynthesisConfig) -> Result<Arc<dyn SpeechSynthesizer>> {
    match &config.relay_url {
        Some(url) => Ok(Arc::new(RelaySynthesizer::new(
            url.clone(),
            config.relay_token.clone(),
            config.timeout,
        )?)),
        None => Ok(Arc::new(ElevenLabsSynthesizer::new(config)?)),
    }
}
