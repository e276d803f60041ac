pub mod audio;
pub mod integration;
pub mod llm;
pub mod messages;
pub mod speech;
mod utils;

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum FranklinError {
    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Remote rejected request (status {status}): {message}")]
    RemoteRejected { status: u16, message: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Missing credential: {0}")]
    MissingCredential(String),

    #[error("Audio device error: {0}")]
    AudioDeviceError(String),

    #[error("Playback error: {0}")]
    PlaybackError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Channel error: {0}")]
    ChannelError(String),
}

/// Bodies are read as raw text or bytes and parsed with serde_json, so a
/// reqwest decode error only ever means the body stream broke off.
impl From<reqwest::Error> for FranklinError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_builder() {
            FranklinError::ConfigError(e.to_string())
        } else {
            // Timeouts, refused connections and interrupted bodies all land here
            FranklinError::NetworkError(e.to_string())
        }
    }
}

impl FranklinError {
    /// Check if this error is recoverable
    pub fn is_recoverable(&self) -> bool {
        match self {
            // Transient remote failures, the next turn may succeed
            FranklinError::NetworkError(_) => true,
            FranklinError::RemoteRejected { .. } => true,
            FranklinError::InvalidResponse(_) => true,
            FranklinError::PlaybackError(_) => true,
            // These need the user to fix the environment
            FranklinError::MissingCredential(_) => false,
            FranklinError::AudioDeviceError(_) => false,
            FranklinError::ConfigError(_) => false,
            FranklinError::ChannelError(_) => false,
        }
    }

    /// Get a user-friendly description
    pub fn user_message(&self) -> String {
        match self {
            FranklinError::NetworkError(_) => {
                "Could not reach the server. Please check your connection.".to_string()
            }
            FranklinError::RemoteRejected { .. } => {
                "The server rejected the request. Please try again.".to_string()
            }
            FranklinError::InvalidResponse(_) => {
                "The server sent an unexpected response. Please try again.".to_string()
            }
            FranklinError::MissingCredential(_) => {
                "An API key is missing. Please check your configuration.".to_string()
            }
            FranklinError::AudioDeviceError(_) => {
                "Audio device error. Please check your speakers.".to_string()
            }
            FranklinError::PlaybackError(_) => {
                "Audio playback failed. Response will be shown as text.".to_string()
            }
            FranklinError::ConfigError(_) => {
                "Configuration error. Please check settings.".to_string()
            }
            FranklinError::ChannelError(_) => {
                "Internal communication error. Please restart the application.".to_string()
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, FranklinError>;
