//! Shared plumbing for the HTTP gateways

use crate::{FranklinError, Result};
use std::time::Duration;

/// Build a client with the gateway's request timeout applied.
///
/// A timed-out request surfaces as `FranklinError::NetworkError`.
pub(crate) fn build_client(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| FranklinError::ConfigError(format!("Failed to build HTTP client: {}", e)))
}

/// Pull a human readable message out of an error body.
///
/// Understands `{"error": "..."}` envelopes and `{"detail": {"message": "..."}}`
/// provider errors; anything else is returned trimmed as-is.
pub(crate) fn error_message(body: &str) -> Option<String> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(value) = serde_json::from_str::<serde_json::Value>(trimmed) {
        if let Some(msg) = value.get("error").and_then(|e| e.as_str()) {
            return Some(msg.to_string());
        }
        if let Some(msg) = value.pointer("/detail/message").and_then(|m| m.as_str()) {
            return Some(msg.to_string());
        }
        if let Some(msg) = value.get("detail").and_then(|d| d.as_str()) {
            return Some(msg.to_string());
        }
    }

    Some(trimmed.chars().take(200).collect())
}

/// Classify a non-2xx response.
pub(crate) fn rejection(status: u16, body: &str) -> FranklinError {
    match error_message(body) {
        Some(message) => FranklinError::RemoteRejected { status, message },
        None => FranklinError::InvalidResponse(format!("status {} with an empty body", status)),
    }
}
