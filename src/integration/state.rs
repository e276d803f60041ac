//! Conversation state shared with the presentation layer

use crate::messages::Message;
use crate::FranklinError;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use uuid::Uuid;

/// Position of the current exchange
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Ready for input
    Idle,
    /// Waiting on the completion gateway
    AwaitingCompletion,
    /// Waiting on the synthesis gateway
    AwaitingSynthesis,
    /// Reply audio is playing
    Speaking,
    /// The completion failed; immediately followed by `Idle`
    Failed,
}

impl Phase {
    pub fn is_idle(&self) -> bool {
        *self == Phase::Idle
    }

    /// Whether the assistant's voice indicator should be lit
    pub fn is_voicing(&self) -> bool {
        matches!(self, Phase::AwaitingSynthesis | Phase::Speaking)
    }
}

/// What started the exchange
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnKind {
    /// A user submission
    Reply,
    /// Speaking the seeded greeting
    Greeting,
}

/// The single live exchange
#[derive(Debug, Clone)]
pub struct ExchangeState {
    pub phase: Phase,
    /// User text awaiting a reply, cleared when the turn ends
    pub pending_user_text: Option<String>,
    pub turn_id: Option<Uuid>,
    pub kind: TurnKind,
    /// Message being synthesized or spoken
    pub voiced_message: Option<Uuid>,
    /// Playback started for this turn
    pub playback_id: Option<Uuid>,
}

impl Default for ExchangeState {
    fn default() -> Self {
        Self {
            phase: Phase::Idle,
            pending_user_text: None,
            turn_id: None,
            kind: TurnKind::Reply,
            voiced_message: None,
            playback_id: None,
        }
    }
}

impl ExchangeState {
    pub fn begin(turn_id: Uuid, kind: TurnKind, pending_user_text: Option<String>) -> Self {
        Self {
            phase: Phase::Idle,
            pending_user_text,
            turn_id: Some(turn_id),
            kind,
            voiced_message: None,
            playback_id: None,
        }
    }

    pub fn is_turn(&self, turn_id: Uuid) -> bool {
        self.turn_id == Some(turn_id)
    }
}

/// Session-wide "speak replies" toggle.
///
/// Clones share the same flag, so the presentation layer can flip it from
/// any thread without touching the orchestrator.
#[derive(Debug, Clone)]
pub struct VoicePreference {
    enabled: Arc<AtomicBool>,
}

impl VoicePreference {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled: Arc::new(AtomicBool::new(enabled)),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    pub fn set(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
    }

    /// Flip the preference and return the new value
    pub fn toggle(&self) -> bool {
        !self.enabled.fetch_xor(true, Ordering::SeqCst)
    }
}

impl Default for VoicePreference {
    fn default() -> Self {
        Self::new(true)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    ChatError,
    VoiceError,
}

/// A user-visible toast
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub kind: NotificationKind,
    pub title: String,
    pub description: String,
}

impl Notification {
    pub fn chat_error(persona_name: &str, error: &FranklinError) -> Self {
        let hint = match error {
            FranklinError::MissingCredential(_) | FranklinError::RemoteRejected { .. } => {
                "Check your API keys.".to_string()
            }
            other => other.user_message(),
        };

        Self {
            kind: NotificationKind::ChatError,
            title: "Chat Error".to_string(),
            description: format!("Could not get response from {}. {}", persona_name, hint),
        }
    }

    pub fn voice_error(error: &FranklinError) -> Self {
        let description = match error {
            FranklinError::MissingCredential(_) => {
                "Could not generate voice. Check your ElevenLabs API key.".to_string()
            }
            _ => "Could not generate voice. The reply is shown as text only.".to_string(),
        };

        Self {
            kind: NotificationKind::VoiceError,
            title: "Voice Error".to_string(),
            description,
        }
    }
}

/// Change feed for the presentation layer
#[derive(Debug, Clone)]
pub enum ConversationEvent {
    MessageAppended(Message),
    PhaseChanged { from: Phase, to: Phase },
    Notification(Notification),
}

/// Result of a submit request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    Accepted { turn_id: Uuid },
    /// Input was empty after trimming
    RejectedBlank,
    /// Another exchange is in flight
    RejectedBusy(Phase),
}

impl SubmitOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, SubmitOutcome::Accepted { .. })
    }
}

/// Read-only view for rendering
#[derive(Debug, Clone)]
pub struct ConversationSnapshot {
    pub messages: Vec<Message>,
    pub phase: Phase,
    pub is_voice_enabled: bool,
    /// Submitted text the assistant has not answered yet
    pub pending_user_text: Option<String>,
    /// Message whose voice indicator is lit
    pub speaking_message_id: Option<Uuid>,
}

impl ConversationSnapshot {
    /// Typing indicator
    pub fn is_typing(&self) -> bool {
        self.phase == Phase::AwaitingCompletion
    }

    /// Input controls are disabled while an exchange is in flight
    pub fn input_locked(&self) -> bool {
        !self.phase.is_idle()
    }

    pub fn is_speaking(&self, message_id: Uuid) -> bool {
        self.speaking_message_id == Some(message_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_toggle_twice_restores() {
        let pref = VoicePreference::new(true);
        assert!(!pref.toggle());
        assert!(pref.toggle());
        assert!(pref.is_enabled());
    }

    #[test]
    fn test_preference_clones_share_flag() {
        let pref = VoicePreference::new(false);
        let ui_side = pref.clone();
        ui_side.set(true);
        assert!(pref.is_enabled());
    }

    #[test]
    fn test_voice_error_wording() {
        let missing = Notification::voice_error(&FranklinError::MissingCredential("key".into()));
        assert_eq!(missing.kind, NotificationKind::VoiceError);
        assert!(missing.description.contains("ElevenLabs API key"));

        let network = Notification::voice_error(&FranklinError::NetworkError("timeout".into()));
        assert!(!network.description.contains("API key"));
    }

    #[test]
    fn test_chat_error_names_persona() {
        let n = Notification::chat_error(
            "Benjamin Franklin",
            &FranklinError::RemoteRejected {
                status: 500,
                message: "boom".into(),
            },
        );
        assert_eq!(n.title, "Chat Error");
        assert_eq!(
            n.description,
            "Could not get response from Benjamin Franklin. Check your API keys."
        );
    }

    #[test]
    fn test_voicing_phases() {
        assert!(Phase::AwaitingSynthesis.is_voicing());
        assert!(Phase::Speaking.is_voicing());
        assert!(!Phase::AwaitingCompletion.is_voicing());
        assert!(!Phase::Idle.is_voicing());
    }
}
