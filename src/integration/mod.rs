//! Integration layer wiring the gateways, playback and the message log
//! into one conversation.
//!
//! Flow: submit -> completion -> (voice on) synthesis -> playback -> idle

pub mod config;
pub mod orchestrator;
pub mod state;
pub mod worker;

pub use config::AppConfig;
pub use orchestrator::{Orchestrator, OrchestratorBuilder};
pub use state::{
    ConversationEvent, ConversationSnapshot, ExchangeState, Notification, NotificationKind,
    Phase, SubmitOutcome, TurnKind, VoicePreference,
};
pub use worker::{GatewayCommand, GatewayEvent, GatewayWorker};
