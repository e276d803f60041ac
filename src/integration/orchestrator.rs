//! Conversation orchestrator
//!
//! Owns the message log and the single live exchange, and sequences the
//! completion gateway, the synthesis gateway and playback:
//!
//! ```text
//! Idle --submit--> AwaitingCompletion
//! AwaitingCompletion --ok, voice off--> Idle
//! AwaitingCompletion --ok, voice on--> AwaitingSynthesis
//! AwaitingCompletion --err--> Failed --> Idle
//! AwaitingSynthesis --ok--> Speaking
//! AwaitingSynthesis --err--> Idle
//! Speaking --finished|failed--> Idle
//! ```
//!
//! The orchestrator is driven from the presentation thread: call [`Orchestrator::poll`]
//! every frame (or use [`Orchestrator::wait_until_idle`]) to apply gateway and
//! playback results. Reads and the voice toggle never wait on the network.

use crate::audio::{self, PlaybackController, PlaybackEvent};
use crate::integration::config::AppConfig;
use crate::integration::state::{
    ConversationEvent, ConversationSnapshot, ExchangeState, Notification, Phase, SubmitOutcome,
    TurnKind, VoicePreference,
};
use crate::integration::worker::{GatewayCommand, GatewayEvent, GatewayWorker};
use crate::llm::{CompletionGateway, HttpCompletionGateway, Persona};
use crate::messages::{AudioPayload, Message, MessageStorage};
use crate::speech::{self, SpeechSynthesizer};
use crate::{FranklinError, Result};
use crossbeam_channel::{bounded, Receiver, Sender, TryRecvError, TrySendError};
use parking_lot::Mutex;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

const EVENT_QUEUE_SIZE: usize = 256;

pub struct Orchestrator {
    persona: Persona,
    messages: MessageStorage,
    exchange: ExchangeState,
    voice: VoicePreference,
    greeting_spoken: bool,

    gateway_tx: Sender<GatewayCommand>,
    gateway_rx: Receiver<GatewayEvent>,

    playback: PlaybackController,
    playback_rx: Receiver<PlaybackEvent>,

    subscribers: Mutex<Vec<Sender<ConversationEvent>>>,
}

impl Orchestrator {
    /// Create an orchestrator over explicit gateways and a running playback controller.
    ///
    /// The message log starts with the persona's greeting.
    pub fn new(
        config: &AppConfig,
        completion: Arc<dyn CompletionGateway>,
        synthesizer: Arc<dyn SpeechSynthesizer>,
        playback: PlaybackController,
    ) -> Result<Self> {
        let worker = GatewayWorker::new(completion, synthesizer, config.synthesis.voice.clone());
        let gateway_tx = worker.command_sender();
        let gateway_rx = worker.event_receiver();
        worker.start_worker()?;

        let playback_rx = playback.event_receiver();

        info!("Conversation with {} opened", config.persona.name);

        Ok(Self {
            messages: MessageStorage::with_greeting(config.persona.greeting.clone()),
            persona: config.persona.clone(),
            exchange: ExchangeState::default(),
            voice: VoicePreference::new(config.voice_enabled),
            greeting_spoken: false,
            gateway_tx,
            gateway_rx,
            playback,
            playback_rx,
            subscribers: Mutex::new(Vec::new()),
        })
    }

    /// Submit user input.
    ///
    /// Blank input and input arriving while an exchange is in flight are
    /// rejected without touching the log.
    pub fn submit(&mut self, text: &str) -> SubmitOutcome {
        let text = text.trim();
        if text.is_empty() {
            return SubmitOutcome::RejectedBlank;
        }
        if !self.exchange.phase.is_idle() {
            debug!("Submit rejected while {:?}", self.exchange.phase);
            return SubmitOutcome::RejectedBusy(self.exchange.phase);
        }

        let turn_id = Uuid::new_v4();
        self.exchange = ExchangeState::begin(turn_id, TurnKind::Reply, Some(text.to_string()));

        self.append(Message::user(text));
        self.set_phase(Phase::AwaitingCompletion);

        info!("Turn {} submitted", turn_id);

        let command = GatewayCommand::Complete {
            turn_id,
            user_text: self.exchange.pending_user_text.clone().unwrap_or_default(),
        };
        if let Err(e) = self.gateway_tx.send(command) {
            self.fail_turn(FranklinError::ChannelError(format!(
                "Gateway worker unavailable: {}",
                e
            )));
        }

        SubmitOutcome::Accepted { turn_id }
    }

    /// Speak the seeded greeting once, if voice is on and nothing is in flight.
    ///
    /// Returns whether synthesis was requested.
    pub fn speak_greeting(&mut self) -> bool {
        if self.greeting_spoken || !self.exchange.phase.is_idle() || !self.voice.is_enabled() {
            return false;
        }
        let Some(greeting) = self.messages.first() else {
            return false;
        };

        self.greeting_spoken = true;
        let turn_id = Uuid::new_v4();
        self.exchange = ExchangeState::begin(turn_id, TurnKind::Greeting, None);
        self.exchange.voiced_message = Some(greeting.id());

        self.set_phase(Phase::AwaitingSynthesis);
        self.request_synthesis(turn_id, greeting.content().to_string());
        true
    }

    /// Flip the voice preference; returns the new value.
    ///
    /// A turn that already decided whether to synthesize is not affected.
    pub fn toggle_voice(&self) -> bool {
        let enabled = self.voice.toggle();
        info!("Voice replies {}", if enabled { "enabled" } else { "disabled" });
        enabled
    }

    /// Cut off the reply being spoken. The phase returns to Idle once playback
    /// confirms.
    pub fn stop_speaking(&self) {
        if self.exchange.phase == Phase::Speaking {
            self.playback.stop();
        }
    }

    /// Apply every pending gateway and playback result. Returns how many were handled.
    pub fn poll(&mut self) -> usize {
        let mut handled = 0;

        loop {
            match self.gateway_rx.try_recv() {
                Ok(event) => {
                    handled += 1;
                    self.on_gateway_event(event);
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    if matches!(
                        self.exchange.phase,
                        Phase::AwaitingCompletion | Phase::AwaitingSynthesis
                    ) {
                        handled += 1;
                        self.on_worker_lost();
                    }
                    break;
                }
            }
        }

        loop {
            match self.playback_rx.try_recv() {
                Ok(event) => {
                    handled += 1;
                    self.on_playback_event(event);
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    if self.exchange.phase == Phase::Speaking {
                        handled += 1;
                        warn!("Playback thread gone while speaking");
                        self.finish_turn();
                    }
                    break;
                }
            }
        }

        handled
    }

    /// Poll until the exchange settles or the timeout passes. Returns whether
    /// the phase is Idle.
    pub fn wait_until_idle(&mut self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            self.poll();
            if self.exchange.phase.is_idle() {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            thread::sleep(Duration::from_millis(10));
        }
    }

    /// Read-only view for rendering
    pub fn snapshot(&self) -> ConversationSnapshot {
        let phase = self.exchange.phase;
        ConversationSnapshot {
            messages: self.messages.get_all(),
            phase,
            is_voice_enabled: self.voice.is_enabled(),
            pending_user_text: if phase == Phase::AwaitingCompletion {
                self.exchange.pending_user_text.clone()
            } else {
                None
            },
            speaking_message_id: if phase.is_voicing() {
                self.exchange.voiced_message
            } else {
                None
            },
        }
    }

    pub fn phase(&self) -> Phase {
        self.exchange.phase
    }

    pub fn is_voice_enabled(&self) -> bool {
        self.voice.is_enabled()
    }

    pub fn persona(&self) -> &Persona {
        &self.persona
    }

    /// Shared read handle onto the message log. Only the orchestrator appends.
    pub fn message_log(&self) -> MessageStorage {
        self.messages.clone()
    }

    /// Subscribe to the change feed: appended messages, phase changes and
    /// notifications.
    ///
    /// Every subscriber gets its own queue holding the events published after
    /// it subscribed. A subscriber that falls `EVENT_QUEUE_SIZE` events behind
    /// misses the newer ones; dropping the receiver unsubscribes.
    pub fn events(&self) -> Receiver<ConversationEvent> {
        let (tx, rx) = bounded(EVENT_QUEUE_SIZE);
        self.subscribers.lock().push(tx);
        rx
    }

    fn on_gateway_event(&mut self, event: GatewayEvent) {
        match event {
            GatewayEvent::Completed { turn_id, result } => self.on_completed(turn_id, result),
            GatewayEvent::Synthesized { turn_id, result } => self.on_synthesized(turn_id, result),
            GatewayEvent::Shutdown => debug!("Gateway worker shut down"),
        }
    }

    fn on_completed(&mut self, turn_id: Uuid, result: Result<String>) {
        if !self.exchange.is_turn(turn_id) || self.exchange.phase != Phase::AwaitingCompletion {
            debug!("Ignoring stale completion for turn {}", turn_id);
            return;
        }

        match result {
            Ok(text) => {
                let reply = Message::assistant(text);
                let reply_id = reply.id();
                let content = reply.content().to_string();
                self.append(reply);

                // The preference is read exactly once per turn, here
                if self.voice.is_enabled() {
                    self.exchange.voiced_message = Some(reply_id);
                    self.set_phase(Phase::AwaitingSynthesis);
                    self.request_synthesis(turn_id, content);
                } else {
                    self.finish_turn();
                }
            }
            Err(e) => self.fail_turn(e),
        }
    }

    fn on_synthesized(&mut self, turn_id: Uuid, result: Result<AudioPayload>) {
        if !self.exchange.is_turn(turn_id) || self.exchange.phase != Phase::AwaitingSynthesis {
            debug!("Ignoring stale synthesis for turn {}", turn_id);
            return;
        }

        let payload = match result {
            Ok(payload) => payload,
            Err(e) => return self.voice_failed(e),
        };

        match self.playback.play(payload) {
            Ok(playback_id) => {
                self.exchange.playback_id = Some(playback_id);
                self.set_phase(Phase::Speaking);
            }
            Err(e) => self.voice_failed(e),
        }
    }

    fn on_playback_event(&mut self, event: PlaybackEvent) {
        let playback_id = event.playback_id();
        if self.exchange.playback_id != Some(playback_id) || self.exchange.phase != Phase::Speaking
        {
            debug!("Ignoring playback event for {}", playback_id);
            return;
        }

        match event {
            PlaybackEvent::Started { .. } => debug!("Speaking turn {:?}", self.exchange.turn_id),
            PlaybackEvent::Finished { stopped, .. } => {
                debug!("Playback finished (stopped: {})", stopped);
                self.finish_turn();
            }
            PlaybackEvent::Failed { error, .. } => {
                warn!("Playback failed: {}", error);
                self.finish_turn();
            }
        }
    }

    fn on_worker_lost(&mut self) {
        let error = FranklinError::ChannelError("Gateway worker stopped".into());
        match self.exchange.phase {
            Phase::AwaitingCompletion => self.fail_turn(error),
            Phase::AwaitingSynthesis => self.voice_failed(error),
            _ => {}
        }
    }

    fn request_synthesis(&mut self, turn_id: Uuid, text: String) {
        if let Err(e) = self.gateway_tx.send(GatewayCommand::Synthesize { turn_id, text }) {
            self.voice_failed(FranklinError::ChannelError(format!(
                "Gateway worker unavailable: {}",
                e
            )));
        }
    }

    /// Completion failure: the turn ends without an assistant message.
    fn fail_turn(&mut self, error: FranklinError) {
        if error.is_recoverable() {
            warn!("Chat error: {}", error);
        } else {
            error!("Chat error: {}", error);
        }
        self.set_phase(Phase::Failed);
        self.notify(Notification::chat_error(&self.persona.name, &error));
        self.finish_turn();
    }

    /// Synthesis or hand-off failure: the text reply stays, only the voice is lost.
    fn voice_failed(&mut self, error: FranklinError) {
        match self.exchange.kind {
            TurnKind::Reply => {
                warn!("Voice error: {}", error);
                self.notify(Notification::voice_error(&error));
            }
            TurnKind::Greeting => warn!("Greeting voice unavailable: {}", error),
        }
        self.finish_turn();
    }

    fn finish_turn(&mut self) {
        self.set_phase(Phase::Idle);
        self.exchange = ExchangeState::default();
    }

    fn set_phase(&mut self, to: Phase) {
        let from = self.exchange.phase;
        if from == to {
            return;
        }
        debug!("Phase {:?} -> {:?}", from, to);
        self.exchange.phase = to;
        self.publish(ConversationEvent::PhaseChanged { from, to });
    }

    fn append(&mut self, message: Message) {
        self.messages.add(message.clone());
        self.publish(ConversationEvent::MessageAppended(message));
    }

    fn notify(&mut self, notification: Notification) {
        self.publish(ConversationEvent::Notification(notification));
    }

    fn publish(&self, event: ConversationEvent) {
        self.subscribers
            .lock()
            .retain(|subscriber| match subscriber.try_send(event.clone()) {
                Ok(()) => true,
                Err(TrySendError::Full(event)) => {
                    debug!("Subscriber queue full, dropping {:?}", event);
                    true
                }
                Err(TrySendError::Disconnected(_)) => false,
            });
    }
}

impl Drop for Orchestrator {
    fn drop(&mut self) {
        let _ = self.gateway_tx.try_send(GatewayCommand::Shutdown);
    }
}

/// Builder for creating an orchestrator.
///
/// Gateways and the audio output default to the ones described by the
/// configuration; tests and embedders can substitute their own.
pub struct OrchestratorBuilder {
    config: AppConfig,
    completion: Option<Arc<dyn CompletionGateway>>,
    synthesizer: Option<Arc<dyn SpeechSynthesizer>>,
    output: Option<Box<dyn FnOnce() -> Result<Box<dyn audio::AudioOutput>> + Send>>,
}

impl OrchestratorBuilder {
    /// Create a new builder with default configuration
    pub fn new() -> Self {
        Self {
            config: AppConfig::default(),
            completion: None,
            synthesizer: None,
            output: None,
        }
    }

    /// Set the complete configuration
    pub fn with_config(mut self, config: AppConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_completion(mut self, completion: Arc<dyn CompletionGateway>) -> Self {
        self.completion = Some(completion);
        self
    }

    pub fn with_synthesizer(mut self, synthesizer: Arc<dyn SpeechSynthesizer>) -> Self {
        self.synthesizer = Some(synthesizer);
        self
    }

    /// Supply the audio output; the closure runs on the playback thread
    pub fn with_output<F>(mut self, make_output: F) -> Self
    where
        F: FnOnce() -> Result<Box<dyn audio::AudioOutput>> + Send + 'static,
    {
        self.output = Some(Box::new(make_output));
        self
    }

    /// Build the orchestrator
    pub fn build(self) -> Result<Orchestrator> {
        self.config.validate()?;

        let completion = match self.completion {
            Some(completion) => completion,
            None => Arc::new(HttpCompletionGateway::new(
                self.config.completion.clone(),
                self.config.persona.prompt.clone(),
            )?),
        };

        let synthesizer = match self.synthesizer {
            Some(synthesizer) => synthesizer,
            None => speech::build_synthesizer(&self.config.synthesis)?,
        };

        let (playback, _) = match self.output {
            Some(make_output) => PlaybackController::spawn(make_output)?,
            None if self.config.enable_audio_output => {
                PlaybackController::spawn(audio::default_output)?
            }
            None => PlaybackController::spawn(|| {
                Ok(Box::new(audio::SilentOutput::default()) as Box<dyn audio::AudioOutput>)
            })?,
        };

        Orchestrator::new(&self.config, completion, synthesizer, playback)
    }
}

impl Default for OrchestratorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::SilentOutput;
    use crate::integration::state::NotificationKind;
    use crate::messages::Sender as MessageSender;
    use crate::speech::VoiceProfile;
    use async_trait::async_trait;

    struct Reply(&'static str);

    #[async_trait]
    impl CompletionGateway for Reply {
        async fn complete(&self, _user_text: &str) -> Result<String> {
            Ok(self.0.to_string())
        }
    }

    struct Rejecting;

    #[async_trait]
    impl CompletionGateway for Rejecting {
        async fn complete(&self, _user_text: &str) -> Result<String> {
            Err(FranklinError::RemoteRejected {
                status: 500,
                message: "upstream failure".into(),
            })
        }
    }

    struct Voice;

    #[async_trait]
    impl SpeechSynthesizer for Voice {
        async fn synthesize(&self, _text: &str, _voice: &VoiceProfile) -> Result<AudioPayload> {
            Ok(AudioPayload::mpeg(vec![0xFF, 0xFB, 0x90]))
        }
    }

    fn orchestrator(
        completion: Arc<dyn CompletionGateway>,
        config: AppConfig,
    ) -> Orchestrator {
        OrchestratorBuilder::new()
            .with_config(config)
            .with_completion(completion)
            .with_synthesizer(Arc::new(Voice))
            .with_output(|| Ok(Box::new(SilentOutput::default()) as Box<dyn audio::AudioOutput>))
            .build()
            .unwrap()
    }

    fn drain(rx: &Receiver<ConversationEvent>) -> Vec<ConversationEvent> {
        rx.try_iter().collect()
    }

    #[test]
    fn test_starts_with_greeting() {
        let orch = orchestrator(Arc::new(Reply("ok")), AppConfig::default());
        let snapshot = orch.snapshot();
        assert_eq!(snapshot.messages.len(), 1);
        assert_eq!(snapshot.messages[0].sender(), MessageSender::Assistant);
        assert_eq!(snapshot.phase, Phase::Idle);
        assert!(snapshot.is_voice_enabled);
    }

    #[test]
    fn test_blank_submit_rejected() {
        let mut orch = orchestrator(Arc::new(Reply("ok")), AppConfig::default());
        assert_eq!(orch.submit("   \n\t"), SubmitOutcome::RejectedBlank);
        assert_eq!(orch.snapshot().messages.len(), 1);
        assert_eq!(orch.phase(), Phase::Idle);
    }

    #[test]
    fn test_user_message_recorded_before_reply() {
        let mut orch = orchestrator(Arc::new(Reply("ok")), AppConfig::default().without_voice());
        assert!(orch.submit("  How do I save money?  ").is_accepted());

        // Appended synchronously, trimmed
        let snapshot = orch.snapshot();
        assert_eq!(snapshot.messages.len(), 2);
        assert_eq!(snapshot.messages[1].content(), "How do I save money?");
        assert_eq!(snapshot.phase, Phase::AwaitingCompletion);
        assert!(snapshot.is_typing());
        assert!(snapshot.input_locked());
        assert_eq!(snapshot.pending_user_text.as_deref(), Some("How do I save money?"));

        assert!(orch.wait_until_idle(Duration::from_secs(2)));
        assert!(orch.snapshot().pending_user_text.is_none());
    }

    #[test]
    fn test_text_only_turn() {
        let mut orch = orchestrator(
            Arc::new(Reply("Save first, spend what remains.")),
            AppConfig::default().without_voice(),
        );
        let events = orch.events();

        orch.submit("How do I save money?");
        assert!(orch.wait_until_idle(Duration::from_secs(2)));

        let messages = orch.snapshot().messages;
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[2].content(), "Save first, spend what remains.");
        assert_eq!(messages[2].sender(), MessageSender::Assistant);

        let phases: Vec<Phase> = drain(&events)
            .into_iter()
            .filter_map(|e| match e {
                ConversationEvent::PhaseChanged { to, .. } => Some(to),
                _ => None,
            })
            .collect();
        assert_eq!(phases, vec![Phase::AwaitingCompletion, Phase::Idle]);
    }

    #[test]
    fn test_voice_turn_passes_through_speaking() {
        let mut orch = orchestrator(Arc::new(Reply("A penny saved.")), AppConfig::default());
        let events = orch.events();

        orch.submit("Tip?");
        assert!(orch.wait_until_idle(Duration::from_secs(2)));

        let phases: Vec<Phase> = drain(&events)
            .into_iter()
            .filter_map(|e| match e {
                ConversationEvent::PhaseChanged { to, .. } => Some(to),
                _ => None,
            })
            .collect();
        assert_eq!(
            phases,
            vec![
                Phase::AwaitingCompletion,
                Phase::AwaitingSynthesis,
                Phase::Speaking,
                Phase::Idle
            ]
        );
        assert!(orch.snapshot().speaking_message_id.is_none());
    }

    #[test]
    fn test_completion_failure_notifies_and_recovers() {
        let mut orch = orchestrator(Arc::new(Rejecting), AppConfig::default());
        let events = orch.events();

        orch.submit("Hello?");
        assert!(orch.wait_until_idle(Duration::from_secs(2)));
        assert_eq!(orch.snapshot().messages.len(), 2);

        let events = drain(&events);
        assert!(events.iter().any(|e| matches!(
            e,
            ConversationEvent::PhaseChanged { to: Phase::Failed, .. }
        )));
        assert!(events.iter().any(|e| matches!(
            e,
            ConversationEvent::Notification(n) if n.kind == NotificationKind::ChatError
        )));

        // The session survives the failed turn
        assert!(orch.submit("Again").is_accepted());
    }

    #[test]
    fn test_speak_greeting_once() {
        let mut orch = orchestrator(Arc::new(Reply("ok")), AppConfig::default());
        let greeting_id = orch.snapshot().messages[0].id();

        assert!(orch.speak_greeting());
        assert_eq!(orch.snapshot().speaking_message_id, Some(greeting_id));
        assert!(orch.wait_until_idle(Duration::from_secs(2)));

        assert!(!orch.speak_greeting());
        assert_eq!(orch.snapshot().messages.len(), 1);
    }

    #[test]
    fn test_greeting_skipped_when_voice_off() {
        let mut orch = orchestrator(Arc::new(Reply("ok")), AppConfig::default().without_voice());
        assert!(!orch.speak_greeting());
        assert_eq!(orch.phase(), Phase::Idle);
    }

    #[test]
    fn test_message_log_tracks_orchestrator_appends() {
        let mut orch = orchestrator(Arc::new(Reply("ok")), AppConfig::default().without_voice());
        let log = orch.message_log();

        orch.submit("Hello");
        assert!(orch.wait_until_idle(Duration::from_secs(2)));

        let ids: Vec<Uuid> = log.get_all().iter().map(|m| m.id()).collect();
        let snapshot_ids: Vec<Uuid> = orch.snapshot().messages.iter().map(|m| m.id()).collect();
        assert_eq!(ids, snapshot_ids);
        assert_eq!(log.len(), 3);
    }

    #[test]
    fn test_every_subscriber_sees_every_event() {
        let mut orch = orchestrator(Arc::new(Reply("ok")), AppConfig::default().without_voice());
        let first = orch.events();
        let second = orch.events();

        orch.submit("Hello");
        assert!(orch.wait_until_idle(Duration::from_secs(2)));

        let first = drain(&first);
        let second = drain(&second);
        // user message, reply, two phase changes
        assert_eq!(first.len(), 4);
        assert_eq!(second.len(), 4);
    }

    #[test]
    fn test_late_subscriber_gets_only_new_events() {
        let mut orch = orchestrator(Arc::new(Reply("ok")), AppConfig::default().without_voice());
        orch.submit("Hello");
        assert!(orch.wait_until_idle(Duration::from_secs(2)));

        let late = orch.events();
        assert!(late.try_recv().is_err());

        orch.submit("Again");
        match late.try_recv() {
            Ok(ConversationEvent::MessageAppended(message)) => {
                assert_eq!(message.content(), "Again");
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_dropped_subscriber_is_removed() {
        let mut orch = orchestrator(Arc::new(Reply("ok")), AppConfig::default().without_voice());
        drop(orch.events());
        orch.submit("Hello");
        assert!(orch.subscribers.lock().is_empty());
    }
}
