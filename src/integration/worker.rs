//! Gateway worker
//!
//! Runs completion and synthesis calls on a dedicated thread with its own
//! tokio runtime, so the orchestrator never blocks on the network.

use crate::llm::CompletionGateway;
use crate::messages::AudioPayload;
use crate::speech::{SpeechSynthesizer, VoiceProfile};
use crate::{FranklinError, Result};
use crossbeam_channel::{bounded, Receiver, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tokio::runtime::Runtime;
use tracing::{debug, error, info};
use uuid::Uuid;

/// Commands that can be sent to the gateway worker
#[derive(Debug, Clone)]
pub enum GatewayCommand {
    /// Ask the completion gateway for a reply
    Complete { turn_id: Uuid, user_text: String },

    /// Render text with the configured voice
    Synthesize { turn_id: Uuid, text: String },

    /// Shutdown the worker
    Shutdown,
}

/// Events emitted by the gateway worker
#[derive(Debug, Clone)]
pub enum GatewayEvent {
    Completed {
        turn_id: Uuid,
        result: Result<String>,
    },

    Synthesized {
        turn_id: Uuid,
        result: Result<AudioPayload>,
    },

    /// Worker has shut down
    Shutdown,
}

/// Gateway worker with channel-based communication
pub struct GatewayWorker {
    completion: Arc<dyn CompletionGateway>,
    synthesizer: Arc<dyn SpeechSynthesizer>,
    voice: VoiceProfile,

    command_tx: Sender<GatewayCommand>,
    command_rx: Receiver<GatewayCommand>,
    event_tx: Sender<GatewayEvent>,
    event_rx: Receiver<GatewayEvent>,
}

impl GatewayWorker {
    pub fn new(
        completion: Arc<dyn CompletionGateway>,
        synthesizer: Arc<dyn SpeechSynthesizer>,
        voice: VoiceProfile,
    ) -> Self {
        let (command_tx, command_rx) = bounded(16);
        let (event_tx, event_rx) = bounded(16);

        Self {
            completion,
            synthesizer,
            voice,
            command_tx,
            command_rx,
            event_tx,
            event_rx,
        }
    }

    /// Get a sender for commands
    pub fn command_sender(&self) -> Sender<GatewayCommand> {
        self.command_tx.clone()
    }

    /// Get a receiver for events
    pub fn event_receiver(&self) -> Receiver<GatewayEvent> {
        self.event_rx.clone()
    }

    /// Start the worker thread.
    ///
    /// Requests are served one at a time, in order. If the runtime cannot be
    /// created the thread exits, which closes the channels and lets the
    /// orchestrator fail the turn instead of waiting forever.
    pub fn start_worker(self) -> Result<JoinHandle<()>> {
        let GatewayWorker {
            completion,
            synthesizer,
            voice,
            command_rx,
            event_tx,
            ..
        } = self;

        thread::Builder::new()
            .name("gateway".into())
            .spawn(move || {
                info!("Gateway worker starting");

                let runtime = match Runtime::new() {
                    Ok(rt) => rt,
                    Err(e) => {
                        error!("Failed to create tokio runtime: {}", e);
                        return;
                    }
                };

                loop {
                    let event = match command_rx.recv() {
                        Ok(GatewayCommand::Complete { turn_id, user_text }) => {
                            debug!("Completion request for turn {}", turn_id);
                            let result = runtime.block_on(completion.complete(&user_text));
                            GatewayEvent::Completed { turn_id, result }
                        }
                        Ok(GatewayCommand::Synthesize { turn_id, text }) => {
                            debug!("Synthesis request for turn {}", turn_id);
                            let result = runtime.block_on(synthesizer.synthesize(&text, &voice));
                            GatewayEvent::Synthesized { turn_id, result }
                        }
                        Ok(GatewayCommand::Shutdown) => {
                            info!("Gateway worker shutting down");
                            let _ = event_tx.send(GatewayEvent::Shutdown);
                            break;
                        }
                        Err(_) => {
                            debug!("Command channel closed");
                            break;
                        }
                    };

                    if event_tx.send(event).is_err() {
                        debug!("Event receiver dropped");
                        break;
                    }
                }

                info!("Gateway worker stopped");
            })
            .map_err(|e| {
                FranklinError::ChannelError(format!("Failed to spawn gateway worker: {}", e))
            })
    }
}
