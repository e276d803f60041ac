//! Playback controller
//!
//! Runs a dedicated audio thread that owns the output device and plays one
//! payload at a time. Every `play` produces exactly one `Finished` or `Failed`
//! event; stopping (explicitly or by starting another payload) counts as
//! finished.

use crate::messages::AudioPayload;
use crate::{FranklinError, Result};
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use parking_lot::Mutex;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// How often the audio thread checks whether the current payload ran out
const POLL_INTERVAL: Duration = Duration::from_millis(25);

/// A device that can play one encoded payload at a time.
///
/// Implementations live on the playback thread and need not be `Send`.
pub trait AudioOutput {
    /// Begin playing, replacing anything already playing
    fn start(&mut self, payload: &AudioPayload) -> Result<()>;

    /// Whether the last started payload has played out
    fn is_finished(&self) -> bool;

    /// Cut off the current payload
    fn stop(&mut self);
}

/// Output that accepts every payload and finishes at once
#[derive(Debug, Default)]
pub struct SilentOutput {
    started: usize,
}

impl AudioOutput for SilentOutput {
    fn start(&mut self, payload: &AudioPayload) -> Result<()> {
        self.started += 1;
        debug!("Silent output skipping {} bytes", payload.len());
        Ok(())
    }

    fn is_finished(&self) -> bool {
        true
    }

    fn stop(&mut self) {}
}

#[derive(Debug)]
pub enum PlaybackCommand {
    Play {
        playback_id: Uuid,
        payload: AudioPayload,
    },
    Stop,
    Shutdown,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PlaybackEvent {
    /// The payload is audible
    Started { playback_id: Uuid },

    /// The payload ended; `stopped` is true when it was cut off
    Finished { playback_id: Uuid, stopped: bool },

    /// The payload could not be played
    Failed {
        playback_id: Uuid,
        error: FranklinError,
    },
}

impl PlaybackEvent {
    pub fn playback_id(&self) -> Uuid {
        match self {
            PlaybackEvent::Started { playback_id }
            | PlaybackEvent::Finished { playback_id, .. }
            | PlaybackEvent::Failed { playback_id, .. } => *playback_id,
        }
    }

    /// Whether this is the one terminal notification for its playback
    pub fn is_terminal(&self) -> bool {
        !matches!(self, PlaybackEvent::Started { .. })
    }
}

/// Handle onto the audio thread
pub struct PlaybackController {
    command_tx: Sender<PlaybackCommand>,
    event_rx: Receiver<PlaybackEvent>,
    current: Arc<Mutex<Option<Uuid>>>,
}

impl PlaybackController {
    /// Start the audio thread.
    ///
    /// `make_output` runs on the audio thread so that non-`Send` devices can be
    /// used. If it fails, every later `play` reports `Failed`.
    pub fn spawn<F>(make_output: F) -> Result<(Self, JoinHandle<()>)>
    where
        F: FnOnce() -> Result<Box<dyn AudioOutput>> + Send + 'static,
    {
        let (command_tx, command_rx) = bounded(16);
        let (event_tx, event_rx) = bounded(64);
        let current = Arc::new(Mutex::new(None));

        let current_for_thread = Arc::clone(&current);
        let handle = thread::Builder::new()
            .name("playback".into())
            .spawn(move || audio_thread_main(make_output, command_rx, event_tx, current_for_thread))
            .map_err(|e| {
                FranklinError::AudioDeviceError(format!("Failed to spawn playback thread: {}", e))
            })?;

        Ok((
            Self {
                command_tx,
                event_rx,
                current,
            },
            handle,
        ))
    }

    /// Queue a payload for playback and return its id.
    ///
    /// Anything already playing is stopped first.
    pub fn play(&self, payload: AudioPayload) -> Result<Uuid> {
        let playback_id = Uuid::new_v4();
        self.command_tx
            .send(PlaybackCommand::Play {
                playback_id,
                payload,
            })
            .map_err(|e| FranklinError::ChannelError(format!("Playback thread gone: {}", e)))?;
        Ok(playback_id)
    }

    /// Stop the current playback, if any
    pub fn stop(&self) {
        if self.command_tx.send(PlaybackCommand::Stop).is_err() {
            warn!("Stop requested but playback thread is gone");
        }
    }

    pub fn event_receiver(&self) -> Receiver<PlaybackEvent> {
        self.event_rx.clone()
    }

    /// Whether a payload is audible right now
    pub fn is_playing(&self) -> bool {
        self.current.lock().is_some()
    }
}

impl Drop for PlaybackController {
    fn drop(&mut self) {
        let _ = self.command_tx.try_send(PlaybackCommand::Shutdown);
    }
}

fn emit(event_tx: &Sender<PlaybackEvent>, event: PlaybackEvent) {
    if event_tx.send(event).is_err() {
        debug!("Playback event dropped, no listener");
    }
}

fn audio_thread_main<F>(
    make_output: F,
    command_rx: Receiver<PlaybackCommand>,
    event_tx: Sender<PlaybackEvent>,
    current: Arc<Mutex<Option<Uuid>>>,
) where
    F: FnOnce() -> Result<Box<dyn AudioOutput>>,
{
    let mut output = match make_output() {
        Ok(output) => Some(output),
        Err(e) => {
            error!("Failed to open audio output: {}", e);
            None
        }
    };

    let mut active: Option<Uuid> = None;

    info!("Playback thread started");

    loop {
        let cmd = match command_rx.recv_timeout(POLL_INTERVAL) {
            Ok(cmd) => Some(cmd),
            Err(RecvTimeoutError::Timeout) => None,
            Err(RecvTimeoutError::Disconnected) => break,
        };

        match cmd {
            Some(PlaybackCommand::Play {
                playback_id,
                payload,
            }) => {
                if let Some(previous) = active.take() {
                    if let Some(out) = output.as_mut() {
                        out.stop();
                    }
                    debug!("Playback {} replaced by {}", previous, playback_id);
                    emit(
                        &event_tx,
                        PlaybackEvent::Finished {
                            playback_id: previous,
                            stopped: true,
                        },
                    );
                }

                let started = match output.as_mut() {
                    Some(out) => out.start(&payload),
                    None => Err(FranklinError::AudioDeviceError(
                        "No audio output available".into(),
                    )),
                };

                match started {
                    Ok(()) => {
                        active = Some(playback_id);
                        emit(&event_tx, PlaybackEvent::Started { playback_id });
                    }
                    Err(error) => {
                        warn!("Playback {} failed to start: {}", playback_id, error);
                        emit(&event_tx, PlaybackEvent::Failed { playback_id, error });
                    }
                }
            }
            Some(PlaybackCommand::Stop) => {
                if let Some(previous) = active.take() {
                    if let Some(out) = output.as_mut() {
                        out.stop();
                    }
                    info!("Playback {} stopped", previous);
                    emit(
                        &event_tx,
                        PlaybackEvent::Finished {
                            playback_id: previous,
                            stopped: true,
                        },
                    );
                }
            }
            Some(PlaybackCommand::Shutdown) => break,
            None => {}
        }

        if let (Some(playback_id), Some(out)) = (active, output.as_ref()) {
            if out.is_finished() {
                active = None;
                debug!("Playback {} finished", playback_id);
                emit(
                    &event_tx,
                    PlaybackEvent::Finished {
                        playback_id,
                        stopped: false,
                    },
                );
            }
        }

        *current.lock() = active;
    }

    if let Some(playback_id) = active.take() {
        if let Some(out) = output.as_mut() {
            out.stop();
        }
        emit(
            &event_tx,
            PlaybackEvent::Finished {
                playback_id,
                stopped: true,
            },
        );
    }
    *current.lock() = None;

    info!("Playback thread stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    /// Output that plays until the test releases it
    struct HeldOutput {
        release: Arc<AtomicBool>,
        audible: Arc<AtomicUsize>,
        playing: bool,
    }

    impl AudioOutput for HeldOutput {
        fn start(&mut self, _payload: &AudioPayload) -> Result<()> {
            if self.playing {
                self.audible.fetch_sub(1, Ordering::SeqCst);
            }
            self.playing = true;
            self.release.store(false, Ordering::SeqCst);
            let now = self.audible.fetch_add(1, Ordering::SeqCst) + 1;
            assert!(now <= 1, "two payloads audible at once");
            Ok(())
        }

        fn is_finished(&self) -> bool {
            self.release.load(Ordering::SeqCst)
        }

        fn stop(&mut self) {
            if self.playing {
                self.playing = false;
                self.audible.fetch_sub(1, Ordering::SeqCst);
            }
        }
    }

    fn held_controller() -> (PlaybackController, Arc<AtomicBool>, Arc<AtomicUsize>) {
        let release = Arc::new(AtomicBool::new(false));
        let audible = Arc::new(AtomicUsize::new(0));
        let (r, a) = (Arc::clone(&release), Arc::clone(&audible));
        let (controller, _) = PlaybackController::spawn(move || {
            Ok(Box::new(HeldOutput {
                release: r,
                audible: a,
                playing: false,
            }) as Box<dyn AudioOutput>)
        })
        .unwrap();
        (controller, release, audible)
    }

    fn next_terminal(rx: &Receiver<PlaybackEvent>) -> PlaybackEvent {
        loop {
            let event = rx
                .recv_timeout(Duration::from_secs(2))
                .expect("no playback event");
            if event.is_terminal() {
                return event;
            }
        }
    }

    fn payload() -> AudioPayload {
        AudioPayload::mpeg(vec![0xFF, 0xFB])
    }

    #[test]
    fn test_silent_output_finishes() {
        let (controller, _) = PlaybackController::spawn(|| {
            Ok(Box::new(SilentOutput::default()) as Box<dyn AudioOutput>)
        })
        .unwrap();
        let rx = controller.event_receiver();

        let id = controller.play(payload()).unwrap();
        assert_eq!(
            next_terminal(&rx),
            PlaybackEvent::Finished {
                playback_id: id,
                stopped: false
            }
        );
    }

    #[test]
    fn test_natural_end() {
        let (controller, release, _) = held_controller();
        let rx = controller.event_receiver();

        let id = controller.play(payload()).unwrap();
        assert_eq!(
            rx.recv_timeout(Duration::from_secs(2)).unwrap(),
            PlaybackEvent::Started { playback_id: id }
        );

        release.store(true, Ordering::SeqCst);
        assert_eq!(
            next_terminal(&rx),
            PlaybackEvent::Finished {
                playback_id: id,
                stopped: false
            }
        );
    }

    #[test]
    fn test_stop_counts_as_finished() {
        let (controller, _, audible) = held_controller();
        let rx = controller.event_receiver();

        let id = controller.play(payload()).unwrap();
        controller.stop();

        assert_eq!(
            next_terminal(&rx),
            PlaybackEvent::Finished {
                playback_id: id,
                stopped: true
            }
        );
        assert_eq!(audible.load(Ordering::SeqCst), 0);
        assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());
    }

    #[test]
    fn test_new_play_stops_previous() {
        let (controller, release, audible) = held_controller();
        let rx = controller.event_receiver();

        let first = controller.play(payload()).unwrap();
        let second = controller.play(payload()).unwrap();

        assert_eq!(
            next_terminal(&rx),
            PlaybackEvent::Finished {
                playback_id: first,
                stopped: true
            }
        );
        assert_eq!(audible.load(Ordering::SeqCst), 1);

        release.store(true, Ordering::SeqCst);
        assert_eq!(
            next_terminal(&rx),
            PlaybackEvent::Finished {
                playback_id: second,
                stopped: false
            }
        );
    }

    #[test]
    fn test_missing_device_fails_each_play() {
        let (controller, _) = PlaybackController::spawn(|| {
            Err(FranklinError::AudioDeviceError("no speakers".into()))
        })
        .unwrap();
        let rx = controller.event_receiver();

        let id = controller.play(payload()).unwrap();
        match next_terminal(&rx) {
            PlaybackEvent::Failed { playback_id, error } => {
                assert_eq!(playback_id, id);
                assert!(matches!(error, FranklinError::AudioDeviceError(_)));
            }
            other => panic!("unexpected event: {:?}", other),
        }
        assert!(!controller.is_playing());
    }
}
