use crate::audio::playback::AudioOutput;
use crate::messages::AudioPayload;
use crate::{FranklinError, Result};
use rodio::{Decoder, OutputStream, OutputStreamHandle, Sink};
use std::io::Cursor;
use tracing::{debug, info};

/// Speaker output through rodio.
///
/// `OutputStream` is not `Send`; create this on the thread that plays audio.
pub struct RodioOutput {
    _stream: OutputStream,
    handle: OutputStreamHandle,
    sink: Option<Sink>,
}

impl RodioOutput {
    /// Open the default output device
    pub fn new() -> Result<Self> {
        let (stream, handle) = OutputStream::try_default().map_err(|e| {
            FranklinError::AudioDeviceError(format!("Failed to open output stream: {}", e))
        })?;

        info!("Opened default audio output");

        Ok(Self {
            _stream: stream,
            handle,
            sink: None,
        })
    }
}

/// Decode an encoded payload into a playable source
pub fn decode(payload: &AudioPayload) -> Result<Decoder<Cursor<Vec<u8>>>> {
    Decoder::new(Cursor::new(payload.bytes.clone())).map_err(|e| {
        FranklinError::PlaybackError(format!("Failed to decode {}: {}", payload.mime, e))
    })
}

impl AudioOutput for RodioOutput {
    fn start(&mut self, payload: &AudioPayload) -> Result<()> {
        self.stop();

        let source = decode(payload)?;
        let sink = Sink::try_new(&self.handle)
            .map_err(|e| FranklinError::AudioDeviceError(format!("Failed to create sink: {}", e)))?;
        sink.append(source);

        debug!("Playing {} bytes of {}", payload.len(), payload.mime);
        self.sink = Some(sink);
        Ok(())
    }

    fn is_finished(&self) -> bool {
        self.sink.as_ref().map(|s| s.empty()).unwrap_or(true)
    }

    fn stop(&mut self) {
        if let Some(sink) = self.sink.take() {
            sink.stop();
        }
    }
}

impl Drop for RodioOutput {
    fn drop(&mut self) {
        self.stop();
    }
}
