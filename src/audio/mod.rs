#[cfg(feature = "audio-io")]
pub mod output;
pub mod playback;

#[cfg(feature = "audio-io")]
pub use output::RodioOutput;
pub use playback::{
    AudioOutput, PlaybackCommand, PlaybackController, PlaybackEvent, SilentOutput,
};

use crate::Result;

/// Open the speaker output for this build.
///
/// With `audio-io` this is the default rodio device; otherwise playback is
/// silent and completes immediately.
pub fn default_output() -> Result<Box<dyn AudioOutput>> {
    #[cfg(feature = "audio-io")]
    {
        Ok(Box::new(RodioOutput::new()?))
    }

    #[cfg(not(feature = "audio-io"))]
    {
        Ok(Box::new(SilentOutput::default()))
    }
}
