//! PCM sink trait and error types.

/// Error type for audio operations.
#[derive(Debug, thiserror::Error)]
pub enum AudioError {
    /// No output device available
    #[error("no audio device available")]
    NoDevice,
    /// Failed to initialize audio device
    #[error("device init error: {0}")]
    DeviceInit(String),
    /// Failed to create audio stream
    #[error("stream create error: {0}")]
    StreamCreate(String),
    /// Playback error
    #[error("playback error: {0}")]
    Playback(String),
}

/// Something that accepts interleaved signed 16-bit PCM.
///
/// Writers ask [`PcmSink::available_frames`] first and then write at most
/// that many frames, so a write never has to block.
pub trait PcmSink {
    /// Frames per second.
    fn sample_rate(&self) -> u32;

    /// Interleaved channels per frame.
    fn channels(&self) -> u16;

    /// Frames that can be written right now without dropping any.
    fn available_frames(&self) -> usize;

    /// Write interleaved samples. Returns the number of whole frames taken.
    fn write(&mut self, samples: &[i16]) -> usize;

    /// Start playback.
    fn start(&mut self) -> Result<(), AudioError>;

    /// Stop playback.
    fn stop(&mut self) -> Result<(), AudioError>;
}
