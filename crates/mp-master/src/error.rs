use mp_audio::AudioError;
use mp_formats::FormatError;

/// Error type for controller operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("format error: {0}")]
    Format(#[from] FormatError),
    #[error("audio error: {0}")]
    Audio(#[from] AudioError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("no module loaded")]
    NoModuleLoaded,
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
