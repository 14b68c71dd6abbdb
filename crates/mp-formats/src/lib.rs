//! File formats for modport.
//!
//! Decodes four-channel tracker modules into [`mp_ir::Module`] and
//! re-expresses them as a Standard MIDI File and a SoundFont2 bank.

mod midi_format;
mod mod_format;
mod riff;
mod sf2_format;

pub use midi_format::{encode_midi, write_midi, MidiOptions, MidiTrackWriter};
pub use mod_format::{decode_module, decode_module_as, decode_module_with, DecodeOptions};
pub use sf2_format::{encode_soundfont, upconvert_pcm, write_soundfont, SoundFontOptions};

/// Error type for module decoding.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FormatError {
    /// The `M.K.` tag was required but something else was found
    #[error("bad magic {found:02X?}, expected \"M.K.\"")]
    BadMagic { found: [u8; 4] },
    /// The file ends before a structure it declares
    #[error("file truncated: need {needed} bytes, have {len}")]
    Truncated { needed: usize, len: usize },
    /// Song length byte is zero
    #[error("order list is empty")]
    EmptyOrderList,
    /// Song length byte is larger than the order table
    #[error("song length {0} exceeds 128 orders")]
    SongLengthOutOfRange(u8),
    /// An order entry names a pattern that cannot exist
    #[error("order {order} references pattern {pattern}")]
    PatternOutOfRange { order: usize, pattern: u8 },
    /// No `M.K.` tag and the header does not look like a 15-sample module
    #[error("unrecognized module layout")]
    UnrecognizedLayout,
}
