//! Pattern and note cell types.

use crate::effects::Effect;
use crate::pitch::period_to_pitch;

/// Rows in every pattern.
pub const ROWS: usize = 64;

/// Channels in every pattern.
pub const CHANNELS: usize = 4;

/// Size of one pattern block on disk: 64 rows x 4 channels x 4 bytes.
pub const PATTERN_BYTES: usize = ROWS * CHANNELS * 4;

/// A single decoded pattern cell.
///
/// On disk a cell is a packed 32-bit big-endian word:
///
/// ```text
/// ssss pppp  pppp pppp  ssss cccc  aaaa aaaa
///  |    |                |    |     effect parameter
///  |    period (12 bits) |    effect command
///  sample high nibble    sample low nibble
/// ```
///
/// The word is unpacked once at decode time; nothing re-derives the masks later.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct NoteCell {
    /// Sample slot (0 = keep the channel's current sample)
    pub sample_index: u8,
    /// Hardware period code (0 = no note)
    pub period_code: u16,
    /// Effect command nibble
    pub effect_command: u8,
    /// Effect parameter byte
    pub effect_param: u8,
}

impl NoteCell {
    /// Unpack a big-endian cell word.
    pub const fn from_packed(word: u32) -> Self {
        Self {
            sample_index: (((word >> 24) & 0xF0) | ((word >> 12) & 0x0F)) as u8,
            period_code: ((word >> 16) & 0x0FFF) as u16,
            effect_command: ((word >> 8) & 0x0F) as u8,
            effect_param: (word & 0xFF) as u8,
        }
    }

    /// Unpack a cell from its four on-disk bytes.
    pub const fn from_bytes(bytes: [u8; 4]) -> Self {
        Self::from_packed(u32::from_be_bytes(bytes))
    }

    /// Repack into the on-disk word.
    pub const fn to_packed(self) -> u32 {
        let sample = self.sample_index as u32;
        ((sample & 0xF0) << 24)
            | ((self.period_code as u32 & 0x0FFF) << 16)
            | ((sample & 0x0F) << 12)
            | ((self.effect_command as u32 & 0x0F) << 8)
            | self.effect_param as u32
    }

    /// True when the cell starts a note.
    pub const fn has_note(&self) -> bool {
        self.period_code != 0
    }

    /// Pitch of the note in this cell, if any.
    pub fn pitch(&self) -> Option<u8> {
        period_to_pitch(self.period_code)
    }

    /// The decoded effect column.
    pub const fn effect(&self) -> Effect {
        Effect::decode(self.effect_command, self.effect_param)
    }

    /// Returns true if the cell is completely empty.
    pub const fn is_empty(&self) -> bool {
        self.sample_index == 0
            && self.period_code == 0
            && self.effect_command == 0
            && self.effect_param == 0
    }
}

/// A 64-row x 4-channel grid of note cells.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Pattern {
    rows: [[NoteCell; CHANNELS]; ROWS],
}

impl Default for Pattern {
    fn default() -> Self {
        Self::new()
    }
}

impl Pattern {
    /// Create a pattern with every cell empty.
    pub const fn new() -> Self {
        Self {
            rows: [[NoteCell {
                sample_index: 0,
                period_code: 0,
                effect_command: 0,
                effect_param: 0,
            }; CHANNELS]; ROWS],
        }
    }

    /// Decode a 1024-byte pattern block.
    ///
    /// Returns `None` when `block` is shorter than [`PATTERN_BYTES`].
    pub fn from_block(block: &[u8]) -> Option<Self> {
        if block.len() < PATTERN_BYTES {
            return None;
        }
        let mut pattern = Self::new();
        for (i, word) in block[..PATTERN_BYTES].chunks_exact(4).enumerate() {
            let cell = NoteCell::from_bytes([word[0], word[1], word[2], word[3]]);
            pattern.rows[i / CHANNELS][i % CHANNELS] = cell;
        }
        Some(pattern)
    }

    /// Get a reference to a cell.
    pub fn cell(&self, row: usize, channel: usize) -> &NoteCell {
        &self.rows[row][channel]
    }

    /// Get a mutable reference to a cell.
    pub fn cell_mut(&mut self, row: usize, channel: usize) -> &mut NoteCell {
        &mut self.rows[row][channel]
    }

    /// All four cells of a row.
    pub fn row(&self, row: usize) -> &[NoteCell; CHANNELS] {
        &self.rows[row]
    }
}
