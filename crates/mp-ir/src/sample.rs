//! Sample slot metadata.

use arrayvec::ArrayString;

/// Size of one sample header record on disk.
pub const SAMPLE_HEADER_LEN: usize = 30;

/// One entry in a module's sample table.
///
/// Sizes and offsets are in bytes (the on-disk fields are 16-bit words,
/// doubled at decode time). The PCM itself lives in [`Module`]'s blob.
///
/// Slot 0 is reserved: it carries the song name, no audio, and exists only
/// so the running PCM offsets line up. See [`Sample::reserved`].
///
/// [`Module`]: crate::Module
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Sample {
    /// Sample name
    pub name: ArrayString<22>,
    /// Length of the sample data
    pub size_in_bytes: u32,
    /// Loop start, relative to the sample start
    pub loop_start_offset: u32,
    /// Loop length
    pub loop_length: u32,
    /// Absolute file offset of the first PCM byte
    pub pcm_start_offset: u32,
    /// Finetune (-8..=7, eighths of a semitone)
    pub finetune: i8,
    /// Default volume (0-64)
    pub volume: u8,
    /// Slot 0 placeholder
    pub reserved: bool,
}

impl Sample {
    /// Create a new empty sample.
    pub fn new(name: &str) -> Self {
        let mut sample = Self::default();
        let _ = sample.name.try_push_str(name);
        sample
    }

    /// True if the sample loops.
    ///
    /// A loop starting at offset 0 does not count. The reserved slot always
    /// reports a zero-length loop; callers skip it rather than play it.
    pub fn is_looped(&self) -> bool {
        self.reserved || self.loop_start_offset != 0
    }

    /// Loop end, relative to the sample start.
    pub fn loop_end_offset(&self) -> u32 {
        self.loop_start_offset + self.loop_length
    }

    /// Absolute file offset one past the last PCM byte.
    pub fn pcm_end_offset(&self) -> u32 {
        self.pcm_start_offset + self.size_in_bytes
    }

    /// True if the slot holds no playable audio.
    pub fn is_empty(&self) -> bool {
        self.reserved || self.size_in_bytes == 0
    }
}
