//! The decoded module and its on-disk layout variants.

use alloc::vec::Vec;
use arrayvec::ArrayString;

use crate::pattern::{NoteCell, Pattern, CHANNELS};
use crate::sample::{Sample, SAMPLE_HEADER_LEN};

/// Offset of the 4-byte format tag in a STANDARD module.
pub const MAGIC_OFFSET: usize = 0x438;

/// The only tag accepted as STANDARD.
pub const STANDARD_MAGIC: [u8; 4] = *b"M.K.";

/// Length of the song name field at offset 0.
const SONG_NAME_LEN: usize = 20;

/// Entries in the on-disk order table.
pub const ORDER_TABLE_LEN: usize = 128;

/// Byte offsets that differ between the two layouts.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Layout {
    /// Sample slots including reserved slot 0
    pub sample_slots: usize,
    /// Song length byte
    pub song_length_offset: usize,
    /// First byte of the 128-entry order table
    pub order_table_offset: usize,
    /// First pattern block
    pub first_pattern_offset: usize,
}

impl Layout {
    const fn for_headers(headers: usize) -> Self {
        let song_length_offset = SONG_NAME_LEN + headers * SAMPLE_HEADER_LEN;
        let order_table_offset = song_length_offset + 2;
        let tag_len = if headers == 31 { 4 } else { 0 };
        Self {
            sample_slots: headers + 1,
            song_length_offset,
            order_table_offset,
            first_pattern_offset: order_table_offset + ORDER_TABLE_LEN + tag_len,
        }
    }

    /// Offset of the header record for sample slot `slot` (1-based).
    pub const fn sample_header_offset(&self, slot: usize) -> usize {
        SONG_NAME_LEN + (slot - 1) * SAMPLE_HEADER_LEN
    }
}

const LEGACY_LAYOUT: Layout = Layout::for_headers(15);
const STANDARD_LAYOUT: Layout = Layout::for_headers(31);

/// The two on-disk layouts.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum FormatVariant {
    /// 15 sample headers, no format tag
    Legacy,
    /// 31 sample headers, `M.K.` tag at 0x438
    #[default]
    Standard,
}

impl FormatVariant {
    /// Pick the variant from the tag bytes at [`MAGIC_OFFSET`].
    pub fn detect(magic: &[u8]) -> Self {
        if magic == STANDARD_MAGIC {
            FormatVariant::Standard
        } else {
            FormatVariant::Legacy
        }
    }

    /// The layout table for this variant.
    pub const fn layout(self) -> &'static Layout {
        match self {
            FormatVariant::Legacy => &LEGACY_LAYOUT,
            FormatVariant::Standard => &STANDARD_LAYOUT,
        }
    }

    /// Sample slots including reserved slot 0 (16 or 32).
    pub const fn sample_slots(self) -> usize {
        self.layout().sample_slots
    }
}

/// A decoded tracker module. Immutable once built.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Module {
    /// Song title; also the display name of sample slot 0
    pub song_name: ArrayString<20>,
    /// Which layout the file used
    pub variant: FormatVariant,
    /// Number of order list entries played
    pub song_length: u8,
    /// Raw order table (all 128 entries)
    pub order_list: [u8; ORDER_TABLE_LEN],
    /// Pattern blocks, `1 + max(order_list)` of them
    pub patterns: Vec<Pattern>,
    /// Sample table, 16 or 32 slots, slot 0 reserved
    pub samples: Vec<Sample>,
    /// Signed 8-bit PCM for every sample, concatenated
    pub pcm: Vec<i8>,
    /// Absolute file offset of `pcm[0]`
    pub pcm_offset: u32,
}

impl Default for Module {
    /// An empty STANDARD module: one blank pattern, one order, no audio.
    fn default() -> Self {
        let mut samples = Vec::with_capacity(FormatVariant::Standard.sample_slots());
        samples.push(Sample {
            reserved: true,
            ..Sample::default()
        });
        Self {
            song_name: ArrayString::new(),
            variant: FormatVariant::Standard,
            song_length: 1,
            order_list: [0; ORDER_TABLE_LEN],
            patterns: alloc::vec![Pattern::new()],
            samples,
            pcm: Vec::new(),
            pcm_offset: 0,
        }
    }
}

impl Module {
    /// Number of pattern blocks.
    pub fn pattern_count(&self) -> usize {
        self.patterns.len()
    }

    /// The used part of the order list.
    pub fn orders(&self) -> &[u8] {
        &self.order_list[..self.song_length as usize]
    }

    /// Pattern index at an order position.
    pub fn pattern_index(&self, order: usize) -> Option<u8> {
        self.order_list.get(order).copied()
    }

    /// Pattern played at an order position.
    pub fn pattern_for_order(&self, order: usize) -> Option<&Pattern> {
        self.pattern_index(order)
            .and_then(|idx| self.patterns.get(idx as usize))
    }

    /// The four cells at `row` of the pattern at `order`.
    pub fn row_cells(&self, order: usize, row: usize) -> Option<&[NoteCell; CHANNELS]> {
        self.pattern_for_order(order).map(|p| p.row(row))
    }

    /// A sample slot by index.
    pub fn sample(&self, index: usize) -> Option<&Sample> {
        self.samples.get(index)
    }

    /// Sample slots that can carry audio (slot 1 onwards), with their indices.
    pub fn audio_samples(&self) -> impl Iterator<Item = (usize, &Sample)> {
        self.samples.iter().enumerate().skip(1)
    }

    /// Number of slots with PCM data.
    pub fn used_sample_count(&self) -> usize {
        self.audio_samples().filter(|(_, s)| !s.is_empty()).count()
    }

    /// The whole PCM region.
    pub fn pcm_blob(&self) -> &[i8] {
        &self.pcm
    }

    /// PCM bytes of one sample, clamped to the data actually present.
    ///
    /// Empty for the reserved slot and for out-of-range indices.
    pub fn sample_pcm(&self, index: usize) -> &[i8] {
        match self.sample_range(index) {
            Some((start, end)) => &self.pcm[start..end],
            None => &[],
        }
    }

    /// Range of one sample within [`Module::pcm_blob`], clamped to its length.
    pub fn sample_range(&self, index: usize) -> Option<(usize, usize)> {
        let sample = self.samples.get(index).filter(|s| !s.reserved)?;
        let start = sample.pcm_start_offset.checked_sub(self.pcm_offset)? as usize;
        let start = start.min(self.pcm.len());
        let end = (start + sample.size_in_bytes as usize).min(self.pcm.len());
        Some((start, end))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_layout_offsets() {
        let layout = FormatVariant::Standard.layout();
        assert_eq!(layout.sample_slots, 32);
        assert_eq!(layout.song_length_offset, 950);
        assert_eq!(layout.order_table_offset, 952);
        assert_eq!(layout.first_pattern_offset, 1084);
        assert_eq!(layout.sample_header_offset(1), 20);
        assert_eq!(layout.sample_header_offset(31), 920);
    }

    #[test]
    fn legacy_layout_offsets() {
        let layout = FormatVariant::Legacy.layout();
        assert_eq!(layout.sample_slots, 16);
        assert_eq!(layout.song_length_offset, 470);
        assert_eq!(layout.order_table_offset, 472);
        assert_eq!(layout.first_pattern_offset, 600);
    }

    #[test]
    fn detect_requires_exact_tag() {
        assert_eq!(FormatVariant::detect(b"M.K."), FormatVariant::Standard);
        assert_eq!(FormatVariant::detect(b"M!K!"), FormatVariant::Legacy);
        assert_eq!(FormatVariant::detect(b"\0\0\0\0"), FormatVariant::Legacy);
    }

    fn two_sample_module() -> Module {
        let mut module = Module::default();
        module.samples.push(Sample { size_in_bytes: 4, pcm_start_offset: 100, ..Sample::new("a") });
        module.samples.push(Sample { size_in_bytes: 6, pcm_start_offset: 104, ..Sample::new("b") });
        module.pcm = alloc::vec![1, 2, 3, 4, 5, 6, 7];
        module.pcm_offset = 100;
        module
    }

    #[test]
    fn sample_pcm_slices_blob() {
        let module = two_sample_module();
        assert_eq!(module.sample_pcm(1), &[1, 2, 3, 4]);
        assert_eq!(module.sample_pcm(0), &[] as &[i8]);
        assert_eq!(module.sample_pcm(9), &[] as &[i8]);
    }

    #[test]
    fn truncated_sample_is_clamped() {
        let module = two_sample_module();
        // sample 2 claims 6 bytes but only 3 remain
        assert_eq!(module.sample_pcm(2), &[5, 6, 7]);
        assert_eq!(module.sample_range(2), Some((4, 7)));
    }

    #[test]
    fn orders_and_patterns() {
        let module = two_sample_module();
        assert_eq!(module.orders(), &[0]);
        assert!(module.pattern_for_order(0).is_some());
        assert_eq!(module.used_sample_count(), 2);
    }
}
