//! Byte-level builder for synthetic module files.

#![allow(dead_code)]

use mp_ir::{FormatVariant, NoteCell, PATTERN_BYTES};

pub struct SampleData {
    pub name: &'static str,
    pub finetune: u8,
    pub volume: u8,
    pub loop_start_words: u16,
    pub loop_length_words: u16,
    pub data: Vec<i8>,
}

impl SampleData {
    pub fn new(name: &'static str, data: Vec<i8>) -> Self {
        Self { name, finetune: 0, volume: 64, loop_start_words: 0, loop_length_words: 1, data }
    }

    pub fn looped(mut self, start_words: u16, length_words: u16) -> Self {
        self.loop_start_words = start_words;
        self.loop_length_words = length_words;
        self
    }
}

pub struct ModBuilder {
    pub variant: FormatVariant,
    pub name: &'static str,
    pub song_length: u8,
    pub orders: Vec<u8>,
    pub patterns: Vec<[u8; PATTERN_BYTES]>,
    pub samples: Vec<SampleData>,
    /// Bytes to drop from the end of the file
    pub truncate: usize,
}

impl ModBuilder {
    pub fn new(variant: FormatVariant) -> Self {
        Self {
            variant,
            name: "synthetic",
            song_length: 1,
            orders: vec![0],
            patterns: vec![[0; PATTERN_BYTES]],
            samples: Vec::new(),
            truncate: 0,
        }
    }

    pub fn standard() -> Self {
        Self::new(FormatVariant::Standard)
    }

    pub fn legacy() -> Self {
        Self::new(FormatVariant::Legacy)
    }

    pub fn orders(mut self, orders: &[u8]) -> Self {
        self.orders = orders.to_vec();
        self.song_length = orders.len() as u8;
        self
    }

    pub fn pattern_count(mut self, count: usize) -> Self {
        self.patterns = vec![[0; PATTERN_BYTES]; count];
        self
    }

    pub fn cell(mut self, pattern: usize, row: usize, channel: usize, cell: NoteCell) -> Self {
        let offset = (row * 4 + channel) * 4;
        self.patterns[pattern][offset..offset + 4].copy_from_slice(&cell.to_packed().to_be_bytes());
        self
    }

    pub fn sample(mut self, sample: SampleData) -> Self {
        self.samples.push(sample);
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let layout = self.variant.layout();
        let mut out = vec![0u8; layout.first_pattern_offset];
        out[..self.name.len()].copy_from_slice(self.name.as_bytes());

        for (i, sample) in self.samples.iter().enumerate() {
            let at = layout.sample_header_offset(i + 1);
            out[at..at + sample.name.len()].copy_from_slice(sample.name.as_bytes());
            let words = (sample.data.len() / 2) as u16;
            out[at + 22..at + 24].copy_from_slice(&words.to_be_bytes());
            out[at + 24] = sample.finetune;
            out[at + 25] = sample.volume;
            out[at + 26..at + 28].copy_from_slice(&sample.loop_start_words.to_be_bytes());
            out[at + 28..at + 30].copy_from_slice(&sample.loop_length_words.to_be_bytes());
        }

        out[layout.song_length_offset] = self.song_length;
        out[layout.song_length_offset + 1] = 127;
        let orders = layout.order_table_offset;
        out[orders..orders + self.orders.len()].copy_from_slice(&self.orders);
        if self.variant == FormatVariant::Standard {
            out[1080..1084].copy_from_slice(b"M.K.");
        }

        for pattern in &self.patterns {
            out.extend_from_slice(pattern);
        }
        for sample in &self.samples {
            out.extend(sample.data.iter().map(|&b| b as u8));
        }
        out.truncate(out.len() - self.truncate);
        out
    }
}

pub fn note(sample: u8, period: u16) -> NoteCell {
    NoteCell { sample_index: sample, period_code: period, ..NoteCell::default() }
}

pub fn effect(command: u8, param: u8) -> NoteCell {
    NoteCell { effect_command: command, effect_param: param, ..NoteCell::default() }
}

/// Little-endian u32 at `offset`.
pub fn le_u32(bytes: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([bytes[offset], bytes[offset + 1], bytes[offset + 2], bytes[offset + 3]])
}

/// Big-endian u32 at `offset`.
pub fn be_u32(bytes: &[u8], offset: usize) -> u32 {
    u32::from_be_bytes([bytes[offset], bytes[offset + 1], bytes[offset + 2], bytes[offset + 3]])
}
