//! Four-channel MOD decoder.
//!
//! Both layouts share the same record shapes and differ only in how many
//! sample headers precede the order table. See [`mp_ir::Layout`].

use arrayvec::ArrayString;
use binrw::io::Cursor;
use binrw::BinRead;
use mp_ir::{
    FormatVariant, Layout, Module, Pattern, Sample, MAGIC_OFFSET, ORDER_TABLE_LEN, PATTERN_BYTES,
    SAMPLE_HEADER_LEN, STANDARD_MAGIC,
};

use crate::FormatError;

/// Highest pattern index an order entry may hold.
const MAX_PATTERN: u8 = 127;

/// Decoder settings.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DecodeOptions {
    /// Force a layout instead of detecting it from the tag
    pub variant: Option<FormatVariant>,
}

/// On-disk sample header. Lengths and loop points are in 16-bit words.
#[derive(BinRead, Debug)]
#[br(big)]
struct SampleHeader {
    name: [u8; 22],
    length_words: u16,
    finetune: u8,
    volume: u8,
    loop_start_words: u16,
    loop_length_words: u16,
}

impl SampleHeader {
    fn parse(data: &[u8], offset: usize) -> Result<Self, FormatError> {
        let end = offset + SAMPLE_HEADER_LEN;
        let record = data.get(offset..end).ok_or(FormatError::Truncated {
            needed: end,
            len: data.len(),
        })?;
        SampleHeader::read(&mut Cursor::new(record)).map_err(|_| FormatError::Truncated {
            needed: end,
            len: data.len(),
        })
    }

    fn into_sample(self) -> Sample {
        // finetune is a signed nibble
        let nibble = (self.finetune & 0x0F) as i8;
        Sample {
            name: fixed_text(&self.name),
            size_in_bytes: self.length_words as u32 * 2,
            loop_start_offset: self.loop_start_words as u32 * 2,
            loop_length: self.loop_length_words as u32 * 2,
            finetune: if nibble > 7 { nibble - 16 } else { nibble },
            volume: self.volume.min(64),
            ..Sample::default()
        }
    }
}

/// Decode a module, detecting the layout from the `M.K.` tag.
pub fn decode_module(data: &[u8]) -> Result<Module, FormatError> {
    decode_module_with(data, &DecodeOptions::default())
}

/// Decode a module with a fixed layout.
///
/// STANDARD still requires the tag; LEGACY skips the check entirely.
pub fn decode_module_as(data: &[u8], variant: FormatVariant) -> Result<Module, FormatError> {
    decode_module_with(data, &DecodeOptions { variant: Some(variant) })
}

pub fn decode_module_with(data: &[u8], options: &DecodeOptions) -> Result<Module, FormatError> {
    let magic = data.get(MAGIC_OFFSET..MAGIC_OFFSET + 4);
    let variant = match options.variant {
        Some(FormatVariant::Standard) => {
            let found: [u8; 4] = magic
                .and_then(|m| m.try_into().ok())
                .ok_or(FormatError::Truncated {
                    needed: MAGIC_OFFSET + 4,
                    len: data.len(),
                })?;
            if found != STANDARD_MAGIC {
                return Err(FormatError::BadMagic { found });
            }
            FormatVariant::Standard
        }
        Some(FormatVariant::Legacy) => FormatVariant::Legacy,
        None => magic.map_or(FormatVariant::Legacy, FormatVariant::detect),
    };

    let result = decode_layout(data, variant);
    if options.variant.is_none() && variant == FormatVariant::Legacy {
        // without a tag, a bad header means this is not a module at all
        return result.map_err(|e| match e {
            FormatError::EmptyOrderList
            | FormatError::SongLengthOutOfRange(_)
            | FormatError::PatternOutOfRange { .. } => FormatError::UnrecognizedLayout,
            other => other,
        });
    }
    result
}

fn decode_layout(data: &[u8], variant: FormatVariant) -> Result<Module, FormatError> {
    let layout = variant.layout();
    require(data, layout.first_pattern_offset)?;

    let song_length = data[layout.song_length_offset];
    if song_length == 0 {
        return Err(FormatError::EmptyOrderList);
    }
    if song_length as usize > ORDER_TABLE_LEN {
        return Err(FormatError::SongLengthOutOfRange(song_length));
    }

    let mut order_list = [0u8; ORDER_TABLE_LEN];
    order_list.copy_from_slice(
        &data[layout.order_table_offset..layout.order_table_offset + ORDER_TABLE_LEN],
    );
    let mut max_pattern = 0;
    for (order, &pattern) in order_list.iter().enumerate() {
        if pattern > MAX_PATTERN {
            return Err(FormatError::PatternOutOfRange { order, pattern });
        }
        max_pattern = max_pattern.max(pattern);
    }
    let pattern_count = max_pattern as usize + 1;

    let pcm_offset = layout.first_pattern_offset + pattern_count * PATTERN_BYTES;
    require(data, pcm_offset)?;
    let patterns = data[layout.first_pattern_offset..pcm_offset]
        .chunks_exact(PATTERN_BYTES)
        .filter_map(Pattern::from_block)
        .collect();

    let song_name: ArrayString<20> = fixed_text(&data[..20]);
    let samples = decode_samples(data, layout, &song_name, pcm_offset)?;
    let pcm: Vec<i8> = data[pcm_offset..].iter().map(|&b| b as i8).collect();

    let module = Module {
        song_name,
        variant,
        song_length,
        order_list,
        patterns,
        samples,
        pcm,
        pcm_offset: pcm_offset as u32,
    };
    check_pcm_length(&module);

    tracing::debug!(
        ?variant,
        name = %module.song_name,
        song_length,
        patterns = module.pattern_count(),
        samples = module.used_sample_count(),
        pcm_bytes = module.pcm.len(),
        "decoded module"
    );
    Ok(module)
}

/// Parse the sample table and lay out PCM offsets.
///
/// Slot 1 starts right after the last pattern and every later slot starts
/// where the previous one ends. Slot 0 always takes slot 1's size and sits
/// just before slot 1; when that would begin before the start of the file
/// its offset is pinned at 0, so the chain is anchored at slot 1 rather
/// than slot 0.
fn decode_samples(
    data: &[u8],
    layout: &Layout,
    song_name: &str,
    pcm_offset: usize,
) -> Result<Vec<Sample>, FormatError> {
    let mut samples = Vec::with_capacity(layout.sample_slots);
    let mut reserved = Sample {
        reserved: true,
        ..Sample::new(song_name)
    };
    samples.push(reserved.clone());

    let mut start = pcm_offset as u32;
    for slot in 1..layout.sample_slots {
        let mut sample = SampleHeader::parse(data, layout.sample_header_offset(slot))?.into_sample();
        sample.pcm_start_offset = start;
        start = start.saturating_add(sample.size_in_bytes);
        samples.push(sample);
    }

    let first_size = samples.get(1).map_or(0, |s| s.size_in_bytes);
    reserved.pcm_start_offset = (pcm_offset as u32).saturating_sub(first_size);
    reserved.size_in_bytes = first_size;
    samples[0] = reserved;
    Ok(samples)
}

fn check_pcm_length(module: &Module) {
    let available = module.pcm_offset as u64 + module.pcm.len() as u64;
    for (index, sample) in module.audio_samples() {
        let end = sample.pcm_end_offset() as u64;
        if sample.size_in_bytes > 0 && end > available {
            tracing::warn!(
                sample = index,
                missing = end - available.max(sample.pcm_start_offset as u64),
                "sample data truncated, clamping"
            );
        }
    }
}

fn require(data: &[u8], needed: usize) -> Result<(), FormatError> {
    if data.len() < needed {
        return Err(FormatError::Truncated {
            needed,
            len: data.len(),
        });
    }
    Ok(())
}

/// NUL-padded text field as a fixed-capacity string. Stops at the first NUL
/// and drops characters that do not fit.
fn fixed_text<const N: usize>(bytes: &[u8]) -> ArrayString<N> {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    let mut text = ArrayString::new();
    for c in String::from_utf8_lossy(&bytes[..end]).trim_end().chars() {
        if text.try_push(c).is_err() {
            break;
        }
    }
    text
}
