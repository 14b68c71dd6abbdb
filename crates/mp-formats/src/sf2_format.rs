//! SoundFont2 bank export.
//!
//! Every sample slot after the reserved one becomes a preset with a single
//! instrument zone playing that sample, so MIDI program `n` selects slot
//! `n + 1` exactly as the MIDI export expects.

use std::io::{self, Write};

use mp_engine::{SampleBounds, C4_SPEED};
use mp_ir::Module;

use crate::riff::{chunk, list, RecordWriter};

const NAME_LEN: usize = 20;
const PHDR_LEN: usize = 38;
const INST_LEN: usize = 22;
const SHDR_LEN: usize = 46;
/// Terminal modulator record
const MOD_TERMINAL: [u8; 10] = [0; 10];

const GEN_INSTRUMENT: u16 = 41;
const GEN_SAMPLE_MODES: u16 = 54;
const GEN_SAMPLE_ID: u16 = 53;
/// sampleModes value: loop while the key is held
const LOOP_CONTINUOUSLY: u16 = 3;

const ROOT_KEY: u8 = 60;
const MONO_SAMPLE: u16 = 1;

/// Bank metadata.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SoundFontOptions {
    /// Sound engine named in the INFO list
    pub engine: String,
    /// Bank name; the song name when unset
    pub bank_name: Option<String>,
    /// Rate at which a sample plays back at the root key
    pub root_sample_rate: u32,
}

impl Default for SoundFontOptions {
    fn default() -> Self {
        Self {
            engine: "modport".into(),
            bank_name: None,
            root_sample_rate: C4_SPEED,
        }
    }
}

/// 8-bit PCM to 16-bit little-endian words, each byte becoming the high
/// byte of its word.
pub fn upconvert_pcm(pcm: &[i8]) -> Vec<u8> {
    pcm.iter().flat_map(|&b| [0, b as u8]).collect()
}

/// One preset/instrument/sample triple.
struct Zone {
    name: String,
    start: u32,
    end: u32,
    loop_start: u32,
    loop_end: u32,
    looped: bool,
}

impl Zone {
    fn instrument_generators(&self) -> u16 {
        if self.looped {
            2
        } else {
            1
        }
    }
}

fn zones(module: &Module) -> Vec<Zone> {
    module
        .audio_samples()
        .map(|(index, sample)| {
            let (start, end) = module.sample_range(index).unwrap_or_default();
            let (start, end) = (start as u32, end as u32);
            // same loop the mixer plays: non-empty and inside the data
            let (looped, loop_start, loop_end) = match SampleBounds::from_module(module, index) {
                Some(bounds) if bounds.looped => {
                    (true, bounds.loop_start as u32, bounds.end as u32)
                }
                _ => (false, start, start),
            };
            let name = if sample.name.is_empty() {
                format!("sample {index:02}")
            } else {
                sample.name.to_string()
            };
            Zone { name, start, end, loop_start, loop_end, looped }
        })
        .collect()
}

/// Encode a module's sample set as an SF2 bank.
pub fn encode_soundfont(module: &Module, options: &SoundFontOptions) -> Vec<u8> {
    let zones = zones(module);
    let count = zones.len() as u16;

    let mut phdr = Vec::with_capacity((zones.len() + 1) * PHDR_LEN);
    let mut pbag = Vec::new();
    let mut pgen = Vec::new();
    let mut inst = Vec::with_capacity((zones.len() + 1) * INST_LEN);
    let mut ibag = Vec::new();
    let mut igen = Vec::new();
    let mut shdr = Vec::with_capacity((zones.len() + 1) * SHDR_LEN);
    let mut igen_index = 0u16;

    for (i, zone) in zones.iter().enumerate() {
        let i = i as u16;

        phdr.put_text(&zone.name, NAME_LEN);
        phdr.put_u16(i); // preset
        phdr.put_u16(0); // bank
        phdr.put_u16(i); // bag
        phdr.resize(phdr.len() + 12, 0); // library, genre, morphology

        pbag.put_u16(i);
        pbag.put_u16(0);
        pgen.put_u16(GEN_INSTRUMENT);
        pgen.put_u16(i);

        inst.put_text(&zone.name, NAME_LEN);
        inst.put_u16(i);

        ibag.put_u16(igen_index);
        ibag.put_u16(0);
        igen_index += zone.instrument_generators();
        if zone.looped {
            igen.put_u16(GEN_SAMPLE_MODES);
            igen.put_u16(LOOP_CONTINUOUSLY);
        }
        igen.put_u16(GEN_SAMPLE_ID);
        igen.put_u16(i);

        shdr.put_text(&zone.name, NAME_LEN);
        shdr.put_u32(zone.start);
        shdr.put_u32(zone.end);
        shdr.put_u32(zone.loop_start);
        shdr.put_u32(zone.loop_end);
        shdr.put_u32(options.root_sample_rate);
        shdr.put_u8(ROOT_KEY);
        shdr.put_u8(0); // pitch correction
        shdr.put_u16(0); // sample link
        shdr.put_u16(MONO_SAMPLE);
    }

    phdr.put_text("EOP", NAME_LEN);
    phdr.put_u16(0);
    phdr.put_u16(0);
    phdr.put_u16(count);
    phdr.resize(phdr.len() + 12, 0);
    pbag.put_u16(count);
    pbag.put_u16(0);
    pgen.put_u32(0);

    inst.put_text("EOI", NAME_LEN);
    inst.put_u16(count);
    ibag.put_u16(igen_index);
    ibag.put_u16(0);
    igen.put_u32(0);

    shdr.put_text("EOS", NAME_LEN);
    shdr.resize(shdr.len() + SHDR_LEN - NAME_LEN, 0);

    let bank_name = options
        .bank_name
        .as_deref()
        .unwrap_or(module.song_name.as_str());

    let bytes = list(
        b"RIFF",
        b"sfbk",
        &[
            list(
                b"LIST",
                b"INFO",
                &[
                    chunk(b"ifil", &[2, 0, 1, 0]),
                    chunk(b"isng", &nul_terminated(&options.engine)),
                    chunk(b"INAM", &nul_terminated(bank_name)),
                ],
            ),
            list(b"LIST", b"sdta", &[chunk(b"smpl", &upconvert_pcm(module.pcm_blob()))]),
            list(
                b"LIST",
                b"pdta",
                &[
                    chunk(b"phdr", &phdr),
                    chunk(b"pbag", &pbag),
                    chunk(b"pmod", &MOD_TERMINAL),
                    chunk(b"pgen", &pgen),
                    chunk(b"inst", &inst),
                    chunk(b"ibag", &ibag),
                    chunk(b"imod", &MOD_TERMINAL),
                    chunk(b"igen", &igen),
                    chunk(b"shdr", &shdr),
                ],
            ),
        ],
    );

    tracing::debug!(
        presets = count,
        pcm_frames = module.pcm_blob().len(),
        bytes = bytes.len(),
        "encoded soundfont"
    );
    bytes
}

/// Encode and write an SF2 bank.
pub fn write_soundfont<W: Write>(
    mut writer: W,
    module: &Module,
    options: &SoundFontOptions,
) -> io::Result<()> {
    writer.write_all(&encode_soundfont(module, options))?;
    writer.flush()
}

fn nul_terminated(text: &str) -> Vec<u8> {
    let mut bytes = text.as_bytes().to_vec();
    bytes.push(0);
    bytes
}
