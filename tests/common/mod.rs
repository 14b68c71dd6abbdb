//! Synthetic module files for the workspace tests.

#![allow(dead_code)]

use mp_ir::{NoteCell, PATTERN_BYTES};

/// Period of middle C.
pub const C4: u16 = 428;
/// Period one octave up.
pub const C5: u16 = 214;

pub fn note(sample: u8, period: u16) -> NoteCell {
    NoteCell { sample_index: sample, period_code: period, ..NoteCell::default() }
}

pub fn effect(command: u8, param: u8) -> NoteCell {
    NoteCell { effect_command: command, effect_param: param, ..NoteCell::default() }
}

/// A STANDARD module with a looped square wave in slot 1, a one-shot
/// ramp in slot 2 and two patterns played in order 0, 1, 0.
///
/// Pattern 0 runs at speed 3 and starts both samples; pattern 1 changes
/// the tempo, moves the square up an octave and breaks at row 8.
pub fn demo_song() -> Vec<u8> {
    let mut patterns = vec![[0u8; PATTERN_BYTES]; 2];
    let mut put = |pattern: usize, row: usize, channel: usize, cell: NoteCell| {
        let at = (row * 4 + channel) * 4;
        patterns[pattern][at..at + 4].copy_from_slice(&cell.to_packed().to_be_bytes());
    };
    put(0, 0, 0, note(1, C4));
    put(0, 0, 3, effect(0xF, 3));
    put(0, 16, 1, note(2, C4));
    put(0, 32, 0, note(1, C5));
    put(0, 48, 2, note(2, 320));
    put(1, 0, 0, note(1, C5));
    put(1, 0, 3, effect(0xF, 150));
    put(1, 4, 1, note(2, 856));
    put(1, 8, 3, effect(0xD, 0));

    let square: Vec<u8> = (0..256).map(|i| if i % 32 < 16 { 0x50 } else { 0xB0 }).collect();
    let ramp: Vec<u8> = (0..512).map(|i| (i % 256) as u8).collect();

    let mut out = vec![0u8; 1084];
    out[..4].copy_from_slice(b"demo");
    write_header(&mut out, 20, "square", square.len(), 16, 64);
    write_header(&mut out, 50, "ramp", ramp.len(), 0, 1);
    out[950] = 3;
    out[951] = 127;
    out[952..955].copy_from_slice(&[0, 1, 0]);
    out[1080..1084].copy_from_slice(b"M.K.");
    for pattern in &patterns {
        out.extend_from_slice(pattern);
    }
    out.extend_from_slice(&square);
    out.extend_from_slice(&ramp);
    out
}

fn write_header(out: &mut [u8], at: usize, name: &str, len: usize, loop_start: u16, loop_len: u16) {
    out[at..at + name.len()].copy_from_slice(name.as_bytes());
    out[at + 22..at + 24].copy_from_slice(&((len / 2) as u16).to_be_bytes());
    out[at + 25] = 64;
    out[at + 26..at + 28].copy_from_slice(&loop_start.to_be_bytes());
    out[at + 28..at + 30].copy_from_slice(&loop_len.to_be_bytes());
}
