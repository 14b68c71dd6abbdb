//! Pitch-to-playback-rate conversion for sample playback.
//!
//! A sample played at the reference pitch (period 428) is read at
//! `c4_speed` frames per second. Other periods scale that inversely.

use mp_ir::pitch::{pitch_to_period, REFERENCE_PERIOD, REFERENCE_PITCH};

/// Standard Amiga playback rate of the reference pitch, in Hz.
pub const C4_SPEED: u32 = 8363;

/// Source frame rate for a period code.
///
/// Formula: rate = c4_speed * 428 / period. Returns 0 for period 0.
pub fn period_to_rate(period: u16, c4_speed: u32) -> u32 {
    if period == 0 {
        return 0;
    }
    (c4_speed as u64 * REFERENCE_PERIOD as u64 / period as u64) as u32
}

/// Source frame rate for a semitone pitch.
///
/// Pitches inside the period table go through the hardware period so live
/// playback matches the tracker exactly; pitches outside it fall back to
/// equal temperament around the reference pitch.
pub fn pitch_to_rate(pitch: u8, c4_speed: u32) -> u32 {
    match pitch_to_period(pitch) {
        0 => shift_frequency(c4_speed, pitch as i16 - REFERENCE_PITCH as i16),
        period => period_to_rate(period, c4_speed),
    }
}

/// Shift a frequency by a number of semitones using 12-TET.
/// Positive = higher pitch, negative = lower pitch.
fn shift_frequency(base_freq: u32, semitones: i16) -> u32 {
    let octaves = semitones.div_euclid(12);
    let remainder = semitones.rem_euclid(12) as usize;

    // round(2^(n/12) * 65536)
    const SEMITONE_MUL: [u32; 12] = [
        65536, 69433, 73562, 77936, 82570, 87480, 92682, 98193, 104032, 110218, 116772, 123715,
    ];

    let freq = (base_freq as u64 * SEMITONE_MUL[remainder] as u64) >> 16;

    if octaves >= 0 {
        (freq << octaves as u32).min(u32::MAX as u64) as u32
    } else {
        (freq >> (-octaves) as u32) as u32
    }
}
