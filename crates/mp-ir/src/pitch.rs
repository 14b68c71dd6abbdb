//! Conversion between hardware period codes and semitone pitches.
//!
//! Pitch 60 is the reference middle pitch and corresponds to period 428.
//! Period to pitch is computed; pitch to period is a table lookup, because
//! the hardware periods are not exactly log-spaced and rounding the inverse
//! formula would not reproduce them.

use core::fmt;

/// The reference pitch (middle C).
pub const REFERENCE_PITCH: u8 = 60;

/// Period code of the reference pitch.
pub const REFERENCE_PERIOD: u16 = 428;

/// Pitch of the first entry in [`PERIODS`].
pub const LOWEST_PITCH: u8 = 48;

/// Canonical period codes for pitches 48..=83, three octaves.
pub const PERIODS: [u16; 36] = [
    856, 808, 762, 720, 678, 640, 604, 570, 538, 508, 480, 453, //
    428, 404, 381, 360, 339, 320, 302, 285, 269, 254, 240, 226, //
    214, 202, 190, 180, 170, 160, 151, 143, 135, 127, 120, 113, //
];

/// Convert a period code to the nearest semitone pitch.
///
/// `pitch = round(60 + 12 * log2(428 / period))`, clamped to 0..=127.
/// Returns `None` for period 0 (no note).
pub fn period_to_pitch(period: u16) -> Option<u8> {
    if period == 0 {
        return None;
    }
    let ratio = REFERENCE_PERIOD as f64 / period as f64;
    let pitch = libm::round(REFERENCE_PITCH as f64 + 12.0 * libm::log2(ratio));
    Some(pitch.clamp(0.0, 127.0) as u8)
}

/// Look up the canonical period code for a pitch.
///
/// Returns 0 when the pitch lies outside the table.
pub fn pitch_to_period(pitch: u8) -> u16 {
    pitch
        .checked_sub(LOWEST_PITCH)
        .and_then(|i| PERIODS.get(i as usize))
        .copied()
        .unwrap_or(0)
}

/// Tracker-style note name, e.g. `C-4` or `F#5`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PitchName(pub u8);

impl fmt::Display for PitchName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const NAMES: [&str; 12] = [
            "C-", "C#", "D-", "D#", "E-", "F-", "F#", "G-", "G#", "A-", "A#", "B-",
        ];
        let octave = self.0 as i16 / 12 - 1;
        write!(f, "{}{}", NAMES[self.0 as usize % 12], octave)
    }
}
