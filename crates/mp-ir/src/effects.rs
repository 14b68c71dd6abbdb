//! Effect column decoding.
//!
//! Only the commands that change sequencing are given their own variants.
//! Everything else is carried through untouched for renderers that want it.

/// Command nibble for pattern break.
pub const EFFECT_PATTERN_BREAK: u8 = 0xD;

/// Command nibble for set speed / set tempo.
pub const EFFECT_SET_SPEED_TEMPO: u8 = 0xF;

/// Speed/tempo parameters below this value set speed, at or above set tempo.
const TEMPO_THRESHOLD: u8 = 0x20;

/// A decoded effect column.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Effect {
    /// No effect
    #[default]
    None,
    /// Set ticks per row (1-31)
    SetSpeed(u8),
    /// Set beats per minute (32-255)
    SetTempo(u8),
    /// Jump to the next order. Carries the row the tracker intended to
    /// land on, which playback ignores (it always lands on row 0).
    PatternBreak(u8),
    /// Any other command, passed through uninterpreted
    Other { command: u8, param: u8 },
}

impl Effect {
    /// Decode an effect command nibble and parameter byte.
    pub const fn decode(command: u8, param: u8) -> Self {
        match command {
            EFFECT_SET_SPEED_TEMPO => match param {
                0 => Effect::None,
                p if p < TEMPO_THRESHOLD => Effect::SetSpeed(p),
                p => Effect::SetTempo(p),
            },
            EFFECT_PATTERN_BREAK => {
                let row = (param >> 4) * 10 + (param & 0x0F);
                Effect::PatternBreak(if row > 63 { 63 } else { row })
            }
            0 if param == 0 => Effect::None,
            _ => Effect::Other { command, param },
        }
    }

    /// True for effects the sequencer acts on.
    pub const fn affects_sequencing(&self) -> bool {
        matches!(
            self,
            Effect::SetSpeed(_) | Effect::SetTempo(_) | Effect::PatternBreak(_)
        )
    }
}
