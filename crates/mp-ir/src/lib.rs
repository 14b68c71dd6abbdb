//! Core song model for the modport tracker toolkit.
//!
//! This crate defines the decoded in-memory representation of a
//! four-channel tracker module. The decoder in `mp-formats` produces a
//! [`Module`]; the sequencer, mixer and encoders only ever read it.
//!
//! Designed to be `no_std` compatible with the `alloc` crate.

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

mod effects;
mod event;
mod module;
mod pattern;
pub mod pitch;
mod sample;

pub use effects::{Effect, EFFECT_PATTERN_BREAK, EFFECT_SET_SPEED_TEMPO};
pub use event::{
    EventReceiver, PlaybackEvent, RowStatus, NOTE_OFF, NOTE_ON, PROGRAM_CHANGE,
};
pub use module::{FormatVariant, Layout, Module, MAGIC_OFFSET, ORDER_TABLE_LEN, STANDARD_MAGIC};
pub use pattern::{NoteCell, Pattern, CHANNELS, PATTERN_BYTES, ROWS};
pub use pitch::{period_to_pitch, pitch_to_period, PitchName};
pub use sample::{Sample, SAMPLE_HEADER_LEN};
