//! Sequencing and mixing for modport.
//!
//! Walks a decoded [`mp_ir::Module`] row by row, turns rows into
//! playback events, and renders those events to PCM with an
//! integer-exact resampling mixer.

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

mod frequency;
mod mixer;
pub mod scheduler;
pub mod sequencer;
mod voice;

pub use frequency::{period_to_rate, pitch_to_rate, C4_SPEED};
pub use mixer::{volume_scale, Mixer, MixerConfig};
pub use scheduler::{schedule_song, RowEvents, RowScheduler, Velocities};
pub use sequencer::{
    SequencedRow, Sequencer, SequencerCursor, SequencingDirective, Timing, DEFAULT_SPEED,
    DEFAULT_TEMPO,
};
pub use voice::{SampleBounds, Voice};
