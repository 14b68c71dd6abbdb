//! Playback events produced by the sequencer and consumed by the mixer and
//! the MIDI encoder.

use core::fmt;

use crate::pattern::{NoteCell, CHANNELS};
use crate::pitch::PitchName;

/// MIDI status nibble for note off.
pub const NOTE_OFF: u8 = 0x80;
/// MIDI status nibble for note on.
pub const NOTE_ON: u8 = 0x90;
/// MIDI status nibble for program change.
pub const PROGRAM_CHANGE: u8 = 0xC0;

/// One event emitted while walking the song.
///
/// Order matters: a program change for a channel always precedes the
/// note-on that should use it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlaybackEvent {
    /// Release the note sounding on a channel
    NoteOff { channel: u8, pitch: u8, velocity: u8 },
    /// Select sample `program + 1` for a channel
    ProgramChange { channel: u8, program: u8 },
    /// Start a note
    NoteOn { channel: u8, pitch: u8, velocity: u8 },
    /// Speed or tempo changed
    Tempo { micros_per_quarter: u32 },
    /// Row marker carrying the row's contents
    Row(RowStatus),
}

impl PlaybackEvent {
    /// MIDI status byte for channel events.
    pub const fn status(&self) -> Option<u8> {
        match *self {
            PlaybackEvent::NoteOff { channel, .. } => Some(NOTE_OFF | (channel & 0x0F)),
            PlaybackEvent::NoteOn { channel, .. } => Some(NOTE_ON | (channel & 0x0F)),
            PlaybackEvent::ProgramChange { channel, .. } => {
                Some(PROGRAM_CHANGE | (channel & 0x0F))
            }
            PlaybackEvent::Tempo { .. } | PlaybackEvent::Row(_) => None,
        }
    }
}

/// Position and contents of one sequenced row.
///
/// Displays as a status line: `"OO/RR | C-4 01 F06 | --- -- 000 | ..."`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RowStatus {
    pub order: u16,
    pub row: u8,
    pub cells: [NoteCell; CHANNELS],
}

impl fmt::Display for RowStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02X}/{:02X}", self.order, self.row)?;
        for cell in &self.cells {
            f.write_str(" | ")?;
            match cell.pitch() {
                Some(pitch) => write!(f, "{}", PitchName(pitch))?,
                None => f.write_str("---")?,
            }
            match cell.sample_index {
                0 => f.write_str(" --")?,
                s => write!(f, " {:02X}", s)?,
            }
            write!(f, " {:X}{:02X}", cell.effect_command, cell.effect_param)?;
        }
        Ok(())
    }
}

/// Something that consumes playback events in order.
pub trait EventReceiver {
    /// Handle one event.
    fn receive(&mut self, event: &PlaybackEvent);
}

impl<R: EventReceiver + ?Sized> EventReceiver for &mut R {
    fn receive(&mut self, event: &PlaybackEvent) {
        (**self).receive(event);
    }
}

impl EventReceiver for alloc::vec::Vec<PlaybackEvent> {
    fn receive(&mut self, event: &PlaybackEvent) {
        self.push(*event);
    }
}
