//! Standard MIDI File export.
//!
//! Produces a format 0 file with one track. Every event has delta-time 0;
//! timing is carried by tempo meta events and the per-row text events a
//! player paces itself on.

use std::io::{self, Write};

use mp_engine::{schedule_song, Timing, Velocities};
use mp_ir::{EventReceiver, Module, PlaybackEvent};

const META: u8 = 0xFF;
const META_TEXT: u8 = 0x01;
const META_TEMPO: u8 = 0x51;
const META_END_OF_TRACK: u8 = 0x2F;

/// Export settings.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MidiOptions {
    /// Ticks per quarter note declared in the header
    pub division: u16,
    pub note_velocity: u8,
    pub release_velocity: u8,
}

impl Default for MidiOptions {
    fn default() -> Self {
        let velocities = Velocities::default();
        Self {
            division: 96,
            note_velocity: velocities.note,
            release_velocity: velocities.release,
        }
    }
}

impl MidiOptions {
    fn velocities(&self) -> Velocities {
        Velocities {
            note: self.note_velocity,
            release: self.release_velocity,
        }
    }
}

/// Collects playback events as track bytes.
#[derive(Debug, Default)]
pub struct MidiTrackWriter {
    track: Vec<u8>,
    events: usize,
}

impl MidiTrackWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Events written so far, excluding end-of-track.
    pub fn event_count(&self) -> usize {
        self.events
    }

    fn channel_event(&mut self, bytes: &[u8]) {
        self.track.push(0);
        self.track.extend_from_slice(bytes);
        self.events += 1;
    }

    fn meta_event(&mut self, kind: u8, data: &[u8]) {
        self.track.extend_from_slice(&[0, META, kind]);
        write_vlq(&mut self.track, data.len() as u32);
        self.track.extend_from_slice(data);
        self.events += 1;
    }

    /// Append end-of-track and return the track body.
    pub fn finish(mut self) -> Vec<u8> {
        self.track.extend_from_slice(&[0, META, META_END_OF_TRACK, 0]);
        self.track
    }
}

impl EventReceiver for MidiTrackWriter {
    fn receive(&mut self, event: &PlaybackEvent) {
        let Some(status) = event.status() else {
            match event {
                PlaybackEvent::Tempo { micros_per_quarter } => {
                    let [_, hi, mid, lo] = micros_per_quarter.to_be_bytes();
                    self.meta_event(META_TEMPO, &[hi, mid, lo]);
                }
                PlaybackEvent::Row(status) => {
                    self.meta_event(META_TEXT, status.to_string().as_bytes());
                }
                _ => {}
            }
            return;
        };
        match *event {
            PlaybackEvent::NoteOff { pitch, velocity, .. }
            | PlaybackEvent::NoteOn { pitch, velocity, .. } => {
                self.channel_event(&[status, pitch & 0x7F, velocity & 0x7F])
            }
            PlaybackEvent::ProgramChange { program, .. } => {
                self.channel_event(&[status, program & 0x7F])
            }
            PlaybackEvent::Tempo { .. } | PlaybackEvent::Row(_) => {}
        }
    }
}

/// Encode a whole song as a Standard MIDI File.
///
/// The track opens with the default tempo, then carries every row's
/// events in sequencing order and ends with note-offs for anything still
/// sounding.
pub fn encode_midi(module: &Module, options: &MidiOptions) -> Vec<u8> {
    let mut writer = MidiTrackWriter::new();
    writer.receive(&PlaybackEvent::Tempo {
        micros_per_quarter: Timing::default().micros_per_quarter(),
    });
    schedule_song(module, options.velocities(), &mut writer);
    let events = writer.event_count();
    let track = writer.finish();

    let mut out = Vec::with_capacity(14 + 8 + track.len());
    out.extend_from_slice(b"MThd");
    out.extend_from_slice(&6u32.to_be_bytes());
    out.extend_from_slice(&0u16.to_be_bytes()); // format 0
    out.extend_from_slice(&1u16.to_be_bytes()); // 1 track
    out.extend_from_slice(&options.division.to_be_bytes());
    out.extend_from_slice(b"MTrk");
    out.extend_from_slice(&(track.len() as u32).to_be_bytes());
    out.extend_from_slice(&track);

    tracing::debug!(events, bytes = out.len(), "encoded midi");
    out
}

/// Encode and write a Standard MIDI File.
pub fn write_midi<W: Write>(mut writer: W, module: &Module, options: &MidiOptions) -> io::Result<()> {
    writer.write_all(&encode_midi(module, options))?;
    writer.flush()
}

/// Write a MIDI variable-length quantity.
fn write_vlq(buf: &mut Vec<u8>, mut value: u32) {
    let mut bytes = [0u8; 5];
    let mut i = 4;
    bytes[i] = (value & 0x7F) as u8;
    value >>= 7;
    while value > 0 {
        i -= 1;
        bytes[i] = ((value & 0x7F) | 0x80) as u8;
        value >>= 7;
    }
    buf.extend_from_slice(&bytes[i..]);
}
