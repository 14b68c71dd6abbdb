//! Row-to-event scheduling.
//!
//! Turns sequenced rows into [`PlaybackEvent`]s. Both live playback and
//! MIDI export run the same scheduler over the same [`Sequencer`], so the
//! two outputs cannot disagree about what the song contains.

use mp_ir::{EventReceiver, Module, NoteCell, PlaybackEvent, CHANNELS};

use crate::sequencer::{SequencedRow, Sequencer};

/// Velocity of every note-on.
pub const NOTE_VELOCITY: u8 = 0x60;

/// Velocity of every note-off.
pub const RELEASE_VELOCITY: u8 = 0x40;

/// Upper bound on events one row can produce: three per channel, a tempo
/// change and the row marker.
pub const MAX_ROW_EVENTS: usize = CHANNELS * 3 + 2;

/// Events produced for one row, in emission order.
pub type RowEvents = heapless::Vec<PlaybackEvent, MAX_ROW_EVENTS>;

/// Fixed velocities stamped on note events.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Velocities {
    pub note: u8,
    pub release: u8,
}

impl Default for Velocities {
    fn default() -> Self {
        Self {
            note: NOTE_VELOCITY,
            release: RELEASE_VELOCITY,
        }
    }
}

#[derive(Clone, Copy, Debug, Default)]
struct ChannelMemory {
    /// Pitch of the note still sounding
    sounding: Option<u8>,
    /// Last program sent
    program: Option<u8>,
}

/// Tracks per-channel note and program state between rows.
#[derive(Clone, Debug, Default)]
pub struct RowScheduler {
    channels: [ChannelMemory; CHANNELS],
    velocities: Velocities,
}

impl RowScheduler {
    pub fn new(velocities: Velocities) -> Self {
        Self {
            channels: [ChannelMemory::default(); CHANNELS],
            velocities,
        }
    }

    /// Events for one row.
    ///
    /// Per channel: note-off for the previous note when a new one starts,
    /// program change when the sample changes, note-on. Then a tempo event
    /// if speed or tempo changed, then the row marker.
    pub fn schedule_row(&mut self, row: &SequencedRow) -> RowEvents {
        let mut events = RowEvents::new();
        for (ch, cell) in row.cells().iter().enumerate() {
            self.schedule_cell(ch as u8, cell, &mut events);
        }
        if row.directive.timing_changed {
            push(
                &mut events,
                PlaybackEvent::Tempo {
                    micros_per_quarter: row.timing.micros_per_quarter(),
                },
            );
        }
        push(&mut events, PlaybackEvent::Row(row.status));
        events
    }

    fn schedule_cell(&mut self, channel: u8, cell: &NoteCell, events: &mut RowEvents) {
        let memory = &mut self.channels[channel as usize];
        let pitch = cell.pitch();

        if pitch.is_some() {
            if let Some(previous) = memory.sounding.take() {
                push(
                    events,
                    PlaybackEvent::NoteOff {
                        channel,
                        pitch: previous,
                        velocity: self.velocities.release,
                    },
                );
            }
        }

        if cell.sample_index != 0 {
            let program = cell.sample_index - 1;
            if memory.program != Some(program) {
                memory.program = Some(program);
                push(events, PlaybackEvent::ProgramChange { channel, program });
            }
        }

        if let Some(pitch) = pitch {
            memory.sounding = Some(pitch);
            push(
                events,
                PlaybackEvent::NoteOn {
                    channel,
                    pitch,
                    velocity: self.velocities.note,
                },
            );
        }
    }

    /// Note-offs for everything still sounding.
    pub fn release_all(&mut self) -> RowEvents {
        let mut events = RowEvents::new();
        for (ch, memory) in self.channels.iter_mut().enumerate() {
            if let Some(pitch) = memory.sounding.take() {
                push(
                    &mut events,
                    PlaybackEvent::NoteOff {
                        channel: ch as u8,
                        pitch,
                        velocity: self.velocities.release,
                    },
                );
            }
        }
        events
    }
}

fn push(events: &mut RowEvents, event: PlaybackEvent) {
    // capacity covers the worst case row
    let _ = events.push(event);
}

/// Walk a whole song, feeding every event to `receiver` in order.
///
/// Ends with note-offs for notes still sounding when the order list wraps.
pub fn schedule_song<R: EventReceiver + ?Sized>(
    module: &Module,
    velocities: Velocities,
    receiver: &mut R,
) {
    let mut scheduler = RowScheduler::new(velocities);
    for row in Sequencer::new(module) {
        for event in scheduler.schedule_row(&row) {
            receiver.receive(&event);
        }
    }
    for event in scheduler.release_all() {
        receiver.receive(&event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec::Vec;
    use mp_ir::Pattern;

    fn note(sample: u8, period: u16) -> NoteCell {
        NoteCell { sample_index: sample, period_code: period, ..NoteCell::default() }
    }

    fn module_with(pattern: Pattern) -> Module {
        Module { patterns: alloc::vec![pattern], ..Module::default() }
    }

    fn song_events(module: &Module) -> Vec<PlaybackEvent> {
        let mut events = Vec::new();
        schedule_song(module, Velocities::default(), &mut events);
        events
    }

    fn channel_events(events: &[PlaybackEvent]) -> Vec<PlaybackEvent> {
        events
            .iter()
            .filter(|e| e.status().is_some())
            .copied()
            .collect()
    }

    #[test]
    fn program_change_precedes_first_note() {
        let mut pattern = Pattern::new();
        *pattern.cell_mut(0, 0) = note(1, 428);
        let events = channel_events(&song_events(&module_with(pattern)));

        assert_eq!(
            events,
            [
                PlaybackEvent::ProgramChange { channel: 0, program: 0 },
                PlaybackEvent::NoteOn { channel: 0, pitch: 60, velocity: NOTE_VELOCITY },
                PlaybackEvent::NoteOff { channel: 0, pitch: 60, velocity: RELEASE_VELOCITY },
            ]
        );
    }

    #[test]
    fn new_note_releases_previous() {
        let mut pattern = Pattern::new();
        *pattern.cell_mut(0, 1) = note(2, 428);
        *pattern.cell_mut(4, 1) = note(0, 214);
        let events = channel_events(&song_events(&module_with(pattern)));

        assert_eq!(
            events,
            [
                PlaybackEvent::ProgramChange { channel: 1, program: 1 },
                PlaybackEvent::NoteOn { channel: 1, pitch: 60, velocity: NOTE_VELOCITY },
                PlaybackEvent::NoteOff { channel: 1, pitch: 60, velocity: RELEASE_VELOCITY },
                PlaybackEvent::NoteOn { channel: 1, pitch: 72, velocity: NOTE_VELOCITY },
                PlaybackEvent::NoteOff { channel: 1, pitch: 72, velocity: RELEASE_VELOCITY },
            ]
        );
    }

    #[test]
    fn repeated_sample_sends_one_program_change() {
        let mut pattern = Pattern::new();
        *pattern.cell_mut(0, 0) = note(3, 428);
        *pattern.cell_mut(1, 0) = note(3, 404);
        *pattern.cell_mut(2, 0) = note(4, 381);
        let events = song_events(&module_with(pattern));
        let programs: Vec<u8> = events
            .iter()
            .filter_map(|e| match e {
                PlaybackEvent::ProgramChange { program, .. } => Some(*program),
                _ => None,
            })
            .collect();
        assert_eq!(programs, [2, 3]);
    }

    #[test]
    fn sample_without_note_only_changes_program() {
        let mut pattern = Pattern::new();
        *pattern.cell_mut(0, 3) = note(5, 0);
        let events = channel_events(&song_events(&module_with(pattern)));
        assert_eq!(events, [PlaybackEvent::ProgramChange { channel: 3, program: 4 }]);
    }

    #[test]
    fn tempo_event_follows_notes_and_precedes_row_marker() {
        let mut pattern = Pattern::new();
        *pattern.cell_mut(0, 0) = note(1, 428);
        pattern.cell_mut(0, 1).effect_command = 0xF;
        pattern.cell_mut(0, 1).effect_param = 3;
        let module = module_with(pattern);

        let mut seq = Sequencer::new(&module);
        let row = seq.next().unwrap();
        let events = RowScheduler::default().schedule_row(&row);

        assert!(matches!(events[0], PlaybackEvent::ProgramChange { .. }));
        assert!(matches!(events[1], PlaybackEvent::NoteOn { .. }));
        // speed 3 at tempo 125: 60ms rows, 240ms quarters
        assert_eq!(events[2], PlaybackEvent::Tempo { micros_per_quarter: 240_000 });
        assert!(matches!(events[3], PlaybackEvent::Row(status) if status.row == 0));
        assert_eq!(events.len(), 4);
    }

    #[test]
    fn one_row_marker_per_row() {
        let module = Module { song_length: 2, ..Module::default() };
        let rows = song_events(&module)
            .iter()
            .filter(|e| matches!(e, PlaybackEvent::Row(_)))
            .count();
        assert_eq!(rows, 128);
    }

    #[test]
    fn busiest_row_fits() {
        let mut scheduler = RowScheduler::default();
        let mut pattern = Pattern::new();
        for ch in 0..CHANNELS {
            *pattern.cell_mut(0, ch) = note(1, 428);
            *pattern.cell_mut(1, ch) = note(2, 404);
        }
        pattern.cell_mut(1, 0).effect_command = 0xF;
        pattern.cell_mut(1, 0).effect_param = 0x80;
        let module = module_with(pattern);
        let mut seq = Sequencer::new(&module);
        scheduler.schedule_row(&seq.next().unwrap());
        let events = scheduler.schedule_row(&seq.next().unwrap());
        assert_eq!(events.len(), MAX_ROW_EVENTS);
    }
}
