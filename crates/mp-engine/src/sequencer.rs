//! Row/order sequencing over an immutable module.
//!
//! The only mutable state is a [`SequencerCursor`]: a linear row counter
//! from which order, row and loop count are derived. The sequencer never
//! blocks. Pacing rows in real time is up to whoever drives it.

use core::time::Duration;

use mp_ir::{Effect, Module, NoteCell, RowStatus, CHANNELS, ROWS};

/// Ticks per row at song start.
pub const DEFAULT_SPEED: u8 = 6;

/// Beats per minute at song start.
pub const DEFAULT_TEMPO: u8 = 125;

/// Rows per quarter note when converting to MIDI tempo.
pub const ROWS_PER_BEAT: u32 = 4;

/// Position of the sequencer, as a linear row index.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SequencerCursor {
    pub linear_row: u32,
}

impl SequencerCursor {
    /// A cursor at the start of the song.
    pub const fn new() -> Self {
        Self { linear_row: 0 }
    }

    /// Index into the order list.
    pub const fn order(&self) -> usize {
        self.linear_row as usize / ROWS
    }

    /// Row within the current pattern (0-63).
    pub const fn row_in_pattern(&self) -> usize {
        self.linear_row as usize % ROWS
    }

    /// How many times the order list has been played through.
    pub const fn loop_count(&self, song_length: u8) -> u32 {
        if song_length == 0 {
            return 1;
        }
        (self.order() / song_length as usize) as u32
    }

    /// Move to the next row.
    pub fn advance(&mut self) {
        self.linear_row = self.linear_row.saturating_add(1);
    }
}

/// Speed and tempo in effect.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Timing {
    /// Ticks per row
    pub speed: u8,
    /// Beats per minute
    pub tempo: u8,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            speed: DEFAULT_SPEED,
            tempo: DEFAULT_TEMPO,
        }
    }
}

impl Timing {
    /// Duration of one row: `2_500_000 * speed / tempo` microseconds.
    pub const fn row_micros(&self) -> u32 {
        2_500_000 * self.speed as u32 / self.tempo as u32
    }

    /// Duration of one row.
    pub const fn row_duration(&self) -> Duration {
        Duration::from_micros(self.row_micros() as u64)
    }

    /// MIDI tempo: one quarter note is [`ROWS_PER_BEAT`] rows.
    pub const fn micros_per_quarter(&self) -> u32 {
        self.row_micros() * ROWS_PER_BEAT
    }
}

/// What the current row's effects ask of the driver.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SequencingDirective {
    /// Speed or tempo was set on this row
    pub timing_changed: bool,
    /// Skip to row 0 of the next order after this row
    pub pattern_break: bool,
}

/// One row as produced by [`Sequencer`]'s iterator.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SequencedRow {
    pub status: RowStatus,
    pub directive: SequencingDirective,
    /// Timing after this row's effects were applied
    pub timing: Timing,
}

impl SequencedRow {
    pub fn cells(&self) -> &[NoteCell; CHANNELS] {
        &self.status.cells
    }
}

/// Cursor over a module's order list and patterns.
///
/// Iterating yields every row once until the order list wraps, applying
/// speed/tempo and pattern break effects on the way.
#[derive(Clone, Debug)]
pub struct Sequencer<'a> {
    module: &'a Module,
    cursor: SequencerCursor,
    timing: Timing,
}

impl<'a> Sequencer<'a> {
    /// Start at the first row with default timing.
    pub fn new(module: &'a Module) -> Self {
        Self {
            module,
            cursor: SequencerCursor::new(),
            timing: Timing::default(),
        }
    }

    pub fn module(&self) -> &'a Module {
        self.module
    }

    pub fn cursor(&self) -> SequencerCursor {
        self.cursor
    }

    pub fn timing(&self) -> Timing {
        self.timing
    }

    pub fn order(&self) -> usize {
        self.cursor.order()
    }

    pub fn row_in_pattern(&self) -> usize {
        self.cursor.row_in_pattern()
    }

    /// Pattern index at the current order.
    pub fn pattern(&self) -> u8 {
        self.module.pattern_index(self.order()).unwrap_or(0)
    }

    pub fn loop_count(&self) -> u32 {
        self.cursor.loop_count(self.module.song_length)
    }

    /// True once the order list has wrapped.
    pub fn is_finished(&self) -> bool {
        self.loop_count() >= 1
    }

    /// The four cells at the cursor. Empty if the position has no pattern.
    pub fn cells(&self) -> [NoteCell; CHANNELS] {
        self.module
            .row_cells(self.order(), self.row_in_pattern())
            .copied()
            .unwrap_or_default()
    }

    /// Position and contents of the current row.
    pub fn status(&self) -> RowStatus {
        RowStatus {
            order: self.order() as u16,
            row: self.row_in_pattern() as u8,
            cells: self.cells(),
        }
    }

    /// Move to the next row, rolling into the next order after row 63.
    pub fn advance(&mut self) {
        self.cursor.advance();
    }

    /// Advance until the order changes, landing on row 0 of the next order.
    pub fn break_pattern(&mut self) {
        let order = self.order();
        while self.order() == order {
            self.advance();
        }
    }

    /// Apply the sequencing effects of a row's cells.
    ///
    /// Later channels win when several set the same thing.
    pub fn apply_row_effects(&mut self, cells: &[NoteCell; CHANNELS]) -> SequencingDirective {
        let mut directive = SequencingDirective::default();
        for cell in cells {
            match cell.effect() {
                Effect::SetSpeed(speed) => {
                    self.timing.speed = speed;
                    directive.timing_changed = true;
                }
                Effect::SetTempo(tempo) => {
                    self.timing.tempo = tempo;
                    directive.timing_changed = true;
                }
                Effect::PatternBreak(_) => directive.pattern_break = true,
                Effect::None | Effect::Other { .. } => {}
            }
        }
        directive
    }

    /// Move past a row according to its directive.
    pub fn step(&mut self, directive: SequencingDirective) {
        if directive.pattern_break {
            self.break_pattern();
        } else {
            self.advance();
        }
    }
}

impl Iterator for Sequencer<'_> {
    type Item = SequencedRow;

    fn next(&mut self) -> Option<SequencedRow> {
        if self.is_finished() {
            return None;
        }
        let status = self.status();
        let directive = self.apply_row_effects(&status.cells);
        let row = SequencedRow {
            status,
            directive,
            timing: self.timing,
        };
        self.step(directive);
        Some(row)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;
    use alloc::vec::Vec;
    use mp_ir::Pattern;

    fn module_with(patterns: Vec<Pattern>, orders: &[u8]) -> Module {
        let mut order_list = [0u8; 128];
        order_list[..orders.len()].copy_from_slice(orders);
        Module {
            song_length: orders.len() as u8,
            order_list,
            patterns,
            ..Module::default()
        }
    }

    fn effect(command: u8, param: u8) -> NoteCell {
        NoteCell { effect_command: command, effect_param: param, ..NoteCell::default() }
    }

    #[test]
    fn cursor_derives_order_and_row() {
        let cursor = SequencerCursor { linear_row: 64 * 3 + 17 };
        assert_eq!(cursor.order(), 3);
        assert_eq!(cursor.row_in_pattern(), 17);
        assert_eq!(cursor.loop_count(2), 1);
        assert_eq!(cursor.loop_count(4), 0);
    }

    #[test]
    fn default_row_duration_is_120ms() {
        let timing = Timing::default();
        assert_eq!(timing.row_micros(), 120_000);
        assert_eq!(timing.micros_per_quarter(), 480_000);
        assert_eq!(timing.row_duration(), Duration::from_millis(120));
    }

    #[test]
    fn advance_wraps_rows_into_orders() {
        let module = module_with(vec![Pattern::new(), Pattern::new()], &[0, 1]);
        let mut seq = Sequencer::new(&module);
        for _ in 0..63 {
            seq.advance();
        }
        assert_eq!((seq.order(), seq.row_in_pattern()), (0, 63));
        seq.advance();
        assert_eq!((seq.order(), seq.row_in_pattern()), (1, 0));
        assert_eq!(seq.pattern(), 1);
    }

    #[test]
    fn plays_every_row_once_then_stops() {
        let module = module_with(vec![Pattern::new()], &[0, 0, 0]);
        let rows = Sequencer::new(&module).count();
        assert_eq!(rows, 3 * ROWS);
    }

    #[test]
    fn speed_and_tempo_effects() {
        let module = module_with(vec![Pattern::new()], &[0]);
        let mut seq = Sequencer::new(&module);

        let cells = [effect(0xF, 3), effect(0xF, 150), NoteCell::default(), NoteCell::default()];
        let directive = seq.apply_row_effects(&cells);
        assert!(directive.timing_changed);
        assert!(!directive.pattern_break);
        assert_eq!(seq.timing(), Timing { speed: 3, tempo: 150 });
        assert_eq!(seq.timing().row_micros(), 50_000);
    }

    #[test]
    fn speed_zero_is_ignored() {
        let module = module_with(vec![Pattern::new()], &[0]);
        let mut seq = Sequencer::new(&module);
        let cells = [effect(0xF, 0), NoteCell::default(), NoteCell::default(), NoteCell::default()];
        let directive = seq.apply_row_effects(&cells);
        assert!(!directive.timing_changed);
        assert_eq!(seq.timing(), Timing::default());
    }

    #[test]
    fn pattern_break_lands_on_next_order_row_zero() {
        let mut pattern = Pattern::new();
        // parameter asks for row 0x32, which is ignored
        *pattern.cell_mut(5, 2) = effect(0xD, 0x32);
        let module = module_with(vec![pattern], &[0, 0]);
        let mut seq = Sequencer::new(&module);

        let rows: Vec<SequencedRow> = seq.by_ref().take(6).collect();
        assert!(rows[5].directive.pattern_break);
        assert_eq!(rows[5].status.order, 0);
        assert_eq!(rows[5].status.row, 5);

        let next = seq.next().unwrap();
        assert_eq!(next.status.order, 1);
        assert_eq!(next.status.row, 0);
    }

    #[test]
    fn break_on_last_order_finishes_song() {
        let mut pattern = Pattern::new();
        *pattern.cell_mut(0, 0) = effect(0xD, 0);
        let module = module_with(vec![pattern], &[0]);
        let rows = Sequencer::new(&module).count();
        assert_eq!(rows, 1);
    }

    #[test]
    fn status_reports_cells() {
        let mut pattern = Pattern::new();
        pattern.cell_mut(0, 0).period_code = 428;
        pattern.cell_mut(0, 0).sample_index = 1;
        let module = module_with(vec![pattern], &[0]);
        let seq = Sequencer::new(&module);
        let status = seq.status();
        assert_eq!((status.order, status.row), (0, 0));
        assert_eq!(status.cells[0].pitch(), Some(60));
    }
}
