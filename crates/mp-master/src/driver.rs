//! Playback drivers: the wall-clock sequencing loop, the mixing loop and
//! the frame-paced offline render.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use mp_audio::PcmSink;
use mp_engine::{Mixer, MixerConfig, RowScheduler, Sequencer, Velocities, C4_SPEED};
use mp_ir::{EventReceiver, Module};

use crate::channel::{EventQueue, EventSender};

/// Frames rendered per mixing step.
pub const MIX_CHUNK_FRAMES: usize = 512;

/// Widest interleaved frame the mixing buffer holds.
const MAX_OUTPUT_CHANNELS: usize = 8;

/// Longest the sequencing thread sleeps before rechecking the stop flag.
const STOP_POLL: Duration = Duration::from_millis(10);

const NO_POSITION: u32 = u32::MAX;

/// Order and row of the row most recently sequenced.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PlaybackPosition {
    pub order: u16,
    pub row: u8,
}

/// Flags and position shared by the controller and its two threads.
#[derive(Debug)]
pub struct PlaybackState {
    stop: Arc<AtomicBool>,
    sequencing_done: AtomicBool,
    finished: AtomicBool,
    position: AtomicU32,
}

impl PlaybackState {
    pub fn new() -> Self {
        Self {
            stop: Arc::new(AtomicBool::new(false)),
            sequencing_done: AtomicBool::new(false),
            finished: AtomicBool::new(false),
            position: AtomicU32::new(NO_POSITION),
        }
    }

    /// Flag raised by [`PlaybackState::request_stop`], for
    /// [`crate::event_channel`].
    pub fn stop_flag(&self) -> Arc<AtomicBool> {
        self.stop.clone()
    }

    pub fn request_stop(&self) {
        self.stop.store(true, Ordering::Relaxed);
    }

    pub fn is_stopping(&self) -> bool {
        self.stop.load(Ordering::Relaxed)
    }

    pub fn is_sequencing_done(&self) -> bool {
        self.sequencing_done.load(Ordering::Acquire)
    }

    pub fn is_finished(&self) -> bool {
        self.finished.load(Ordering::Acquire)
    }

    pub(crate) fn mark_sequencing_done(&self) {
        self.sequencing_done.store(true, Ordering::Release);
    }

    pub(crate) fn mark_finished(&self) {
        self.finished.store(true, Ordering::Release);
    }

    pub fn position(&self) -> Option<PlaybackPosition> {
        match self.position.load(Ordering::Relaxed) {
            NO_POSITION => None,
            packed => Some(PlaybackPosition {
                order: (packed >> 8) as u16,
                row: packed as u8,
            }),
        }
    }

    fn set_position(&self, order: u16, row: u8) {
        self.position
            .store(((order as u32) << 8) | row as u32, Ordering::Relaxed);
    }
}

impl Default for PlaybackState {
    fn default() -> Self {
        Self::new()
    }
}

/// Walk the song in real time, sending each row's events as its time comes.
///
/// Rows are paced against absolute deadlines so sleep overshoot does not
/// accumulate. Ends with note-offs for anything still sounding.
pub fn run_sequencer(
    module: Arc<Module>,
    velocities: Velocities,
    mut sender: EventSender,
    state: Arc<PlaybackState>,
) {
    let mut scheduler = RowScheduler::new(velocities);
    let mut deadline = Instant::now();

    for row in Sequencer::new(&module) {
        if state.is_stopping() {
            break;
        }
        state.set_position(row.status.order, row.status.row);
        for event in scheduler.schedule_row(&row) {
            sender.receive(&event);
        }
        deadline += row.timing.row_duration();
        sleep_until(deadline, &state);
    }

    for event in scheduler.release_all() {
        sender.receive(&event);
    }
    state.mark_sequencing_done();
    tracing::debug!("sequencing finished");
}

fn sleep_until(deadline: Instant, state: &PlaybackState) {
    loop {
        let now = Instant::now();
        if now >= deadline || state.is_stopping() {
            return;
        }
        std::thread::sleep((deadline - now).min(STOP_POLL));
    }
}

/// Feed `sink` until the song has been sequenced, every event applied and
/// every voice has fallen silent, or until a stop is requested.
///
/// Each step renders exactly as many frames as the sink can take right
/// now, capped at [`MIX_CHUNK_FRAMES`]. Returns the frames written.
pub fn run_mixer<S: PcmSink + ?Sized>(
    sink: &mut S,
    mixer: &mut Mixer,
    queue: &mut EventQueue,
    state: &PlaybackState,
) -> usize {
    let channels = (sink.channels().max(1) as usize).min(MAX_OUTPUT_CHANNELS);
    let mut buffer = [0i16; MIX_CHUNK_FRAMES * MAX_OUTPUT_CHANNELS];
    let mut written = 0;

    while !state.is_stopping() {
        // read the flag first so events sent before it are in the queue
        let done = state.is_sequencing_done();
        queue.drain_into(mixer);
        if done && queue.is_empty() && mixer.active_voices() == 0 {
            break;
        }

        let frames = sink.available_frames().min(MIX_CHUNK_FRAMES);
        if frames == 0 {
            std::thread::sleep(Duration::from_millis(1));
            continue;
        }
        let out = &mut buffer[..frames * channels];
        render_chunk(mixer, out);
        written += sink.write(out);
    }
    written
}

#[cfg(feature = "alloc_check")]
fn render_chunk(mixer: &mut Mixer, out: &mut [i16]) {
    assert_no_alloc::assert_no_alloc(|| mixer.render(out));
}

#[cfg(not(feature = "alloc_check"))]
fn render_chunk(mixer: &mut Mixer, out: &mut [i16]) {
    mixer.render(out);
}

/// Settings for [`render_song`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RenderOptions {
    pub velocities: Velocities,
    /// Source rate of a sample played at pitch 60
    pub source_c4_rate: u32,
    /// Longest the render continues after the last row while notes ring out
    pub max_tail_frames: usize,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            velocities: Velocities::default(),
            source_c4_rate: C4_SPEED,
            max_tail_frames: 2 * 44_100,
        }
    }
}

/// Render a whole song into `sink`, pacing rows by frame count instead of
/// the wall clock. Deterministic for a given module and sink format.
///
/// Stops early once the sink accepts no more frames. Returns the frames
/// written.
pub fn render_song<S: PcmSink + ?Sized>(
    module: Arc<Module>,
    options: &RenderOptions,
    sink: &mut S,
) -> usize {
    let rate = sink.sample_rate();
    let config = MixerConfig {
        output_rate: rate,
        output_channels: sink.channels(),
        source_c4_rate: options.source_c4_rate,
    };
    let mut mixer = Mixer::new(module.clone(), config);
    let mut scheduler = RowScheduler::new(options.velocities);
    let mut written = 0;
    let mut carry = 0u64;

    for row in Sequencer::new(&module) {
        for event in scheduler.schedule_row(&row) {
            mixer.receive(&event);
        }
        // microseconds times frames per second, carried so rows never drift
        let acc = carry + row.timing.row_micros() as u64 * rate as u64;
        let frames = (acc / 1_000_000) as usize;
        carry = acc % 1_000_000;

        let (n, full) = render_frames(&mut mixer, sink, frames);
        written += n;
        if full {
            return written;
        }
    }

    for event in scheduler.release_all() {
        mixer.receive(&event);
    }
    let mut tail = 0;
    while mixer.active_voices() > 0 && tail < options.max_tail_frames {
        let frames = MIX_CHUNK_FRAMES.min(options.max_tail_frames - tail);
        let (n, full) = render_frames(&mut mixer, sink, frames);
        written += n;
        tail += n;
        if full {
            break;
        }
    }

    tracing::debug!(frames = written, rate, "offline render finished");
    written
}

/// Render `frames` frames into the sink. Returns the frames taken and
/// whether the sink filled up.
fn render_frames<S: PcmSink + ?Sized>(mixer: &mut Mixer, sink: &mut S, frames: usize) -> (usize, bool) {
    let channels = (sink.channels().max(1) as usize).min(MAX_OUTPUT_CHANNELS);
    let mut buffer = [0i16; MIX_CHUNK_FRAMES * MAX_OUTPUT_CHANNELS];
    let mut remaining = frames;
    let mut taken = 0;
    while remaining > 0 {
        let chunk = remaining.min(MIX_CHUNK_FRAMES);
        let out = &mut buffer[..chunk * channels];
        mixer.render(out);
        let n = sink.write(out);
        taken += n;
        if n < chunk {
            return (taken, true);
        }
        remaining -= chunk;
    }
    (taken, false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::{event_channel, EVENT_CAPACITY};
    use mp_audio::BufferSink;
    use mp_ir::{NoteCell, Pattern, PlaybackEvent, Sample};

    /// One-shot square wave in slot 1 and a song with a single note on the
    /// first row of one pattern.
    fn one_note_module(speed: u8) -> Arc<Module> {
        let mut module = Module::default();
        module.samples.push(Sample {
            size_in_bytes: 32,
            pcm_start_offset: 0,
            ..Sample::new("square")
        });
        module.pcm = (0..32).map(|i| if i % 2 == 0 { 50 } else { -50 }).collect();
        let mut pattern = Pattern::new();
        *pattern.cell_mut(0, 0) = NoteCell { sample_index: 1, period_code: 428, ..NoteCell::default() };
        *pattern.cell_mut(0, 1) = NoteCell { effect_command: 0xF, effect_param: speed, ..NoteCell::default() };
        module.patterns = vec![pattern];
        Arc::new(module)
    }

    #[test]
    fn position_packs_order_and_row() {
        let state = PlaybackState::new();
        assert_eq!(state.position(), None);
        state.set_position(0x12, 0x3F);
        assert_eq!(state.position(), Some(PlaybackPosition { order: 0x12, row: 0x3F }));
    }

    #[test]
    fn offline_render_covers_every_row() {
        // speed 1 at tempo 125: 20ms per row, 64 rows
        let module = one_note_module(1);
        let mut sink = BufferSink::new(8000, 1);
        let frames = render_song(module, &RenderOptions::default(), &mut sink);
        assert_eq!(frames, 64 * 160);
        assert_eq!(sink.frames(), frames);
        assert!(sink.samples()[..16].iter().any(|&s| s != 0));
        assert!(sink.samples()[200..].iter().all(|&s| s == 0));
    }

    #[test]
    fn offline_render_is_deterministic() {
        let render = || {
            let mut sink = BufferSink::new(22050, 2);
            render_song(one_note_module(3), &RenderOptions::default(), &mut sink);
            sink.into_samples()
        };
        assert_eq!(render(), render());
    }

    #[test]
    fn row_pacing_carries_remainder() {
        // 20000us rows at 44100Hz are 882 frames exactly; at 11025 they are
        // 220.5 and must alternate 220/221
        let mut sink = BufferSink::new(11025, 1);
        let frames = render_song(one_note_module(1), &RenderOptions::default(), &mut sink);
        assert_eq!(frames, 64 * 11025 / 50);
    }

    #[test]
    fn zero_rate_sink_renders_nothing() {
        let mut sink = BufferSink::new(0, 2);
        assert_eq!(render_song(one_note_module(1), &RenderOptions::default(), &mut sink), 0);
        assert!(sink.samples().is_empty());
    }

    #[test]
    fn offline_render_stops_at_full_sink() {
        let mut sink = BufferSink::with_limit(8000, 2, 1000);
        let frames = render_song(one_note_module(6), &RenderOptions::default(), &mut sink);
        assert_eq!(frames, 1000);
        assert_eq!(sink.frames(), 1000);
    }

    #[test]
    fn mixing_loop_plays_queued_events_out() {
        let module = one_note_module(6);
        let state = PlaybackState::new();
        let (mut tx, mut queue) = event_channel(EVENT_CAPACITY, state.stop_flag());
        tx.receive(&PlaybackEvent::ProgramChange { channel: 0, program: 0 });
        tx.receive(&PlaybackEvent::NoteOn { channel: 0, pitch: 60, velocity: 0x60 });
        state.mark_sequencing_done();

        let mut sink = BufferSink::new(8363, 2);
        let config = MixerConfig { output_rate: 8363, output_channels: 2, source_c4_rate: 8363 };
        let mut mixer = Mixer::new(module, config);
        let written = run_mixer(&mut sink, &mut mixer, &mut queue, &state);

        // the 32-frame one-shot fits in the first chunk
        assert_eq!(written, MIX_CHUNK_FRAMES);
        assert_eq!(&sink.samples()[..4], &[-3200, -3200, 3200, 3200]);
        assert_eq!(mixer.active_voices(), 0);
    }

    #[test]
    fn mixing_loop_honours_stop() {
        let module = one_note_module(6);
        let state = PlaybackState::new();
        let (_tx, mut queue) = event_channel(4, state.stop_flag());
        state.request_stop();
        let mut sink = BufferSink::new(44100, 2);
        let mut mixer = Mixer::new(module, MixerConfig::default());
        assert_eq!(run_mixer(&mut sink, &mut mixer, &mut queue, &state), 0);
    }

    #[test]
    fn sequencer_thread_sends_song_and_releases() {
        let module = one_note_module(1);
        let state = Arc::new(PlaybackState::new());
        let (tx, mut queue) = event_channel(EVENT_CAPACITY, state.stop_flag());
        run_sequencer(module, Velocities::default(), tx, state.clone());

        assert!(state.is_sequencing_done());
        assert_eq!(state.position(), Some(PlaybackPosition { order: 0, row: 63 }));
        let mut events = Vec::new();
        queue.drain_into(&mut events);
        assert_eq!(
            events,
            [
                PlaybackEvent::ProgramChange { channel: 0, program: 0 },
                PlaybackEvent::NoteOn { channel: 0, pitch: 60, velocity: 0x60 },
                PlaybackEvent::Tempo { micros_per_quarter: 80_000 },
                PlaybackEvent::NoteOff { channel: 0, pitch: 60, velocity: 0x40 },
            ]
        );
    }
}
