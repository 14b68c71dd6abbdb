//! Software mixer: four resampling voices summed into interleaved PCM.

use alloc::sync::Arc;

use mp_ir::{EventReceiver, Module, PlaybackEvent, CHANNELS};

use crate::frequency::{pitch_to_rate, C4_SPEED};
use crate::voice::{SampleBounds, Voice};

/// Output format and tuning of the mixer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MixerConfig {
    /// Output frames per second
    pub output_rate: u32,
    /// Interleaved output channels; every voice is written to all of them
    pub output_channels: u16,
    /// Source rate of a sample played at pitch 60
    pub source_c4_rate: u32,
}

impl Default for MixerConfig {
    fn default() -> Self {
        Self {
            output_rate: 44_100,
            output_channels: 2,
            source_c4_rate: C4_SPEED,
        }
    }
}

/// Volume multiplier for a note velocity. The default velocity 0x60 maps
/// to 64, full scale for an 8-bit frame.
pub const fn volume_scale(velocity: u8) -> i32 {
    velocity as i32 * 2 / 3
}

/// Renders PCM from a module's samples under control of playback events.
///
/// Rendering never allocates and never blocks.
pub struct Mixer {
    module: Arc<Module>,
    voices: [Voice; CHANNELS],
    /// Program selected per channel, `sample slot - 1`
    programs: [Option<u8>; CHANNELS],
    config: MixerConfig,
}

impl Mixer {
    /// A zero output rate is raised to 1 frame per second.
    pub fn new(module: Arc<Module>, mut config: MixerConfig) -> Self {
        config.output_rate = config.output_rate.max(1);
        Self {
            module,
            voices: [Voice::default(); CHANNELS],
            programs: [None; CHANNELS],
            config,
        }
    }

    pub fn module(&self) -> &Arc<Module> {
        &self.module
    }

    pub fn config(&self) -> &MixerConfig {
        &self.config
    }

    pub fn voice(&self, channel: usize) -> Option<&Voice> {
        self.voices.get(channel)
    }

    /// Number of voices currently producing audio.
    pub fn active_voices(&self) -> usize {
        self.voices.iter().filter(|v| v.active).count()
    }

    /// Start `sample` on a voice at `pitch`.
    ///
    /// Ignored for unknown voices and for slots without audio.
    pub fn note_on(&mut self, voice: usize, sample: u8, pitch: u8, velocity: u8) {
        let Some(v) = self.voices.get_mut(voice) else {
            return;
        };
        match SampleBounds::from_module(&self.module, sample as usize) {
            Some(bounds) => {
                let rate = pitch_to_rate(pitch, self.config.source_c4_rate);
                v.trigger(sample, pitch, bounds, rate, volume_scale(velocity));
            }
            None => v.stop(),
        }
    }

    pub fn note_off(&mut self, voice: usize) {
        if let Some(v) = self.voices.get_mut(voice) {
            v.release();
        }
    }

    /// Select the sample used by later note-ons on a channel.
    pub fn program_change(&mut self, channel: usize, program: u8) {
        if let Some(p) = self.programs.get_mut(channel) {
            *p = Some(program);
        }
    }

    /// Silence every voice and forget program selections.
    pub fn reset(&mut self) {
        self.voices = [Voice::default(); CHANNELS];
        self.programs = [None; CHANNELS];
    }

    /// Fill `out` with interleaved frames.
    ///
    /// The buffer length need not be a multiple of the channel count; a
    /// trailing partial frame is zeroed.
    pub fn render(&mut self, out: &mut [i16]) {
        let channels = self.config.output_channels.max(1) as usize;
        for frame in out.chunks_mut(channels) {
            let value = if frame.len() == channels { self.mix_frame() } else { 0 };
            frame.fill(value);
        }
    }

    /// Fill `out` with interleaved little-endian 16-bit frames.
    pub fn render_bytes(&mut self, out: &mut [u8]) {
        let channels = self.config.output_channels.max(1) as usize;
        for frame in out.chunks_mut(channels * 2) {
            let value = if frame.len() == channels * 2 { self.mix_frame() } else { 0 };
            for bytes in frame.chunks_mut(2) {
                bytes.copy_from_slice(&value.to_le_bytes()[..bytes.len()]);
            }
        }
    }

    fn mix_frame(&mut self) -> i16 {
        let pcm = self.module.pcm_blob();
        let output_rate = self.config.output_rate;
        let mut acc: i32 = 0;
        for voice in &mut self.voices {
            if let Some(value) = voice.next_frame(pcm, output_rate) {
                acc += value;
            }
        }
        acc.clamp(i16::MIN as i32, i16::MAX as i32) as i16
    }
}

impl EventReceiver for Mixer {
    fn receive(&mut self, event: &PlaybackEvent) {
        match *event {
            PlaybackEvent::NoteOn { channel, pitch, velocity } => {
                let channel = channel as usize;
                if let Some(Some(program)) = self.programs.get(channel).copied() {
                    self.note_on(channel, program.saturating_add(1), pitch, velocity);
                }
            }
            PlaybackEvent::NoteOff { channel, .. } => self.note_off(channel as usize),
            PlaybackEvent::ProgramChange { channel, program } => {
                self.program_change(channel as usize, program)
            }
            PlaybackEvent::Tempo { .. } | PlaybackEvent::Row(_) => {}
        }
    }
}
