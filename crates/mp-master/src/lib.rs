//! Headless controller for modport.
//!
//! Owns a decoded module and drives everything done with it: live
//! playback on the default audio device, offline rendering, and MIDI,
//! SoundFont and WAV export. The CLI is a thin shell over this.

mod channel;
mod driver;
mod error;
mod wav;

use std::io::Write;
use std::sync::mpsc;
use std::sync::Arc;
use std::thread::JoinHandle;

use mp_audio::{BufferSink, CpalOutput, PcmSink};
use mp_engine::{Mixer, MixerConfig, Velocities};

// Re-export common types so callers don't need the lower crates directly.
pub use mp_formats::{DecodeOptions, FormatError, MidiOptions, SoundFontOptions};
pub use mp_ir::{FormatVariant, Module};

pub use channel::{event_channel, EventQueue, EventSender, EVENT_CAPACITY};
pub use driver::{
    render_song, run_mixer, run_sequencer, PlaybackPosition, PlaybackState, RenderOptions,
    MIX_CHUNK_FRAMES,
};
pub use error::{Error, Result};
pub use wav::{samples_to_wav, write_wav};

/// Device buffering requested for live playback.
const OUTPUT_LATENCY_MS: u32 = 100;

/// Channels of an offline render.
const RENDER_CHANNELS: u16 = 2;

/// Headless controller: owns a module and manages playback.
#[derive(Default)]
pub struct Controller {
    module: Option<Arc<Module>>,
    playback: Option<PlaybackHandle>,
}

struct PlaybackHandle {
    state: Arc<PlaybackState>,
    sequencer: Option<JoinHandle<()>>,
    mixer: Option<JoinHandle<()>>,
}

impl Controller {
    pub fn new() -> Self {
        Self::default()
    }

    // --- Module management ---

    pub fn module(&self) -> Option<&Module> {
        self.module.as_deref()
    }

    /// Decode a module, detecting its layout. Stops any playback first.
    pub fn load(&mut self, data: &[u8]) -> Result<&Module> {
        self.load_with(data, &DecodeOptions::default())
    }

    /// Decode a module with a fixed layout.
    pub fn load_as(&mut self, data: &[u8], variant: FormatVariant) -> Result<&Module> {
        self.load_with(data, &DecodeOptions { variant: Some(variant) })
    }

    pub fn load_with(&mut self, data: &[u8], options: &DecodeOptions) -> Result<&Module> {
        self.stop();
        let module = Arc::new(mp_formats::decode_module_with(data, options)?);
        tracing::info!(
            name = %module.song_name,
            variant = ?module.variant,
            orders = module.song_length,
            "loaded module"
        );
        Ok(&**self.module.insert(module))
    }

    fn loaded(&self) -> Result<&Arc<Module>> {
        self.module.as_ref().ok_or(Error::NoModuleLoaded)
    }

    // --- Real-time playback ---

    /// Start playing the loaded module on the default output device.
    ///
    /// Returns once the device is open; playback runs on two threads
    /// until the song ends or [`Controller::stop`] is called.
    pub fn play(&mut self) -> Result<()> {
        self.stop();
        let module = self.loaded()?.clone();
        let state = Arc::new(PlaybackState::new());
        let (sender, mut queue) = event_channel(EVENT_CAPACITY, state.stop_flag());
        let (ready_tx, ready_rx) = mpsc::sync_channel(1);

        let mixer_module = module.clone();
        let mixer_state = state.clone();
        let mixer = std::thread::spawn(move || {
            let mut output = match open_output() {
                Ok(output) => {
                    let _ = ready_tx.send(Ok(()));
                    output
                }
                Err(e) => {
                    mixer_state.mark_finished();
                    let _ = ready_tx.send(Err(e));
                    return;
                }
            };
            let config = MixerConfig {
                output_rate: output.sample_rate(),
                output_channels: output.channels(),
                ..MixerConfig::default()
            };
            let mut mixer = Mixer::new(mixer_module, config);
            let frames = run_mixer(&mut output, &mut mixer, &mut queue, &mixer_state);
            // let the device play out what is buffered
            std::thread::sleep(std::time::Duration::from_millis(OUTPUT_LATENCY_MS as u64 * 2));
            if let Err(err) = output.stop() {
                tracing::error!(%err, "failed to stop audio output");
            }
            tracing::info!(frames, "playback finished");
            mixer_state.mark_finished();
        });

        match ready_rx.recv() {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                let _ = mixer.join();
                return Err(e.into());
            }
            Err(_) => {
                let _ = mixer.join();
                return Err(mp_audio::AudioError::Playback("mixing thread exited".into()).into());
            }
        }

        let sequencer_state = state.clone();
        let sequencer = std::thread::spawn(move || {
            run_sequencer(module, Velocities::default(), sender, sequencer_state);
        });

        tracing::info!("playback started");
        self.playback = Some(PlaybackHandle {
            state,
            sequencer: Some(sequencer),
            mixer: Some(mixer),
        });
        Ok(())
    }

    /// Stop playback and wait for both threads to exit.
    pub fn stop(&mut self) {
        if let Some(mut pb) = self.playback.take() {
            pb.state.request_stop();
            for handle in [pb.sequencer.take(), pb.mixer.take()].into_iter().flatten() {
                let _ = handle.join();
            }
            tracing::info!("playback stopped");
        }
    }

    pub fn is_playing(&self) -> bool {
        self.playback
            .as_ref()
            .is_some_and(|p| !p.state.is_finished())
    }

    pub fn is_finished(&self) -> bool {
        self.playback
            .as_ref()
            .is_some_and(|p| p.state.is_finished())
    }

    /// Row currently being sequenced, while playing.
    pub fn position(&self) -> Option<PlaybackPosition> {
        let pb = self.playback.as_ref()?;
        if pb.state.is_finished() {
            return None;
        }
        pb.state.position()
    }

    // --- Export ---

    pub fn export_midi(&self, options: &MidiOptions) -> Result<Vec<u8>> {
        Ok(mp_formats::encode_midi(self.loaded()?, options))
    }

    pub fn export_soundfont(&self, options: &SoundFontOptions) -> Result<Vec<u8>> {
        Ok(mp_formats::encode_soundfont(self.loaded()?, options))
    }

    /// Write the song as a Standard MIDI File, propagating I/O errors.
    pub fn write_midi<W: Write>(&self, writer: W, options: &MidiOptions) -> Result<()> {
        mp_formats::write_midi(writer, self.loaded()?, options)?;
        Ok(())
    }

    /// Write the sample set as an SF2 bank, propagating I/O errors.
    pub fn write_soundfont<W: Write>(&self, writer: W, options: &SoundFontOptions) -> Result<()> {
        mp_formats::write_soundfont(writer, self.loaded()?, options)?;
        Ok(())
    }

    // --- Offline rendering ---

    /// Render the song to interleaved stereo, at most `max_frames` frames.
    pub fn render_frames(&self, sample_rate: u32, max_frames: usize) -> Result<Vec<i16>> {
        let module = self.loaded()?.clone();
        let mut sink = BufferSink::with_limit(sample_rate, RENDER_CHANNELS, max_frames);
        let options = RenderOptions {
            max_tail_frames: sample_rate as usize * 2,
            ..RenderOptions::default()
        };
        render_song(module, &options, &mut sink);
        Ok(sink.into_samples())
    }

    /// Render the song to a stereo WAV file image, at most `max_seconds` long.
    pub fn render_to_wav(&self, sample_rate: u32, max_seconds: u32) -> Result<Vec<u8>> {
        let max_frames = sample_rate as usize * max_seconds as usize;
        let samples = self.render_frames(sample_rate, max_frames)?;
        Ok(samples_to_wav(&samples, RENDER_CHANNELS, sample_rate))
    }

    /// Render the song and write it as a stereo WAV file.
    pub fn write_rendered_wav<W: Write>(
        &self,
        mut writer: W,
        sample_rate: u32,
        max_seconds: u32,
    ) -> Result<()> {
        let max_frames = sample_rate as usize * max_seconds as usize;
        let samples = self.render_frames(sample_rate, max_frames)?;
        write_wav(&mut writer, &samples, RENDER_CHANNELS, sample_rate)?;
        writer.flush()?;
        Ok(())
    }
}

impl Drop for Controller {
    fn drop(&mut self) {
        self.stop();
    }
}

fn open_output() -> Result<CpalOutput, mp_audio::AudioError> {
    let mut output = CpalOutput::new(OUTPUT_LATENCY_MS)?;
    output.start()?;
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operations_need_a_module() {
        let mut controller = Controller::new();
        assert!(controller.module().is_none());
        assert!(matches!(controller.play(), Err(Error::NoModuleLoaded)));
        assert!(matches!(
            controller.export_midi(&MidiOptions::default()),
            Err(Error::NoModuleLoaded)
        ));
        assert!(matches!(
            controller.export_soundfont(&SoundFontOptions::default()),
            Err(Error::NoModuleLoaded)
        ));
        assert!(matches!(controller.render_frames(44100, 10), Err(Error::NoModuleLoaded)));
        assert!(!controller.is_playing());
        assert_eq!(controller.position(), None);
    }

    #[test]
    fn failed_load_keeps_nothing() {
        let mut controller = Controller::new();
        let err = controller.load(&[0u8; 16]).unwrap_err();
        assert!(matches!(err, Error::Format(FormatError::Truncated { .. })));
        assert!(controller.module().is_none());
    }

    #[test]
    fn stop_without_playback_is_a_no_op() {
        let mut controller = Controller::new();
        controller.stop();
        assert!(!controller.is_finished());
    }
}
