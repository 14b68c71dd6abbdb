//! CPAL-based PCM output.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Stream, StreamConfig};
use ringbuf::traits::{Consumer, Observer, Producer, Split};
use ringbuf::{HeapProd, HeapRb};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::traits::{AudioError, PcmSink};

/// Default device output fed through a lock-free ring of interleaved samples.
pub struct CpalOutput {
    config: StreamConfig,
    stream: Stream,
    producer: HeapProd<i16>,
    running: Arc<AtomicBool>,
}

impl CpalOutput {
    /// Open the default output device with roughly `latency_ms` of buffering.
    pub fn new(latency_ms: u32) -> Result<Self, AudioError> {
        let host = cpal::default_host();
        let device = host.default_output_device().ok_or(AudioError::NoDevice)?;

        let config = device
            .default_output_config()
            .map_err(|e| AudioError::DeviceInit(e.to_string()))?;

        let mut config: StreamConfig = config.into();
        // the mixer writes the same value to every channel; stereo is plenty
        config.channels = 2;
        let channels = config.channels as usize;

        let frames = (config.sample_rate.0 as usize * latency_ms.max(1) as usize / 1000).max(64);
        let rb = HeapRb::<i16>::new(frames * channels);
        let (producer, mut consumer) = rb.split();

        let running = Arc::new(AtomicBool::new(false));
        let playing = running.clone();

        let stream = device
            .build_output_stream(
                &config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    if !playing.load(Ordering::Relaxed) {
                        data.fill(0.0);
                        return;
                    }
                    for sample in data.iter_mut() {
                        *sample = consumer.try_pop().map_or(0.0, |s| s as f32 / 32768.0);
                    }
                },
                |err| tracing::error!(%err, "audio stream error"),
                None,
            )
            .map_err(|e| AudioError::StreamCreate(e.to_string()))?;

        tracing::info!(
            rate = config.sample_rate.0,
            channels,
            buffer_frames = frames,
            "opened audio output"
        );

        Ok(Self {
            config,
            stream,
            producer,
            running,
        })
    }
}

impl PcmSink for CpalOutput {
    fn sample_rate(&self) -> u32 {
        self.config.sample_rate.0
    }

    fn channels(&self) -> u16 {
        self.config.channels
    }

    fn available_frames(&self) -> usize {
        self.producer.vacant_len() / self.config.channels as usize
    }

    fn write(&mut self, samples: &[i16]) -> usize {
        let channels = self.config.channels as usize;
        let frames = (samples.len() / channels).min(self.available_frames());
        let pushed = self.producer.push_slice(&samples[..frames * channels]);
        pushed / channels
    }

    fn start(&mut self) -> Result<(), AudioError> {
        self.running.store(true, Ordering::Relaxed);
        self.stream
            .play()
            .map_err(|e| AudioError::Playback(e.to_string()))
    }

    fn stop(&mut self) -> Result<(), AudioError> {
        self.running.store(false, Ordering::Relaxed);
        self.stream
            .pause()
            .map_err(|e| AudioError::Playback(e.to_string()))
    }
}
