//! In-memory PCM sink.

use crate::traits::{AudioError, PcmSink};

/// Collects written PCM in a growable buffer, up to an optional frame limit.
#[derive(Clone, Debug)]
pub struct BufferSink {
    sample_rate: u32,
    channels: u16,
    max_frames: Option<usize>,
    samples: Vec<i16>,
    running: bool,
}

impl BufferSink {
    pub fn new(sample_rate: u32, channels: u16) -> Self {
        Self {
            sample_rate,
            channels: channels.max(1),
            max_frames: None,
            samples: Vec::new(),
            running: false,
        }
    }

    /// A sink that stops accepting frames after `max_frames`.
    pub fn with_limit(sample_rate: u32, channels: u16, max_frames: usize) -> Self {
        Self {
            max_frames: Some(max_frames),
            samples: Vec::with_capacity(max_frames * channels.max(1) as usize),
            ..Self::new(sample_rate, channels)
        }
    }

    /// Frames written so far.
    pub fn frames(&self) -> usize {
        self.samples.len() / self.channels as usize
    }

    pub fn samples(&self) -> &[i16] {
        &self.samples
    }

    pub fn into_samples(self) -> Vec<i16> {
        self.samples
    }

    pub fn is_running(&self) -> bool {
        self.running
    }
}

impl PcmSink for BufferSink {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn channels(&self) -> u16 {
        self.channels
    }

    fn available_frames(&self) -> usize {
        match self.max_frames {
            Some(max) => max.saturating_sub(self.frames()),
            None => usize::MAX,
        }
    }

    fn write(&mut self, samples: &[i16]) -> usize {
        let channels = self.channels as usize;
        let frames = (samples.len() / channels).min(self.available_frames());
        self.samples.extend_from_slice(&samples[..frames * channels]);
        frames
    }

    fn start(&mut self) -> Result<(), AudioError> {
        self.running = true;
        Ok(())
    }

    fn stop(&mut self) -> Result<(), AudioError> {
        self.running = false;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unlimited_sink_takes_everything() {
        let mut sink = BufferSink::new(44100, 2);
        assert_eq!(sink.write(&[1, 2, 3, 4, 5]), 2);
        assert_eq!(sink.samples(), &[1, 2, 3, 4]);
        assert_eq!(sink.frames(), 2);
    }

    #[test]
    fn limited_sink_reports_capacity() {
        let mut sink = BufferSink::with_limit(8000, 1, 3);
        assert_eq!(sink.available_frames(), 3);
        assert_eq!(sink.write(&[9, 9]), 2);
        assert_eq!(sink.available_frames(), 1);
        assert_eq!(sink.write(&[7, 7, 7]), 1);
        assert_eq!(sink.available_frames(), 0);
        assert_eq!(sink.into_samples(), [9, 9, 7]);
    }

    #[test]
    fn start_and_stop() {
        let mut sink = BufferSink::new(44100, 2);
        sink.start().unwrap();
        assert!(sink.is_running());
        sink.stop().unwrap();
        assert!(!sink.is_running());
    }
}
