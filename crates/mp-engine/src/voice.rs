//! Voice: integer-exact resampling of one channel's sample.

use mp_ir::Module;

/// Where a sample lives in the PCM blob and how it ends.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SampleBounds {
    /// First frame, as an index into the PCM blob
    pub start: usize,
    /// One past the last playable frame (the loop end for looped samples)
    pub end: usize,
    /// Frame to wrap to when looping
    pub loop_start: usize,
    pub looped: bool,
}

impl SampleBounds {
    /// Bounds of sample slot `index`, clamped to the PCM actually present.
    ///
    /// `None` for the reserved slot, unknown slots and empty samples. A
    /// loop that does not fit inside the sample is dropped.
    pub fn from_module(module: &Module, index: usize) -> Option<Self> {
        let sample = module.sample(index)?;
        let (start, end) = module.sample_range(index)?;
        if start >= end {
            return None;
        }
        let mut bounds = Self {
            start,
            end,
            loop_start: start,
            looped: false,
        };
        if sample.is_looped() && sample.loop_length > 0 {
            let loop_start = start + sample.loop_start_offset as usize;
            let loop_end = (loop_start + sample.loop_length as usize).min(end);
            if loop_start < loop_end {
                bounds.loop_start = loop_start;
                bounds.end = loop_end;
                bounds.looped = true;
            }
        }
        Some(bounds)
    }

    fn loop_len(&self) -> usize {
        self.end - self.loop_start
    }
}

/// One channel's live mixing state.
#[derive(Clone, Copy, Debug, Default)]
pub struct Voice {
    /// Is the voice producing audio?
    pub active: bool,
    /// Sample slot being played
    pub sample: u8,
    /// Pitch of the current note
    pub pitch: u8,
    /// Source frames per second at this pitch
    pub source_rate: u32,
    /// Multiplier applied to each 8-bit frame
    pub volume_scale: i32,
    /// Current frame, as an index into the PCM blob
    pub position: usize,
    /// Bresenham accumulator, always below the output rate
    pub remainder: u32,
    pub bounds: SampleBounds,
    /// Cleared by note-off; a released looped voice plays out to its loop
    /// end instead of wrapping
    pub held: bool,
}

impl Voice {
    /// Start a note from the beginning of its sample.
    pub fn trigger(&mut self, sample: u8, pitch: u8, bounds: SampleBounds, source_rate: u32, volume_scale: i32) {
        *self = Self {
            active: source_rate > 0,
            sample,
            pitch,
            source_rate,
            volume_scale,
            position: bounds.start,
            remainder: 0,
            bounds,
            held: true,
        };
    }

    /// Note-off: immediate for one-shot samples, deferred to the loop end
    /// for looped ones.
    pub fn release(&mut self) {
        if self.bounds.looped {
            self.held = false;
        } else {
            self.active = false;
        }
    }

    /// Silence the voice now.
    pub fn stop(&mut self) {
        self.active = false;
    }

    /// Advance the source position by one output frame.
    ///
    /// Returns the number of source frames stepped over. An output rate of
    /// 0 is treated as 1.
    pub fn advance(&mut self, output_rate: u32) -> usize {
        let output_rate = output_rate.max(1) as u64;
        let acc = self.remainder as u64 + self.source_rate as u64;
        let frames = acc / output_rate;
        self.remainder = (acc % output_rate) as u32;
        self.position += frames as usize;
        frames as usize
    }

    /// Step one output frame and return its contribution, or `None` once
    /// the voice has run out.
    pub fn next_frame(&mut self, pcm: &[i8], output_rate: u32) -> Option<i32> {
        if !self.active {
            return None;
        }
        self.advance(output_rate);
        if self.position >= self.bounds.end {
            if self.bounds.looped && self.held {
                let overshoot = self.position - self.bounds.end;
                self.position = self.bounds.loop_start + overshoot % self.bounds.loop_len();
            } else {
                self.active = false;
                return None;
            }
        }
        match pcm.get(self.position) {
            Some(&frame) => Some(frame as i32 * self.volume_scale),
            None => {
                self.active = false;
                None
            }
        }
    }
}
