//! PCM output sinks for modport.

mod buffer;
mod cpal_backend;
mod traits;

pub use buffer::BufferSink;
pub use cpal_backend::CpalOutput;
pub use traits::{AudioError, PcmSink};
