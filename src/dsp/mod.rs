//! Low-level DSP primitives used by the voice generator and effect nodes.
//!
//! These components are allocation-free once constructed, so they are safe
//! to run inside the audio callback. They stay focused on the signal math;
//! routing and parameter plumbing live in `engine::render`.

/// Attack/decay/sustain/release envelope generator.
pub mod envelope;
/// State-variable filter with lowpass and highpass responses.
pub mod filter;
/// Band-limited oscillator waveforms.
pub mod oscillator;
/// Schroeder reverb with a wet/dry crossfade.
pub mod reverb;
/// One-pole parameter smoothing.
pub mod smooth;

pub use envelope::{Envelope, EnvelopeStage};
pub use filter::{FilterType, SVFilter};
pub use oscillator::{Oscillator, Waveform};
pub use reverb::Reverb;
pub use smooth::SmoothedParam;

/// Per-note rendering context.
#[derive(Debug, Clone, Copy)]
pub struct RenderCtx {
    pub sample_rate: f32,
    pub frequency: f32,
    pub velocity: f32,
}

impl RenderCtx {
    pub fn from_note(sample_rate: f32, note: u8, velocity: f32) -> Self {
        Self {
            sample_rate,
            frequency: crate::control::mapping::midi_to_frequency(note) as f32,
            velocity,
        }
    }

    pub fn from_freq(sample_rate: f32, frequency: f32, velocity: f32) -> Self {
        Self {
            sample_rate,
            frequency,
            velocity,
        }
    }
}
