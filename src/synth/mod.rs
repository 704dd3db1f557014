//! Voice management and polyphony.
//!
//! This layer sits above the DSP primitives: a [`Voice`] pairs an oscillator
//! with an envelope, and [`PolySynth`] runs a fixed pool of them.

pub mod poly;
pub mod voice;

pub use poly::PolySynth;
pub use voice::{Voice, VoiceState};
