#[cfg(feature = "serde")]
pub mod config; // TOML settings and presets
pub mod control; // Value mapping, throttling and drag gestures
pub mod dsp;
pub mod engine; // Audio backends behind one trait
pub mod error;
pub mod graph; // Oscillator -> filter -> reverb -> analyser chain
pub mod notes;
pub mod params;
pub mod session;
pub mod synth; // Voice management and polyphony

pub use error::{Error, Result};

pub const MAX_BLOCK_SIZE: usize = 2048;
pub(crate) const MIN_TIME: f32 = 1.0 / 48_000.0;
