//! Lifecycle of the synth's audio graph.
//!
//! The graph is a fixed chain: voice → filter → reverb → analyser → output.
//! [`AudioGraphManager`] builds it on an engine, forwards parameter updates
//! with bypass semantics, and disposes it exactly once.

pub mod manager;

pub use manager::{AudioGraphHandle, AudioGraphManager, DEFAULT_ANALYSER_SIZE, RESUME_ATTEMPTS};
