//! Error types shared by the control layer, the graph manager and the engines.
//!
//! Benign races between UI teardown and in-flight events (double dispose,
//! note-off for a note that is not sounding, updates against a disposed
//! graph) are not errors and never surface here.

use thiserror::Error;

use crate::engine::NodeId;

/// Failures reported by an [`AudioEngine`](crate::engine::AudioEngine).
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    /// The host environment cannot provide the requested node or context.
    #[error("audio engine unsupported: {0}")]
    Unsupported(String),

    /// The command ring to the audio thread is full.
    #[error("engine command queue is full")]
    QueueFull,

    /// Every node slot is in use.
    #[error("engine node table is full")]
    NodeLimit,

    /// The node was never created or has already been disposed.
    #[error("unknown audio node {0}")]
    UnknownNode(NodeId),

    /// The audio context refused to leave the suspended state.
    #[error("failed to resume audio context: {0}")]
    ResumeFailed(String),
}

/// Crate-level error.
#[derive(Debug, Error)]
pub enum Error {
    /// The synthesis graph could not be built; audio stays unavailable.
    #[error("failed to initialize audio graph")]
    GraphInit {
        #[source]
        source: EngineError,
    },

    /// A note was requested while the context is suspended and resuming failed.
    #[error("audio context still suspended after {attempts} resume attempts")]
    EngineSuspended { attempts: u32 },

    /// A control range with `min >= max` (or a non-finite bound).
    #[error("invalid control range: min {min} must be below max {max}")]
    InvalidRange { min: f64, max: f64 },

    /// A logarithmic control range must start above zero.
    #[error("logarithmic range needs a positive minimum, got {min}")]
    NonPositiveLogRange { min: f64 },

    /// A note name that does not parse as scientific pitch notation.
    #[error("unknown note name '{0}'")]
    UnknownNote(String),

    /// A configuration or preset document could not be read.
    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Engine(#[from] EngineError),
}

pub type Result<T> = std::result::Result<T, Error>;
