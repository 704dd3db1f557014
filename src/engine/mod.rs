//! The audio engine seam.
//!
//! [`AudioEngine`] is everything the graph manager needs from whatever
//! actually produces sound: create nodes, wire them, write parameters,
//! trigger notes, read the analyser and tear nodes down. All calls happen on
//! the control thread and must return promptly; engines that run DSP
//! elsewhere queue the work.
//!
//! Two implementations ship with the crate:
//!
//! - [`native::NativeEngine`]: in-process DSP. Commands cross to the audio
//!   thread over a lock-free ring and are applied by
//!   [`render::EngineRenderer`] inside the device callback.
//! - [`recording::RecordingEngine`]: no audio at all. Records every call and
//!   can be told to fail, for tests and headless embedding.

use std::fmt;

use crate::{
    error::EngineError,
    notes::NoteId,
    params::{EnvelopeParams, EnvelopeUpdate, FilterType, Waveform},
};

pub mod native;
pub mod recording;
pub mod render;

pub use native::{EngineConfig, NativeEngine, ResumeHook};
pub use recording::{EngineCall, RecordingEngine};
pub use render::EngineRenderer;

/// Handle to one engine node. Only meaningful to the engine that issued it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32);

impl NodeId {
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u32 {
        self.0
    }

    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node#{}", self.0)
    }
}

/// Whether the engine is currently producing audio.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextState {
    Running,
    Suspended,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Voice,
    Filter,
    Reverb,
    Analyser,
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NodeKind::Voice => "voice",
            NodeKind::Filter => "filter",
            NodeKind::Reverb => "reverb",
            NodeKind::Analyser => "analyser",
        };
        f.write_str(name)
    }
}

/// Initial settings of a polyphonic voice node.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VoiceSpec {
    pub waveform: Waveform,
    pub volume_db: f64,
    pub envelope: EnvelopeParams,
}

/// Initial settings of a filter node.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FilterSpec {
    pub filter_type: FilterType,
    pub frequency_hz: f64,
    pub q: f64,
}

/// A single parameter write addressed to one node.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParamWrite {
    Waveform(Waveform),
    VolumeDb(f64),
    /// Fields left `None` keep their value. Applies from the next attack.
    Envelope(EnvelopeUpdate),
    FilterFrequency(f64),
    FilterType(FilterType),
    FilterQ(f64),
    ReverbWet(f64),
}

impl ParamWrite {
    /// Node kind this write is meaningful for.
    pub fn target_kind(&self) -> NodeKind {
        match self {
            ParamWrite::Waveform(_) | ParamWrite::VolumeDb(_) | ParamWrite::Envelope(_) => {
                NodeKind::Voice
            }
            ParamWrite::FilterFrequency(_) | ParamWrite::FilterType(_) | ParamWrite::FilterQ(_) => {
                NodeKind::Filter
            }
            ParamWrite::ReverbWet(_) => NodeKind::Reverb,
        }
    }
}

/// Host audio engine.
pub trait AudioEngine {
    fn context_state(&self) -> ContextState;

    /// Asks the engine to start producing audio.
    fn resume(&mut self) -> Result<(), EngineError>;

    fn create_voice(&mut self, spec: &VoiceSpec) -> Result<NodeId, EngineError>;
    fn create_filter(&mut self, spec: &FilterSpec) -> Result<NodeId, EngineError>;
    fn create_reverb(&mut self, wet: f64) -> Result<NodeId, EngineError>;
    /// `size` is the number of most recent samples the analyser retains.
    fn create_analyser(&mut self, size: usize) -> Result<NodeId, EngineError>;

    fn connect(&mut self, from: NodeId, to: NodeId) -> Result<(), EngineError>;
    fn connect_to_output(&mut self, node: NodeId) -> Result<(), EngineError>;

    fn set_param(&mut self, node: NodeId, write: ParamWrite) -> Result<(), EngineError>;

    fn trigger_attack(&mut self, voice: NodeId, note: NoteId) -> Result<(), EngineError>;
    fn trigger_release(&mut self, voice: NodeId, note: NoteId) -> Result<(), EngineError>;

    /// Copies the newest analyser samples into `out`, oldest first, and
    /// returns how many were written.
    fn read_analyser(&mut self, node: NodeId, out: &mut [f32]) -> Result<usize, EngineError>;

    fn dispose(&mut self, node: NodeId) -> Result<(), EngineError>;
}
