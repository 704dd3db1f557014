//! An engine that makes no sound and remembers everything it was asked.

use std::collections::BTreeMap;

use crate::{
    engine::{AudioEngine, ContextState, FilterSpec, NodeId, NodeKind, ParamWrite, VoiceSpec},
    error::EngineError,
    notes::NoteId,
};

/// One call received by a [`RecordingEngine`].
#[derive(Debug, Clone, PartialEq)]
pub enum EngineCall {
    Resume,
    CreateVoice(VoiceSpec),
    CreateFilter(FilterSpec),
    CreateReverb { wet: f64 },
    CreateAnalyser { size: usize },
    Connect { from: NodeId, to: NodeId },
    ConnectToOutput(NodeId),
    SetParam { node: NodeId, write: ParamWrite },
    TriggerAttack { voice: NodeId, note: NoteId },
    TriggerRelease { voice: NodeId, note: NoteId },
    Dispose(NodeId),
}

#[derive(Debug, Default)]
pub struct RecordingEngine {
    calls: Vec<EngineCall>,
    live: BTreeMap<NodeId, NodeKind>,
    next_id: u32,
    created: usize,
    state: Option<ContextState>,
    fail_creation_at: Option<usize>,
    resume_failures: u32,
    write_failures: u32,
    analyser_fill: f32,
}

impl RecordingEngine {
    /// Starts suspended, like a freshly created browser audio context.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn running() -> Self {
        Self {
            state: Some(ContextState::Running),
            ..Self::default()
        }
    }

    /// The `n`th node creation (0-based) fails with `Unsupported`.
    pub fn fail_creation_at(mut self, n: usize) -> Self {
        self.fail_creation_at = Some(n);
        self
    }

    /// The next `count` resume attempts fail.
    pub fn fail_resumes(mut self, count: u32) -> Self {
        self.resume_failures = count;
        self
    }

    /// The next `count` parameter writes fail with `QueueFull` and are not
    /// recorded, as if they never reached the engine.
    pub fn fail_writes(mut self, count: u32) -> Self {
        self.write_failures = count;
        self
    }

    /// Value the analyser reports for every sample.
    pub fn with_analyser_fill(mut self, value: f32) -> Self {
        self.analyser_fill = value;
        self
    }

    pub fn calls(&self) -> &[EngineCall] {
        &self.calls
    }

    pub fn clear_calls(&mut self) {
        self.calls.clear();
    }

    pub fn live_nodes(&self) -> impl Iterator<Item = (NodeId, NodeKind)> + '_ {
        self.live.iter().map(|(id, kind)| (*id, *kind))
    }

    pub fn is_live(&self, node: NodeId) -> bool {
        self.live.contains_key(&node)
    }

    pub fn count(&self, predicate: impl Fn(&EngineCall) -> bool) -> usize {
        self.calls.iter().filter(|c| predicate(c)).count()
    }

    /// Parameter writes addressed to `node`, in order.
    pub fn writes_to(&self, node: NodeId) -> Vec<ParamWrite> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                EngineCall::SetParam { node: n, write } if *n == node => Some(*write),
                _ => None,
            })
            .collect()
    }

    fn create(&mut self, call: EngineCall, kind: NodeKind) -> Result<NodeId, EngineError> {
        let index = self.created;
        self.created += 1;
        self.calls.push(call);

        if self.fail_creation_at == Some(index) {
            return Err(EngineError::Unsupported(format!(
                "{kind} creation refused"
            )));
        }
        let id = NodeId::new(self.next_id);
        self.next_id += 1;
        self.live.insert(id, kind);
        Ok(id)
    }

    fn require(&self, node: NodeId) -> Result<NodeKind, EngineError> {
        self.live
            .get(&node)
            .copied()
            .ok_or(EngineError::UnknownNode(node))
    }
}

impl AudioEngine for RecordingEngine {
    fn context_state(&self) -> ContextState {
        self.state.unwrap_or(ContextState::Suspended)
    }

    fn resume(&mut self) -> Result<(), EngineError> {
        self.calls.push(EngineCall::Resume);
        if self.resume_failures > 0 {
            self.resume_failures -= 1;
            return Err(EngineError::ResumeFailed("not allowed to start".into()));
        }
        self.state = Some(ContextState::Running);
        Ok(())
    }

    fn create_voice(&mut self, spec: &VoiceSpec) -> Result<NodeId, EngineError> {
        self.create(EngineCall::CreateVoice(*spec), NodeKind::Voice)
    }

    fn create_filter(&mut self, spec: &FilterSpec) -> Result<NodeId, EngineError> {
        self.create(EngineCall::CreateFilter(*spec), NodeKind::Filter)
    }

    fn create_reverb(&mut self, wet: f64) -> Result<NodeId, EngineError> {
        self.create(EngineCall::CreateReverb { wet }, NodeKind::Reverb)
    }

    fn create_analyser(&mut self, size: usize) -> Result<NodeId, EngineError> {
        self.create(EngineCall::CreateAnalyser { size }, NodeKind::Analyser)
    }

    fn connect(&mut self, from: NodeId, to: NodeId) -> Result<(), EngineError> {
        self.calls.push(EngineCall::Connect { from, to });
        self.require(from)?;
        self.require(to)?;
        Ok(())
    }

    fn connect_to_output(&mut self, node: NodeId) -> Result<(), EngineError> {
        self.calls.push(EngineCall::ConnectToOutput(node));
        self.require(node).map(|_| ())
    }

    fn set_param(&mut self, node: NodeId, write: ParamWrite) -> Result<(), EngineError> {
        if self.write_failures > 0 {
            self.write_failures -= 1;
            return Err(EngineError::QueueFull);
        }
        self.calls.push(EngineCall::SetParam { node, write });
        let kind = self.require(node)?;
        if kind != write.target_kind() {
            return Err(EngineError::Unsupported(format!(
                "{write:?} sent to a {kind} node"
            )));
        }
        Ok(())
    }

    fn trigger_attack(&mut self, voice: NodeId, note: NoteId) -> Result<(), EngineError> {
        self.calls.push(EngineCall::TriggerAttack { voice, note });
        self.require(voice).map(|_| ())
    }

    fn trigger_release(&mut self, voice: NodeId, note: NoteId) -> Result<(), EngineError> {
        self.calls.push(EngineCall::TriggerRelease { voice, note });
        self.require(voice).map(|_| ())
    }

    fn read_analyser(&mut self, node: NodeId, out: &mut [f32]) -> Result<usize, EngineError> {
        self.require(node)?;
        out.fill(self.analyser_fill);
        Ok(out.len())
    }

    fn dispose(&mut self, node: NodeId) -> Result<(), EngineError> {
        self.calls.push(EngineCall::Dispose(node));
        self.live
            .remove(&node)
            .map(|_| ())
            .ok_or(EngineError::UnknownNode(node))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn creation_failure_is_injected_once() {
        let mut engine = RecordingEngine::new().fail_creation_at(1);
        assert!(engine.create_reverb(0.2).is_ok());
        assert!(engine.create_reverb(0.2).is_err());
        assert!(engine.create_reverb(0.2).is_ok());
        assert_eq!(engine.live_nodes().count(), 2);
    }

    #[test]
    fn resume_failures_count_down() {
        let mut engine = RecordingEngine::new().fail_resumes(1);
        assert_eq!(engine.context_state(), ContextState::Suspended);
        assert!(engine.resume().is_err());
        assert!(engine.resume().is_ok());
        assert_eq!(engine.context_state(), ContextState::Running);
    }

    #[test]
    fn double_dispose_is_an_error_at_engine_level() {
        let mut engine = RecordingEngine::running();
        let id = engine.create_analyser(128).unwrap();
        engine.dispose(id).unwrap();
        assert_eq!(engine.dispose(id), Err(EngineError::UnknownNode(id)));
    }
}
