//! Control-thread half of the native engine.

use std::collections::{HashMap, VecDeque};

use rtrb::{Consumer, PushError, RingBuffer};

use crate::{
    dsp::{envelope::EnvelopeShape, filter::SVFilter, reverb::Reverb},
    engine::{
        render::{AnalyserNode, EngineMessage, EngineRenderer, RenderNode, VoiceNode},
        AudioEngine, ContextState, FilterSpec, NodeId, NodeKind, ParamWrite, VoiceSpec,
    },
    error::EngineError,
    notes::NoteId,
    synth::PolySynth,
};

/// Called by [`NativeEngine::resume`]; the binary starts the output stream here.
///
/// Not `Send`: the hook usually owns a `cpal::Stream`, which is pinned to the
/// thread that built it on some hosts.
pub type ResumeHook = Box<dyn FnMut() -> Result<(), EngineError>>;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineConfig {
    pub sample_rate: f32,
    pub max_voices: usize,
    pub max_nodes: usize,
    pub command_capacity: usize,
    /// Glide time for gain, cutoff and wet changes.
    pub smoothing_ms: f32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sample_rate: 48_000.0,
            max_voices: 8,
            max_nodes: 64,
            command_capacity: 1024,
            smoothing_ms: 20.0,
        }
    }
}

impl EngineConfig {
    pub fn with_sample_rate(mut self, sample_rate: f32) -> Self {
        self.sample_rate = sample_rate;
        self
    }

    pub fn with_voices(mut self, max_voices: usize) -> Self {
        self.max_voices = max_voices.max(1);
        self
    }

    pub fn with_smoothing_ms(mut self, smoothing_ms: f32) -> Self {
        self.smoothing_ms = smoothing_ms.max(0.0);
        self
    }
}

/// Keeps the newest `size` samples published by one analyser node.
struct AnalyserTap {
    rx: Consumer<f32>,
    history: VecDeque<f32>,
    size: usize,
}

impl AnalyserTap {
    fn pull(&mut self) {
        while let Ok(sample) = self.rx.pop() {
            if self.history.len() == self.size {
                self.history.pop_front();
            }
            self.history.push_back(sample);
        }
    }
}

pub struct NativeEngine {
    config: EngineConfig,
    tx: rtrb::Producer<EngineMessage>,
    retired: Consumer<Box<RenderNode>>,
    live: Vec<Option<NodeKind>>,
    free_ids: Vec<u32>,
    analysers: HashMap<NodeId, AnalyserTap>,
    state: ContextState,
    resume_hook: Option<ResumeHook>,
}

impl NativeEngine {
    pub fn new(config: EngineConfig) -> (Self, EngineRenderer) {
        let max_nodes = config.max_nodes.max(1);
        let (tx, rx) = RingBuffer::new(config.command_capacity.max(1));
        let (retire_tx, retired) = RingBuffer::new(max_nodes * 2);

        let engine = Self {
            config,
            tx,
            retired,
            live: vec![None; max_nodes],
            // pop() hands out the lowest id first
            free_ids: (0..max_nodes as u32).rev().collect(),
            analysers: HashMap::new(),
            state: ContextState::Suspended,
            resume_hook: None,
        };
        let renderer = EngineRenderer::new(rx, retire_tx, max_nodes);
        (engine, renderer)
    }

    pub fn with_resume_hook(mut self, hook: ResumeHook) -> Self {
        self.resume_hook = Some(hook);
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn live_nodes(&self) -> usize {
        self.live.iter().filter(|k| k.is_some()).count()
    }

    /// Drops nodes the renderer has handed back.
    pub fn collect_garbage(&mut self) -> usize {
        let mut freed = 0;
        while let Ok(node) = self.retired.pop() {
            drop(node);
            freed += 1;
        }
        freed
    }

    fn send(&mut self, message: EngineMessage) -> Result<(), EngineError> {
        match self.tx.push(message) {
            Ok(()) => Ok(()),
            Err(PushError::Full(_)) => {
                tracing::warn!("engine command queue full");
                Err(EngineError::QueueFull)
            }
        }
    }

    fn kind_of(&self, id: NodeId) -> Result<NodeKind, EngineError> {
        self.live
            .get(id.index())
            .copied()
            .flatten()
            .ok_or(EngineError::UnknownNode(id))
    }

    fn expect_kind(&self, id: NodeId, kind: NodeKind) -> Result<(), EngineError> {
        let actual = self.kind_of(id)?;
        if actual == kind {
            Ok(())
        } else {
            Err(EngineError::Unsupported(format!(
                "{id} is a {actual} node, expected {kind}"
            )))
        }
    }

    fn insert(&mut self, node: RenderNode) -> Result<NodeId, EngineError> {
        self.collect_garbage();
        let kind = node.kind();
        let raw = self.free_ids.pop().ok_or(EngineError::NodeLimit)?;
        let id = NodeId::new(raw);

        if let Err(err) = self.send(EngineMessage::Insert {
            id,
            node: Box::new(node),
        }) {
            self.free_ids.push(raw);
            return Err(err);
        }
        self.live[id.index()] = Some(kind);
        tracing::debug!(%id, %kind, "created node");
        Ok(id)
    }
}

impl AudioEngine for NativeEngine {
    fn context_state(&self) -> ContextState {
        self.state
    }

    fn resume(&mut self) -> Result<(), EngineError> {
        if self.state == ContextState::Running {
            return Ok(());
        }
        if let Some(hook) = self.resume_hook.as_mut() {
            hook()?;
        }
        self.state = ContextState::Running;
        tracing::info!("audio context running");
        Ok(())
    }

    fn create_voice(&mut self, spec: &VoiceSpec) -> Result<NodeId, EngineError> {
        let shape = EnvelopeShape::new(
            spec.envelope.attack as f32,
            spec.envelope.decay as f32,
            spec.envelope.sustain as f32,
            spec.envelope.release as f32,
        );
        let synth = PolySynth::new(
            self.config.sample_rate,
            self.config.max_voices,
            spec.waveform,
            shape,
            spec.volume_db as f32,
            self.config.smoothing_ms,
        );
        self.insert(RenderNode::Voice(VoiceNode { synth, shape }))
    }

    fn create_filter(&mut self, spec: &FilterSpec) -> Result<NodeId, EngineError> {
        let filter = SVFilter::new(
            self.config.sample_rate,
            spec.filter_type,
            spec.frequency_hz as f32,
            spec.q as f32,
        )
        .with_smoothing(self.config.smoothing_ms);
        self.insert(RenderNode::Filter(filter))
    }

    fn create_reverb(&mut self, wet: f64) -> Result<NodeId, EngineError> {
        let reverb = Reverb::new(self.config.sample_rate, wet as f32, self.config.smoothing_ms);
        self.insert(RenderNode::Reverb(reverb))
    }

    fn create_analyser(&mut self, size: usize) -> Result<NodeId, EngineError> {
        let size = size.max(1);
        // room for several callbacks' worth between UI reads
        let (tx, rx) = RingBuffer::new(size.max(crate::MAX_BLOCK_SIZE) * 4);
        let id = self.insert(RenderNode::Analyser(AnalyserNode::new(tx)))?;
        self.analysers.insert(
            id,
            AnalyserTap {
                rx,
                history: VecDeque::with_capacity(size),
                size,
            },
        );
        Ok(id)
    }

    fn connect(&mut self, from: NodeId, to: NodeId) -> Result<(), EngineError> {
        self.kind_of(from)?;
        self.kind_of(to)?;
        self.send(EngineMessage::Connect { from, to })
    }

    fn connect_to_output(&mut self, node: NodeId) -> Result<(), EngineError> {
        self.kind_of(node)?;
        self.send(EngineMessage::ConnectOutput(node))
    }

    fn set_param(&mut self, node: NodeId, write: ParamWrite) -> Result<(), EngineError> {
        self.expect_kind(node, write.target_kind())?;
        self.send(EngineMessage::Set { node, write })
    }

    fn trigger_attack(&mut self, voice: NodeId, note: NoteId) -> Result<(), EngineError> {
        self.expect_kind(voice, NodeKind::Voice)?;
        self.send(EngineMessage::Attack {
            voice,
            note: note.midi(),
        })
    }

    fn trigger_release(&mut self, voice: NodeId, note: NoteId) -> Result<(), EngineError> {
        self.expect_kind(voice, NodeKind::Voice)?;
        self.send(EngineMessage::Release {
            voice,
            note: note.midi(),
        })
    }

    fn read_analyser(&mut self, node: NodeId, out: &mut [f32]) -> Result<usize, EngineError> {
        self.collect_garbage();
        let tap = self
            .analysers
            .get_mut(&node)
            .ok_or(EngineError::UnknownNode(node))?;
        tap.pull();

        let n = out.len().min(tap.history.len());
        let skip = tap.history.len() - n;
        for (dst, src) in out.iter_mut().zip(tap.history.iter().skip(skip)) {
            *dst = *src;
        }
        Ok(n)
    }

    fn dispose(&mut self, node: NodeId) -> Result<(), EngineError> {
        self.collect_garbage();
        self.kind_of(node)?;
        self.send(EngineMessage::Remove(node))?;
        self.live[node.index()] = None;
        self.analysers.remove(&node);
        self.free_ids.push(node.raw());
        tracing::debug!(id = %node, "disposed node");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::{EnvelopeParams, FilterType, Waveform};

    fn voice_spec() -> VoiceSpec {
        VoiceSpec {
            waveform: Waveform::Sawtooth,
            volume_db: -6.0,
            envelope: EnvelopeParams {
                attack: 0.001,
                decay: 0.05,
                sustain: 0.8,
                release: 0.05,
            },
        }
    }

    #[test]
    fn starts_suspended_and_resumes_through_hook() {
        use std::sync::{
            atomic::{AtomicUsize, Ordering},
            Arc,
        };

        let calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&calls);
        let (engine, _renderer) = NativeEngine::new(EngineConfig::default());
        let mut engine = engine.with_resume_hook(Box::new(move || -> Result<(), EngineError> {
            seen.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }));

        assert_eq!(engine.context_state(), ContextState::Suspended);
        engine.resume().unwrap();
        engine.resume().unwrap();
        assert_eq!(engine.context_state(), ContextState::Running);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn failing_hook_stays_suspended() {
        let (engine, _renderer) = NativeEngine::new(EngineConfig::default());
        let mut engine = engine.with_resume_hook(Box::new(|| -> Result<(), EngineError> {
            Err(EngineError::ResumeFailed("device busy".into()))
        }));
        assert!(engine.resume().is_err());
        assert_eq!(engine.context_state(), ContextState::Suspended);
    }

    #[test]
    fn node_limit_is_enforced() {
        let config = EngineConfig {
            max_nodes: 2,
            ..EngineConfig::default()
        };
        let (mut engine, _renderer) = NativeEngine::new(config);
        engine.create_reverb(0.1).unwrap();
        engine.create_reverb(0.1).unwrap();
        assert_eq!(engine.create_reverb(0.1), Err(EngineError::NodeLimit));
    }

    #[test]
    fn full_queue_is_reported() {
        let config = EngineConfig {
            command_capacity: 2,
            ..EngineConfig::default()
        };
        let (mut engine, _renderer) = NativeEngine::new(config);
        let a = engine.create_reverb(0.1).unwrap();
        engine.set_param(a, ParamWrite::ReverbWet(0.2)).unwrap();
        assert_eq!(
            engine.set_param(a, ParamWrite::ReverbWet(0.3)),
            Err(EngineError::QueueFull)
        );
    }

    #[test]
    fn writes_to_wrong_kind_are_rejected() {
        let (mut engine, _renderer) = NativeEngine::new(EngineConfig::default());
        let reverb = engine.create_reverb(0.1).unwrap();
        assert!(matches!(
            engine.set_param(reverb, ParamWrite::FilterQ(2.0)),
            Err(EngineError::Unsupported(_))
        ));
    }

    #[test]
    fn disposed_ids_are_unknown_then_reused() {
        let (mut engine, mut renderer) = NativeEngine::new(EngineConfig::default());
        let id = engine.create_reverb(0.1).unwrap();
        engine.dispose(id).unwrap();
        assert_eq!(engine.dispose(id), Err(EngineError::UnknownNode(id)));

        let mut out = [0.0; 64];
        renderer.render(&mut out);
        assert_eq!(engine.collect_garbage(), 1);

        let again = engine.create_reverb(0.1).unwrap();
        assert_eq!(again, id);
    }

    #[test]
    fn renders_full_chain_and_feeds_analyser() {
        let (mut engine, mut renderer) = NativeEngine::new(EngineConfig::default());
        let voice = engine.create_voice(&voice_spec()).unwrap();
        let filter = engine
            .create_filter(&FilterSpec {
                filter_type: FilterType::LowPass,
                frequency_hz: 5_000.0,
                q: 0.707,
            })
            .unwrap();
        let reverb = engine.create_reverb(0.3).unwrap();
        let analyser = engine.create_analyser(128).unwrap();
        engine.connect(voice, filter).unwrap();
        engine.connect(filter, reverb).unwrap();
        engine.connect(reverb, analyser).unwrap();
        engine.connect_to_output(analyser).unwrap();

        engine.trigger_attack(voice, NoteId::new(57)).unwrap();

        let mut out = vec![0.0; 1024];
        renderer.render(&mut out);
        let peak = out.iter().fold(0.0f32, |acc, &x| acc.max(x.abs()));
        assert!(peak > 0.05, "peak {peak}");

        let mut scope = [0.0; 256];
        let n = engine.read_analyser(analyser, &mut scope).unwrap();
        assert_eq!(n, 128);
        assert_eq!(&scope[..128], &out[1024 - 128..]);
    }

    #[test]
    fn silent_without_output_connection() {
        let (mut engine, mut renderer) = NativeEngine::new(EngineConfig::default());
        let voice = engine.create_voice(&voice_spec()).unwrap();
        engine.trigger_attack(voice, NoteId::new(60)).unwrap();

        let mut out = vec![0.0; 512];
        renderer.render(&mut out);
        assert!(out.iter().all(|&x| x == 0.0));
    }

    #[test]
    fn interleaved_copies_mono_to_each_channel() {
        let (mut engine, mut renderer) = NativeEngine::new(EngineConfig::default());
        let voice = engine.create_voice(&voice_spec()).unwrap();
        engine.connect_to_output(voice).unwrap();
        engine.trigger_attack(voice, NoteId::new(60)).unwrap();

        let mut out = vec![0.0; 512];
        renderer.render_interleaved(&mut out, 2);
        for frame in out.chunks(2) {
            assert_eq!(frame[0], frame[1]);
        }
        assert!(out.iter().any(|&x| x != 0.0));
    }

    #[test]
    fn analyser_samples_stay_in_range_for_a_loud_chord() {
        let (mut engine, mut renderer) = NativeEngine::new(EngineConfig::default());
        let voice = engine
            .create_voice(&VoiceSpec {
                waveform: Waveform::Square,
                volume_db: 0.0,
                ..voice_spec()
            })
            .unwrap();
        let filter = engine
            .create_filter(&FilterSpec {
                filter_type: FilterType::LowPass,
                frequency_hz: 20_000.0,
                q: 1.0,
            })
            .unwrap();
        let analyser = engine.create_analyser(128).unwrap();
        engine.connect(voice, filter).unwrap();
        engine.connect(filter, analyser).unwrap();
        engine.connect_to_output(analyser).unwrap();
        for midi in [60, 64, 67, 72] {
            engine.trigger_attack(voice, NoteId::new(midi)).unwrap();
        }

        let mut out = vec![0.0; 9_600];
        renderer.render(&mut out);

        let mut scope = [0.0; 128];
        let n = engine.read_analyser(analyser, &mut scope).unwrap();
        assert_eq!(n, 128);
        assert!(scope.iter().all(|x| (-1.0..=1.0).contains(x)));
        // the chord really does clip
        assert!(scope.iter().any(|x| x.abs() == 1.0));
    }

    #[test]
    fn dispose_drains_retired_nodes() {
        let (mut engine, mut renderer) = NativeEngine::new(EngineConfig::default());
        let ids: Vec<NodeId> = (0..3).map(|_| engine.create_reverb(0.1).unwrap()).collect();
        engine.dispose(ids[0]).unwrap();
        engine.dispose(ids[1]).unwrap();

        let mut out = [0.0; 64];
        renderer.render(&mut out);

        // the two retired reverbs are freed here, not left in the ring
        engine.dispose(ids[2]).unwrap();
        assert_eq!(engine.collect_garbage(), 0);

        renderer.render(&mut out);
        let mut scope = [0.0; 4];
        assert!(engine.read_analyser(ids[2], &mut scope).is_err());
        assert_eq!(engine.collect_garbage(), 0);
    }
}
