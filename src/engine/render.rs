//! Audio-thread half of the native engine.
//!
//! [`EngineRenderer`] owns every DSP node. The control thread never touches
//! them directly: it sends [`EngineMessage`]s, which are drained at the top
//! of each callback. Nodes arrive fully built (allocation happened on the
//! control thread) and leave through the retire ring, so nothing in
//! [`EngineRenderer::render`] allocates or frees.
//!
//! Topology is a set of chains. Each voice renders into scratch, then the
//! block is passed down `next` links through the processors until a node
//! marked as output, where it is summed into the device buffer.

use rtrb::{Consumer, Producer};

use crate::{
    dsp::{envelope::EnvelopeShape, filter::SVFilter, reverb::Reverb},
    engine::{NodeId, NodeKind, ParamWrite},
    synth::PolySynth,
    MAX_BLOCK_SIZE,
};

/// Samples from an analyser node to its control-thread reader.
pub(crate) struct AnalyserNode {
    tx: Producer<f32>,
}

impl AnalyserNode {
    pub(crate) fn new(tx: Producer<f32>) -> Self {
        Self { tx }
    }

    fn process(&mut self, buffer: &[f32]) {
        for &sample in buffer {
            // readers get the same [-1, 1] range the device does; the
            // reader is behind: drop rather than block
            if self.tx.push(sample.clamp(-1.0, 1.0)).is_err() {
                break;
            }
        }
    }
}

pub(crate) struct VoiceNode {
    pub(crate) synth: PolySynth,
    pub(crate) shape: EnvelopeShape,
}

pub(crate) enum RenderNode {
    Voice(VoiceNode),
    Filter(SVFilter),
    Reverb(Reverb),
    Analyser(AnalyserNode),
}

impl RenderNode {
    pub(crate) fn kind(&self) -> NodeKind {
        match self {
            RenderNode::Voice(_) => NodeKind::Voice,
            RenderNode::Filter(_) => NodeKind::Filter,
            RenderNode::Reverb(_) => NodeKind::Reverb,
            RenderNode::Analyser(_) => NodeKind::Analyser,
        }
    }

    fn apply(&mut self, write: ParamWrite) {
        match (self, write) {
            (RenderNode::Voice(v), ParamWrite::Waveform(w)) => v.synth.set_waveform(w),
            (RenderNode::Voice(v), ParamWrite::VolumeDb(db)) => v.synth.set_volume_db(db as f32),
            (RenderNode::Voice(v), ParamWrite::Envelope(update)) => {
                let overlay = |field: Option<f64>, old: f32| field.map_or(old, |x| x as f32);
                v.shape = EnvelopeShape::new(
                    overlay(update.attack, v.shape.attack),
                    overlay(update.decay, v.shape.decay),
                    overlay(update.sustain, v.shape.sustain),
                    overlay(update.release, v.shape.release),
                );
                v.synth.set_envelope(v.shape);
            }
            (RenderNode::Filter(f), ParamWrite::FilterFrequency(hz)) => f.set_cutoff(hz as f32),
            (RenderNode::Filter(f), ParamWrite::FilterType(t)) => f.set_filter_type(t),
            (RenderNode::Filter(f), ParamWrite::FilterQ(q)) => f.set_q(q as f32),
            (RenderNode::Reverb(r), ParamWrite::ReverbWet(wet)) => r.set_mix(wet as f32),
            // kind mismatches are rejected before the message is sent
            _ => {}
        }
    }

    fn process(&mut self, buffer: &mut [f32]) {
        match self {
            RenderNode::Voice(_) => {}
            RenderNode::Filter(f) => f.render(buffer),
            RenderNode::Reverb(r) => r.render(buffer),
            RenderNode::Analyser(a) => a.process(buffer),
        }
    }
}

pub(crate) enum EngineMessage {
    Insert { id: NodeId, node: Box<RenderNode> },
    Connect { from: NodeId, to: NodeId },
    ConnectOutput(NodeId),
    Set { node: NodeId, write: ParamWrite },
    Attack { voice: NodeId, note: u8 },
    Release { voice: NodeId, note: u8 },
    Remove(NodeId),
}

pub struct EngineRenderer {
    rx: Consumer<EngineMessage>,
    retire_tx: Producer<Box<RenderNode>>,
    nodes: Vec<Option<Box<RenderNode>>>,
    next: Vec<Option<usize>>,
    to_output: Vec<bool>,
    scratch: Vec<f32>,
    mono: Vec<f32>,
}

impl EngineRenderer {
    pub(crate) fn new(
        rx: Consumer<EngineMessage>,
        retire_tx: Producer<Box<RenderNode>>,
        max_nodes: usize,
    ) -> Self {
        Self {
            rx,
            retire_tx,
            nodes: (0..max_nodes).map(|_| None).collect(),
            next: vec![None; max_nodes],
            to_output: vec![false; max_nodes],
            scratch: vec![0.0; MAX_BLOCK_SIZE],
            mono: vec![0.0; MAX_BLOCK_SIZE],
        }
    }

    fn node_mut(&mut self, id: NodeId) -> Option<&mut RenderNode> {
        self.nodes.get_mut(id.index()).and_then(|n| n.as_deref_mut())
    }

    fn drain_messages(&mut self) {
        while let Ok(message) = self.rx.pop() {
            match message {
                EngineMessage::Insert { id, node } => {
                    if let Some(slot) = self.nodes.get_mut(id.index()) {
                        *slot = Some(node);
                        self.next[id.index()] = None;
                        self.to_output[id.index()] = false;
                    }
                }
                EngineMessage::Connect { from, to } => {
                    if let Some(link) = self.next.get_mut(from.index()) {
                        *link = Some(to.index());
                    }
                }
                EngineMessage::ConnectOutput(id) => {
                    if let Some(flag) = self.to_output.get_mut(id.index()) {
                        *flag = true;
                    }
                }
                EngineMessage::Set { node, write } => {
                    if let Some(node) = self.node_mut(node) {
                        node.apply(write);
                    }
                }
                EngineMessage::Attack { voice, note } => {
                    if let Some(RenderNode::Voice(v)) = self.node_mut(voice) {
                        v.synth.note_on(note, 1.0);
                    }
                }
                EngineMessage::Release { voice, note } => {
                    if let Some(RenderNode::Voice(v)) = self.node_mut(voice) {
                        v.synth.note_off(note);
                    }
                }
                EngineMessage::Remove(id) => self.remove(id.index()),
            }
        }
    }

    fn remove(&mut self, index: usize) {
        let Some(slot) = self.nodes.get_mut(index) else {
            return;
        };
        if let Some(node) = slot.take() {
            // freed on the control thread; if that ring is full, drop here
            let _ = self.retire_tx.push(node);
        }
        self.next[index] = None;
        self.to_output[index] = false;
        for link in self.next.iter_mut() {
            if *link == Some(index) {
                *link = None;
            }
        }
    }

    /// Renders one mono block into `out`, applying queued commands first.
    pub fn render(&mut self, out: &mut [f32]) {
        self.drain_messages();
        for chunk in out.chunks_mut(MAX_BLOCK_SIZE) {
            self.render_chunk(chunk);
        }
    }

    /// Renders interleaved frames, copying the mono mix to every channel.
    pub fn render_interleaved(&mut self, out: &mut [f32], channels: usize) {
        self.drain_messages();
        let channels = channels.max(1);
        for frames in out.chunks_mut(MAX_BLOCK_SIZE * channels) {
            let len = frames.len() / channels;
            let mut mono = std::mem::take(&mut self.mono);
            self.render_chunk(&mut mono[..len]);
            for (frame, &sample) in frames.chunks_mut(channels).zip(mono.iter()) {
                frame.fill(sample);
            }
            self.mono = mono;
        }
    }

    fn render_chunk(&mut self, out: &mut [f32]) {
        out.fill(0.0);
        let len = out.len();

        for source in 0..self.nodes.len() {
            let scratch = &mut self.scratch[..len];
            match self.nodes[source].as_deref_mut() {
                Some(RenderNode::Voice(v)) => v.synth.render(scratch),
                _ => continue,
            }

            let mut current = source;
            // bounded walk: a chain never revisits a node
            for _ in 0..self.nodes.len() {
                if self.to_output[current] {
                    for (o, s) in out.iter_mut().zip(scratch.iter()) {
                        *o += *s;
                    }
                }
                let Some(next) = self.next[current] else {
                    break;
                };
                if let Some(node) = self.nodes[next].as_deref_mut() {
                    node.process(scratch);
                }
                current = next;
            }
        }

        for sample in out.iter_mut() {
            *sample = sample.clamp(-1.0, 1.0);
        }
    }
}
