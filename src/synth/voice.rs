use crate::dsp::{
    envelope::{Envelope, EnvelopeShape},
    oscillator::{Oscillator, Waveform},
    RenderCtx,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoiceState {
    Free,      // Available for allocation
    Active,    // Gate high: attack, decay or sustain
    Releasing, // Gate low, envelope still ringing out
}

/// One oscillator shaped by one envelope, playing one note at a time.
#[derive(Debug, Clone)]
pub struct Voice {
    note: u8,
    state: VoiceState,
    age: u64,
    ctx: RenderCtx,
    osc: Oscillator,
    env: Envelope,
}

impl Voice {
    pub fn new(sample_rate: f32, waveform: Waveform, shape: EnvelopeShape) -> Self {
        Self {
            note: 0,
            state: VoiceState::Free,
            age: 0,
            ctx: RenderCtx::from_note(sample_rate, 69, 1.0),
            osc: Oscillator::new(sample_rate, waveform),
            env: Envelope::new(shape),
        }
    }

    /// Starts `note`, latching the envelope shape set most recently.
    pub fn start(&mut self, note: u8, velocity: f32, age: u64) {
        if self.state == VoiceState::Free {
            self.osc.reset();
        }
        self.note = note;
        self.state = VoiceState::Active;
        self.age = age;
        self.ctx = RenderCtx::from_note(self.ctx.sample_rate, note, velocity.clamp(0.0, 1.0));
        self.osc.set_frequency(self.ctx.frequency);
        self.env.note_on();
    }

    pub fn release(&mut self) {
        if self.state == VoiceState::Active {
            self.state = VoiceState::Releasing;
            self.env.note_off(&self.ctx);
        }
    }

    pub fn set_waveform(&mut self, waveform: Waveform) {
        self.osc.set_waveform(waveform);
    }

    pub fn set_envelope(&mut self, shape: EnvelopeShape) {
        self.env.set_shape(shape);
    }

    /// Adds this voice's output to `out`.
    pub fn render_add(&mut self, out: &mut [f32]) {
        if self.state == VoiceState::Free {
            return;
        }

        for sample in out.iter_mut() {
            let level = self.env.next_sample(&self.ctx);
            *sample += self.osc.advance() * level * self.ctx.velocity;
        }

        if self.state == VoiceState::Releasing && !self.env.is_active() {
            self.free();
        }
    }

    pub fn free(&mut self) {
        self.state = VoiceState::Free;
        self.env.reset();
    }

    pub fn is_free(&self) -> bool {
        self.state == VoiceState::Free
    }

    pub fn is_active(&self) -> bool {
        self.state != VoiceState::Free
    }

    pub fn note(&self) -> u8 {
        self.note
    }

    pub fn age(&self) -> u64 {
        self.age
    }

    pub fn state(&self) -> VoiceState {
        self.state
    }

    pub fn envelope(&self) -> &Envelope {
        &self.env
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn voice() -> Voice {
        Voice::new(1_000.0, Waveform::Square, EnvelopeShape::new(0.01, 0.01, 0.5, 0.02))
    }

    #[test]
    fn free_voice_is_silent() {
        let mut v = voice();
        let mut out = [0.0; 32];
        v.render_add(&mut out);
        assert!(out.iter().all(|&x| x == 0.0));
    }

    #[test]
    fn release_frees_after_tail() {
        let mut v = voice();
        v.start(60, 1.0, 0);
        let mut out = [0.0; 64];
        v.render_add(&mut out);
        assert!(out.iter().any(|&x| x != 0.0));

        v.release();
        assert_eq!(v.state(), VoiceState::Releasing);
        let mut out = [0.0; 64];
        v.render_add(&mut out);
        assert!(v.is_free());
    }

    #[test]
    fn release_is_ignored_when_not_playing() {
        let mut v = voice();
        v.release();
        assert!(v.is_free());
    }
}
