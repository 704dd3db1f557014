//! Reverb - room simulation via delay networks.
//!
//! Classic Schroeder topology with a short pre-delay in front:
//!
//! ```text
//!                       ┌→ [Comb 1] ─┐
//! Input ─→ [Pre-delay] ─┼→ [Comb 2] ─┼→ (+) ─→ [Allpass 1] ─→ [Allpass 2] ─→ wet
//!                       ├→ [Comb 3] ─┤
//!                       └→ [Comb 4] ─┘
//!
//! Output = (1 - mix) · dry + mix · wet
//! ```
//!
//! Comb feedback is derived from the decay time (RT60): each comb loses 60 dB
//! after `decay` seconds, i.e. `g = 10^(-3 · delay / decay)`.
//!
//! The mix is a [`SmoothedParam`], so toggling reverb off glides to dry
//! instead of cutting the tail mid-sample.

use super::smooth::SmoothedParam;

const COMB_DELAYS_MS: [f32; 4] = [29.7, 37.1, 41.1, 43.7];
const ALLPASS_DELAYS_MS: [f32; 2] = [5.0, 1.7];
const ALLPASS_FEEDBACK: f32 = 0.5;
const DEFAULT_DAMPING: f32 = 0.3;

pub const DEFAULT_DECAY_SECONDS: f32 = 2.0;
pub const DEFAULT_PRE_DELAY_SECONDS: f32 = 0.01;

fn samples_for(ms: f32, sample_rate: f32) -> usize {
    ((ms * sample_rate / 1000.0) as usize).max(1)
}

/// Circular buffer sized once at construction.
#[derive(Debug, Clone)]
struct DelayLine {
    buffer: Box<[f32]>,
    pos: usize,
}

impl DelayLine {
    fn new(len: usize) -> Self {
        Self {
            buffer: vec![0.0; len.max(1)].into_boxed_slice(),
            pos: 0,
        }
    }

    fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Returns the sample written `len` samples ago and stores `input`.
    #[inline]
    fn tick(&mut self, input: f32) -> f32 {
        let out = self.buffer[self.pos];
        self.buffer[self.pos] = input;
        self.pos = (self.pos + 1) % self.buffer.len();
        out
    }

    #[inline]
    fn read(&self) -> f32 {
        self.buffer[self.pos]
    }

    fn clear(&mut self) {
        self.buffer.fill(0.0);
        self.pos = 0;
    }
}

/// Feedback comb with one-pole damping in the loop.
#[derive(Debug, Clone)]
pub struct CombFilter {
    line: DelayLine,
    feedback: f32,
    damp: f32,
    filter_state: f32,
}

impl CombFilter {
    pub fn new(delay_samples: usize) -> Self {
        Self {
            line: DelayLine::new(delay_samples),
            feedback: 0.5,
            damp: DEFAULT_DAMPING,
            filter_state: 0.0,
        }
    }

    pub fn delay_samples(&self) -> usize {
        self.line.len()
    }

    pub fn set_feedback(&mut self, feedback: f32) {
        self.feedback = feedback.clamp(0.0, 0.98);
    }

    pub fn set_damp(&mut self, damp: f32) {
        self.damp = damp.clamp(0.0, 1.0);
    }

    #[inline]
    pub fn process(&mut self, input: f32) -> f32 {
        let output = self.line.read();
        self.filter_state = output * (1.0 - self.damp) + self.filter_state * self.damp;
        self.line.tick(input + self.filter_state * self.feedback);
        output
    }

    pub fn reset(&mut self) {
        self.line.clear();
        self.filter_state = 0.0;
    }
}

#[derive(Debug, Clone)]
pub struct AllpassFilter {
    line: DelayLine,
    feedback: f32,
}

impl AllpassFilter {
    pub fn new(delay_samples: usize) -> Self {
        Self {
            line: DelayLine::new(delay_samples),
            feedback: ALLPASS_FEEDBACK,
        }
    }

    #[inline]
    pub fn process(&mut self, input: f32) -> f32 {
        let delayed = self.line.read();
        let output = -self.feedback * input + delayed;
        self.line.tick(input + self.feedback * output);
        output
    }

    pub fn reset(&mut self) {
        self.line.clear();
    }
}

#[derive(Debug, Clone)]
pub struct Reverb {
    pre_delay: DelayLine,
    combs: [CombFilter; 4],
    allpasses: [AllpassFilter; 2],
    mix: SmoothedParam,
}

impl Reverb {
    pub fn new(sample_rate: f32, mix: f32, smoothing_ms: f32) -> Self {
        let combs = COMB_DELAYS_MS.map(|ms| CombFilter::new(samples_for(ms, sample_rate)));
        let allpasses = ALLPASS_DELAYS_MS.map(|ms| AllpassFilter::new(samples_for(ms, sample_rate)));

        let mut reverb = Self {
            pre_delay: DelayLine::new(samples_for(DEFAULT_PRE_DELAY_SECONDS * 1000.0, sample_rate)),
            combs,
            allpasses,
            mix: SmoothedParam::new(mix.clamp(0.0, 1.0), sample_rate, smoothing_ms),
        };
        reverb.set_decay(DEFAULT_DECAY_SECONDS, sample_rate);
        reverb
    }

    /// Sets every comb's feedback so its tail falls 60 dB in `seconds`.
    pub fn set_decay(&mut self, seconds: f32, sample_rate: f32) {
        let seconds = seconds.max(0.01);
        for comb in &mut self.combs {
            let delay = comb.delay_samples() as f32 / sample_rate;
            comb.set_feedback(10f32.powf(-3.0 * delay / seconds));
        }
    }

    pub fn set_mix(&mut self, mix: f32) {
        self.mix.set_target(mix.clamp(0.0, 1.0));
    }

    pub fn mix(&self) -> f32 {
        self.mix.target()
    }

    /// The reverberated signal alone.
    #[inline]
    pub fn process_wet(&mut self, input: f32) -> f32 {
        let delayed = self.pre_delay.tick(input);
        let mut wet = 0.0;
        for comb in &mut self.combs {
            wet += comb.process(delayed);
        }
        wet *= 0.25;
        for allpass in &mut self.allpasses {
            wet = allpass.process(wet);
        }
        wet
    }

    #[inline]
    pub fn process(&mut self, input: f32) -> f32 {
        let mix = self.mix.advance();
        let wet = self.process_wet(input);
        (1.0 - mix) * input + mix * wet
    }

    pub fn render(&mut self, buffer: &mut [f32]) {
        for sample in buffer.iter_mut() {
            *sample = self.process(*sample);
        }
    }

    pub fn reset(&mut self) {
        self.pre_delay.clear();
        for comb in &mut self.combs {
            comb.reset();
        }
        for allpass in &mut self.allpasses {
            allpass.reset();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn comb_filter_creates_echo() {
        let mut comb = CombFilter::new(10);
        comb.set_feedback(0.5);
        comb.set_damp(0.0);

        assert!(comb.process(1.0).abs() < 0.01);
        for _ in 0..9 {
            comb.process(0.0);
        }
        assert!(comb.process(0.0) > 0.99);
        for _ in 0..9 {
            comb.process(0.0);
        }
        let second = comb.process(0.0);
        assert!((second - 0.5).abs() < 0.01, "second echo {second}");
    }

    #[test]
    fn allpass_preserves_energy() {
        let mut allpass = AllpassFilter::new(5);
        let mut energy_in = 0.0;
        let mut energy_out = 0.0;

        for i in 0..200 {
            let input = if i < 10 { 1.0 } else { 0.0 };
            let output = allpass.process(input);
            energy_in += input * input;
            energy_out += output * output;
        }
        assert!(energy_out > energy_in * 0.8);
    }

    #[test]
    fn impulse_leaves_a_tail() {
        let mut reverb = Reverb::new(48_000.0, 1.0, 0.0);
        reverb.process(1.0);

        let tail: f32 = (0..10_000).map(|_| reverb.process(0.0).abs()).sum();
        assert!(tail > 0.01, "tail energy {tail}");
    }

    #[test]
    fn zero_mix_is_dry() {
        let mut reverb = Reverb::new(48_000.0, 0.0, 0.0);
        for i in 0..4_000 {
            let input = ((i as f32) * 0.05).sin();
            assert!((reverb.process(input) - input).abs() < 1e-6);
        }
    }

    #[test]
    fn mix_change_is_smoothed() {
        let mut reverb = Reverb::new(48_000.0, 1.0, 10.0);
        reverb.set_mix(0.0);
        // constant input: dry part of the output rises gradually
        let first = reverb.process(1.0);
        assert!(first < 0.01, "first sample {first}");
        assert_eq!(reverb.mix(), 0.0);
    }

    #[test]
    fn stable_under_sustained_input() {
        let mut reverb = Reverb::new(48_000.0, 1.0, 0.0);
        reverb.set_decay(10.0, 48_000.0);
        for _ in 0..48_000 {
            let out = reverb.process(0.1);
            assert!(out.is_finite());
            assert!(out.abs() < 20.0, "unstable: {out}");
        }
    }
}
