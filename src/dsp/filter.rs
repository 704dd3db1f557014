use std::f32::consts::PI;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use super::smooth::SmoothedParam;

/*
State-variable filter (trapezoidal integrators)
================================================

  g = tan(π · cutoff / sample_rate)      prewarped integrator gain
  k = 1 / Q                              damping

  v3 = x - ic2
  v1 = (ic1 + g·v3) / (1 + g·(g + k))    bandpass
  v2 = ic2 + g·v1                        lowpass
  hp = x - k·v1 - v2                     highpass

Q = 0.707 is maximally flat; Q = 1 gives a slight bump at the cutoff, and
higher values ring. Both responses share one state pair so switching type
mid-note is click-free.

| type      | passes       | rejects      | transparent at |
| --------- | ------------ | ------------ | -------------- |
| low-pass  | below cutoff | above cutoff | 20 kHz         |
| high-pass | above cutoff | below cutoff | 20 Hz          |
*/

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FilterType {
    #[default]
    LowPass,
    HighPass,
}

impl FilterType {
    pub fn label(self) -> &'static str {
        match self {
            FilterType::LowPass => "lowpass",
            FilterType::HighPass => "highpass",
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            FilterType::LowPass => FilterType::HighPass,
            FilterType::HighPass => FilterType::LowPass,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SVFilter {
    ic1eq: f32,
    ic2eq: f32,

    sample_rate: f32,
    cutoff: SmoothedParam,
    q: f32,
    filter_type: FilterType,

    g: f32,
}

impl SVFilter {
    pub fn new(sample_rate: f32, filter_type: FilterType, cutoff_hz: f32, q: f32) -> Self {
        let mut filter = Self {
            ic1eq: 0.0,
            ic2eq: 0.0,
            sample_rate,
            cutoff: SmoothedParam::instant(cutoff_hz),
            q: q.max(0.1),
            filter_type,
            g: 0.0,
        };
        filter.g = filter.compute_g(cutoff_hz);
        filter
    }

    pub fn lowpass(sample_rate: f32, cutoff_hz: f32) -> Self {
        Self::new(sample_rate, FilterType::LowPass, cutoff_hz, 0.707)
    }

    pub fn highpass(sample_rate: f32, cutoff_hz: f32) -> Self {
        Self::new(sample_rate, FilterType::HighPass, cutoff_hz, 0.707)
    }

    /// Glide cutoff changes over `smoothing_ms` instead of stepping.
    pub fn with_smoothing(mut self, smoothing_ms: f32) -> Self {
        self.cutoff = SmoothedParam::new(self.cutoff.get(), self.sample_rate, smoothing_ms);
        self
    }

    #[inline]
    fn compute_g(&self, cutoff_hz: f32) -> f32 {
        // keep the prewarp away from Nyquist, where tan() blows up
        let nyquist_safe = cutoff_hz.clamp(1.0, self.sample_rate * 0.49);
        (PI * nyquist_safe / self.sample_rate).tan()
    }

    #[inline]
    pub fn process(&mut self, sample: f32) -> f32 {
        if !self.cutoff.is_settled() {
            let cutoff = self.cutoff.advance();
            self.g = self.compute_g(cutoff);
        }

        let g = self.g;
        let k = 1.0 / self.q;
        let h = 1.0 / (1.0 + g * (g + k));
        let v3 = sample - self.ic2eq;
        let v1 = h * (self.ic1eq + g * v3);
        let v2 = self.ic2eq + g * v1;

        self.ic1eq = 2.0 * v1 - self.ic1eq;
        self.ic2eq = 2.0 * v2 - self.ic2eq;

        match self.filter_type {
            FilterType::LowPass => v2,
            FilterType::HighPass => sample - k * v1 - v2,
        }
    }

    pub fn render(&mut self, buffer: &mut [f32]) {
        for sample in buffer.iter_mut() {
            *sample = self.process(*sample);
        }
    }

    pub fn reset(&mut self) {
        self.ic1eq = 0.0;
        self.ic2eq = 0.0;
    }

    pub fn set_cutoff(&mut self, cutoff_hz: f32) {
        self.cutoff.set_target(cutoff_hz);
    }

    pub fn set_q(&mut self, q: f32) {
        self.q = q.max(0.1);
    }

    pub fn set_filter_type(&mut self, filter_type: FilterType) {
        self.filter_type = filter_type;
    }

    /// Target cutoff, ignoring any glide in progress.
    pub fn cutoff(&self) -> f32 {
        self.cutoff.target()
    }

    /// True while the cutoff is still moving towards its target.
    pub fn is_gliding(&self) -> bool {
        !self.cutoff.is_settled()
    }

    pub fn q(&self) -> f32 {
        self.q
    }

    pub fn filter_type(&self) -> FilterType {
        self.filter_type
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsp::oscillator::{Oscillator, Waveform};

    const SAMPLE_RATE: f32 = 48_000.0;

    fn sine(frequency: f32, len: usize) -> Vec<f32> {
        let mut osc = Oscillator::new(SAMPLE_RATE, Waveform::Sine);
        osc.set_frequency(frequency);
        let mut buffer = vec![0.0; len];
        osc.render(&mut buffer);
        buffer
    }

    fn peak_after_transient(buffer: &[f32]) -> f32 {
        buffer
            .iter()
            .skip(buffer.len() / 2)
            .fold(0.0f32, |acc, &x| acc.max(x.abs()))
    }

    #[test]
    fn lowpass_passes_dc() {
        let mut filter = SVFilter::lowpass(SAMPLE_RATE, 500.0);
        let mut buffer = vec![1.0; 512];
        filter.render(&mut buffer);
        assert!(buffer[511] > 0.99);
    }

    #[test]
    fn highpass_blocks_dc() {
        let mut filter = SVFilter::highpass(SAMPLE_RATE, 500.0);
        let mut buffer = vec![1.0; 512];
        filter.render(&mut buffer);
        assert!(buffer[511].abs() < 0.01);
    }

    #[test]
    fn lowpass_attenuates_above_cutoff() {
        let mut filter = SVFilter::lowpass(SAMPLE_RATE, 500.0);
        let mut buffer = sine(5_000.0, 2_048);
        filter.render(&mut buffer);
        assert!(peak_after_transient(&buffer) < 0.05);
    }

    #[test]
    fn bypass_settings_are_transparent_in_band() {
        let mut lp = SVFilter::lowpass(SAMPLE_RATE, 20_000.0);
        let mut buffer = sine(1_000.0, 4_096);
        lp.render(&mut buffer);
        let lp_peak = peak_after_transient(&buffer);
        assert!((lp_peak - 1.0).abs() < 0.02, "lowpass bypass peak {lp_peak}");

        let mut hp = SVFilter::highpass(SAMPLE_RATE, 20.0);
        let mut buffer = sine(1_000.0, 4_096);
        hp.render(&mut buffer);
        let hp_peak = peak_after_transient(&buffer);
        assert!((hp_peak - 1.0).abs() < 0.02, "highpass bypass peak {hp_peak}");
    }

    #[test]
    fn higher_q_boosts_cutoff() {
        let mut flat = SVFilter::new(SAMPLE_RATE, FilterType::LowPass, 1_000.0, 0.5);
        let mut buffer = sine(1_000.0, 4_096);
        flat.render(&mut buffer);
        let flat_peak = peak_after_transient(&buffer);

        let mut resonant = SVFilter::new(SAMPLE_RATE, FilterType::LowPass, 1_000.0, 8.0);
        let mut buffer = sine(1_000.0, 4_096);
        resonant.render(&mut buffer);
        let resonant_peak = peak_after_transient(&buffer);

        assert!(resonant_peak > flat_peak * 4.0);
    }

    #[test]
    fn smoothed_cutoff_glides() {
        let mut filter = SVFilter::lowpass(SAMPLE_RATE, 200.0).with_smoothing(20.0);
        filter.set_cutoff(10_000.0);
        assert_eq!(filter.cutoff(), 10_000.0);

        let mut buffer = sine(5_000.0, 8);
        filter.render(&mut buffer);
        // a few samples in, the cutoff is still near 200 Hz
        assert!(buffer.iter().all(|x| x.abs() < 0.2));
    }

    #[test]
    fn cutoff_glide_finishes() {
        let mut filter = SVFilter::lowpass(SAMPLE_RATE, 1_000.0).with_smoothing(20.0);
        filter.set_cutoff(20_000.0);
        assert!(filter.is_gliding());

        // half a second is ~25 time constants
        let mut buffer = vec![0.0; 24_000];
        filter.render(&mut buffer);
        assert!(!filter.is_gliding());
    }

    #[test]
    fn switching_type_keeps_state_finite() {
        let mut filter = SVFilter::lowpass(SAMPLE_RATE, 800.0);
        let mut buffer = sine(440.0, 256);
        filter.render(&mut buffer);
        filter.set_filter_type(FilterType::HighPass);
        filter.render(&mut buffer);
        assert!(buffer.iter().all(|x| x.is_finite()));
    }
}
