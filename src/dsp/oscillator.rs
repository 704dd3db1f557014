#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use std::f32::consts::TAU;

/*
Audio Oscillator
================

The oscillator is the voice's sound source: a phase accumulator in [0, 1)
advanced by `frequency / sample_rate` every sample, shaped into one of four
waveforms.

  Sine      sin(2π·phase)                      fundamental only
  Square    +1 below phase 0.5, -1 above       odd harmonics, 1/n
  Sawtooth  2·phase - 1                        all harmonics, 1/n
  Triangle  1 - 4·|phase - 0.5|                odd harmonics, 1/n²

Square and sawtooth jump instantly, which folds harmonics above Nyquist back
into the audible band. A PolyBLEP residual is subtracted around each jump:
it replaces the ideal step with a short polynomial ramp spanning one sample
on either side.

          naive               with PolyBLEP
   1 ┤   ╱│   ╱│            1 ┤   ╱╮   ╱╮
     │  ╱ │  ╱ │              │  ╱ │  ╱ │
  -1 ┤ ╱  │ ╱  │           -1 ┤ ╱  ╰╱   ╰
*/

/// Oscillator shape.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Waveform {
    #[default]
    Sine,
    Square,
    Sawtooth,
    Triangle,
}

impl Waveform {
    pub const ALL: [Waveform; 4] = [
        Waveform::Sine,
        Waveform::Square,
        Waveform::Sawtooth,
        Waveform::Triangle,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Waveform::Sine => "sine",
            Waveform::Square => "square",
            Waveform::Sawtooth => "sawtooth",
            Waveform::Triangle => "triangle",
        }
    }

    /// The next shape in panel order, wrapping around.
    pub fn next(self) -> Self {
        match self {
            Waveform::Sine => Waveform::Square,
            Waveform::Square => Waveform::Sawtooth,
            Waveform::Sawtooth => Waveform::Triangle,
            Waveform::Triangle => Waveform::Sine,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Oscillator {
    phase: f32,
    phase_inc: f32,
    sample_rate: f32,
    waveform: Waveform,
}

impl Oscillator {
    pub fn new(sample_rate: f32, waveform: Waveform) -> Self {
        Self {
            phase: 0.0,
            phase_inc: 440.0 / sample_rate,
            sample_rate,
            waveform,
        }
    }

    pub fn set_frequency(&mut self, frequency: f32) {
        self.phase_inc = (frequency.max(0.0) / self.sample_rate).min(0.5);
    }

    pub fn set_waveform(&mut self, waveform: Waveform) {
        self.waveform = waveform;
    }

    pub fn waveform(&self) -> Waveform {
        self.waveform
    }

    pub fn reset(&mut self) {
        self.phase = 0.0;
    }

    #[inline]
    pub fn advance(&mut self) -> f32 {
        let phase = self.phase;
        let dt = self.phase_inc;

        let out = match self.waveform {
            Waveform::Sine => (phase * TAU).sin(),
            Waveform::Sawtooth => 2.0 * phase - 1.0 - poly_blep(phase, dt),
            Waveform::Square => {
                let naive = if phase < 0.5 { 1.0 } else { -1.0 };
                naive + poly_blep(phase, dt) - poly_blep((phase + 0.5).fract(), dt)
            }
            Waveform::Triangle => 1.0 - 4.0 * (phase - 0.5).abs(),
        };

        self.phase += dt;
        if self.phase >= 1.0 {
            self.phase -= 1.0;
        }
        out
    }

    pub fn render(&mut self, buffer: &mut [f32]) {
        for sample in buffer.iter_mut() {
            *sample = self.advance();
        }
    }
}

/// Two-sample polynomial band-limited step residual.
#[inline]
fn poly_blep(t: f32, dt: f32) -> f32 {
    if dt <= 0.0 {
        0.0
    } else if t < dt {
        let x = t / dt;
        x + x - x * x - 1.0
    } else if t > 1.0 - dt {
        let x = (t - 1.0) / dt;
        x * x + x + x + 1.0
    } else {
        0.0
    }
}
