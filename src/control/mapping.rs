use crate::error::{Error, Result};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/*
Value Mapping
=============

Every control in the instrument owns a numeric range and a curve. The curve
decides how physical travel (pixels of drag, degrees of rotation) is spread
over that range.

  Linear   t = (v - min) / (max - min)
           Equal travel = equal change. Volume in dB, mix, sustain.

  Log      t = ln(v / min) / ln(max / min)
           Equal travel = equal *ratio*. Frequencies: 20 Hz → 200 Hz takes
           the same knob travel as 2 kHz → 20 kHz, which is how we hear pitch.

Both map into the normalized domain [0, 1]; `denormalize` maps back.

  0.0 ─────────── 0.5 ─────────── 1.0      normalized
  20 Hz          632 Hz         20 kHz      log: midpoint is √(min·max)
  20 Hz        10010 Hz         20 kHz      linear: midpoint is (min+max)/2

Knob rotation
-------------

A knob sweeps 270° with the gap at the bottom:

            0°
        ╱───┴───╲
  -135° │       │ +135°
        ╲       ╱
          (gap)

  angle = min_angle + t · (max_angle - min_angle)

Gain
----

  ratio = 10^(dB / 20)          dB = 20 · log10(ratio)
  -6 dB ≈ 0.5    -20 dB = 0.1    -60 dB = 0.001
*/

/// Curve used to spread a control's travel over its range.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Scale {
    #[default]
    Linear,
    Log,
}

/// Display unit for value readouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unit {
    Decibels,
    Hertz,
    Seconds,
    Percent,
    Plain,
}

/// A validated `[min, max]` range plus its scale.
///
/// Construction is the only place range preconditions are checked, so the
/// per-event mapping code never sees `min == max` or a log range touching 0.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParamRange {
    min: f64,
    max: f64,
    scale: Scale,
}

impl ParamRange {
    pub fn new(min: f64, max: f64, scale: Scale) -> Result<Self> {
        if !min.is_finite() || !max.is_finite() || min >= max {
            return Err(Error::InvalidRange { min, max });
        }
        if scale == Scale::Log && min <= 0.0 {
            return Err(Error::NonPositiveLogRange { min });
        }
        Ok(Self { min, max, scale })
    }

    /// For built-in tables whose bounds are known to be valid.
    pub(crate) const fn new_unchecked(min: f64, max: f64, scale: Scale) -> Self {
        Self { min, max, scale }
    }

    pub fn linear(min: f64, max: f64) -> Result<Self> {
        Self::new(min, max, Scale::Linear)
    }

    pub fn log(min: f64, max: f64) -> Result<Self> {
        Self::new(min, max, Scale::Log)
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }

    pub fn scale(&self) -> Scale {
        self.scale
    }

    pub fn clamp(&self, value: f64) -> f64 {
        clamp(value, self.min, self.max)
    }

    /// Position of `value` in [0, 1]; out-of-range values are clamped first.
    pub fn normalize(&self, value: f64) -> f64 {
        normalize(self.clamp(value), self.min, self.max, self.scale)
    }

    pub fn denormalize(&self, t: f64) -> f64 {
        self.clamp(denormalize(clamp(t, 0.0, 1.0), self.min, self.max, self.scale))
    }
}

/// Rotation limits of a knob, in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KnobSweep {
    pub min_angle: f64,
    pub max_angle: f64,
}

impl Default for KnobSweep {
    fn default() -> Self {
        Self {
            min_angle: -135.0,
            max_angle: 135.0,
        }
    }
}

#[inline]
pub fn clamp(value: f64, min: f64, max: f64) -> f64 {
    value.max(min).min(max)
}

/// `(value - min) / (max - min)`. NaN when `min == max`.
#[inline]
pub fn linear_normalize(value: f64, min: f64, max: f64) -> f64 {
    (value - min) / (max - min)
}

/// `ln(value / min) / ln(max / min)`. All arguments must be positive.
#[inline]
pub fn log_normalize(value: f64, min: f64, max: f64) -> f64 {
    (value / min).ln() / (max / min).ln()
}

pub fn normalize(value: f64, min: f64, max: f64, scale: Scale) -> f64 {
    match scale {
        Scale::Linear => linear_normalize(value, min, max),
        Scale::Log => log_normalize(value, min, max),
    }
}

pub fn denormalize(t: f64, min: f64, max: f64, scale: Scale) -> f64 {
    match scale {
        Scale::Linear => min + t * (max - min),
        Scale::Log => min * (max / min).powf(t),
    }
}

#[inline]
pub fn lerp(start: f64, end: f64, t: f64) -> f64 {
    start + (end - start) * t
}

#[inline]
pub fn db_to_ratio(db: f64) -> f64 {
    10.0_f64.powf(db / 20.0)
}

#[inline]
pub fn ratio_to_db(ratio: f64) -> f64 {
    20.0 * ratio.log10()
}

pub fn value_to_angle(value: f64, range: &ParamRange, sweep: KnobSweep) -> f64 {
    sweep.min_angle + range.normalize(value) * (sweep.max_angle - sweep.min_angle)
}

pub fn angle_to_value(angle: f64, range: &ParamRange, sweep: KnobSweep) -> f64 {
    let t = linear_normalize(angle, sweep.min_angle, sweep.max_angle);
    range.denormalize(t)
}

/// A4 = 440 Hz = MIDI note 69.
#[inline]
pub fn midi_to_frequency(note: u8) -> f64 {
    440.0 * 2.0_f64.powf((f64::from(note) - 69.0) / 12.0)
}

pub fn frequency_to_midi(frequency: f64) -> u8 {
    (12.0 * (frequency / 440.0).log2() + 69.0)
        .round()
        .clamp(0.0, 127.0) as u8
}

/// Short readout used next to knobs: `"1.2k Hz"`, `"-10.0 dB"`, `"50%"`.
pub fn format_value(value: f64, unit: Unit) -> String {
    let magnitude = if value.abs() >= 1000.0 {
        format!("{:.1}k", value / 1000.0)
    } else {
        format!("{value:.1}")
    };
    match unit {
        Unit::Decibels => format!("{magnitude} dB"),
        Unit::Hertz => format!("{magnitude} Hz"),
        Unit::Seconds => format!("{value:.2} s"),
        Unit::Percent => format!("{:.0}%", value * 100.0),
        Unit::Plain => magnitude,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn rejects_empty_and_inverted_ranges() {
        assert!(matches!(
            ParamRange::linear(1.0, 1.0),
            Err(Error::InvalidRange { .. })
        ));
        assert!(matches!(
            ParamRange::linear(5.0, -5.0),
            Err(Error::InvalidRange { .. })
        ));
        assert!(matches!(
            ParamRange::linear(f64::NAN, 1.0),
            Err(Error::InvalidRange { .. })
        ));
    }

    #[test]
    fn log_range_needs_positive_minimum() {
        assert!(matches!(
            ParamRange::log(0.0, 20_000.0),
            Err(Error::NonPositiveLogRange { .. })
        ));
        assert!(ParamRange::log(20.0, 20_000.0).is_ok());
    }

    #[test]
    fn log_normalize_hits_endpoints() {
        assert_eq!(log_normalize(20.0, 20.0, 20_000.0), 0.0);
        assert!((log_normalize(20_000.0, 20.0, 20_000.0) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn log_midpoint_is_geometric_mean() {
        let range = ParamRange::log(20.0, 20_000.0).unwrap();
        let mid = range.denormalize(0.5);
        assert!((mid - (20.0_f64 * 20_000.0).sqrt()).abs() < 1e-6);
    }

    #[test]
    fn default_sweep_spans_270_degrees() {
        let range = ParamRange::linear(0.0, 1.0).unwrap();
        let sweep = KnobSweep::default();
        assert_eq!(value_to_angle(0.0, &range, sweep), -135.0);
        assert_eq!(value_to_angle(0.5, &range, sweep), 0.0);
        assert_eq!(value_to_angle(1.0, &range, sweep), 135.0);
    }

    #[test]
    fn angle_round_trips_on_log_range() {
        let range = ParamRange::log(20.0, 20_000.0).unwrap();
        let sweep = KnobSweep::default();
        let angle = value_to_angle(1000.0, &range, sweep);
        assert!((angle_to_value(angle, &range, sweep) - 1000.0).abs() < 1e-6);
    }

    #[test]
    fn angle_beyond_sweep_is_clamped() {
        let range = ParamRange::linear(-60.0, 0.0).unwrap();
        assert_eq!(angle_to_value(400.0, &range, KnobSweep::default()), 0.0);
        assert_eq!(angle_to_value(-400.0, &range, KnobSweep::default()), -60.0);
    }

    #[test]
    fn known_gain_points() {
        assert!((db_to_ratio(-20.0) - 0.1).abs() < 1e-12);
        assert!((db_to_ratio(0.0) - 1.0).abs() < 1e-12);
        assert!((ratio_to_db(0.001) + 60.0).abs() < 1e-9);
    }

    #[test]
    fn midi_conversions() {
        assert!((midi_to_frequency(69) - 440.0).abs() < 1e-9);
        assert_eq!(frequency_to_midi(261.63), 60);
        assert_eq!(frequency_to_midi(1.0), 0);
    }

    #[test]
    fn readouts() {
        assert_eq!(format_value(1500.0, Unit::Hertz), "1.5k Hz");
        assert_eq!(format_value(-10.0, Unit::Decibels), "-10.0 dB");
        assert_eq!(format_value(0.3, Unit::Percent), "30%");
        assert_eq!(format_value(0.25, Unit::Seconds), "0.25 s");
    }

    proptest! {
        #[test]
        fn db_round_trip(db in -60.0f64..=0.0) {
            prop_assert!((ratio_to_db(db_to_ratio(db)) - db).abs() < 1e-9);
        }

        #[test]
        fn clamp_stays_in_range(value in -1e6f64..1e6, min in -1e3f64..1e3, span in 1e-3f64..1e3) {
            let max = min + span;
            let clamped = clamp(value, min, max);
            prop_assert!(clamped >= min && clamped <= max);
            if value >= min && value <= max {
                prop_assert_eq!(clamped, value);
            }
        }

        #[test]
        fn log_normalize_is_monotonic(a in 20.0f64..20_000.0, b in 20.0f64..20_000.0) {
            prop_assume!(a != b);
            let (lo, hi) = if a < b { (a, b) } else { (b, a) };
            prop_assert!(log_normalize(lo, 20.0, 20_000.0) < log_normalize(hi, 20.0, 20_000.0));
        }

        #[test]
        fn denormalize_inverts_normalize(t in 0.0f64..=1.0) {
            let range = ParamRange::log(0.1, 20.0).unwrap();
            prop_assert!((range.normalize(range.denormalize(t)) - t).abs() < 1e-9);
        }
    }
}
