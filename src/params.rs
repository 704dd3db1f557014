//! The authoritative synth configuration.
//!
//! [`SynthParameters`] is owned by the UI root. Every write goes through a
//! method that clamps to the documented range and returns the *applied*
//! partial update, which is what gets forwarded to the audio graph. Turning
//! an effect off never touches its numeric field, so turning it back on
//! restores the previous setting.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::control::mapping::{clamp, ParamRange, Scale, Unit};
pub use crate::dsp::filter::FilterType;
pub use crate::dsp::oscillator::Waveform;

pub const VOLUME_DB_MIN: f64 = -60.0;
pub const VOLUME_DB_MAX: f64 = 0.0;
pub const FREQUENCY_MIN_HZ: f64 = 20.0;
pub const FREQUENCY_MAX_HZ: f64 = 20_000.0;
pub const Q_MIN: f64 = 0.1;
pub const Q_MAX: f64 = 20.0;
pub const ENVELOPE_TIME_MAX: f64 = 10.0;

/// Cutoff that makes a filter of the given type transparent.
pub fn bypass_frequency(filter_type: FilterType) -> f64 {
    match filter_type {
        FilterType::LowPass => FREQUENCY_MAX_HZ,
        FilterType::HighPass => FREQUENCY_MIN_HZ,
    }
}

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OscillatorParams {
    pub waveform: Waveform,
    pub volume_db: f64,
}

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnvelopeParams {
    pub attack: f64,
    pub decay: f64,
    pub sustain: f64,
    pub release: f64,
}

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FilterParams {
    pub frequency_hz: f64,
    pub filter_type: FilterType,
    pub q: f64,
    pub enabled: bool,
}

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReverbParams {
    pub mix: f64,
    pub enabled: bool,
}

impl Default for OscillatorParams {
    fn default() -> Self {
        Self {
            waveform: Waveform::Sine,
            volume_db: -10.0,
        }
    }
}

impl Default for EnvelopeParams {
    fn default() -> Self {
        Self {
            attack: 0.1,
            decay: 0.2,
            sustain: 0.5,
            release: 0.5,
        }
    }
}

impl Default for FilterParams {
    fn default() -> Self {
        Self {
            frequency_hz: 1000.0,
            filter_type: FilterType::LowPass,
            q: 1.0,
            enabled: true,
        }
    }
}

impl Default for ReverbParams {
    fn default() -> Self {
        Self {
            mix: 0.3,
            enabled: true,
        }
    }
}

impl FilterParams {
    /// Cutoff actually applied to the filter node.
    pub fn effective_frequency(&self) -> f64 {
        if self.enabled {
            self.frequency_hz
        } else {
            bypass_frequency(self.filter_type)
        }
    }
}

impl ReverbParams {
    /// Wet level actually applied to the reverb node.
    pub fn effective_wet(&self) -> f64 {
        if self.enabled {
            self.mix
        } else {
            0.0
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct OscillatorUpdate {
    pub waveform: Option<Waveform>,
    pub volume_db: Option<f64>,
}

/// Any subset of ADSR; `None` fields keep their previous value.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct EnvelopeUpdate {
    pub attack: Option<f64>,
    pub decay: Option<f64>,
    pub sustain: Option<f64>,
    pub release: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FilterUpdate {
    pub frequency_hz: Option<f64>,
    pub filter_type: Option<FilterType>,
    pub q: Option<f64>,
    pub enabled: Option<bool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ReverbUpdate {
    pub mix: Option<f64>,
    pub enabled: Option<bool>,
}

impl OscillatorUpdate {
    pub fn waveform(waveform: Waveform) -> Self {
        Self {
            waveform: Some(waveform),
            ..Self::default()
        }
    }

    pub fn volume_db(volume_db: f64) -> Self {
        Self {
            volume_db: Some(volume_db),
            ..Self::default()
        }
    }
}

impl EnvelopeUpdate {
    pub fn is_empty(&self) -> bool {
        self.attack.is_none() && self.decay.is_none() && self.sustain.is_none() && self.release.is_none()
    }

    /// Overlays the specified fields onto `base`.
    pub fn apply_to(&self, base: EnvelopeParams) -> EnvelopeParams {
        EnvelopeParams {
            attack: self.attack.unwrap_or(base.attack),
            decay: self.decay.unwrap_or(base.decay),
            sustain: self.sustain.unwrap_or(base.sustain),
            release: self.release.unwrap_or(base.release),
        }
    }
}

impl FilterUpdate {
    pub fn frequency(frequency_hz: f64) -> Self {
        Self {
            frequency_hz: Some(frequency_hz),
            ..Self::default()
        }
    }

    pub fn enabled(enabled: bool) -> Self {
        Self {
            enabled: Some(enabled),
            ..Self::default()
        }
    }

    pub fn filter_type(filter_type: FilterType) -> Self {
        Self {
            filter_type: Some(filter_type),
            ..Self::default()
        }
    }

    pub fn q(q: f64) -> Self {
        Self {
            q: Some(q),
            ..Self::default()
        }
    }
}

impl ReverbUpdate {
    pub fn mix(mix: f64) -> Self {
        Self {
            mix: Some(mix),
            ..Self::default()
        }
    }

    pub fn enabled(enabled: bool) -> Self {
        Self {
            enabled: Some(enabled),
            ..Self::default()
        }
    }
}

/// Continuously controllable parameters, one per knob on the panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParamId {
    Volume,
    FilterFrequency,
    FilterQ,
    ReverbMix,
    Attack,
    Decay,
    Sustain,
    Release,
}

impl ParamId {
    pub const ALL: [ParamId; 8] = [
        ParamId::Volume,
        ParamId::FilterFrequency,
        ParamId::FilterQ,
        ParamId::ReverbMix,
        ParamId::Attack,
        ParamId::Decay,
        ParamId::Sustain,
        ParamId::Release,
    ];

    pub fn label(self) -> &'static str {
        match self {
            ParamId::Volume => "VOLUME",
            ParamId::FilterFrequency => "CUTOFF",
            ParamId::FilterQ => "RES",
            ParamId::ReverbMix => "REVERB",
            ParamId::Attack => "ATTACK",
            ParamId::Decay => "DECAY",
            ParamId::Sustain => "SUSTAIN",
            ParamId::Release => "RELEASE",
        }
    }

    pub fn unit(self) -> Unit {
        match self {
            ParamId::Volume => Unit::Decibels,
            ParamId::FilterFrequency => Unit::Hertz,
            ParamId::FilterQ => Unit::Plain,
            ParamId::ReverbMix | ParamId::Sustain => Unit::Percent,
            ParamId::Attack | ParamId::Decay | ParamId::Release => Unit::Seconds,
        }
    }

    /// Knob range. Narrower than the store's clamp range for envelope times.
    pub fn range(self) -> ParamRange {
        let (min, max, scale) = match self {
            ParamId::Volume => (VOLUME_DB_MIN, VOLUME_DB_MAX, Scale::Linear),
            ParamId::FilterFrequency => (FREQUENCY_MIN_HZ, FREQUENCY_MAX_HZ, Scale::Log),
            ParamId::FilterQ => (Q_MIN, Q_MAX, Scale::Log),
            ParamId::ReverbMix | ParamId::Sustain => (0.0, 1.0, Scale::Linear),
            ParamId::Attack | ParamId::Decay => (0.001, 2.0, Scale::Linear),
            ParamId::Release => (0.001, 3.0, Scale::Linear),
        };
        ParamRange::new_unchecked(min, max, scale)
    }
}

/// A store write, expressed as the partial update to forward to the graph.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParamChange {
    Oscillator(OscillatorUpdate),
    Envelope(EnvelopeUpdate),
    Filter(FilterUpdate),
    Reverb(ReverbUpdate),
}

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SynthParameters {
    oscillator: OscillatorParams,
    envelope: EnvelopeParams,
    filter: FilterParams,
    reverb: ReverbParams,
}

fn finite(name: &'static str, value: f64) -> Option<f64> {
    if value.is_finite() {
        Some(value)
    } else {
        tracing::warn!(param = name, value, "rejected non-finite parameter value");
        None
    }
}

impl SynthParameters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn oscillator(&self) -> &OscillatorParams {
        &self.oscillator
    }

    pub fn envelope(&self) -> &EnvelopeParams {
        &self.envelope
    }

    pub fn filter(&self) -> &FilterParams {
        &self.filter
    }

    pub fn reverb(&self) -> &ReverbParams {
        &self.reverb
    }

    /// Re-applies every clamp. Used after deserializing a preset, where the
    /// document may carry anything.
    pub fn sanitized(self) -> Self {
        let mut clean = Self::default();
        clean.apply_oscillator(OscillatorUpdate {
            waveform: Some(self.oscillator.waveform),
            volume_db: Some(self.oscillator.volume_db),
        });
        clean.apply_envelope(EnvelopeUpdate {
            attack: Some(self.envelope.attack),
            decay: Some(self.envelope.decay),
            sustain: Some(self.envelope.sustain),
            release: Some(self.envelope.release),
        });
        clean.apply_filter(FilterUpdate {
            frequency_hz: Some(self.filter.frequency_hz),
            filter_type: Some(self.filter.filter_type),
            q: Some(self.filter.q),
            enabled: Some(self.filter.enabled),
        });
        clean.apply_reverb(ReverbUpdate {
            mix: Some(self.reverb.mix),
            enabled: Some(self.reverb.enabled),
        });
        clean
    }

    pub fn apply_oscillator(&mut self, update: OscillatorUpdate) -> OscillatorUpdate {
        let mut applied = OscillatorUpdate::default();
        if let Some(waveform) = update.waveform {
            self.oscillator.waveform = waveform;
            applied.waveform = Some(waveform);
        }
        if let Some(db) = update.volume_db.and_then(|v| finite("volume_db", v)) {
            self.oscillator.volume_db = clamp(db, VOLUME_DB_MIN, VOLUME_DB_MAX);
            applied.volume_db = Some(self.oscillator.volume_db);
        }
        applied
    }

    pub fn apply_envelope(&mut self, update: EnvelopeUpdate) -> EnvelopeUpdate {
        let time = |name, v: Option<f64>| {
            v.and_then(|v| finite(name, v))
                .map(|v| clamp(v, 0.0, ENVELOPE_TIME_MAX))
        };
        let applied = EnvelopeUpdate {
            attack: time("attack", update.attack),
            decay: time("decay", update.decay),
            sustain: update
                .sustain
                .and_then(|v| finite("sustain", v))
                .map(|v| clamp(v, 0.0, 1.0)),
            release: time("release", update.release),
        };
        self.envelope = applied.apply_to(self.envelope);
        applied
    }

    pub fn apply_filter(&mut self, update: FilterUpdate) -> FilterUpdate {
        let mut applied = FilterUpdate::default();
        if let Some(hz) = update.frequency_hz.and_then(|v| finite("frequency_hz", v)) {
            self.filter.frequency_hz = clamp(hz, FREQUENCY_MIN_HZ, FREQUENCY_MAX_HZ);
            applied.frequency_hz = Some(self.filter.frequency_hz);
        }
        if let Some(filter_type) = update.filter_type {
            self.filter.filter_type = filter_type;
            applied.filter_type = Some(filter_type);
        }
        if let Some(q) = update.q.and_then(|v| finite("q", v)) {
            self.filter.q = clamp(q, Q_MIN, Q_MAX);
            applied.q = Some(self.filter.q);
        }
        if let Some(enabled) = update.enabled {
            self.filter.enabled = enabled;
            applied.enabled = Some(enabled);
        }
        applied
    }

    pub fn apply_reverb(&mut self, update: ReverbUpdate) -> ReverbUpdate {
        let mut applied = ReverbUpdate::default();
        if let Some(mix) = update.mix.and_then(|v| finite("mix", v)) {
            self.reverb.mix = clamp(mix, 0.0, 1.0);
            applied.mix = Some(self.reverb.mix);
        }
        if let Some(enabled) = update.enabled {
            self.reverb.enabled = enabled;
            applied.enabled = Some(enabled);
        }
        applied
    }

    pub fn get(&self, id: ParamId) -> f64 {
        match id {
            ParamId::Volume => self.oscillator.volume_db,
            ParamId::FilterFrequency => self.filter.frequency_hz,
            ParamId::FilterQ => self.filter.q,
            ParamId::ReverbMix => self.reverb.mix,
            ParamId::Attack => self.envelope.attack,
            ParamId::Decay => self.envelope.decay,
            ParamId::Sustain => self.envelope.sustain,
            ParamId::Release => self.envelope.release,
        }
    }

    pub fn set(&mut self, id: ParamId, value: f64) -> ParamChange {
        match id {
            ParamId::Volume => {
                ParamChange::Oscillator(self.apply_oscillator(OscillatorUpdate::volume_db(value)))
            }
            ParamId::FilterFrequency => {
                ParamChange::Filter(self.apply_filter(FilterUpdate::frequency(value)))
            }
            ParamId::FilterQ => ParamChange::Filter(self.apply_filter(FilterUpdate::q(value))),
            ParamId::ReverbMix => ParamChange::Reverb(self.apply_reverb(ReverbUpdate::mix(value))),
            ParamId::Attack => ParamChange::Envelope(self.apply_envelope(EnvelopeUpdate {
                attack: Some(value),
                ..EnvelopeUpdate::default()
            })),
            ParamId::Decay => ParamChange::Envelope(self.apply_envelope(EnvelopeUpdate {
                decay: Some(value),
                ..EnvelopeUpdate::default()
            })),
            ParamId::Sustain => ParamChange::Envelope(self.apply_envelope(EnvelopeUpdate {
                sustain: Some(value),
                ..EnvelopeUpdate::default()
            })),
            ParamId::Release => ParamChange::Envelope(self.apply_envelope(EnvelopeUpdate {
                release: Some(value),
                ..EnvelopeUpdate::default()
            })),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_stock_patch() {
        let params = SynthParameters::default();
        assert_eq!(params.oscillator().waveform, Waveform::Sine);
        assert_eq!(params.oscillator().volume_db, -10.0);
        assert_eq!(params.filter().frequency_hz, 1000.0);
        assert!(params.filter().enabled);
        assert_eq!(params.reverb().mix, 0.3);
        assert_eq!(params.envelope().sustain, 0.5);
    }

    #[test]
    fn writes_are_clamped() {
        let mut params = SynthParameters::new();
        params.apply_filter(FilterUpdate::frequency(5.0));
        assert_eq!(params.filter().frequency_hz, FREQUENCY_MIN_HZ);
        params.apply_filter(FilterUpdate::frequency(96_000.0));
        assert_eq!(params.filter().frequency_hz, FREQUENCY_MAX_HZ);

        params.set(ParamId::Sustain, 1.5);
        assert_eq!(params.envelope().sustain, 1.0);
        params.set(ParamId::ReverbMix, -0.2);
        assert_eq!(params.reverb().mix, 0.0);
        params.set(ParamId::Volume, 12.0);
        assert_eq!(params.oscillator().volume_db, 0.0);
        params.set(ParamId::Attack, -1.0);
        assert_eq!(params.envelope().attack, 0.0);
        params.set(ParamId::FilterQ, 0.0);
        assert_eq!(params.filter().q, Q_MIN);
    }

    #[test]
    fn non_finite_writes_are_ignored() {
        let mut params = SynthParameters::new();
        let change = params.set(ParamId::FilterFrequency, f64::NAN);
        assert_eq!(change, ParamChange::Filter(FilterUpdate::default()));
        assert_eq!(params.filter().frequency_hz, 1000.0);
    }

    #[test]
    fn disabling_filter_keeps_frequency() {
        let mut params = SynthParameters::new();
        params.apply_filter(FilterUpdate::frequency(500.0));
        params.apply_filter(FilterUpdate::enabled(false));

        assert_eq!(params.filter().frequency_hz, 500.0);
        assert_eq!(params.filter().effective_frequency(), FREQUENCY_MAX_HZ);

        params.apply_filter(FilterUpdate::enabled(true));
        assert_eq!(params.filter().effective_frequency(), 500.0);
    }

    #[test]
    fn highpass_bypass_opens_downwards() {
        let mut params = SynthParameters::new();
        params.apply_filter(FilterUpdate {
            filter_type: Some(FilterType::HighPass),
            enabled: Some(false),
            ..FilterUpdate::default()
        });
        assert_eq!(params.filter().effective_frequency(), FREQUENCY_MIN_HZ);
    }

    #[test]
    fn disabling_reverb_keeps_mix() {
        let mut params = SynthParameters::new();
        params.apply_reverb(ReverbUpdate::mix(0.8));
        params.apply_reverb(ReverbUpdate::enabled(false));
        assert_eq!(params.reverb().effective_wet(), 0.0);
        assert_eq!(params.reverb().mix, 0.8);
    }

    #[test]
    fn partial_envelope_update_keeps_other_stages() {
        let mut params = SynthParameters::new();
        let applied = params.apply_envelope(EnvelopeUpdate {
            release: Some(1.25),
            ..EnvelopeUpdate::default()
        });

        assert_eq!(applied.attack, None);
        assert_eq!(params.envelope().attack, 0.1);
        assert_eq!(params.envelope().release, 1.25);
    }

    #[test]
    fn get_reads_back_what_set_wrote() {
        let mut params = SynthParameters::new();
        for id in ParamId::ALL {
            let range = id.range();
            let mid = range.denormalize(0.5);
            params.set(id, mid);
            assert!((params.get(id) - mid).abs() < 1e-12, "{id:?}");
        }
    }

    #[test]
    fn sanitize_repairs_out_of_range_documents() {
        let mut raw = SynthParameters::default();
        raw.filter.frequency_hz = 1e9;
        raw.reverb.mix = 3.0;
        let clean = raw.sanitized();
        assert_eq!(clean.filter().frequency_hz, FREQUENCY_MAX_HZ);
        assert_eq!(clean.reverb().mix, 1.0);
    }
}
