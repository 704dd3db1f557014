//! TOML application settings and parameter presets.
//!
//! ```toml
//! [audio]
//! voices = 8
//! analyser_size = 128
//! smoothing_ms = 20.0
//!
//! [controls]
//! throttle_ms = 33
//! reference_span = 200.0
//! knob_sensitivity = 1.0
//! slider_sensitivity = 1.0
//!
//! [keyboard]
//! octave_shift = 0
//! [keyboard.map]
//! z = "B3"
//! ```

use std::{collections::BTreeMap, path::Path, time::Duration};

use serde::{Deserialize, Serialize};

use crate::{
    control::{
        gesture::{GestureSettings, DEFAULT_REFERENCE_SPAN},
        throttle::DEFAULT_INTERVAL,
    },
    error::{Error, Result},
    graph::DEFAULT_ANALYSER_SIZE,
    notes::KeyInputMapper,
    params::SynthParameters,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    pub voices: usize,
    pub analyser_size: usize,
    pub smoothing_ms: f32,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            voices: 8,
            analyser_size: DEFAULT_ANALYSER_SIZE,
            smoothing_ms: 20.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlsConfig {
    pub throttle_ms: u64,
    pub reference_span: f64,
    pub knob_sensitivity: f64,
    pub slider_sensitivity: f64,
}

impl Default for ControlsConfig {
    fn default() -> Self {
        Self {
            throttle_ms: DEFAULT_INTERVAL.as_millis() as u64,
            reference_span: DEFAULT_REFERENCE_SPAN,
            knob_sensitivity: 1.0,
            slider_sensitivity: 1.0,
        }
    }
}

impl ControlsConfig {
    fn settings(&self, sensitivity: f64) -> GestureSettings {
        GestureSettings {
            sensitivity,
            reference_span: self.reference_span,
            throttle_interval: Duration::from_millis(self.throttle_ms),
        }
    }

    pub fn knob_settings(&self) -> GestureSettings {
        self.settings(self.knob_sensitivity)
    }

    pub fn slider_settings(&self) -> GestureSettings {
        self.settings(self.slider_sensitivity)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyboardConfig {
    pub octave_shift: i32,
    /// Key name to note name, e.g. `z = "B3"`.
    pub map: BTreeMap<String, String>,
}

impl KeyboardConfig {
    pub fn mapper(&self) -> Result<KeyInputMapper> {
        let overrides = self.map.iter().map(|(k, v)| (k.as_str(), v.as_str()));
        Ok(KeyInputMapper::with_overrides(overrides)?.with_octave_shift(self.octave_shift))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub audio: AudioConfig,
    pub controls: ControlsConfig,
    pub keyboard: KeyboardConfig,
}

impl AppConfig {
    pub fn from_toml(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()
    }

    /// Reads `path`; a missing file yields the defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        match std::fs::read_to_string(path) {
            Ok(text) => {
                tracing::info!(path = %path.display(), "loaded config");
                Self::from_toml(&text)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "no config file, using defaults");
                Ok(Self::default())
            }
            Err(e) => Err(e.into()),
        }
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| Error::Config(e.to_string()))
    }

    fn validate(self) -> Result<Self> {
        if self.audio.voices == 0 {
            return Err(Error::Config("audio.voices must be at least 1".into()));
        }
        if self.audio.analyser_size == 0 {
            return Err(Error::Config("audio.analyser_size must be at least 1".into()));
        }
        let span = self.controls.reference_span;
        if !(span > 0.0 && span.is_finite()) {
            return Err(Error::Config(
                "controls.reference_span must be positive and finite".into(),
            ));
        }
        for (name, s) in [
            ("knob_sensitivity", self.controls.knob_sensitivity),
            ("slider_sensitivity", self.controls.slider_sensitivity),
        ] {
            if !(s > 0.0) || !s.is_finite() {
                return Err(Error::Config(format!("controls.{name} must be positive")));
            }
        }
        Ok(self)
    }
}

/// Parses a preset. Out-of-range values are clamped.
pub fn preset_from_toml(text: &str) -> Result<SynthParameters> {
    let params: SynthParameters =
        toml::from_str(text).map_err(|e| Error::Config(e.to_string()))?;
    Ok(params.sanitized())
}

pub fn preset_to_toml(params: &SynthParameters) -> Result<String> {
    toml::to_string_pretty(params).map_err(|e| Error::Config(e.to_string()))
}

pub fn load_preset(path: impl AsRef<Path>) -> Result<SynthParameters> {
    let text = std::fs::read_to_string(path)?;
    preset_from_toml(&text)
}

pub fn save_preset(path: impl AsRef<Path>, params: &SynthParameters) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, preset_to_toml(params)?)?;
    tracing::info!(path = %path.display(), "saved preset");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::{FilterType, FilterUpdate, Waveform};

    #[test]
    fn empty_document_is_default() {
        assert_eq!(AppConfig::from_toml("").unwrap(), AppConfig::default());
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config = AppConfig::from_toml(
            r#"
            [controls]
            throttle_ms = 16

            [keyboard.map]
            z = "B3"
            "#,
        )
        .unwrap();
        assert_eq!(config.controls.throttle_ms, 16);
        assert_eq!(config.controls.reference_span, DEFAULT_REFERENCE_SPAN);
        assert_eq!(config.audio.voices, 8);
        assert_eq!(
            config.controls.knob_settings().throttle_interval,
            Duration::from_millis(16)
        );

        let mapper = config.keyboard.mapper().unwrap();
        assert_eq!(mapper.lookup("z"), Some("B3".parse().unwrap()));
    }

    #[test]
    fn rejects_bad_values() {
        assert!(matches!(
            AppConfig::from_toml("[audio]\nvoices = 0"),
            Err(Error::Config(_))
        ));
        assert!(AppConfig::from_toml("[controls]\nknob_sensitivity = -1.0").is_err());
        assert!(AppConfig::from_toml("[audio\n").is_err());
    }

    #[test]
    fn infinite_reference_span_is_rejected() {
        assert!(matches!(
            AppConfig::from_toml("[controls]\nreference_span = inf"),
            Err(Error::Config(_))
        ));
        assert!(AppConfig::from_toml("[controls]\nreference_span = nan").is_err());
    }

    #[test]
    fn missing_file_gives_defaults() {
        let path = std::env::temp_dir().join("retro_synth_missing_config_0f3a.toml");
        assert_eq!(AppConfig::load(path).unwrap(), AppConfig::default());
    }

    #[test]
    fn bad_note_in_keymap_fails() {
        let config = AppConfig::from_toml("[keyboard.map]\nq = \"H2\"").unwrap();
        assert!(matches!(config.keyboard.mapper(), Err(Error::UnknownNote(_))));
    }

    #[test]
    fn preset_survives_a_save_and_load() {
        let mut params = SynthParameters::default();
        params.apply_filter(FilterUpdate {
            frequency_hz: Some(750.0),
            filter_type: Some(FilterType::HighPass),
            q: None,
            enabled: Some(false),
        });

        let path = std::env::temp_dir()
            .join(format!("retro_synth_preset_{}", std::process::id()))
            .join("warm.toml");
        save_preset(&path, &params).unwrap();
        let loaded = load_preset(&path).unwrap();
        let _ = std::fs::remove_dir_all(path.parent().unwrap());

        assert_eq!(loaded, params);
    }

    #[test]
    fn preset_values_are_clamped() {
        let params = preset_from_toml(
            r#"
            [oscillator]
            waveform = "square"
            volume_db = 12.0

            [filter]
            frequency_hz = 5.0
            "#,
        )
        .unwrap();
        assert_eq!(params.oscillator().waveform, Waveform::Square);
        assert_eq!(params.oscillator().volume_db, 0.0);
        assert_eq!(params.filter().frequency_hz, 20.0);
        assert!(params.filter().enabled);
    }
}
