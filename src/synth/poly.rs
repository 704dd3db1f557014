use crate::{
    control::mapping::db_to_ratio,
    dsp::{envelope::EnvelopeShape, oscillator::Waveform, smooth::SmoothedParam},
    synth::voice::{Voice, VoiceState},
};

/// Fixed pool of voices behind a single output gain.
///
/// All voices share the waveform (applied live, so held notes change timbre
/// immediately) and the envelope shape (latched per note at `note_on`).
#[derive(Debug, Clone)]
pub struct PolySynth {
    voices: Vec<Voice>,
    gain: SmoothedParam,
    frame_counter: u64,
}

impl PolySynth {
    pub fn new(
        sample_rate: f32,
        max_voices: usize,
        waveform: Waveform,
        shape: EnvelopeShape,
        volume_db: f32,
        smoothing_ms: f32,
    ) -> Self {
        let voices = (0..max_voices.max(1))
            .map(|_| Voice::new(sample_rate, waveform, shape))
            .collect();

        Self {
            voices,
            gain: SmoothedParam::new(
                db_to_ratio(f64::from(volume_db)) as f32,
                sample_rate,
                smoothing_ms,
            ),
            frame_counter: 0,
        }
    }

    pub fn note_on(&mut self, note: u8, velocity: f32) {
        let age = self.frame_counter;
        if let Some(voice) = self.allocate_voice(note) {
            voice.start(note, velocity, age);
        }
    }

    pub fn note_off(&mut self, note: u8) {
        for voice in &mut self.voices {
            if voice.note() == note && voice.state() == VoiceState::Active {
                voice.release();
            }
        }
    }

    pub fn release_all(&mut self) {
        for voice in &mut self.voices {
            voice.release();
        }
    }

    pub fn set_waveform(&mut self, waveform: Waveform) {
        for voice in &mut self.voices {
            voice.set_waveform(waveform);
        }
    }

    pub fn set_envelope(&mut self, shape: EnvelopeShape) {
        for voice in &mut self.voices {
            voice.set_envelope(shape);
        }
    }

    pub fn set_volume_db(&mut self, volume_db: f32) {
        self.gain.set_target(db_to_ratio(f64::from(volume_db)) as f32);
    }

    /// Overwrites `out` with the mixed voices.
    pub fn render(&mut self, out: &mut [f32]) {
        out.fill(0.0);
        for voice in &mut self.voices {
            voice.render_add(out);
        }
        for sample in out.iter_mut() {
            *sample *= self.gain.advance();
        }
        self.frame_counter += out.len() as u64;
    }

    pub fn active_voices(&self) -> usize {
        self.voices.iter().filter(|v| v.is_active()).count()
    }

    pub fn voices(&self) -> &[Voice] {
        &self.voices
    }

    /// Same note retriggers its voice; otherwise a free voice, otherwise the
    /// oldest releasing one. With every voice held, the note is dropped.
    fn allocate_voice(&mut self, note: u8) -> Option<&mut Voice> {
        let idx = self
            .voices
            .iter()
            .position(|v| v.is_active() && v.note() == note)
            .or_else(|| self.voices.iter().position(Voice::is_free))
            .or_else(|| {
                self.voices
                    .iter()
                    .enumerate()
                    .filter(|(_, v)| v.state() == VoiceState::Releasing)
                    .min_by_key(|(_, v)| v.age())
                    .map(|(idx, _)| idx)
            })?;
        self.voices.get_mut(idx)
    }
}
