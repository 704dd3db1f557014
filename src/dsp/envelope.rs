use crate::{dsp::RenderCtx, MIN_TIME};

/*
ADSR Envelope
=============

Linear ramps, one stage at a time:

  Level
    1.0 ┐     ╱╲
        │    ╱  ╲___________
    S   │   ╱               ╲
        │  ╱                 ╲
    0.0 └─╱───────────────────╲──→ Time
         A     D      S        R

  increment = target_change / (time_seconds * sample_rate)

Two rules matter for playing:

  * The shape (A, D, S, R) is copied when the gate opens. Edits made while a
    note sounds are kept in `next_shape` and only heard from the next
    note_on, so a held note never jumps mid-stage.
  * note_off releases from whatever level the envelope is at, and note_on
    attacks from the current level too. Neither ever steps the output.

State machine:

   Idle ──note_on──→ Attack ──level=1──→ Decay ──level=S──→ Sustain
    ↑                  │                   │                  │
    │                  └──────note_off─────┴──────────────────┘
    │                                      ↓
    └──────────────level=0─────────── Release
*/

/// Stage timings in seconds; sustain is a level.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnvelopeShape {
    pub attack: f32,
    pub decay: f32,
    pub sustain: f32,
    pub release: f32,
}

impl EnvelopeShape {
    pub fn new(attack: f32, decay: f32, sustain: f32, release: f32) -> Self {
        Self {
            attack: attack.max(0.0),
            decay: decay.max(0.0),
            sustain: sustain.clamp(0.0, 1.0),
            release: release.max(0.0),
        }
    }
}

impl Default for EnvelopeShape {
    fn default() -> Self {
        Self::new(0.1, 0.2, 0.5, 0.5)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvelopeStage {
    Idle,
    Attack,
    Decay,
    Sustain,
    Release,
}

#[derive(Debug, Clone)]
pub struct Envelope {
    next_shape: EnvelopeShape,
    shape: EnvelopeShape,

    stage: EnvelopeStage,
    level: f32,

    release_start_level: f32,
    release_total_samples: u32,
    release_elapsed_samples: u32,
}

impl Envelope {
    pub fn new(shape: EnvelopeShape) -> Self {
        Self {
            next_shape: shape,
            shape,
            stage: EnvelopeStage::Idle,
            level: 0.0,
            release_start_level: 0.0,
            release_total_samples: 1,
            release_elapsed_samples: 0,
        }
    }

    /// Takes effect at the next `note_on`.
    pub fn set_shape(&mut self, shape: EnvelopeShape) {
        self.next_shape = shape;
    }

    /// Shape the sounding note was started with.
    pub fn active_shape(&self) -> EnvelopeShape {
        self.shape
    }

    pub fn next_shape(&self) -> EnvelopeShape {
        self.next_shape
    }

    pub fn note_on(&mut self) {
        self.shape = self.next_shape;
        self.stage = EnvelopeStage::Attack;
        self.release_elapsed_samples = 0;
    }

    pub fn note_off(&mut self, ctx: &RenderCtx) {
        if matches!(self.stage, EnvelopeStage::Idle | EnvelopeStage::Release) {
            return;
        }

        self.release_start_level = self.level;
        self.release_total_samples = if self.shape.release <= MIN_TIME {
            1
        } else {
            (self.shape.release * ctx.sample_rate).round().max(1.0) as u32
        };
        self.release_elapsed_samples = 0;
        self.stage = EnvelopeStage::Release;
    }

    pub fn next_sample(&mut self, ctx: &RenderCtx) -> f32 {
        match self.stage {
            EnvelopeStage::Idle => {
                self.level = 0.0;
            }

            EnvelopeStage::Attack => {
                let increment = 1.0 / (self.shape.attack.max(MIN_TIME) * ctx.sample_rate);
                self.level += increment;

                if self.level >= 1.0 {
                    self.level = 1.0;
                    self.stage = EnvelopeStage::Decay;
                }
            }

            EnvelopeStage::Decay => {
                let target = self.shape.sustain;
                let decrement = (1.0 - target) / (self.shape.decay.max(MIN_TIME) * ctx.sample_rate);
                self.level -= decrement;

                if self.level <= target {
                    self.level = target;
                    self.stage = EnvelopeStage::Sustain;
                }
            }

            EnvelopeStage::Sustain => {
                self.level = self.shape.sustain;
            }

            EnvelopeStage::Release => {
                self.release_elapsed_samples = self.release_elapsed_samples.saturating_add(1);
                let progress =
                    self.release_elapsed_samples as f32 / self.release_total_samples as f32;
                self.level = (self.release_start_level * (1.0 - progress)).max(0.0);

                if self.release_elapsed_samples >= self.release_total_samples {
                    self.level = 0.0;
                    self.stage = EnvelopeStage::Idle;
                }
            }
        }

        debug_assert!((0.0..=1.0).contains(&self.level));
        self.level
    }

    pub fn is_active(&self) -> bool {
        self.stage != EnvelopeStage::Idle
    }

    pub fn reset(&mut self) {
        self.stage = EnvelopeStage::Idle;
        self.level = 0.0;
        self.release_elapsed_samples = 0;
        self.release_start_level = 0.0;
    }

    pub fn level(&self) -> f32 {
        self.level
    }

    pub fn stage(&self) -> EnvelopeStage {
        self.stage
    }
}

impl Default for Envelope {
    fn default() -> Self {
        Self::new(EnvelopeShape::default())
    }
}
