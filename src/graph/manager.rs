use crate::{
    engine::{AudioEngine, ContextState, FilterSpec, NodeId, ParamWrite, VoiceSpec},
    error::{EngineError, Error, Result},
    notes::NoteId,
    params::{
        EnvelopeUpdate, FilterParams, FilterUpdate, OscillatorUpdate, ReverbParams, ReverbUpdate,
        SynthParameters,
    },
};

/// Samples kept by the analyser node.
pub const DEFAULT_ANALYSER_SIZE: usize = 128;
/// Resume is attempted this many times before a note gives up.
pub const RESUME_ATTEMPTS: u32 = 2;

/// The four nodes of one synth graph plus the state needed to undo bypass.
///
/// Owned by whoever called [`AudioGraphManager::initialize`]; every other
/// manager call borrows it.
#[derive(Debug)]
pub struct AudioGraphHandle {
    voice: NodeId,
    filter: NodeId,
    reverb: NodeId,
    analyser: NodeId,
    disposed: bool,
    filter_state: FilterParams,
    reverb_state: ReverbParams,
}

impl AudioGraphHandle {
    pub fn voice(&self) -> NodeId {
        self.voice
    }

    pub fn filter(&self) -> NodeId {
        self.filter
    }

    pub fn reverb(&self) -> NodeId {
        self.reverb
    }

    pub fn analyser(&self) -> NodeId {
        self.analyser
    }

    pub fn nodes(&self) -> [NodeId; 4] {
        [self.voice, self.filter, self.reverb, self.analyser]
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    /// Stored filter settings; the frequency survives bypass.
    pub fn filter_state(&self) -> &FilterParams {
        &self.filter_state
    }

    pub fn reverb_state(&self) -> &ReverbParams {
        &self.reverb_state
    }

    /// Cutoff currently realised on the filter node.
    pub fn effective_filter_frequency(&self) -> f64 {
        self.filter_state.effective_frequency()
    }

    /// Wet level currently realised on the reverb node.
    pub fn effective_reverb_wet(&self) -> f64 {
        self.reverb_state.effective_wet()
    }
}

/// Builds, updates and tears down the voice → filter → reverb → analyser →
/// output chain on an [`AudioEngine`].
pub struct AudioGraphManager<E> {
    engine: E,
    analyser_size: usize,
}

impl<E: AudioEngine> AudioGraphManager<E> {
    pub fn new(engine: E) -> Self {
        Self {
            engine,
            analyser_size: DEFAULT_ANALYSER_SIZE,
        }
    }

    pub fn with_analyser_size(mut self, size: usize) -> Self {
        self.analyser_size = size.max(1);
        self
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut E {
        &mut self.engine
    }

    pub fn into_engine(self) -> E {
        self.engine
    }

    pub fn initialize(&mut self, params: &SynthParameters) -> Result<AudioGraphHandle> {
        let mut created = Vec::with_capacity(4);
        match self.build(params, &mut created) {
            Ok(handle) => {
                tracing::info!(
                    voice = %handle.voice,
                    filter = %handle.filter,
                    reverb = %handle.reverb,
                    analyser = %handle.analyser,
                    "audio graph initialized"
                );
                Ok(handle)
            }
            Err(source) => {
                tracing::warn!(error = %source, partial = created.len(), "audio graph init failed");
                for node in created {
                    if let Err(err) = self.engine.dispose(node) {
                        tracing::debug!(%node, error = %err, "rollback dispose failed");
                    }
                }
                Err(Error::GraphInit { source })
            }
        }
    }

    fn build(
        &mut self,
        params: &SynthParameters,
        created: &mut Vec<NodeId>,
    ) -> std::result::Result<AudioGraphHandle, EngineError> {
        let osc = params.oscillator();
        let voice = self.engine.create_voice(&VoiceSpec {
            waveform: osc.waveform,
            volume_db: osc.volume_db,
            envelope: *params.envelope(),
        })?;
        created.push(voice);

        let filter_state = *params.filter();
        let filter = self.engine.create_filter(&FilterSpec {
            filter_type: filter_state.filter_type,
            frequency_hz: filter_state.effective_frequency(),
            q: filter_state.q,
        })?;
        created.push(filter);

        let reverb_state = *params.reverb();
        let reverb = self.engine.create_reverb(reverb_state.effective_wet())?;
        created.push(reverb);

        let analyser = self.engine.create_analyser(self.analyser_size)?;
        created.push(analyser);

        self.engine.connect(voice, filter)?;
        self.engine.connect(filter, reverb)?;
        self.engine.connect(reverb, analyser)?;
        self.engine.connect_to_output(analyser)?;

        Ok(AudioGraphHandle {
            voice,
            filter,
            reverb,
            analyser,
            disposed: false,
            filter_state,
            reverb_state,
        })
    }

    fn write(&mut self, node: NodeId, write: ParamWrite) -> Result<()> {
        self.engine.set_param(node, write)?;
        Ok(())
    }

    pub fn update_oscillator(
        &mut self,
        handle: &mut AudioGraphHandle,
        update: OscillatorUpdate,
    ) -> Result<()> {
        if live(handle, "oscillator update") {
            if let Some(waveform) = update.waveform {
                self.write(handle.voice, ParamWrite::Waveform(waveform))?;
            }
            if let Some(db) = update.volume_db {
                self.write(handle.voice, ParamWrite::VolumeDb(db))?;
            }
        }
        Ok(())
    }

    /// Heard from the next attack; sounding notes keep their shape.
    pub fn update_envelope(
        &mut self,
        handle: &mut AudioGraphHandle,
        update: EnvelopeUpdate,
    ) -> Result<()> {
        if live(handle, "envelope update") && !update.is_empty() {
            self.write(handle.voice, ParamWrite::Envelope(update))?;
        }
        Ok(())
    }

    pub fn update_filter(&mut self, handle: &mut AudioGraphHandle, update: FilterUpdate) -> Result<()> {
        if !live(handle, "filter update") {
            return Ok(());
        }

        // the handle only learns the new state once the engine has it
        let before = handle.filter_state.effective_frequency();
        let mut next = handle.filter_state;
        if let Some(hz) = update.frequency_hz {
            next.frequency_hz = hz;
        }
        if let Some(filter_type) = update.filter_type {
            next.filter_type = filter_type;
        }
        if let Some(q) = update.q {
            next.q = q;
        }
        if let Some(enabled) = update.enabled {
            next.enabled = enabled;
        }
        let after = next.effective_frequency();

        if let Some(filter_type) = update.filter_type {
            self.write(handle.filter, ParamWrite::FilterType(filter_type))?;
        }
        if after != before {
            self.write(handle.filter, ParamWrite::FilterFrequency(after))?;
        }
        if let Some(q) = update.q {
            self.write(handle.filter, ParamWrite::FilterQ(q))?;
        }
        handle.filter_state = next;
        Ok(())
    }

    pub fn update_reverb(&mut self, handle: &mut AudioGraphHandle, update: ReverbUpdate) -> Result<()> {
        if !live(handle, "reverb update") {
            return Ok(());
        }

        let before = handle.reverb_state.effective_wet();
        let mut next = handle.reverb_state;
        if let Some(mix) = update.mix {
            next.mix = mix;
        }
        if let Some(enabled) = update.enabled {
            next.enabled = enabled;
        }
        let after = next.effective_wet();

        if after != before {
            self.write(handle.reverb, ParamWrite::ReverbWet(after))?;
        }
        handle.reverb_state = next;
        Ok(())
    }

    /// Resumes a suspended engine, retrying once.
    pub fn ensure_running(&mut self) -> Result<()> {
        let mut attempts = 0;
        while self.engine.context_state() != ContextState::Running {
            if attempts == RESUME_ATTEMPTS {
                return Err(Error::EngineSuspended { attempts });
            }
            attempts += 1;
            if let Err(err) = self.engine.resume() {
                tracing::warn!(attempt = attempts, error = %err, "audio context resume failed");
            }
        }
        Ok(())
    }

    pub fn trigger_attack(&mut self, handle: &AudioGraphHandle, note: NoteId) -> Result<()> {
        if live(handle, "attack") {
            self.engine.trigger_attack(handle.voice, note)?;
        }
        Ok(())
    }

    pub fn trigger_release(&mut self, handle: &AudioGraphHandle, note: NoteId) -> Result<()> {
        if live(handle, "release") {
            self.engine.trigger_release(handle.voice, note)?;
        }
        Ok(())
    }

    /// Newest analyser samples for display; zero when disposed.
    pub fn analyser_snapshot(&mut self, handle: &AudioGraphHandle, out: &mut [f32]) -> Result<usize> {
        if !live(handle, "analyser read") {
            return Ok(0);
        }
        Ok(self.engine.read_analyser(handle.analyser, out)?)
    }

    /// Disposes all four nodes. Later calls do nothing.
    pub fn dispose(&mut self, handle: &mut AudioGraphHandle) {
        if handle.disposed {
            tracing::debug!("audio graph already disposed");
            return;
        }
        handle.disposed = true;
        for node in handle.nodes() {
            if let Err(err) = self.engine.dispose(node) {
                tracing::warn!(%node, error = %err, "dispose failed");
            }
        }
        tracing::info!("audio graph disposed");
    }
}

fn live(handle: &AudioGraphHandle, what: &str) -> bool {
    if handle.disposed {
        tracing::trace!(what, "ignored on disposed audio graph");
    }
    !handle.disposed
}
