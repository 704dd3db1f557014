//! The UI root: one parameter store, one graph, one set of sounding notes.

use crate::{
    engine::AudioEngine,
    error::Result,
    graph::{AudioGraphHandle, AudioGraphManager},
    notes::{ActiveNoteSet, KeyInputMapper, NoteDispatcher, NoteId},
    params::{
        FilterType, FilterUpdate, OscillatorUpdate, ParamChange, ParamId, ReverbUpdate,
        SynthParameters, Waveform,
    },
};

/// Owns everything a synth front end needs and keeps the store and the
/// audio graph in step. Dropping it releases notes and disposes the graph.
pub struct Session<E: AudioEngine> {
    params: SynthParameters,
    manager: AudioGraphManager<E>,
    handle: Option<AudioGraphHandle>,
    dispatcher: NoteDispatcher,
    keys: KeyInputMapper,
}

impl<E: AudioEngine> Session<E> {
    /// Builds the graph for `params`. If the engine cannot build it the
    /// session still exists, silent, and the error is returned alongside.
    pub fn start(
        manager: AudioGraphManager<E>,
        params: SynthParameters,
        keys: KeyInputMapper,
    ) -> (Self, Option<crate::error::Error>) {
        let mut session = Self {
            params,
            manager,
            handle: None,
            dispatcher: NoteDispatcher::new(),
            keys,
        };
        let error = match session.manager.initialize(&session.params) {
            Ok(handle) => {
                session.handle = Some(handle);
                None
            }
            Err(err) => {
                tracing::error!(error = %err, "synth running without audio");
                Some(err)
            }
        };
        (session, error)
    }

    pub fn params(&self) -> &SynthParameters {
        &self.params
    }

    pub fn handle(&self) -> Option<&AudioGraphHandle> {
        self.handle.as_ref()
    }

    pub fn has_audio(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_disposed())
    }

    pub fn manager(&self) -> &AudioGraphManager<E> {
        &self.manager
    }

    pub fn manager_mut(&mut self) -> &mut AudioGraphManager<E> {
        &mut self.manager
    }

    pub fn active_notes(&self) -> &ActiveNoteSet {
        self.dispatcher.active()
    }

    pub fn keys(&self) -> &KeyInputMapper {
        &self.keys
    }

    pub fn keys_mut(&mut self) -> &mut KeyInputMapper {
        &mut self.keys
    }

    fn route(&mut self, change: ParamChange) -> Result<()> {
        let Some(handle) = self.handle.as_mut() else {
            return Ok(());
        };
        match change {
            ParamChange::Oscillator(u) => self.manager.update_oscillator(handle, u),
            ParamChange::Envelope(u) => self.manager.update_envelope(handle, u),
            ParamChange::Filter(u) => self.manager.update_filter(handle, u),
            ParamChange::Reverb(u) => self.manager.update_reverb(handle, u),
        }
    }

    /// Writes one knob value; returns the clamped value now stored.
    pub fn set_param(&mut self, id: ParamId, value: f64) -> Result<f64> {
        let change = self.params.set(id, value);
        self.route(change)?;
        Ok(self.params.get(id))
    }

    pub fn set_waveform(&mut self, waveform: Waveform) -> Result<()> {
        let applied = self.params.apply_oscillator(OscillatorUpdate::waveform(waveform));
        self.route(ParamChange::Oscillator(applied))
    }

    pub fn set_filter_type(&mut self, filter_type: FilterType) -> Result<()> {
        let applied = self.params.apply_filter(FilterUpdate::filter_type(filter_type));
        self.route(ParamChange::Filter(applied))
    }

    pub fn set_filter_enabled(&mut self, enabled: bool) -> Result<()> {
        let applied = self.params.apply_filter(FilterUpdate::enabled(enabled));
        self.route(ParamChange::Filter(applied))
    }

    pub fn set_reverb_enabled(&mut self, enabled: bool) -> Result<()> {
        let applied = self.params.apply_reverb(ReverbUpdate::enabled(enabled));
        self.route(ParamChange::Reverb(applied))
    }

    /// Replaces every parameter, e.g. after loading a preset.
    pub fn load_params(&mut self, params: SynthParameters) -> Result<()> {
        let params = params.sanitized();
        for id in ParamId::ALL {
            self.set_param(id, params.get(id))?;
        }
        self.set_waveform(params.oscillator().waveform)?;
        self.set_filter_type(params.filter().filter_type)?;
        self.set_filter_enabled(params.filter().enabled)?;
        self.set_reverb_enabled(params.reverb().enabled)
    }

    pub fn note_on(&mut self, note: NoteId) -> Result<bool> {
        self.dispatcher
            .note_on(&mut self.manager, self.handle.as_ref(), note)
    }

    pub fn note_off(&mut self, note: NoteId) -> bool {
        self.dispatcher
            .note_off(&mut self.manager, self.handle.as_ref(), note)
    }

    pub fn release_all(&mut self) -> usize {
        self.dispatcher
            .release_all(&mut self.manager, self.handle.as_ref())
    }

    /// Key press from the computer keyboard; returns the note started.
    pub fn key_down(&mut self, key: &str, repeat: bool) -> Result<Option<NoteId>> {
        let Some(note) = self.keys.on_key_down(key, repeat, self.dispatcher.active()) else {
            return Ok(None);
        };
        Ok(self.note_on(note)?.then_some(note))
    }

    /// Key release; returns the note that was stopped.
    pub fn key_up(&mut self, key: &str) -> Option<NoteId> {
        let note = self.keys.on_key_up(key)?;
        self.note_off(note).then_some(note)
    }

    /// Newest analyser samples, oldest first.
    pub fn analyser_snapshot(&mut self, out: &mut [f32]) -> Result<usize> {
        match self.handle.as_ref() {
            Some(handle) => self.manager.analyser_snapshot(handle, out),
            None => Ok(0),
        }
    }

    /// Releases notes and disposes the graph. Safe to call more than once.
    pub fn shutdown(&mut self) {
        self.release_all();
        if let Some(handle) = self.handle.as_mut() {
            self.manager.dispose(handle);
        }
    }
}

impl<E: AudioEngine> Drop for Session<E> {
    fn drop(&mut self) {
        self.shutdown();
    }
}
