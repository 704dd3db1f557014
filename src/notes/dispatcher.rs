use std::collections::BTreeSet;

use crate::{
    engine::AudioEngine,
    error::Result,
    graph::{AudioGraphHandle, AudioGraphManager},
    notes::NoteId,
};

/// Sounding notes, lowest pitch first. Never holds duplicates.
pub type ActiveNoteSet = BTreeSet<NoteId>;

/// Turns note-on/off requests into engine triggers, at most one attack per
/// sounding note.
#[derive(Debug, Default)]
pub struct NoteDispatcher {
    active: ActiveNoteSet,
}

impl NoteDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts `note` unless it is already sounding or there is no live graph.
    ///
    /// Returns `Ok(true)` when an attack was triggered.
    pub fn note_on<E: AudioEngine>(
        &mut self,
        manager: &mut AudioGraphManager<E>,
        handle: Option<&AudioGraphHandle>,
        note: NoteId,
    ) -> Result<bool> {
        let Some(handle) = handle.filter(|h| !h.is_disposed()) else {
            tracing::debug!(%note, "note on without an audio graph");
            return Ok(false);
        };
        if self.active.contains(&note) {
            tracing::trace!(%note, "note already sounding");
            return Ok(false);
        }

        manager.ensure_running()?;
        manager.trigger_attack(handle, note)?;
        self.active.insert(note);
        Ok(true)
    }

    /// Forgets `note` and releases it if a live graph exists.
    ///
    /// Returns whether the note was sounding. Engine errors are logged, not
    /// returned: a lost release must not leave the note stuck in the set.
    pub fn note_off<E: AudioEngine>(
        &mut self,
        manager: &mut AudioGraphManager<E>,
        handle: Option<&AudioGraphHandle>,
        note: NoteId,
    ) -> bool {
        let was_active = self.active.remove(&note);
        if let Some(handle) = handle {
            if let Err(err) = manager.trigger_release(handle, note) {
                tracing::warn!(%note, error = %err, "release failed");
            }
        }
        was_active
    }

    /// Releases every sounding note. Used on focus loss and teardown.
    pub fn release_all<E: AudioEngine>(
        &mut self,
        manager: &mut AudioGraphManager<E>,
        handle: Option<&AudioGraphHandle>,
    ) -> usize {
        let notes = std::mem::take(&mut self.active);
        let count = notes.len();
        for note in notes {
            if let Some(handle) = handle {
                if let Err(err) = manager.trigger_release(handle, note) {
                    tracing::warn!(%note, error = %err, "release failed");
                }
            }
        }
        count
    }

    pub fn active(&self) -> &ActiveNoteSet {
        &self.active
    }

    pub fn is_active(&self, note: NoteId) -> bool {
        self.active.contains(&note)
    }
}
