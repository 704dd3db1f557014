use std::collections::HashMap;

use crate::{
    error::Result,
    notes::{dispatcher::ActiveNoteSet, NoteId},
};

/// Home-row piano layout: white keys on `a s d f g h j k l ;`, black keys on
/// the row above.
pub const DEFAULT_LAYOUT: [(&str, &str); 17] = [
    ("a", "C4"),
    ("w", "C#4"),
    ("s", "D4"),
    ("e", "D#4"),
    ("d", "E4"),
    ("f", "F4"),
    ("t", "F#4"),
    ("g", "G4"),
    ("y", "G#4"),
    ("h", "A4"),
    ("u", "A#4"),
    ("j", "B4"),
    ("k", "C5"),
    ("o", "C#5"),
    ("l", "D5"),
    ("p", "D#5"),
    (";", "E5"),
];

/// Maps computer-keyboard keys to notes.
#[derive(Debug, Clone)]
pub struct KeyInputMapper {
    map: HashMap<String, NoteId>,
    octave_shift: i32,
}

impl Default for KeyInputMapper {
    fn default() -> Self {
        let map = DEFAULT_LAYOUT
            .iter()
            .filter_map(|(key, note)| Some((key.to_string(), note.parse().ok()?)))
            .collect();
        Self {
            map,
            octave_shift: 0,
        }
    }
}

impl KeyInputMapper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Default layout with some keys remapped. Note names are parsed here,
    /// so a bad entry fails construction rather than a key press.
    pub fn with_overrides<'a>(
        overrides: impl IntoIterator<Item = (&'a str, &'a str)>,
    ) -> Result<Self> {
        let mut mapper = Self::default();
        for (key, note) in overrides {
            mapper.map.insert(key.to_lowercase(), note.parse()?);
        }
        Ok(mapper)
    }

    /// Transposes every mapped note by whole octaves.
    pub fn with_octave_shift(mut self, octaves: i32) -> Self {
        self.octave_shift = octaves;
        self
    }

    pub fn octave_shift(&self) -> i32 {
        self.octave_shift
    }

    pub fn set_octave_shift(&mut self, octaves: i32) {
        self.octave_shift = octaves;
    }

    /// The note `key` plays, if any.
    pub fn lookup(&self, key: &str) -> Option<NoteId> {
        let note = self.map.get(&key.to_lowercase())?;
        note.transpose(self.octave_shift * 12)
    }

    /// Note to start for a key press. Auto-repeat, unmapped keys and notes
    /// already sounding produce nothing.
    pub fn on_key_down(&self, key: &str, repeat: bool, active: &ActiveNoteSet) -> Option<NoteId> {
        if repeat {
            return None;
        }
        self.lookup(key).filter(|note| !active.contains(note))
    }

    /// Note to stop for a key release, whether or not it is sounding.
    pub fn on_key_up(&self, key: &str) -> Option<NoteId> {
        self.lookup(key)
    }

    /// `(key, note)` pairs in pitch order, for drawing the keyboard.
    pub fn layout(&self) -> Vec<(String, NoteId)> {
        let mut keys: Vec<(String, NoteId)> = self
            .map
            .keys()
            .filter_map(|k| Some((k.clone(), self.lookup(k)?)))
            .collect();
        keys.sort_by_key(|(_, note)| *note);
        keys
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn note(s: &str) -> NoteId {
        s.parse().unwrap()
    }

    #[test]
    fn default_layout_covers_c4_to_e5() {
        let mapper = KeyInputMapper::new();
        assert_eq!(mapper.lookup("a"), Some(note("C4")));
        assert_eq!(mapper.lookup("w"), Some(note("C#4")));
        assert_eq!(mapper.lookup("h"), Some(note("A4")));
        assert_eq!(mapper.lookup(";"), Some(note("E5")));
        assert_eq!(mapper.layout().len(), 17);
    }

    #[test]
    fn keys_are_case_insensitive() {
        let mapper = KeyInputMapper::new();
        assert_eq!(mapper.lookup("A"), Some(note("C4")));
    }

    #[test]
    fn repeat_never_starts_a_note() {
        let mapper = KeyInputMapper::new();
        let active = ActiveNoteSet::new();
        assert_eq!(mapper.on_key_down("a", true, &active), None);
        assert_eq!(mapper.on_key_down("a", false, &active), Some(note("C4")));
    }

    #[test]
    fn unknown_and_active_keys_are_ignored() {
        let mapper = KeyInputMapper::new();
        let mut active = ActiveNoteSet::new();
        assert_eq!(mapper.on_key_down("z", false, &active), None);

        active.insert(note("C4"));
        assert_eq!(mapper.on_key_down("a", false, &active), None);
    }

    #[test]
    fn key_up_maps_unconditionally() {
        let mapper = KeyInputMapper::new();
        assert_eq!(mapper.on_key_up("s"), Some(note("D4")));
        assert_eq!(mapper.on_key_up("1"), None);
    }

    #[test]
    fn octave_shift_transposes() {
        let mapper = KeyInputMapper::new().with_octave_shift(-1);
        assert_eq!(mapper.lookup("a"), Some(note("C3")));
    }

    #[test]
    fn overrides_replace_and_extend() {
        let mapper = KeyInputMapper::with_overrides([("z", "B3"), ("a", "C#4")]).unwrap();
        assert_eq!(mapper.lookup("z"), Some(note("B3")));
        assert_eq!(mapper.lookup("a"), Some(note("C#4")));

        assert!(KeyInputMapper::with_overrides([("q", "X9")]).is_err());
    }
}
