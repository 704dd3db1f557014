use std::{fmt, str::FromStr};

use crate::error::Error;

const NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

/// A pitch, stored as a MIDI note number (0..=127).
///
/// Parses and prints scientific pitch notation: `"C4"` is 60, `"A4"` is 69.
/// Flats are accepted on input (`"Db4"` == `"C#4"`); output always uses
/// sharps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NoteId(u8);

impl NoteId {
    pub const MIDDLE_C: NoteId = NoteId(60);

    /// Values above 127 saturate.
    pub const fn new(midi: u8) -> Self {
        if midi > 127 {
            Self(127)
        } else {
            Self(midi)
        }
    }

    pub const fn midi(self) -> u8 {
        self.0
    }

    pub fn frequency(self) -> f64 {
        crate::control::mapping::midi_to_frequency(self.0)
    }

    /// Shifts by `semitones`, or `None` if the result leaves 0..=127.
    pub fn transpose(self, semitones: i32) -> Option<Self> {
        let shifted = i32::from(self.0) + semitones;
        u8::try_from(shifted)
            .ok()
            .filter(|m| *m <= 127)
            .map(Self)
    }

    pub fn octave(self) -> i32 {
        i32::from(self.0) / 12 - 1
    }

    pub fn pitch_class(self) -> &'static str {
        NAMES[usize::from(self.0 % 12)]
    }
}

impl fmt::Display for NoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.pitch_class(), self.octave())
    }
}

impl FromStr for NoteId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let unknown = || Error::UnknownNote(s.to_string());
        let mut chars = s.trim().chars();

        let base: i32 = match chars.next().map(|c| c.to_ascii_uppercase()) {
            Some('C') => 0,
            Some('D') => 2,
            Some('E') => 4,
            Some('F') => 5,
            Some('G') => 7,
            Some('A') => 9,
            Some('B') => 11,
            _ => return Err(unknown()),
        };

        let rest = chars.as_str();
        let (accidental, octave) = match rest.chars().next() {
            Some('#') => (1, &rest[1..]),
            Some('b') => (-1, &rest[1..]),
            _ => (0, rest),
        };

        let octave: i32 = octave.parse().map_err(|_| unknown())?;
        let midi = (octave + 1) * 12 + base + accidental;
        u8::try_from(midi)
            .ok()
            .filter(|m| *m <= 127)
            .map(NoteId)
            .ok_or_else(unknown)
    }
}

impl From<NoteId> for u8 {
    fn from(note: NoteId) -> Self {
        note.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(s: &str) -> NoteId {
        s.parse().unwrap()
    }

    #[test]
    fn parses_scientific_pitch() {
        assert_eq!(parse("C4").midi(), 60);
        assert_eq!(parse("A4").midi(), 69);
        assert_eq!(parse("C#4"), parse("Db4"));
        assert_eq!(parse("E5").midi(), 76);
        assert_eq!(parse("C-1").midi(), 0);
        assert_eq!(parse("G9").midi(), 127);
    }

    #[test]
    fn rejects_garbage_and_out_of_range() {
        assert!(matches!("H4".parse::<NoteId>(), Err(Error::UnknownNote(_))));
        assert!("C".parse::<NoteId>().is_err());
        assert!("G#9".parse::<NoteId>().is_err());
        assert!("".parse::<NoteId>().is_err());
    }

    #[test]
    fn displays_with_sharps() {
        assert_eq!(NoteId::new(61).to_string(), "C#4");
        assert_eq!(NoteId::new(0).to_string(), "C-1");
        assert_eq!(parse("Bb3").to_string(), "A#3");
    }

    #[test]
    fn a4_is_440() {
        assert!((parse("A4").frequency() - 440.0).abs() < 1e-9);
    }

    #[test]
    fn transpose_stays_in_midi_range() {
        assert_eq!(NoteId::MIDDLE_C.transpose(12), Some(NoteId::new(72)));
        assert_eq!(NoteId::new(2).transpose(-3), None);
        assert_eq!(NoteId::new(120).transpose(8), None);
    }
}
