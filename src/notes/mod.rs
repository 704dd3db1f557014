//! Notes: identifiers, the set of sounding notes, and keyboard input.

pub mod dispatcher;
pub mod id;
pub mod keyboard;

pub use dispatcher::{ActiveNoteSet, NoteDispatcher};
pub use id::NoteId;
pub use keyboard::{KeyInputMapper, DEFAULT_LAYOUT};
