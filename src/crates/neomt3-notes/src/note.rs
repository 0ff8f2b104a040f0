use serde::{Deserialize, Serialize};

/// Velocity given to notes whose encoding carries none
pub const DEFAULT_VELOCITY: u8 = 100;
/// Length given to notes whose encoding carries no offset (onsets, drums)
pub const DEFAULT_NOTE_DURATION: f64 = 0.01;
/// Shortest note a decoder will emit
pub const MIN_NOTE_DURATION: f64 = 0.01;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
    pub pitch: u8,
    pub velocity: u8,
    pub program: u8,
    pub is_drum: bool,
    pub start_time: f64,
    pub end_time: f64,
}

/// Notes with absolute times in seconds
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NoteSequence {
    pub notes: Vec<Note>,
    pub total_time: f64,
}

/// The payload of one timestamped note event handed to an encoding spec.
///
/// `velocity` is `Some(0)` for an offset. Onset-only encodings leave both
/// velocity and program empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NoteEventData {
    pub pitch: u8,
    pub velocity: Option<u8>,
    pub program: Option<u8>,
    pub is_drum: bool,
}

impl NoteSequence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a note, stretching it to the minimum duration
    pub fn add_note(&mut self, mut note: Note) {
        note.end_time = note.end_time.max(note.start_time + MIN_NOTE_DURATION);
        self.total_time = self.total_time.max(note.end_time);
        self.notes.push(note);
    }

    /// Drop percussion notes, returning how many were removed
    pub fn remove_drums(&mut self) -> usize {
        let before = self.notes.len();
        self.notes.retain(|note| !note.is_drum);
        before - self.notes.len()
    }

    /// Order notes by onset, then pitch, then program
    pub fn sort(&mut self) {
        self.notes.sort_by(|a, b| {
            a.start_time
                .total_cmp(&b.start_time)
                .then(a.pitch.cmp(&b.pitch))
                .then(a.program.cmp(&b.program))
        });
    }

    /// Onset times and pitches only
    pub fn to_onsets(&self) -> (Vec<f64>, Vec<NoteEventData>) {
        self.notes
            .iter()
            .map(|note| {
                (
                    note.start_time,
                    NoteEventData {
                        pitch: note.pitch,
                        velocity: None,
                        program: None,
                        is_drum: note.is_drum,
                    },
                )
            })
            .unzip()
    }

    /// Offsets of pitched notes followed by onsets of all notes.
    ///
    /// Notes are ordered by drum flag, program and pitch first; offsets come
    /// before onsets so a stable sort on time keeps an offset ahead of a
    /// re-onset of the same pitch.
    pub fn to_onsets_and_offsets(&self) -> (Vec<f64>, Vec<NoteEventData>) {
        let mut notes: Vec<&Note> = self.notes.iter().collect();
        notes.sort_by_key(|note| (note.is_drum, note.program, note.pitch));

        let offsets = notes.iter().filter(|note| !note.is_drum).map(|note| {
            (
                note.end_time,
                NoteEventData {
                    pitch: note.pitch,
                    velocity: Some(0),
                    program: Some(note.program),
                    is_drum: false,
                },
            )
        });
        let onsets = notes.iter().map(|note| {
            (
                note.start_time,
                NoteEventData {
                    pitch: note.pitch,
                    velocity: Some(note.velocity),
                    program: Some(note.program),
                    is_drum: note.is_drum,
                },
            )
        });

        offsets.chain(onsets).unzip()
    }
}
