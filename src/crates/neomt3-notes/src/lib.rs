//! Note sequences to transcription targets and back
//!
//! Builds on the codec from `neomt3-core` and the run-length encoding from
//! `neomt3-rle` to turn notes (typically parsed from MIDI) into per-segment
//! model tokens, and model output back into notes.
//!
//! # Main Components
//!
//! - **encoding**: the [`EventEncodingSpec`] strategies ([`NoteSpec`], [`NoteOnsetSpec`])
//! - **events**: frame-aligned event indexing and decoding
//! - **pipeline**: end-to-end tokenization of a [`NoteSequence`]
//! - **midi**: standard MIDI file import

pub mod encoding;
pub mod error;
pub mod events;
pub mod midi;
pub mod note;
pub mod pipeline;

pub use encoding::{EventEncodingSpec, NoteDecodingState, NoteEncodingState, NoteOnsetSpec, NoteSpec};
pub use error::{NoteError, Result};
pub use events::{
    decode_events, decode_segments, encode_and_index_events, DecodeSegment, DecodeStats,
    IndexedEvents,
};
pub use midi::{note_sequence_from_midi, note_sequence_from_midi_bytes};
pub use note::{Note, NoteEventData, NoteSequence};
pub use pipeline::{detokenize_segments, tokenize_note_sequence, SegmentOptions, TokenizedSegment};
