//! Event vocabularies and targets for note transcription models
//!
//! Re-exports the workspace crates under one roof:
//!
//! - [`neomt3_core`]: event codec, vocabulary and token mapping
//! - [`neomt3_rle`]: run-length shift encoding, state-change elision and
//!   target merging
//! - [`neomt3_notes`]: note sequences, encoding specs, MIDI import and
//!   tokenization
//!
//! # Examples
//!
//! ```
//! use neomt3::{build_codec, merge_run_length_encoded_targets, VocabularyConfig};
//!
//! let codec = build_codec(&VocabularyConfig::default()).unwrap();
//! let merged = merge_run_length_encoded_targets(&codec, &[vec![3u32, 161], vec![3, 165]]).unwrap();
//! assert_eq!(merged, vec![3, 161, 165]);
//! ```

pub use neomt3_core;
pub use neomt3_notes;
pub use neomt3_rle;

pub use neomt3_core::{
    build_codec, vocabulary_from_codec, Codec, CodecError, Event, EventRange, Token,
    VocabularyConfig, VocabularySummary,
};
pub use neomt3_notes::{
    detokenize_segments, note_sequence_from_midi, tokenize_note_sequence, Note, NoteError,
    NoteSequence, SegmentOptions, TokenizedSegment,
};
pub use neomt3_rle::{
    encode_targets, merge_run_length_encoded_targets, remove_redundant_state_changes,
    run_length_decode_shifts, run_length_encode_shifts,
};
