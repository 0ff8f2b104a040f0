//! Event codec and vocabulary for note transcription token streams
//!
//! Musical events (note onsets, velocity and program changes, ties, time
//! shifts) are mapped onto a single flat integer vocabulary that a
//! sequence-to-sequence model consumes and produces.
//!
//! # Examples
//!
//! ```
//! use neomt3_core::{build_codec, Event, VocabularyConfig};
//!
//! let codec = build_codec(&VocabularyConfig::default()).unwrap();
//! let token = codec.encode_event(&Event::new("note", 60)).unwrap();
//! assert_eq!(codec.decode_event(token).unwrap(), Some(Event::new("note", 60)));
//! ```
//!
//! # Main Components
//!
//! - **Event / EventRange**: typed event values and their valid ranges
//! - **Codec**: the flat layout of all registered event types
//! - **Vocabulary**: deriving a codec from high-level options

pub mod codec;
pub mod error;
pub mod event;
pub mod vocabulary;

pub use codec::{Codec, Token, EOS_TOKEN, NUM_SPECIAL_TOKENS, PAD_TOKEN, SOS_TOKEN};
pub use error::{CodecError, Result};
pub use event::{types, Event, EventRange};
pub use vocabulary::{
    bin_to_velocity, build_codec, indices_to_tokens, num_velocity_bins_from_codec,
    tokens_to_indices, velocity_to_bin, vocabulary_from_codec, VocabularyConfig,
    VocabularySummary,
};
