//! Run-length encoding of model targets
//!
//! Targets are sequences of event indices (see [`neomt3_core::Codec`]) in
//! which time advances through `shift` events. This crate compresses those
//! sequences into the compact form a model is trained on, and back.
//!
//! # Examples
//!
//! ```
//! use neomt3_core::{build_codec, VocabularyConfig};
//! use neomt3_rle::{run_length_decode_shifts, run_length_encode_shifts};
//!
//! let codec = build_codec(&VocabularyConfig::default()).unwrap();
//! // three single steps, middle C, three more steps, D
//! let events = [1, 1, 1, 161, 1, 1, 1, 163];
//! let encoded = run_length_encode_shifts(&codec, &events).unwrap();
//! assert_eq!(encoded, vec![3, 161, 6, 163]);
//! assert_eq!(run_length_decode_shifts(&codec, &encoded).unwrap(), events.to_vec());
//! ```
//!
//! # Main Functions
//!
//! - [`run_length_encode_shifts`] / [`run_length_decode_shifts`]: shifts to
//!   absolute step counts and back
//! - [`remove_redundant_state_changes`]: drop repeated velocity/program events
//! - [`encode_targets`]: both of the above in one pass
//! - [`merge_run_length_encoded_targets`]: interleave encoded tracks by time

pub mod merge;
pub mod shifts;
pub mod state_changes;

pub use merge::merge_run_length_encoded_targets;
pub use shifts::{encode_targets, run_length_decode_shifts, run_length_encode_shifts};
pub use state_changes::remove_redundant_state_changes;

#[cfg(test)]
pub(crate) mod testing {
    use neomt3_core::{Codec, EventRange};

    /// shift 0..=100, then pitch, velocity, drum and program over 0..=127, then tie
    pub fn codec() -> Codec {
        let midi = EventRange::new(0, 127).unwrap();
        Codec::new(vec![
            ("shift", EventRange::new(0, 100).unwrap()),
            ("pitch", midi),
            ("velocity", midi),
            ("drum", midi),
            ("program", midi),
            ("tie", EventRange::new(0, 0).unwrap()),
        ])
        .unwrap()
    }
}
