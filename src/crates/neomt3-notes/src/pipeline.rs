//! Note sequences to model tokens and back, segment by segment.

use crate::encoding::{EventEncodingSpec, NoteOnsetSpec, NoteSpec};
use crate::error::{check_rate, Result};
use crate::events::{decode_segments, encode_and_index_events, DecodeSegment, DecodeStats};
use crate::note::{NoteEventData, NoteSequence};
use log::debug;
use neomt3_core::{
    indices_to_tokens, tokens_to_indices, types, Codec, Event, Token, VocabularyConfig,
};
use neomt3_rle::encode_targets;
use serde::{Deserialize, Serialize};

/// Model tokens for one segment of a piece
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenizedSegment {
    /// Seconds
    pub start_time: f64,
    pub tokens: Vec<Token>,
}

/// Frame grid and segmentation used when tokenizing
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SegmentOptions {
    pub steps_per_second: u32,
    pub frames_per_second: u32,
    /// Frames per segment; `None` keeps the whole piece in one segment
    pub segment_frames: Option<usize>,
}

impl Default for SegmentOptions {
    fn default() -> Self {
        SegmentOptions {
            steps_per_second: 100,
            frames_per_second: 125,
            segment_frames: None,
        }
    }
}

fn state_change_types(config: &VocabularyConfig) -> &'static [&'static str] {
    if config.onsets_only {
        &[]
    } else {
        &[types::VELOCITY, types::PROGRAM]
    }
}

/// Encode a note sequence into per-segment tokens, each ending with EOS.
///
/// Segments other than the first open with the notes still sounding at their
/// start when the vocabulary has ties.
pub fn tokenize_note_sequence(
    sequence: &NoteSequence,
    config: &VocabularyConfig,
    codec: &Codec,
    options: &SegmentOptions,
) -> Result<Vec<TokenizedSegment>> {
    check_rate("steps_per_second", options.steps_per_second)?;
    check_rate("frames_per_second", options.frames_per_second)?;
    if config.onsets_only {
        let (times, values) = sequence.to_onsets();
        tokenize(&NoteOnsetSpec, &times, &values, config, codec, options)
    } else {
        let (times, values) = sequence.to_onsets_and_offsets();
        let spec = NoteSpec {
            include_ties: config.include_ties,
        };
        tokenize(&spec, &times, &values, config, codec, options)
    }
}

fn tokenize<E: EventEncodingSpec>(
    spec: &E,
    times: &[f64],
    values: &[NoteEventData],
    config: &VocabularyConfig,
    codec: &Codec,
    options: &SegmentOptions,
) -> Result<Vec<TokenizedSegment>> {
    let fps = options.frames_per_second as f64;
    let end_time = times.iter().copied().fold(0.0, f64::max);
    let num_frames = ((end_time * fps).ceil() as usize).max(1);
    let frame_times: Vec<f64> = (0..num_frames).map(|i| i as f64 / fps).collect();

    let mut state = spec.init_encoding_state();
    let indexed = encode_and_index_events(
        spec,
        &mut state,
        times,
        values,
        codec,
        &frame_times,
        options.steps_per_second,
    )?;

    let state_events_end = if config.include_ties && !config.onsets_only {
        Some(codec.encode_event_index(&Event::new(types::TIE, 0))?)
    } else {
        None
    };
    let segment_frames = options.segment_frames.unwrap_or(num_frames).max(1);

    let mut segments = Vec::new();
    for start in (0..indexed.num_frames()).step_by(segment_frames) {
        let end = (start + segment_frames).min(indexed.num_frames());
        let targets = indexed.segment_targets(start..end, state_events_end)?;
        let encoded = encode_targets(codec, &targets, state_change_types(config))?;
        segments.push(TokenizedSegment {
            start_time: start as f64 / fps,
            tokens: indices_to_tokens(&encoded, true),
        });
    }

    debug!(
        "tokenized {} note events into {} segments",
        times.len(),
        segments.len()
    );
    Ok(segments)
}

/// Decode per-segment tokens back into one note sequence
pub fn detokenize_segments(
    segments: &[TokenizedSegment],
    config: &VocabularyConfig,
    codec: &Codec,
    steps_per_second: u32,
) -> Result<(NoteSequence, DecodeStats)> {
    let segments: Vec<DecodeSegment> = segments
        .iter()
        .map(|segment| DecodeSegment {
            start_time: segment.start_time,
            events: tokens_to_indices(&segment.tokens),
        })
        .collect();

    if config.onsets_only {
        decode_segments(&NoteOnsetSpec, &segments, codec, steps_per_second)
    } else {
        let spec = NoteSpec {
            include_ties: config.include_ties,
        };
        decode_segments(&spec, &segments, codec, steps_per_second)
    }
}
