use crate::codec::{Codec, Token, EOS_TOKEN, NUM_SPECIAL_TOKENS, PAD_TOKEN, SOS_TOKEN};
use crate::error::{CodecError, Result};
use crate::event::{types, EventRange};
use serde::{Deserialize, Serialize};

pub const MIN_MIDI_PITCH: i32 = 0;
pub const MAX_MIDI_PITCH: i32 = 127;
pub const MIN_MIDI_PROGRAM: i32 = 0;
pub const MAX_MIDI_PROGRAM: i32 = 127;
pub const MAX_MIDI_VELOCITY: u8 = 127;

/// High-level vocabulary options a codec is derived from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VocabularyConfig {
    /// Velocity bins, bin 0 included (it marks note offsets)
    pub num_velocity_bins: u32,
    /// Only note onsets: no velocity or program events
    pub onsets_only: bool,
    /// Register the tie event that closes a segment's tie section
    pub include_ties: bool,
    /// Register the drum event for percussion onsets
    pub include_drums: bool,
    /// Largest step count a single shift event carries
    pub max_shift_steps: u32,
}

impl Default for VocabularyConfig {
    fn default() -> Self {
        VocabularyConfig {
            num_velocity_bins: 32,
            onsets_only: false,
            include_ties: true,
            include_drums: false,
            max_shift_steps: 100,
        }
    }
}

impl VocabularyConfig {
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}

/// Derive the codec for a vocabulary configuration.
///
/// Layout: `shift`, `note`, then `velocity` and `program` unless
/// `onsets_only`, then `drum` when `include_drums`, then `tie` when
/// `include_ties`.
///
/// With velocities, bin 0 marks offsets, so at least one more bin is needed
/// for onsets.
pub fn build_codec(config: &VocabularyConfig) -> Result<Codec> {
    let shift_range = EventRange::new(0, config.max_shift_steps as i32)?;
    if config.max_shift_steps == 0 {
        return Err(CodecError::InvalidShiftRange(shift_range));
    }

    let mut ranges = vec![
        (types::SHIFT, shift_range),
        (types::NOTE, EventRange::new(MIN_MIDI_PITCH, MAX_MIDI_PITCH)?),
    ];
    if !config.onsets_only {
        let max_bin = i32::try_from(config.num_velocity_bins as i64 - 1).map_err(|_| {
            CodecError::VocabularyTooLarge {
                event_type: types::VELOCITY.to_string(),
                limit: u32::MAX - NUM_SPECIAL_TOKENS,
            }
        })?;
        if max_bin < 1 {
            // no bin left for onsets
            return Err(CodecError::InvalidRange {
                min_value: 1,
                max_value: max_bin,
            });
        }
        ranges.push((types::VELOCITY, EventRange::new(0, max_bin)?));
        ranges.push((
            types::PROGRAM,
            EventRange::new(MIN_MIDI_PROGRAM, MAX_MIDI_PROGRAM)?,
        ));
    }
    if config.include_drums {
        ranges.push((types::DRUM, EventRange::new(MIN_MIDI_PITCH, MAX_MIDI_PITCH)?));
    }
    if config.include_ties {
        ranges.push((types::TIE, EventRange::new(0, 0)?));
    }

    Codec::new(ranges)
}

/// What the model's embedding and output layers need to know
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VocabularySummary {
    pub vocab_size: u32,
    pub eos_id: Token,
    pub pad_id: Token,
    /// The layout reserves no unknown-token slot
    pub unk_id: Option<Token>,
}

pub fn vocabulary_from_codec(codec: &Codec) -> VocabularySummary {
    VocabularySummary {
        vocab_size: codec.num_classes(),
        eos_id: EOS_TOKEN,
        pad_id: PAD_TOKEN,
        unk_id: None,
    }
}

pub fn num_velocity_bins_from_codec(codec: &Codec) -> Result<u32> {
    let (first, last) = codec.event_index_range(types::VELOCITY)?;
    Ok(last - first + 1)
}

/// Quantize a MIDI velocity. Velocity 0 (offset) keeps bin 0; onsets land in
/// `1..num_bins`.
pub fn velocity_to_bin(velocity: u8, num_bins: u32) -> i32 {
    if velocity == 0 {
        return 0;
    }
    let onset_bins = num_bins.saturating_sub(1) as f64;
    let bin = (onset_bins * velocity as f64 / MAX_MIDI_VELOCITY as f64).ceil() as i32;
    bin.max(1)
}

pub fn bin_to_velocity(bin: i32, num_bins: u32) -> u8 {
    if bin <= 0 || num_bins <= 1 {
        return 0;
    }
    let onset_bins = (num_bins - 1) as f64;
    let velocity = (MAX_MIDI_VELOCITY as f64 * bin as f64 / onset_bins).floor();
    velocity.min(MAX_MIDI_VELOCITY as f64) as u8
}

/// Shift event indices into token space, optionally closing with EOS
pub fn indices_to_tokens(indices: &[u32], append_eos: bool) -> Vec<Token> {
    let mut tokens: Vec<Token> = indices.iter().map(|&i| i + NUM_SPECIAL_TOKENS).collect();
    if append_eos {
        tokens.push(EOS_TOKEN);
    }
    tokens
}

/// Map model tokens back to event indices: stops at the first EOS and skips
/// PAD and SOS.
pub fn tokens_to_indices(tokens: &[Token]) -> Vec<u32> {
    tokens
        .iter()
        .take_while(|&&t| t != EOS_TOKEN)
        .filter(|&&t| t != PAD_TOKEN && t != SOS_TOKEN)
        .map(|&t| t - NUM_SPECIAL_TOKENS)
        .collect()
}
