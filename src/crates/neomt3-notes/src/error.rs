use neomt3_core::CodecError;

#[derive(Debug, thiserror::Error)]
pub enum NoteError {
    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error("Cannot decode event: {0}")]
    Decode(String),

    #[error("Note event for pitch {pitch} carries no velocity")]
    MissingVelocity { pitch: u8 },

    #[error("Frame range {start}..{end} exceeds {num_frames} frames")]
    FrameOutOfRange {
        start: usize,
        end: usize,
        num_frames: usize,
    },

    #[error("{times} event times but {values} event values")]
    LengthMismatch { times: usize, values: usize },

    #[error("Invalid options: {0}")]
    InvalidOptions(String),

    #[error("Failed to parse MIDI file: {0}")]
    Midi(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl NoteError {
    pub fn decode(reason: impl Into<String>) -> Self {
        NoteError::Decode(reason.into())
    }
}

/// Fail on a zero frame or step rate
pub(crate) fn check_rate(name: &str, rate: u32) -> Result<()> {
    if rate == 0 {
        return Err(NoteError::InvalidOptions(format!(
            "{} must be greater than zero",
            name
        )));
    }
    Ok(())
}

pub type Result<T> = std::result::Result<T, NoteError>;
