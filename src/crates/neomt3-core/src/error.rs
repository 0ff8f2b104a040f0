use crate::event::EventRange;

/// Errors raised by the codec and by everything that classifies event
/// indices through it.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    #[error("Unknown event type: {0}")]
    UnknownEventType(String),

    #[error("Event type registered twice: {0}")]
    DuplicateEventType(String),

    #[error("min_value ({min_value}) must be less than or equal to max_value ({max_value})")]
    InvalidRange { min_value: i32, max_value: i32 },

    #[error("Event type '{event_type}' does not fit in a {limit}-class vocabulary")]
    VocabularyTooLarge { event_type: String, limit: u32 },

    #[error("Token {token} is outside the vocabulary (limit {limit})")]
    TokenOutOfRange { token: u32, limit: u32 },

    #[error("Value {value} for event type '{event_type}' is outside {min_value}..={max_value}")]
    ValueOutOfRange {
        event_type: String,
        value: i32,
        min_value: i32,
        max_value: i32,
    },

    #[error("Shift range {0} must start at 0 and span at least one step")]
    InvalidShiftRange(EventRange),

    #[error("Shift moves backwards from step {from} to step {to}")]
    ShiftBackwards { from: u64, to: u64 },
}

pub type Result<T> = std::result::Result<T, CodecError>;
