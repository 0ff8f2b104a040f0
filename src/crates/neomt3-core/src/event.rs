use crate::error::{CodecError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Event type names used by the vocabulary builder and the note encoders.
pub mod types {
    pub const SHIFT: &str = "shift";
    pub const NOTE: &str = "note";
    pub const VELOCITY: &str = "velocity";
    pub const PROGRAM: &str = "program";
    pub const DRUM: &str = "drum";
    pub const TIE: &str = "tie";
}

/// A typed, valued occurrence such as a note onset or a velocity change
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Event {
    #[serde(rename = "type")]
    event_type: String,
    value: i32,
}

impl Event {
    pub fn new(event_type: impl Into<String>, value: i32) -> Self {
        Event {
            event_type: event_type.into(),
            value,
        }
    }

    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    pub fn value(&self) -> i32 {
        self.value
    }

    pub fn is_type(&self, event_type: &str) -> bool {
        self.event_type == event_type
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.event_type, self.value)
    }
}

/// Inclusive range of values an event type may take.
///
/// Only constructible through [`EventRange::new`], so `min_value <= max_value`
/// always holds. Deserialization goes through the same check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawEventRange")]
pub struct EventRange {
    min_value: i32,
    max_value: i32,
}

#[derive(Deserialize)]
struct RawEventRange {
    min_value: i32,
    max_value: i32,
}

impl TryFrom<RawEventRange> for EventRange {
    type Error = CodecError;

    fn try_from(raw: RawEventRange) -> Result<Self> {
        EventRange::new(raw.min_value, raw.max_value)
    }
}

impl EventRange {
    /// Create a range, failing when `min_value > max_value`
    pub fn new(min_value: i32, max_value: i32) -> Result<Self> {
        if min_value > max_value {
            return Err(CodecError::InvalidRange {
                min_value,
                max_value,
            });
        }
        Ok(EventRange {
            min_value,
            max_value,
        })
    }

    pub fn min_value(&self) -> i32 {
        self.min_value
    }

    pub fn max_value(&self) -> i32 {
        self.max_value
    }

    /// Number of distinct values in the range (up to 2^32 for the full `i32`
    /// span)
    pub fn size(&self) -> u64 {
        (self.max_value as i64 - self.min_value as i64 + 1) as u64
    }

    pub fn contains(&self, value: i32) -> bool {
        value >= self.min_value && value <= self.max_value
    }
}

impl TryFrom<(i32, i32)> for EventRange {
    type Error = CodecError;

    fn try_from((min_value, max_value): (i32, i32)) -> Result<Self> {
        EventRange::new(min_value, max_value)
    }
}

impl fmt::Display for EventRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..={}", self.min_value, self.max_value)
    }
}
