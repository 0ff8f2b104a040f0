use crate::error::{CodecError, Result};
use crate::event::{types, Event, EventRange};
use log::debug;
use std::collections::HashMap;

/// Integer id of an event or special marker as seen by the model
pub type Token = u32;

pub const PAD_TOKEN: Token = 0;
pub const SOS_TOKEN: Token = 1;
pub const EOS_TOKEN: Token = 2;
pub const NUM_SPECIAL_TOKENS: u32 = 3;

#[derive(Debug, Clone, PartialEq, Eq)]
struct TypeSlot {
    name: String,
    range: EventRange,
    /// First event index owned by this type
    offset: u32,
    /// One past the last event index owned by this type
    end: u32,
}

/// Maps typed events onto one flat integer space.
///
/// Every registered type owns a contiguous block of indices, laid out in
/// registration order. That order is part of the wire format: reordering the
/// types invalidates anything encoded with the previous layout.
///
/// The codec speaks two integer spaces:
///
/// - **event indices** (`0..num_event_classes()`) are the bare layout. Targets
///   and the run-length layer work on these.
/// - **tokens** (`0..num_classes()`) are event indices shifted past the
///   special tokens ([`PAD_TOKEN`], [`SOS_TOKEN`], [`EOS_TOKEN`]). This is what
///   the model embeds and predicts.
///
/// A codec is never mutated after construction and can be shared freely
/// between threads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Codec {
    slots: Vec<TypeSlot>,
    num_event_classes: u32,
}

impl Codec {
    /// Build a codec from `(type name, range)` pairs in layout order
    pub fn new<I, S>(event_ranges: I) -> Result<Self>
    where
        I: IntoIterator<Item = (S, EventRange)>,
        S: Into<String>,
    {
        let mut slots: Vec<TypeSlot> = Vec::new();
        let mut offset = 0u32;

        for (name, range) in event_ranges {
            let name = name.into();
            if slots.iter().any(|slot| slot.name == name) {
                return Err(CodecError::DuplicateEventType(name));
            }
            // the token space adds the special tokens on top of the last index
            let end = u32::try_from(range.size())
                .ok()
                .and_then(|size| offset.checked_add(size))
                .filter(|end| end.checked_add(NUM_SPECIAL_TOKENS).is_some())
                .ok_or_else(|| CodecError::VocabularyTooLarge {
                    event_type: name.clone(),
                    limit: u32::MAX - NUM_SPECIAL_TOKENS,
                })?;
            slots.push(TypeSlot {
                name,
                range,
                offset,
                end,
            });
            offset = end;
        }

        debug!(
            "codec layout: {} event types, {} event classes",
            slots.len(),
            offset
        );

        Ok(Codec {
            slots,
            num_event_classes: offset,
        })
    }

    /// Build a codec from an ordered list of type names and a map of their
    /// `(min, max)` ranges
    pub fn with_range_map<S: AsRef<str>>(
        event_types: &[S],
        event_ranges: &HashMap<String, (i32, i32)>,
    ) -> Result<Self> {
        let pairs = event_types
            .iter()
            .map(|name| {
                let name = name.as_ref();
                let &(min_value, max_value) = event_ranges
                    .get(name)
                    .ok_or_else(|| CodecError::UnknownEventType(name.to_string()))?;
                Ok((name.to_string(), EventRange::new(min_value, max_value)?))
            })
            .collect::<Result<Vec<_>>>()?;

        Codec::new(pairs)
    }

    fn slot(&self, event_type: &str) -> Result<&TypeSlot> {
        self.slots
            .iter()
            .find(|slot| slot.name == event_type)
            .ok_or_else(|| CodecError::UnknownEventType(event_type.to_string()))
    }

    /// Registered type names in layout order
    pub fn event_types(&self) -> impl Iterator<Item = &str> {
        self.slots.iter().map(|slot| slot.name.as_str())
    }

    pub fn has_event_type(&self, event_type: &str) -> bool {
        self.slots.iter().any(|slot| slot.name == event_type)
    }

    pub fn num_special_tokens(&self) -> u32 {
        NUM_SPECIAL_TOKENS
    }

    /// Size of the event index space
    pub fn num_event_classes(&self) -> u32 {
        self.num_event_classes
    }

    /// Size of the token space, special tokens included
    pub fn num_classes(&self) -> u32 {
        self.num_event_classes + NUM_SPECIAL_TOKENS
    }

    pub fn encode_event_index(&self, event: &Event) -> Result<u32> {
        let slot = self.slot(event.event_type())?;
        if !slot.range.contains(event.value()) {
            return Err(CodecError::ValueOutOfRange {
                event_type: slot.name.clone(),
                value: event.value(),
                min_value: slot.range.min_value(),
                max_value: slot.range.max_value(),
            });
        }
        let relative = event.value() as i64 - slot.range.min_value() as i64;
        Ok(slot.offset + relative as u32)
    }

    pub fn decode_event_index(&self, index: u32) -> Result<Event> {
        let slot = self
            .slots
            .iter()
            .find(|slot| index < slot.end)
            .ok_or(CodecError::TokenOutOfRange {
                token: index,
                limit: self.num_event_classes,
            })?;
        let value = (index - slot.offset) as i64 + slot.range.min_value() as i64;
        Ok(Event::new(slot.name.clone(), value as i32))
    }

    /// Encode an event as a model token
    pub fn encode_event(&self, event: &Event) -> Result<Token> {
        Ok(self.encode_event_index(event)? + NUM_SPECIAL_TOKENS)
    }

    /// Decode a model token. Special tokens decode to `None`.
    pub fn decode_event(&self, token: Token) -> Result<Option<Event>> {
        if token < NUM_SPECIAL_TOKENS {
            return Ok(None);
        }
        if token >= self.num_classes() {
            return Err(CodecError::TokenOutOfRange {
                token,
                limit: self.num_classes(),
            });
        }
        self.decode_event_index(token - NUM_SPECIAL_TOKENS).map(Some)
    }

    /// Value range registered for `event_type`
    pub fn event_type_range(&self, event_type: &str) -> Result<EventRange> {
        Ok(self.slot(event_type)?.range)
    }

    /// Inclusive event index bounds of `event_type`
    pub fn event_index_range(&self, event_type: &str) -> Result<(u32, u32)> {
        let slot = self.slot(event_type)?;
        Ok((slot.offset, slot.end - 1))
    }

    /// Inclusive token bounds of `event_type`
    pub fn token_range(&self, event_type: &str) -> Result<(Token, Token)> {
        let (start, end) = self.event_index_range(event_type)?;
        Ok((start + NUM_SPECIAL_TOKENS, end + NUM_SPECIAL_TOKENS))
    }

    pub fn is_shift_event_index(&self, index: u32) -> bool {
        self.slot(types::SHIFT)
            .map(|slot| index >= slot.offset && index < slot.end)
            .unwrap_or(false)
    }

    /// Largest number of steps a single shift event can carry
    pub fn max_shift_steps(&self) -> Result<i32> {
        Ok(self.event_type_range(types::SHIFT)?.max_value())
    }
}
