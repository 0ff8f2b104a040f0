//! Pluggable strategies for turning note events into codec events and back.
//!
//! An [`EventEncodingSpec`] owns both directions: a stateful encoder that
//! turns [`NoteEventData`] into codec [`Event`]s, and a stateful decoder
//! that rebuilds a [`NoteSequence`] from timed events.

use crate::error::{NoteError, Result};
use crate::note::{
    Note, NoteEventData, NoteSequence, DEFAULT_NOTE_DURATION, DEFAULT_VELOCITY, MIN_NOTE_DURATION,
};
use neomt3_core::{bin_to_velocity, num_velocity_bins_from_codec, types, velocity_to_bin, Codec, Event};
use std::collections::{BTreeMap, BTreeSet};

pub trait EventEncodingSpec {
    type EncodingState;
    type DecodingState;

    fn init_encoding_state(&self) -> Self::EncodingState;

    /// Events announcing one note event; updates the encoding state
    fn encode_event(
        &self,
        state: &mut Self::EncodingState,
        data: &NoteEventData,
        codec: &Codec,
    ) -> Result<Vec<Event>>;

    /// Snapshot of the encoding state, written at the start of a segment so
    /// the decoder knows which notes are still sounding
    fn encoding_state_to_events(&self, state: &Self::EncodingState) -> Vec<Event>;

    fn init_decoding_state(&self) -> Self::DecodingState;

    fn begin_decoding_segment(&self, state: &mut Self::DecodingState);

    fn decode_event(
        &self,
        state: &mut Self::DecodingState,
        time: f64,
        event: &Event,
        codec: &Codec,
    ) -> Result<()>;

    fn flush_decoding_state(&self, state: Self::DecodingState) -> NoteSequence;
}

/// Decoder bookkeeping shared by the note specs
#[derive(Debug, Clone)]
pub struct NoteDecodingState {
    pub current_time: f64,
    pub current_velocity: u8,
    pub current_program: u8,
    /// `(pitch, program)` -> `(onset time, velocity)`
    active_pitches: BTreeMap<(u8, u8), (f64, u8)>,
    tied_pitches: BTreeSet<(u8, u8)>,
    is_tie_section: bool,
    note_sequence: NoteSequence,
}

impl Default for NoteDecodingState {
    fn default() -> Self {
        NoteDecodingState {
            current_time: 0.0,
            current_velocity: DEFAULT_VELOCITY,
            current_program: 0,
            active_pitches: BTreeMap::new(),
            tied_pitches: BTreeSet::new(),
            is_tie_section: false,
            note_sequence: NoteSequence::new(),
        }
    }
}

impl NoteDecodingState {
    fn advance_to(&mut self, time: f64) -> Result<()> {
        if time < self.current_time {
            return Err(NoteError::decode(format!(
                "event time {:.3} < current time {:.3}",
                time, self.current_time
            )));
        }
        self.current_time = time;
        Ok(())
    }

    fn close_note(&mut self, pitch: u8, program: u8, end_time: f64) {
        if let Some((start_time, velocity)) = self.active_pitches.remove(&(pitch, program)) {
            self.note_sequence.add_note(Note {
                pitch,
                velocity,
                program,
                is_drum: false,
                start_time,
                end_time,
            });
        }
    }
}

/// Onsets only: every event is a pitch, decoded as a short fixed-length note.
/// Drum hits are written as `drum`, everything else as `note`.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoteOnsetSpec;

impl EventEncodingSpec for NoteOnsetSpec {
    type EncodingState = ();
    type DecodingState = NoteDecodingState;

    fn init_encoding_state(&self) {}

    fn encode_event(&self, _state: &mut (), data: &NoteEventData, _codec: &Codec) -> Result<Vec<Event>> {
        let event_type = if data.is_drum { types::DRUM } else { types::NOTE };
        Ok(vec![Event::new(event_type, data.pitch as i32)])
    }

    fn encoding_state_to_events(&self, _state: &()) -> Vec<Event> {
        Vec::new()
    }

    fn init_decoding_state(&self) -> NoteDecodingState {
        NoteDecodingState::default()
    }

    fn begin_decoding_segment(&self, _state: &mut NoteDecodingState) {}

    fn decode_event(
        &self,
        state: &mut NoteDecodingState,
        time: f64,
        event: &Event,
        _codec: &Codec,
    ) -> Result<()> {
        let is_drum = match event.event_type() {
            types::NOTE => false,
            types::DRUM => true,
            _ => {
                return Err(NoteError::decode(format!(
                    "unexpected event {} in onset stream",
                    event
                )))
            }
        };
        state.advance_to(time)?;
        state.note_sequence.add_note(Note {
            pitch: event.value() as u8,
            velocity: DEFAULT_VELOCITY,
            program: 0,
            is_drum,
            start_time: time,
            end_time: time + DEFAULT_NOTE_DURATION,
        });
        Ok(())
    }

    fn flush_decoding_state(&self, state: NoteDecodingState) -> NoteSequence {
        state.note_sequence
    }
}

/// Sounding pitches while encoding, `(program, pitch)` -> velocity bin
#[derive(Debug, Clone, Default)]
pub struct NoteEncodingState {
    active_pitches: BTreeMap<(u8, u8), i32>,
}

/// Onsets, offsets, velocities and programs, with optional tie sections
#[derive(Debug, Clone, Copy)]
pub struct NoteSpec {
    pub include_ties: bool,
}

impl Default for NoteSpec {
    fn default() -> Self {
        NoteSpec { include_ties: true }
    }
}

impl NoteSpec {
    fn decode_pitch(&self, state: &mut NoteDecodingState, time: f64, pitch: u8) -> Result<()> {
        let key = (pitch, state.current_program);

        if state.is_tie_section {
            if !state.active_pitches.contains_key(&key) {
                return Err(NoteError::decode(format!(
                    "inactive pitch {} program {} in tie section",
                    pitch, state.current_program
                )));
            }
            if !state.tied_pitches.insert(key) {
                return Err(NoteError::decode(format!(
                    "pitch {} program {} is already tied",
                    pitch, state.current_program
                )));
            }
        } else if state.current_velocity == 0 {
            if !state.active_pitches.contains_key(&key) {
                return Err(NoteError::decode(format!(
                    "note-off for inactive pitch {} program {}",
                    pitch, state.current_program
                )));
            }
            state.close_note(pitch, state.current_program, time);
        } else {
            // re-onset of a sounding pitch ends the previous note
            state.close_note(pitch, state.current_program, time);
            state
                .active_pitches
                .insert(key, (time, state.current_velocity));
        }
        Ok(())
    }

    fn end_tie_section(&self, state: &mut NoteDecodingState) -> Result<()> {
        if !state.is_tie_section {
            return Err(NoteError::decode("tie section end event when not in tie section"));
        }
        let untied: Vec<(u8, u8)> = state
            .active_pitches
            .keys()
            .filter(|key| !state.tied_pitches.contains(key))
            .copied()
            .collect();
        for (pitch, program) in untied {
            state.close_note(pitch, program, state.current_time);
        }
        state.is_tie_section = false;
        Ok(())
    }
}

impl EventEncodingSpec for NoteSpec {
    type EncodingState = NoteEncodingState;
    type DecodingState = NoteDecodingState;

    fn init_encoding_state(&self) -> NoteEncodingState {
        NoteEncodingState::default()
    }

    fn encode_event(
        &self,
        state: &mut NoteEncodingState,
        data: &NoteEventData,
        codec: &Codec,
    ) -> Result<Vec<Event>> {
        let velocity = data.velocity.ok_or(NoteError::MissingVelocity { pitch: data.pitch })?;
        let num_bins = num_velocity_bins_from_codec(codec)?;
        let velocity_bin = velocity_to_bin(velocity, num_bins);

        if data.is_drum {
            return Ok(vec![
                Event::new(types::VELOCITY, velocity_bin),
                Event::new(types::DRUM, data.pitch as i32),
            ]);
        }

        let program = data.program.unwrap_or(0);
        if velocity_bin == 0 {
            state.active_pitches.remove(&(program, data.pitch));
        } else {
            state.active_pitches.insert((program, data.pitch), velocity_bin);
        }

        let mut events = Vec::with_capacity(3);
        if let Some(program) = data.program {
            events.push(Event::new(types::PROGRAM, program as i32));
        }
        events.push(Event::new(types::VELOCITY, velocity_bin));
        events.push(Event::new(types::NOTE, data.pitch as i32));
        Ok(events)
    }

    fn encoding_state_to_events(&self, state: &NoteEncodingState) -> Vec<Event> {
        if !self.include_ties {
            return Vec::new();
        }
        let mut events: Vec<Event> = state
            .active_pitches
            .keys()
            .flat_map(|&(program, pitch)| {
                [
                    Event::new(types::PROGRAM, program as i32),
                    Event::new(types::NOTE, pitch as i32),
                ]
            })
            .collect();
        events.push(Event::new(types::TIE, 0));
        events
    }

    fn init_decoding_state(&self) -> NoteDecodingState {
        NoteDecodingState::default()
    }

    fn begin_decoding_segment(&self, state: &mut NoteDecodingState) {
        if self.include_ties {
            state.is_tie_section = true;
            state.tied_pitches.clear();
        }
    }

    fn decode_event(
        &self,
        state: &mut NoteDecodingState,
        time: f64,
        event: &Event,
        codec: &Codec,
    ) -> Result<()> {
        state.advance_to(time)?;
        let value = event.value();

        match event.event_type() {
            types::NOTE => self.decode_pitch(state, time, value as u8),
            types::DRUM => {
                if state.current_velocity == 0 {
                    return Err(NoteError::decode("velocity cannot be zero for drum event"));
                }
                state.note_sequence.add_note(Note {
                    pitch: value as u8,
                    velocity: state.current_velocity,
                    program: state.current_program,
                    is_drum: true,
                    start_time: time,
                    end_time: time + DEFAULT_NOTE_DURATION,
                });
                Ok(())
            }
            types::VELOCITY => {
                let num_bins = num_velocity_bins_from_codec(codec)?;
                state.current_velocity = bin_to_velocity(value, num_bins);
                Ok(())
            }
            types::PROGRAM => {
                state.current_program = value as u8;
                Ok(())
            }
            types::TIE => self.end_tie_section(state),
            _ => Err(NoteError::decode(format!("unexpected event {}", event))),
        }
    }

    fn flush_decoding_state(&self, mut state: NoteDecodingState) -> NoteSequence {
        let end_time = state
            .active_pitches
            .values()
            .fold(state.current_time, |end, &(onset, _)| end.max(onset + MIN_NOTE_DURATION));
        let active: Vec<(u8, u8)> = state.active_pitches.keys().copied().collect();
        for (pitch, program) in active {
            state.close_note(pitch, program, end_time);
        }
        state.note_sequence
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use neomt3_core::{build_codec, VocabularyConfig};

    fn codec() -> Codec {
        build_codec(&VocabularyConfig {
            include_drums: true,
            ..VocabularyConfig::default()
        })
        .unwrap()
    }

    fn onset(pitch: u8, velocity: u8, program: u8) -> NoteEventData {
        NoteEventData {
            pitch,
            velocity: Some(velocity),
            program: Some(program),
            is_drum: false,
        }
    }

    #[test]
    fn test_encode_note_events() {
        let codec = codec();
        let spec = NoteSpec::default();
        let mut state = spec.init_encoding_state();

        let events = spec.encode_event(&mut state, &onset(60, 127, 5), &codec).unwrap();
        assert_eq!(
            events,
            vec![
                Event::new("program", 5),
                Event::new("velocity", 31),
                Event::new("note", 60)
            ]
        );
        assert_eq!(
            spec.encoding_state_to_events(&state),
            vec![Event::new("program", 5), Event::new("note", 60), Event::new("tie", 0)]
        );

        spec.encode_event(&mut state, &onset(60, 0, 5), &codec).unwrap();
        assert_eq!(spec.encoding_state_to_events(&state), vec![Event::new("tie", 0)]);
    }

    #[test]
    fn test_encode_drum_event() {
        let codec = codec();
        let spec = NoteSpec::default();
        let mut state = spec.init_encoding_state();
        let drum = NoteEventData {
            is_drum: true,
            ..onset(36, 100, 0)
        };
        let events = spec.encode_event(&mut state, &drum, &codec).unwrap();
        assert_eq!(events[1], Event::new("drum", 36));
        assert_eq!(spec.encoding_state_to_events(&state), vec![Event::new("tie", 0)]);
    }

    #[test]
    fn test_state_events_sorted_by_program_then_pitch() {
        let codec = codec();
        let spec = NoteSpec::default();
        let mut state = spec.init_encoding_state();
        spec.encode_event(&mut state, &onset(64, 90, 1), &codec).unwrap();
        spec.encode_event(&mut state, &onset(40, 90, 1), &codec).unwrap();
        spec.encode_event(&mut state, &onset(70, 90, 0), &codec).unwrap();
        let pitches: Vec<i32> = spec
            .encoding_state_to_events(&state)
            .iter()
            .filter(|e| e.is_type("note"))
            .map(Event::value)
            .collect();
        assert_eq!(pitches, vec![70, 40, 64]);
    }

    #[test]
    fn test_decode_onset_and_offset() {
        let codec = codec();
        let spec = NoteSpec { include_ties: false };
        let mut state = spec.init_decoding_state();
        spec.begin_decoding_segment(&mut state);

        spec.decode_event(&mut state, 0.0, &Event::new("program", 3), &codec).unwrap();
        spec.decode_event(&mut state, 0.0, &Event::new("velocity", 31), &codec).unwrap();
        spec.decode_event(&mut state, 0.0, &Event::new("note", 60), &codec).unwrap();
        spec.decode_event(&mut state, 0.5, &Event::new("velocity", 0), &codec).unwrap();
        spec.decode_event(&mut state, 0.5, &Event::new("note", 60), &codec).unwrap();

        let ns = spec.flush_decoding_state(state);
        assert_eq!(
            ns.notes,
            vec![Note {
                pitch: 60,
                velocity: 127,
                program: 3,
                is_drum: false,
                start_time: 0.0,
                end_time: 0.5
            }]
        );
    }

    #[test]
    fn test_decode_errors() {
        let codec = codec();
        let spec = NoteSpec { include_ties: false };
        let mut state = spec.init_decoding_state();

        spec.decode_event(&mut state, 1.0, &Event::new("velocity", 0), &codec).unwrap();
        assert!(spec.decode_event(&mut state, 1.0, &Event::new("note", 60), &codec).is_err());
        assert!(spec.decode_event(&mut state, 1.0, &Event::new("drum", 36), &codec).is_err());
        assert!(spec.decode_event(&mut state, 1.0, &Event::new("tie", 0), &codec).is_err());
        assert!(spec.decode_event(&mut state, 0.5, &Event::new("velocity", 3), &codec).is_err());
    }

    #[test]
    fn test_tie_section_keeps_only_tied_notes() {
        let codec = codec();
        let spec = NoteSpec::default();
        let mut state = spec.init_decoding_state();

        // first segment: two notes start, no tie section content
        spec.begin_decoding_segment(&mut state);
        spec.decode_event(&mut state, 0.0, &Event::new("tie", 0), &codec).unwrap();
        spec.decode_event(&mut state, 0.0, &Event::new("velocity", 20), &codec).unwrap();
        spec.decode_event(&mut state, 0.0, &Event::new("note", 60), &codec).unwrap();
        spec.decode_event(&mut state, 0.0, &Event::new("note", 64), &codec).unwrap();

        // second segment ties 64 only, so 60 ends at the segment start
        spec.begin_decoding_segment(&mut state);
        spec.decode_event(&mut state, 2.0, &Event::new("program", 0), &codec).unwrap();
        spec.decode_event(&mut state, 2.0, &Event::new("note", 64), &codec).unwrap();
        assert!(spec.decode_event(&mut state, 2.0, &Event::new("note", 64), &codec).is_err());
        spec.decode_event(&mut state, 2.0, &Event::new("tie", 0), &codec).unwrap();

        let mut ns = spec.flush_decoding_state(state);
        ns.sort();
        assert_eq!(ns.notes.len(), 2);
        assert_eq!((ns.notes[0].pitch, ns.notes[0].end_time), (60, 2.0));
        assert_eq!(ns.notes[1].pitch, 64);
        assert_eq!(ns.notes[1].end_time, 2.0);
    }

    #[test]
    fn test_flush_stretches_to_min_duration() {
        let codec = codec();
        let spec = NoteSpec { include_ties: false };
        let mut state = spec.init_decoding_state();
        spec.decode_event(&mut state, 1.0, &Event::new("note", 60), &codec).unwrap();
        let ns = spec.flush_decoding_state(state);
        assert_eq!(ns.notes[0].end_time, 1.0 + MIN_NOTE_DURATION);
        assert_eq!(ns.notes[0].velocity, DEFAULT_VELOCITY);
    }

    #[test]
    fn test_onset_spec() {
        let codec = codec();
        let spec = NoteOnsetSpec;
        let mut enc = spec.init_encoding_state();
        let data = NoteEventData {
            pitch: 62,
            velocity: None,
            program: None,
            is_drum: false,
        };
        assert_eq!(spec.encode_event(&mut enc, &data, &codec).unwrap(), vec![Event::new("note", 62)]);
        assert!(spec.encoding_state_to_events(&enc).is_empty());

        let mut state = spec.init_decoding_state();
        spec.decode_event(&mut state, 0.25, &Event::new("note", 62), &codec).unwrap();
        assert!(spec.decode_event(&mut state, 0.5, &Event::new("velocity", 1), &codec).is_err());
        spec.decode_event(&mut state, 0.5, &Event::new("drum", 36), &codec).unwrap();
        let ns = spec.flush_decoding_state(state);
        assert_eq!(ns.notes.len(), 2);
        assert_eq!(ns.notes[0].start_time, 0.25);
        assert!(ns.notes[1].is_drum);

        let drum = NoteEventData { is_drum: true, ..data };
        assert_eq!(spec.encode_event(&mut enc, &drum, &codec).unwrap(), vec![Event::new("drum", 62)]);
    }

    #[test]
    fn test_note_spec_requires_velocity() {
        let codec = codec();
        let spec = NoteSpec::default();
        let mut state = spec.init_encoding_state();
        let data = NoteEventData {
            pitch: 60,
            velocity: None,
            program: None,
            is_drum: false,
        };
        assert!(matches!(
            spec.encode_event(&mut state, &data, &codec),
            Err(NoteError::MissingVelocity { pitch: 60 })
        ));
    }
}
