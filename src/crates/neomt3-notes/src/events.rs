//! Timed note events to event indices and back.
//!
//! Encoding produces the uncompressed stream (one single-step shift per time
//! step) aligned against a frame grid, so targets can be cut per audio
//! segment. Decoding consumes run-length encoded targets.

use crate::encoding::EventEncodingSpec;
use crate::error::{check_rate, NoteError, Result};
use crate::note::{NoteEventData, NoteSequence};
use log::{debug, info};
use neomt3_core::{types, Codec, Event};
use serde::{Deserialize, Serialize};
use std::ops::Range;

/// Event indices of a whole sequence plus frame alignment
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexedEvents {
    pub events: Vec<u32>,
    /// First event of each frame
    pub event_start_indices: Vec<usize>,
    /// One past the last event of each frame
    pub event_end_indices: Vec<usize>,
    /// Encoding-state snapshots taken before every event
    pub state_events: Vec<u32>,
    /// First state event of each frame
    pub state_event_indices: Vec<usize>,
}

impl IndexedEvents {
    pub fn num_frames(&self) -> usize {
        self.event_start_indices.len()
    }

    /// Targets for the frames in `frames`.
    ///
    /// With `state_events_end` set, the snapshot in effect at the first frame
    /// is prepended, up to and including that index.
    pub fn segment_targets(&self, frames: Range<usize>, state_events_end: Option<u32>) -> Result<Vec<u32>> {
        if frames.start >= frames.end || frames.end > self.num_frames() {
            return Err(NoteError::FrameOutOfRange {
                start: frames.start,
                end: frames.end,
                num_frames: self.num_frames(),
            });
        }

        let start = self.event_start_indices[frames.start];
        let end = self.event_end_indices[frames.end - 1];
        let mut targets = Vec::new();

        if let Some(end_index) = state_events_end {
            let state_start = self.state_event_indices[frames.start];
            let snapshot = &self.state_events[state_start.min(self.state_events.len())..];
            if let Some(len) = snapshot.iter().position(|&i| i == end_index) {
                targets.extend_from_slice(&snapshot[..=len]);
            }
        }
        targets.extend_from_slice(&self.events[start..end]);
        Ok(targets)
    }
}

/// Position of the encoder on the step and frame grids
#[derive(Debug, Default)]
struct FrameCursor {
    step: u64,
    event: usize,
    state_event: usize,
}

impl FrameCursor {
    /// One shift forward. Every frame starting before the new step begins
    /// at the events recorded since the previous step.
    fn step_forward(
        &mut self,
        indexed: &mut IndexedEvents,
        single_step: u32,
        frame_times: &[f64],
        steps_per_second: u32,
    ) {
        indexed.events.push(single_step);
        self.step += 1;
        let now = self.step as f64 / steps_per_second as f64;
        while let Some(&frame_time) = frame_times.get(indexed.event_start_indices.len()) {
            if frame_time >= now {
                break;
            }
            indexed.event_start_indices.push(self.event);
            indexed.state_event_indices.push(self.state_event);
        }
        self.event = indexed.events.len();
        self.state_event = indexed.state_events.len();
    }
}

fn quantize(time: f64, steps_per_second: u32) -> u64 {
    (time * steps_per_second as f64).round().max(0.0) as u64
}

/// Encode timed note events into event indices aligned to `frame_times`.
///
/// Events are stably sorted by time, so simultaneous events keep their input
/// order. Every time step becomes one single-step shift. Before each event
/// the encoding state is snapshotted into `state_events`. Frames map
/// to the events that happen while they are current, and the stream is
/// padded with shifts until it passes the last frame.
pub fn encode_and_index_events<E: EventEncodingSpec>(
    spec: &E,
    state: &mut E::EncodingState,
    times: &[f64],
    values: &[NoteEventData],
    codec: &Codec,
    frame_times: &[f64],
    steps_per_second: u32,
) -> Result<IndexedEvents> {
    check_rate("steps_per_second", steps_per_second)?;
    if times.len() != values.len() {
        return Err(NoteError::LengthMismatch {
            times: times.len(),
            values: values.len(),
        });
    }

    let mut order: Vec<usize> = (0..times.len()).collect();
    order.sort_by(|&a, &b| times[a].total_cmp(&times[b]));

    let single_step = codec.encode_event_index(&Event::new(types::SHIFT, 1))?;
    let mut indexed = IndexedEvents::default();
    let mut cursor = FrameCursor::default();

    for &i in &order {
        let event_step = quantize(times[i], steps_per_second);
        while event_step > cursor.step {
            cursor.step_forward(&mut indexed, single_step, frame_times, steps_per_second);
        }

        for event in spec.encoding_state_to_events(state) {
            indexed.state_events.push(codec.encode_event_index(&event)?);
        }
        for event in spec.encode_event(state, &values[i], codec)? {
            indexed.events.push(codec.encode_event_index(&event)?);
        }
    }

    if let Some(&last_frame) = frame_times.last() {
        while cursor.step as f64 / steps_per_second as f64 <= last_frame {
            cursor.step_forward(&mut indexed, single_step, frame_times, steps_per_second);
        }
    }

    indexed.event_end_indices = match indexed.event_start_indices.split_first() {
        Some((_, rest)) => rest
            .iter()
            .copied()
            .chain(std::iter::once(indexed.events.len()))
            .collect(),
        None => Vec::new(),
    };

    debug!(
        "indexed {} note events into {} events over {} frames",
        times.len(),
        indexed.events.len(),
        indexed.num_frames()
    );
    Ok(indexed)
}

/// Counters reported by [`decode_events`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecodeStats {
    /// Indices the codec or the encoding spec rejected
    pub invalid_events: usize,
    /// Indices skipped because they fell after `max_time`
    pub dropped_events: usize,
}

impl std::ops::AddAssign for DecodeStats {
    fn add_assign(&mut self, other: DecodeStats) {
        self.invalid_events += other.invalid_events;
        self.dropped_events += other.dropped_events;
    }
}

/// Feed run-length encoded event indices into a decoding state.
///
/// Shift values accumulate since the last non-shift event and place the clock
/// at `start_time + steps / steps_per_second`. Once the clock passes
/// `max_time` the remaining indices are dropped. Invalid indices and events
/// the encoding spec rejects are counted and skipped. Fails only on a zero
/// `steps_per_second`.
pub fn decode_events<E: EventEncodingSpec>(
    spec: &E,
    state: &mut E::DecodingState,
    indices: &[u32],
    start_time: f64,
    max_time: Option<f64>,
    codec: &Codec,
    steps_per_second: u32,
) -> Result<DecodeStats> {
    check_rate("steps_per_second", steps_per_second)?;
    let mut stats = DecodeStats::default();
    let mut current_steps = 0u64;
    let mut current_time = start_time;

    for (position, &index) in indices.iter().enumerate() {
        let event = match codec.decode_event_index(index) {
            Ok(event) => event,
            Err(_) => {
                stats.invalid_events += 1;
                continue;
            }
        };

        if event.is_type(types::SHIFT) {
            current_steps += event.value().max(0) as u64;
            current_time = start_time + current_steps as f64 / steps_per_second as f64;
            if max_time.is_some_and(|max_time| current_time > max_time) {
                stats.dropped_events = indices.len() - position;
                break;
            }
        } else {
            current_steps = 0;
            if let Err(err) = spec.decode_event(state, current_time, &event, codec) {
                stats.invalid_events += 1;
                info!("skipping event {} at {:.3}s: {}", event, current_time, err);
            }
        }
    }

    Ok(stats)
}

/// Targets predicted for one audio segment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecodeSegment {
    /// Seconds
    pub start_time: f64,
    pub events: Vec<u32>,
}

/// Decode segments in time order into one note sequence.
///
/// Each segment runs until the next one starts; the last is unbounded.
pub fn decode_segments<E: EventEncodingSpec>(
    spec: &E,
    segments: &[DecodeSegment],
    codec: &Codec,
    steps_per_second: u32,
) -> Result<(NoteSequence, DecodeStats)> {
    let mut sorted: Vec<&DecodeSegment> = segments.iter().collect();
    sorted.sort_by(|a, b| a.start_time.total_cmp(&b.start_time));

    let mut state = spec.init_decoding_state();
    let mut stats = DecodeStats::default();

    for (i, segment) in sorted.iter().enumerate() {
        let max_time = sorted.get(i + 1).map(|next| next.start_time);
        spec.begin_decoding_segment(&mut state);
        stats += decode_events(
            spec,
            &mut state,
            &segment.events,
            segment.start_time,
            max_time,
            codec,
            steps_per_second,
        )?;
    }

    let sequence = spec.flush_decoding_state(state);
    debug!(
        "decoded {} segments into {} notes ({} invalid, {} dropped)",
        sorted.len(),
        sequence.notes.len(),
        stats.invalid_events,
        stats.dropped_events
    );
    Ok((sequence, stats))
}
