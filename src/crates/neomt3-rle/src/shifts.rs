use crate::state_changes::StateTracker;
use log::debug;
use neomt3_core::{types, Codec, CodecError, Result};

/// Location of the shift type inside a codec's event index space
#[derive(Debug, Clone, Copy)]
pub(crate) struct ShiftLayout {
    start: u32,
    end: u32,
    max_value: i32,
}

impl ShiftLayout {
    pub(crate) fn from_codec(codec: &Codec) -> Result<Self> {
        let range = codec.event_type_range(types::SHIFT)?;
        // the zero-step shift doubles as padding
        if range.min_value() != 0 || range.max_value() < 1 {
            return Err(CodecError::InvalidShiftRange(range));
        }
        let (start, end) = codec.event_index_range(types::SHIFT)?;
        Ok(ShiftLayout {
            start,
            end,
            max_value: range.max_value(),
        })
    }

    pub(crate) fn contains(&self, index: u32) -> bool {
        index >= self.start && index <= self.end
    }

    /// Steps carried by a shift index
    pub(crate) fn steps(&self, index: u32) -> u64 {
        (index - self.start) as u64
    }

    fn index_for(&self, steps: u64) -> u32 {
        self.start + steps as u32
    }

    /// Index of the one-step shift every decoded step is written as
    pub(crate) fn single_step(&self) -> u32 {
        self.index_for(1)
    }

    /// Shift indices spelling out `total` steps: full-capacity chunks
    /// followed by the remainder
    pub(crate) fn chunks(&self, total: u64) -> Vec<u32> {
        let max = self.max_value as u64;
        let mut remaining = total;
        let mut chunks = Vec::with_capacity((total / max + 1) as usize);
        while remaining > 0 {
            let steps = remaining.min(max);
            chunks.push(self.index_for(steps));
            remaining -= steps;
        }
        chunks
    }
}

pub(crate) fn check_index(codec: &Codec, index: u32) -> Result<()> {
    if index >= codec.num_event_classes() {
        return Err(CodecError::TokenOutOfRange {
            token: index,
            limit: codec.num_event_classes(),
        });
    }
    Ok(())
}

/// Collapse single-step shifts into absolute step counts.
///
/// The shifts preceding each non-shift event are replaced by the number of
/// steps elapsed since the start of the sequence, written as shift events of
/// at most `max_shift_steps` each. Shifts after the last event are dropped.
/// Each shift index counts for the steps it carries, so adjacent shifts of
/// different sizes are summed.
pub fn run_length_encode_shifts(codec: &Codec, events: &[u32]) -> Result<Vec<u32>> {
    encode_targets::<&str>(codec, events, &[])
}

/// Run-length encode shifts and drop redundant state changes in one pass.
///
/// A state change that repeats the active value of its type is removed
/// before it can trigger the emission of pending shifts.
pub fn encode_targets<S: AsRef<str>>(
    codec: &Codec,
    events: &[u32],
    state_change_types: &[S],
) -> Result<Vec<u32>> {
    let shift = ShiftLayout::from_codec(codec)?;
    let mut tracker = StateTracker::new(codec, state_change_types)?;

    let mut output = Vec::with_capacity(events.len());
    let mut pending_steps = 0u64;
    let mut total_steps = 0u64;

    for &index in events {
        check_index(codec, index)?;

        if shift.contains(index) {
            let steps = shift.steps(index);
            pending_steps += steps;
            total_steps += steps;
            continue;
        }

        if tracker.is_redundant(index) {
            continue;
        }

        if pending_steps > 0 {
            output.extend(shift.chunks(total_steps));
            pending_steps = 0;
        }
        output.push(index);
    }

    debug!(
        "run-length encoded {} events into {} ({} steps)",
        events.len(),
        output.len(),
        total_steps
    );
    Ok(output)
}

/// Expand absolute shift runs back into one single-step shift per step.
///
/// Every maximal run of shift indices is summed into an absolute step and
/// replaced by the single-step shifts separating it from the previous one.
/// A run that points before the current step is an error.
pub fn run_length_decode_shifts(codec: &Codec, events: &[u32]) -> Result<Vec<u32>> {
    let shift = ShiftLayout::from_codec(codec)?;
    let single_step = shift.single_step();

    let mut output = Vec::with_capacity(events.len());
    let mut current_step = 0u64;
    let mut run: Option<u64> = None;

    let mut advance_to = |output: &mut Vec<u32>, target: u64| -> Result<()> {
        if target < current_step {
            return Err(CodecError::ShiftBackwards {
                from: current_step,
                to: target,
            });
        }
        output.extend(std::iter::repeat(single_step).take((target - current_step) as usize));
        current_step = target;
        Ok(())
    };

    for &index in events {
        check_index(codec, index)?;

        if shift.contains(index) {
            *run.get_or_insert(0) += shift.steps(index);
            continue;
        }

        if let Some(target) = run.take() {
            advance_to(&mut output, target)?;
        }
        output.push(index);
    }
    if let Some(target) = run {
        advance_to(&mut output, target)?;
    }

    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::codec;
    use proptest::prelude::*;

    #[test]
    fn test_run_length_encode_shifts() {
        let codec = codec();
        let events: [u32; 11] = [1, 1, 1, 161, 1, 1, 1, 162, 1, 1, 1];
        assert_eq!(run_length_encode_shifts(&codec, &events).unwrap(), vec![3, 161, 6, 162]);
    }

    #[test]
    fn test_run_length_encode_shifts_beyond_max_length() {
        let codec = codec();
        let mut events: Vec<u32> = vec![1; 202];
        events.extend([161, 1, 1, 1]);
        assert_eq!(
            run_length_encode_shifts(&codec, &events).unwrap(),
            vec![100, 100, 2, 161]
        );
    }

    #[test]
    fn test_run_length_encode_shifts_simultaneous() {
        let codec = codec();
        let events: [u32; 8] = [1, 1, 1, 161, 162, 1, 1, 1];
        assert_eq!(run_length_encode_shifts(&codec, &events).unwrap(), vec![3, 161, 162]);
    }

    #[test]
    fn test_exact_multiple_of_max() {
        let codec = codec();
        let mut events: Vec<u32> = vec![1; 200];
        events.push(161);
        assert_eq!(run_length_encode_shifts(&codec, &events).unwrap(), vec![100, 100, 161]);
    }

    #[test]
    fn test_leading_events_and_empty_input() {
        let codec = codec();
        assert_eq!(run_length_encode_shifts(&codec, &[161, 162]).unwrap(), vec![161, 162]);
        assert!(run_length_encode_shifts(&codec, &[]).unwrap().is_empty());
        assert!(run_length_encode_shifts(&codec, &[1, 1]).unwrap().is_empty());
    }

    #[test]
    fn test_distinct_shift_values_are_summed() {
        let codec = codec();
        assert_eq!(run_length_encode_shifts(&codec, &[2, 3, 161]).unwrap(), vec![5, 161]);
        assert_eq!(run_length_encode_shifts(&codec, &[60, 70, 161]).unwrap(), vec![100, 30, 161]);
    }

    #[test]
    fn test_encode_targets_drops_redundant_state() {
        let codec = codec();
        // velocity 127 twice: the repeat neither survives nor flushes the shift
        let events: [u32; 8] = [356, 161, 1, 1, 356, 1, 356, 162];
        assert_eq!(
            encode_targets(&codec, &events, &["velocity"]).unwrap(),
            vec![356, 161, 3, 162]
        );
    }

    #[test]
    fn test_run_length_decode_shifts() {
        let codec = codec();
        assert_eq!(
            run_length_decode_shifts(&codec, &[3, 161, 6, 162]).unwrap(),
            vec![1, 1, 1, 161, 1, 1, 1, 162]
        );
        let decoded = run_length_decode_shifts(&codec, &[100, 100, 2, 161]).unwrap();
        assert_eq!(decoded.len(), 203);
        assert!(decoded[..202].iter().all(|&i| i == 1));
        assert_eq!(decoded[202], 161);
    }

    #[test]
    fn test_decode_rejects_backwards_shift() {
        let codec = codec();
        assert_eq!(
            run_length_decode_shifts(&codec, &[6, 161, 3, 162]),
            Err(CodecError::ShiftBackwards { from: 6, to: 3 })
        );
        // same step again is allowed
        assert_eq!(
            run_length_decode_shifts(&codec, &[3, 161, 3, 162]).unwrap(),
            vec![1, 1, 1, 161, 162]
        );
    }

    #[test]
    fn test_malformed_input() {
        let codec = codec();
        assert!(matches!(
            run_length_encode_shifts(&codec, &[1, 614]),
            Err(CodecError::TokenOutOfRange { token: 614, limit: 614 })
        ));
        assert!(run_length_decode_shifts(&codec, &[9999]).is_err());

        let no_shift = Codec::new(vec![(
            "note",
            neomt3_core::EventRange::new(0, 127).unwrap(),
        )])
        .unwrap();
        assert_eq!(
            run_length_encode_shifts(&no_shift, &[1]),
            Err(CodecError::UnknownEventType("shift".to_string()))
        );
    }

    #[test]
    fn test_shift_range_must_start_at_zero() {
        let one_based = Codec::new(vec![
            ("shift", neomt3_core::EventRange::new(1, 100).unwrap()),
            ("note", neomt3_core::EventRange::new(0, 127).unwrap()),
        ])
        .unwrap();
        assert!(matches!(
            run_length_encode_shifts(&one_based, &[0, 100]),
            Err(CodecError::InvalidShiftRange(_))
        ));
        assert!(matches!(
            run_length_decode_shifts(&one_based, &[0, 100]),
            Err(CodecError::InvalidShiftRange(_))
        ));
        assert!(matches!(
            crate::merge_run_length_encoded_targets(&one_based, &[vec![0u32, 100]]),
            Err(CodecError::InvalidShiftRange(_))
        ));
    }

    /// `None` is a single-step shift, `Some` a pitch index
    fn raw_stream() -> impl Strategy<Value = Vec<Option<u32>>> {
        prop::collection::vec(prop::option::weighted(0.7, 101u32..229), 0..400)
    }

    fn to_indices(stream: &[Option<u32>]) -> Vec<u32> {
        stream.iter().map(|e| e.unwrap_or(1)).collect()
    }

    proptest! {
        #[test]
        fn prop_round_trip_drops_only_trailing_shifts(stream in raw_stream()) {
            let codec = codec();
            let events = to_indices(&stream);
            let encoded = run_length_encode_shifts(&codec, &events).unwrap();
            let decoded = run_length_decode_shifts(&codec, &encoded).unwrap();

            let trimmed_len = events.iter().rposition(|&i| i != 1).map_or(0, |p| p + 1);
            prop_assert_eq!(decoded, events[..trimmed_len].to_vec());
        }

        #[test]
        fn prop_identical_shift_runs_collapse_into_chunks(run in 1usize..500, pitch in 101u32..229) {
            let codec = codec();
            let mut events = vec![1u32; run];
            events.push(pitch);
            let encoded = run_length_encode_shifts(&codec, &events).unwrap();

            let (last, chunks) = encoded.split_last().unwrap();
            prop_assert_eq!(*last, pitch);
            prop_assert_eq!(chunks.iter().map(|&c| c as usize).sum::<usize>(), run);
            prop_assert!(chunks[..chunks.len() - 1].iter().all(|&c| c == 100));
            prop_assert!(chunks.iter().all(|&c| (1..=100).contains(&c)));
        }

        #[test]
        fn prop_distinct_shift_values_sum(values in prop::collection::vec(1u32..=100, 1..10)) {
            let codec = codec();
            let mut events = values.clone();
            events.push(161);
            let encoded = run_length_encode_shifts(&codec, &events).unwrap();
            let total: u32 = values.iter().sum();
            let emitted: u32 = encoded[..encoded.len() - 1].iter().sum();
            prop_assert_eq!(emitted, total);
        }

        #[test]
        fn prop_adjacent_events_are_never_merged(events in prop::collection::vec(101u32..614, 0..50)) {
            let codec = codec();
            prop_assert_eq!(run_length_encode_shifts(&codec, &events).unwrap(), events);
        }
    }
}
