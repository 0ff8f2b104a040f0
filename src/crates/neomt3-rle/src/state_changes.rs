use crate::shifts::check_index;
use log::debug;
use neomt3_core::{Codec, Result};

/// Last announced value of every tracked state-change type
#[derive(Debug, Clone)]
pub(crate) struct StateTracker {
    ranges: Vec<(u32, u32)>,
    current: Vec<Option<u32>>,
}

impl StateTracker {
    pub(crate) fn new<S: AsRef<str>>(codec: &Codec, state_change_types: &[S]) -> Result<Self> {
        let ranges = state_change_types
            .iter()
            .map(|event_type| codec.event_index_range(event_type.as_ref()))
            .collect::<Result<Vec<_>>>()?;
        let current = vec![None; ranges.len()];
        Ok(StateTracker { ranges, current })
    }

    /// Record `index` and report whether it repeats the active state
    pub(crate) fn is_redundant(&mut self, index: u32) -> bool {
        let mut redundant = false;
        for (&(start, end), current) in self.ranges.iter().zip(self.current.iter_mut()) {
            if index >= start && index <= end {
                if *current == Some(index) {
                    redundant = true;
                }
                *current = Some(index);
            }
        }
        redundant
    }
}

/// Drop state-change events that repeat the value already in effect.
///
/// State-change types (velocity, program, ...) hold their value until the
/// next event of the same type. An event equal to the value in effect for its
/// type carries no information and is removed. Tracking is never reset within
/// a sequence.
pub fn remove_redundant_state_changes<S: AsRef<str>>(
    codec: &Codec,
    events: &[u32],
    state_change_types: &[S],
) -> Result<Vec<u32>> {
    let mut tracker = StateTracker::new(codec, state_change_types)?;
    let mut output = Vec::with_capacity(events.len());

    for &index in events {
        check_index(codec, index)?;
        if !tracker.is_redundant(index) {
            output.push(index);
        }
    }

    debug!(
        "removed {} redundant state changes",
        events.len() - output.len()
    );
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::codec;
    use neomt3_core::CodecError;

    #[test]
    fn test_remove_redundant_state_changes() {
        let codec = codec();
        let events: [u32; 10] = [3, 525, 356, 161, 2, 525, 356, 161, 355, 394];
        assert_eq!(
            remove_redundant_state_changes(&codec, &events, &["velocity", "program"]).unwrap(),
            vec![3, 525, 356, 161, 2, 161, 355, 394]
        );
    }

    #[test]
    fn test_changed_state_is_kept_and_tracked() {
        let codec = codec();
        // velocity 127, 126, 127: each differs from the value in effect
        let events: [u32; 7] = [356, 161, 355, 161, 356, 161, 356];
        assert_eq!(
            remove_redundant_state_changes(&codec, &events, &["velocity"]).unwrap(),
            vec![356, 161, 355, 161, 356, 161]
        );
    }

    #[test]
    fn test_untracked_types_pass_through() {
        let codec = codec();
        let events: [u32; 4] = [525, 525, 161, 161];
        assert_eq!(
            remove_redundant_state_changes(&codec, &events, &["velocity"]).unwrap(),
            events.to_vec()
        );
        let none: &[&str] = &[];
        assert_eq!(
            remove_redundant_state_changes(&codec, &events, none).unwrap(),
            events.to_vec()
        );
    }

    #[test]
    fn test_unknown_state_type() {
        let codec = codec();
        assert_eq!(
            remove_redundant_state_changes(&codec, &[1], &["pedal"]),
            Err(CodecError::UnknownEventType("pedal".to_string()))
        );
    }
}
