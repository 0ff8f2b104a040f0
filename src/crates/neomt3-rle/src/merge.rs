use crate::shifts::{check_index, ShiftLayout};
use log::debug;
use neomt3_core::{Codec, CodecError, Result};

/// Non-shift events of one track that share an absolute step
#[derive(Debug)]
struct Group<'a> {
    step: u64,
    events: &'a [u32],
}

/// Split a run-length encoded track into its step groups. A zero-step shift
/// (never produced by the encoder) marks padding and ends the track.
fn split_track<'a>(codec: &Codec, shift: &ShiftLayout, track: &'a [u32]) -> Result<Vec<Group<'a>>> {
    let mut groups = Vec::new();
    let mut current_step = 0u64;
    let mut run: Option<u64> = None;
    let mut i = 0;

    while i < track.len() {
        let index = track[i];
        check_index(codec, index)?;

        if shift.contains(index) {
            let steps = shift.steps(index);
            if steps == 0 {
                break;
            }
            *run.get_or_insert(0) += steps;
            i += 1;
            continue;
        }

        if let Some(target) = run.take() {
            if target < current_step {
                return Err(CodecError::ShiftBackwards {
                    from: current_step,
                    to: target,
                });
            }
            current_step = target;
        }

        let start = i;
        while i < track.len() && !shift.contains(track[i]) {
            check_index(codec, track[i])?;
            i += 1;
        }
        groups.push(Group {
            step: current_step,
            events: &track[start..i],
        });
    }

    Ok(groups)
}

/// Interleave independently run-length encoded tracks into one stream.
///
/// Events are ordered by absolute step. Events at the same step keep their
/// track order, earlier tracks first. The merged stream is re-encoded with
/// one shift run per distinct step. Rows may be zero-padded.
pub fn merge_run_length_encoded_targets<T: AsRef<[u32]>>(
    codec: &Codec,
    targets: &[T],
) -> Result<Vec<u32>> {
    let shift = ShiftLayout::from_codec(codec)?;

    let mut groups = Vec::new();
    for track in targets {
        groups.extend(split_track(codec, &shift, track.as_ref())?);
    }
    // stable: equal steps stay in track order
    groups.sort_by_key(|group| group.step);

    let mut output = Vec::new();
    let mut emitted_step = 0u64;
    for group in &groups {
        if group.step != emitted_step {
            output.extend(shift.chunks(group.step));
            emitted_step = group.step;
        }
        output.extend_from_slice(group.events);
    }

    debug!(
        "merged {} tracks ({} step groups) into {} events",
        targets.len(),
        groups.len(),
        output.len()
    );
    Ok(output)
}
