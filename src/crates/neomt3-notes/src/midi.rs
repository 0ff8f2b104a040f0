use crate::error::{NoteError, Result};
use crate::note::{Note, NoteSequence};
use log::{debug, warn};
use midly::{MetaMessage, MidiMessage, Smf, Timing, TrackEventKind};
use std::collections::HashMap;
use std::path::Path;

/// General MIDI percussion channel (channel 10, zero-based 9)
pub const DRUM_CHANNEL: u8 = 9;

/// 120 BPM
const DEFAULT_TEMPO: u32 = 500_000;

pub fn note_sequence_from_midi(path: &Path) -> Result<NoteSequence> {
    let data = std::fs::read(path)?;
    note_sequence_from_midi_bytes(&data)
}

/// Parse a standard MIDI file into notes.
///
/// Note-ons are paired with the next note-off (or zero-velocity note-on) of
/// the same key on the same channel. Programs follow program changes per
/// channel. Only the first tempo event is honored.
pub fn note_sequence_from_midi_bytes(data: &[u8]) -> Result<NoteSequence> {
    let smf = Smf::parse(data).map_err(|err| NoteError::Midi(err.to_string()))?;

    let tempo = extract_tempo(&smf);
    let timing = smf.header.timing;
    let to_seconds = |ticks: u64| match timing {
        Timing::Metrical(tpb) => tick_to_second(ticks, tpb.as_int() as u32, tempo),
        Timing::Timecode(fps, subframe) => ticks as f64 / (fps.as_f32() as f64 * subframe as f64),
    };

    let mut sequence = NoteSequence::new();
    for track in &smf.tracks {
        let mut ticks = 0u64;
        let mut programs = [0u8; 16];
        // (channel, key) -> onsets still waiting for their note-off
        let mut open: HashMap<(u8, u8), Vec<(f64, u8, u8)>> = HashMap::new();

        for event in track {
            ticks += event.delta.as_int() as u64;
            let time = to_seconds(ticks);

            let TrackEventKind::Midi { channel, message } = event.kind else {
                continue;
            };
            let channel = channel.as_int();

            match message {
                MidiMessage::ProgramChange { program } => {
                    programs[channel as usize] = program.as_int();
                }
                MidiMessage::NoteOn { key, vel } if vel.as_int() > 0 => {
                    open.entry((channel, key.as_int()))
                        .or_default()
                        .push((time, vel.as_int(), programs[channel as usize]));
                }
                MidiMessage::NoteOn { key, .. } | MidiMessage::NoteOff { key, .. } => {
                    let pending = open.get_mut(&(channel, key.as_int()));
                    match pending.filter(|onsets| !onsets.is_empty()) {
                        Some(onsets) => {
                            let (start_time, velocity, program) = onsets.remove(0);
                            sequence.add_note(Note {
                                pitch: key.as_int(),
                                velocity,
                                program,
                                is_drum: channel == DRUM_CHANNEL,
                                start_time,
                                end_time: time,
                            });
                        }
                        None => debug!(
                            "note-off without onset: channel {} key {}",
                            channel,
                            key.as_int()
                        ),
                    }
                }
                _ => {}
            }
        }

        let end_time = to_seconds(ticks);
        for ((channel, pitch), onsets) in open {
            for (start_time, velocity, program) in onsets {
                warn!("closing unterminated note {} on channel {} at {:.3}s", pitch, channel, end_time);
                sequence.add_note(Note {
                    pitch,
                    velocity,
                    program,
                    is_drum: channel == DRUM_CHANNEL,
                    start_time,
                    end_time,
                });
            }
        }
    }

    sequence.sort();
    debug!(
        "parsed {} notes from {} tracks ({:.3}s)",
        sequence.notes.len(),
        smf.tracks.len(),
        sequence.total_time
    );
    Ok(sequence)
}

fn extract_tempo(smf: &Smf) -> u32 {
    smf.tracks
        .iter()
        .flatten()
        .find_map(|event| match event.kind {
            TrackEventKind::Meta(MetaMessage::Tempo(tempo)) => Some(tempo.as_int()),
            _ => None,
        })
        .unwrap_or(DEFAULT_TEMPO)
}

fn tick_to_second(ticks: u64, ticks_per_beat: u32, tempo: u32) -> f64 {
    ticks as f64 * (tempo as f64 / 1_000_000.0) / ticks_per_beat as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use midly::num::{u15, u24, u28, u4, u7};
    use midly::{Format, Header, TrackEvent};

    fn midi(channel: u8, delta: u32, message: MidiMessage) -> TrackEvent<'static> {
        TrackEvent {
            delta: u28::new(delta),
            kind: TrackEventKind::Midi {
                channel: u4::new(channel),
                message,
            },
        }
    }

    fn on(key: u8, vel: u8) -> MidiMessage {
        MidiMessage::NoteOn {
            key: u7::new(key),
            vel: u7::new(vel),
        }
    }

    fn off(key: u8) -> MidiMessage {
        MidiMessage::NoteOff {
            key: u7::new(key),
            vel: u7::new(0),
        }
    }

    fn write(track: Vec<TrackEvent<'static>>) -> Vec<u8> {
        let mut smf = Smf::new(Header::new(Format::SingleTrack, Timing::Metrical(u15::new(480))));
        smf.tracks.push(track);
        let mut bytes = Vec::new();
        smf.write(&mut bytes).unwrap();
        bytes
    }

    #[test]
    fn test_tick_to_second() {
        assert_eq!(tick_to_second(480, 480, 500_000), 0.5);
        assert_eq!(tick_to_second(960, 480, 1_000_000), 2.0);
    }

    #[test]
    fn test_parse_notes_programs_and_drums() {
        let bytes = write(vec![
            TrackEvent {
                delta: u28::new(0),
                kind: TrackEventKind::Meta(MetaMessage::Tempo(u24::new(1_000_000))),
            },
            midi(0, 0, MidiMessage::ProgramChange { program: u7::new(33) }),
            midi(0, 0, on(60, 100)),
            midi(9, 240, on(36, 90)),
            midi(9, 0, on(36, 0)),
            midi(0, 240, off(60)),
            TrackEvent {
                delta: u28::new(0),
                kind: TrackEventKind::Meta(MetaMessage::EndOfTrack),
            },
        ]);

        let ns = note_sequence_from_midi_bytes(&bytes).unwrap();
        assert_eq!(ns.notes.len(), 2);

        let bass = &ns.notes[0];
        assert_eq!((bass.pitch, bass.velocity, bass.program), (60, 100, 33));
        assert_eq!((bass.start_time, bass.end_time), (0.0, 1.0));
        assert!(!bass.is_drum);

        let kick = &ns.notes[1];
        assert!(kick.is_drum);
        assert_eq!(kick.start_time, 0.5);
        assert_eq!(kick.end_time, 0.5 + crate::note::MIN_NOTE_DURATION);
    }

    #[test]
    fn test_unterminated_note_ends_with_track() {
        let bytes = write(vec![
            midi(0, 0, on(64, 80)),
            midi(0, 960, MidiMessage::ProgramChange { program: u7::new(1) }),
            TrackEvent {
                delta: u28::new(0),
                kind: TrackEventKind::Meta(MetaMessage::EndOfTrack),
            },
        ]);
        let ns = note_sequence_from_midi_bytes(&bytes).unwrap();
        assert_eq!(ns.notes.len(), 1);
        assert_eq!(ns.notes[0].end_time, 1.0);
        assert_eq!(ns.notes[0].program, 0);
    }

    #[test]
    fn test_invalid_bytes() {
        assert!(matches!(
            note_sequence_from_midi_bytes(b"not a midi file"),
            Err(NoteError::Midi(_))
        ));
    }
}
