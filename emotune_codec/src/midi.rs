// Standard MIDI File input and output.
//
// Reading merges every track into one note list (a piano reduction) and
// discards channel 10, the General MIDI drum channel. NoteOn with velocity
// 0 counts as NoteOff. A re-struck key closes the sounding note first;
// notes still sounding at the end of their track close at its last tick.
// Tempo, pedal and controller events are ignored.
//
// Writing produces a format-0 file with a single piano track at the
// sequence's own ticks-per-beat.
//
// Uses the `midly` crate for both directions.

use crate::error::CodecError;
use crate::note::{Note, NoteSequence};
use log::{debug, info};
use midly::{
    Format, Header, MetaMessage, MidiMessage, Smf, Timing, Track, TrackEvent, TrackEventKind,
    num::{u4, u7, u15, u24, u28},
};
use std::collections::BTreeMap;
use std::path::Path;

/// Zero-based channel reserved for percussion in General MIDI.
pub const DRUM_CHANNEL: u8 = 9;

/// Tempo written to output files (120 BPM).
const DEFAULT_TEMPO_US_PER_BEAT: u32 = 500_000;

const MAX_DELTA: u64 = 0x0FFF_FFFF;

/// Read a MIDI file into a merged, drum-free note sequence.
pub fn read_midi(path: &Path) -> Result<NoteSequence, CodecError> {
    let data = std::fs::read(path)?;
    let sequence = parse_midi(&data)?;
    debug!(
        "read {} notes at {} ticks/beat from {}",
        sequence.notes.len(),
        sequence.ticks_per_beat,
        path.display()
    );
    Ok(sequence)
}

/// Parse SMF bytes into a merged, drum-free note sequence.
pub fn parse_midi(data: &[u8]) -> Result<NoteSequence, CodecError> {
    let smf = Smf::parse(data)?;
    let ticks_per_beat = match smf.header.timing {
        Timing::Metrical(tpb) => tpb.as_int(),
        Timing::Timecode(_, _) => return Err(CodecError::UnsupportedTiming),
    };

    let mut notes = Vec::new();
    for track in &smf.tracks {
        collect_track_notes(track, &mut notes);
    }
    notes.sort_by_key(|n| (n.start, n.pitch));

    Ok(NoteSequence::new(notes, ticks_per_beat))
}

fn collect_track_notes(track: &Track<'_>, notes: &mut Vec<Note>) {
    let mut tick: u64 = 0;
    // (channel, key) -> (start tick, velocity). BTreeMap keeps the close-out
    // order at end of track deterministic.
    let mut sounding: BTreeMap<(u8, u8), (u64, u8)> = BTreeMap::new();

    for event in track {
        tick += event.delta.as_int() as u64;
        let TrackEventKind::Midi { channel, message } = event.kind else {
            continue;
        };
        let channel = channel.as_int();
        if channel == DRUM_CHANNEL {
            continue;
        }
        match message {
            MidiMessage::NoteOn { key, vel } if vel.as_int() > 0 => {
                let key = key.as_int();
                if let Some((start, velocity)) = sounding.remove(&(channel, key)) {
                    notes.push(Note { pitch: key, start, end: tick, velocity });
                }
                sounding.insert((channel, key), (tick, vel.as_int()));
            }
            MidiMessage::NoteOn { key, .. } | MidiMessage::NoteOff { key, .. } => {
                let key = key.as_int();
                if let Some((start, velocity)) = sounding.remove(&(channel, key)) {
                    notes.push(Note { pitch: key, start, end: tick, velocity });
                }
            }
            _ => {}
        }
    }

    for ((_, key), (start, velocity)) in sounding {
        notes.push(Note { pitch: key, start, end: tick, velocity });
    }
}

/// Write a note sequence as a single-track piano MIDI file.
pub fn write_midi(sequence: &NoteSequence, path: &Path) -> Result<(), CodecError> {
    let buf = to_smf_bytes(sequence)?;
    std::fs::write(path, &buf)?;
    info!(
        "wrote {} notes ({} ticks) to {}",
        sequence.notes.len(),
        sequence.end_tick(),
        path.display()
    );
    Ok(())
}

/// Serialize a note sequence to SMF bytes.
pub fn to_smf_bytes(sequence: &NoteSequence) -> Result<Vec<u8>, CodecError> {
    let smf = sequence_to_smf(sequence);
    let mut buf = Vec::new();
    smf.write_std(&mut buf)?;
    Ok(buf)
}

fn sequence_to_smf(sequence: &NoteSequence) -> Smf<'static> {
    let mut smf = Smf::new(Header::new(
        Format::SingleTrack,
        Timing::Metrical(u15::new(sequence.ticks_per_beat.clamp(1, 0x7FFF))),
    ));
    let channel = u4::new(0);

    let mut track: Track<'static> = vec![
        TrackEvent {
            delta: u28::new(0),
            kind: TrackEventKind::Meta(MetaMessage::TrackName(b"Piano")),
        },
        TrackEvent {
            delta: u28::new(0),
            kind: TrackEventKind::Meta(MetaMessage::Tempo(u24::new(DEFAULT_TEMPO_US_PER_BEAT))),
        },
        TrackEvent {
            delta: u28::new(0),
            kind: TrackEventKind::Midi {
                channel,
                message: MidiMessage::ProgramChange { program: u7::new(0) },
            },
        },
    ];

    // (tick, is_on, key, velocity). Offs sort before ons at the same tick so
    // a repeated key is released before it is struck again.
    let mut timeline: Vec<(u64, bool, u8, u8)> = Vec::with_capacity(sequence.notes.len() * 2);
    for note in &sequence.notes {
        let key = note.pitch.min(127);
        let end = note.end.max(note.start + 1);
        timeline.push((note.start, true, key, note.velocity.clamp(1, 127)));
        timeline.push((end, false, key, 0));
    }
    timeline.sort_unstable();

    let mut last_tick: u64 = 0;
    for (tick, is_on, key, velocity) in timeline {
        let delta = (tick - last_tick).min(MAX_DELTA) as u32;
        last_tick = tick;
        let message = if is_on {
            MidiMessage::NoteOn { key: u7::new(key), vel: u7::new(velocity) }
        } else {
            MidiMessage::NoteOff { key: u7::new(key), vel: u7::new(0) }
        };
        track.push(TrackEvent {
            delta: u28::new(delta),
            kind: TrackEventKind::Midi { channel, message },
        });
    }

    track.push(TrackEvent {
        delta: u28::new(0),
        kind: TrackEventKind::Meta(MetaMessage::EndOfTrack),
    });
    smf.tracks.push(track);
    smf
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_then_read_preserves_notes() {
        let seq = NoteSequence::new(
            vec![
                Note::new(60, 0, 480),
                Note::new(64, 0, 240),
                Note::new(67, 240, 720),
                Note::new(60, 480, 600),
            ],
            480,
        );
        let bytes = to_smf_bytes(&seq).unwrap();
        let read = parse_midi(&bytes).unwrap();
        assert_eq!(read.ticks_per_beat, 480);
        let mut expected = seq.clone();
        expected.sort();
        assert_eq!(read.notes, expected.notes);
    }

    #[test]
    fn drums_are_discarded_and_tracks_merged() {
        let mut smf = Smf::new(Header::new(
            Format::Parallel,
            Timing::Metrical(u15::new(96)),
        ));
        let note = |delta: u32, ch: u8, key: u8, vel: u8| TrackEvent {
            delta: u28::new(delta),
            kind: TrackEventKind::Midi {
                channel: u4::new(ch),
                message: MidiMessage::NoteOn { key: u7::new(key), vel: u7::new(vel) },
            },
        };
        let end = TrackEvent {
            delta: u28::new(0),
            kind: TrackEventKind::Meta(MetaMessage::EndOfTrack),
        };
        smf.tracks.push(vec![note(0, 0, 60, 90), note(96, 0, 60, 0), end]);
        smf.tracks.push(vec![note(0, DRUM_CHANNEL, 36, 100), note(24, DRUM_CHANNEL, 36, 0), end]);
        smf.tracks.push(vec![note(48, 1, 55, 70), note(48, 1, 55, 0), end]);
        let mut bytes = Vec::new();
        smf.write_std(&mut bytes).unwrap();

        let seq = parse_midi(&bytes).unwrap();
        assert_eq!(seq.ticks_per_beat, 96);
        assert_eq!(
            seq.notes,
            vec![
                Note { pitch: 60, start: 0, end: 96, velocity: 90 },
                Note { pitch: 55, start: 48, end: 96, velocity: 70 },
            ]
        );
    }

    #[test]
    fn unterminated_and_restruck_notes_are_closed() {
        let mut smf = Smf::new(Header::new(
            Format::SingleTrack,
            Timing::Metrical(u15::new(480)),
        ));
        let on = |delta: u32, key: u8| TrackEvent {
            delta: u28::new(delta),
            kind: TrackEventKind::Midi {
                channel: u4::new(0),
                message: MidiMessage::NoteOn { key: u7::new(key), vel: u7::new(80) },
            },
        };
        smf.tracks.push(vec![
            on(0, 60),
            on(120, 60),
            on(0, 62),
            TrackEvent {
                delta: u28::new(360),
                kind: TrackEventKind::Meta(MetaMessage::EndOfTrack),
            },
        ]);
        let mut bytes = Vec::new();
        smf.write_std(&mut bytes).unwrap();

        let seq = parse_midi(&bytes).unwrap();
        assert_eq!(
            seq.notes,
            vec![
                Note { pitch: 60, start: 0, end: 120, velocity: 80 },
                Note { pitch: 60, start: 120, end: 480, velocity: 80 },
                Note { pitch: 62, start: 120, end: 480, velocity: 80 },
            ]
        );
    }

    #[test]
    fn garbage_is_a_parse_error() {
        assert!(matches!(parse_midi(b"MThd nope"), Err(CodecError::Midi(_))));
    }

    #[test]
    fn writes_to_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.mid");
        let seq = NoteSequence::new(vec![Note::new(72, 0, 240)], 480);
        write_midi(&seq, &path).unwrap();
        let read = read_midi(&path).unwrap();
        assert_eq!(read.notes, seq.notes);
    }
}
