// Event decoder: token body -> note list.
//
// One forward scan (see `event::parse_events`) with a time cursor starting
// at tick 0. TIME_SHIFT advances the cursor by whole bins; a PITCH emits a
// note at the cursor, taking its length from an immediately following
// DURATION or defaulting to one bin. The cursor never advances by note
// length, so chords and overlaps decode naturally.
//
// The decoder never fails. Anything that does not fit the grammar is
// dropped and counted in the returned `ParseReport`. Callers are expected
// to strip BOS/emotion/EOS/PAD first (`frame::split_frame`), but leftover
// specials are skipped the same way.

use crate::event::{Event, ParseReport, parse_events};
use crate::note::{DEFAULT_VELOCITY, Note, NoteSequence};
use crate::quantize::Grid;
use crate::vocab::{Token, VocabLayout};
use log::debug;

/// Decode a token body into notes at `ticks_per_beat`.
pub fn decode(layout: &VocabLayout, tokens: &[Token], ticks_per_beat: u16) -> NoteSequence {
    decode_with_report(layout, tokens, ticks_per_beat).0
}

/// Decode, also returning what had to be repaired along the way.
pub fn decode_with_report(
    layout: &VocabLayout,
    tokens: &[Token],
    ticks_per_beat: u16,
) -> (NoteSequence, ParseReport) {
    let grid = Grid::new(ticks_per_beat);
    let (events, report) = parse_events(layout, tokens);

    let mut notes = Vec::new();
    let mut current_time: u64 = 0;

    for event in events {
        match event {
            Event::TimeShift(steps) => {
                current_time = current_time.saturating_add(grid.dequantize(steps as u64));
            }
            Event::Note { pitch, duration } => {
                let end = current_time.saturating_add(grid.dequantize(duration as u64));
                notes.push(Note {
                    pitch,
                    start: current_time,
                    end,
                    velocity: DEFAULT_VELOCITY,
                });
            }
            Event::Skip(_) => {}
        }
    }

    if report.skipped > 0 || report.defaulted_durations > 0 {
        debug!(
            "decoded {} notes from {} tokens ({} skipped, {} defaulted durations)",
            notes.len(),
            tokens.len(),
            report.skipped,
            report.defaulted_durations
        );
    }

    (NoteSequence::new(notes, ticks_per_beat), report)
}
