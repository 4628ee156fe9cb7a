// Event encoder: note list -> token body.
//
// Notes are sorted by (start, pitch) so simultaneous onsets always come out
// in the same order. For each note the encoder emits an optional TIME_SHIFT
// (only when the gap since the cursor quantizes to at least one bin), then
// PITCH, then DURATION. Pitches are clamped into the layout's range, shifts
// and durations into their bands, and durations are floored at one bin.
// Polyphony survives only as consecutive notes with no shift between them.
//
// The output is the body only. BOS, the emotion token and EOS are added by
// `frame.rs`.
//
// Cursor drift: with `CursorMode::SourceTime` the cursor jumps to the note's
// real onset after each shift, while the decoder only ever advances by whole
// bins. Rounding error therefore does not carry between notes on the encode
// side but can build up across a decode. `CursorMode::GridTime` advances the
// cursor by the emitted bins instead, which keeps encoder and decoder in
// lockstep at the cost of different token output for off-grid material.

use crate::error::CodecError;
use crate::event::{Event, flatten};
use crate::midi::read_midi;
use crate::note::{Note, NoteSequence};
use crate::quantize::Grid;
use crate::vocab::{Token, VocabLayout};
use log::debug;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// How the encoder advances its time cursor after emitting a TIME_SHIFT.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CursorMode {
    /// Jump to the note's actual onset tick.
    #[default]
    SourceTime,
    /// Advance by the quantized (and clamped) shift.
    GridTime,
}

/// Convert notes to events, in emission order.
pub fn encode_events(
    layout: &VocabLayout,
    notes: &[Note],
    ticks_per_beat: u16,
    cursor: CursorMode,
) -> Vec<Event> {
    let grid = Grid::new(ticks_per_beat);
    let max_shift = layout.num_time_shifts() as u64 - 1;
    let max_duration = layout.num_durations() as u64 - 1;

    let mut sorted = notes.to_vec();
    sorted.sort_by_key(|n| (n.start, n.pitch));

    let mut events = Vec::with_capacity(sorted.len() * 2);
    let mut current_time: u64 = 0;

    for note in &sorted {
        let time_diff = note.start.saturating_sub(current_time);
        if time_diff > 0 {
            let shift = grid.quantize(time_diff);
            if shift > 0 {
                let shift = shift.min(max_shift);
                events.push(Event::TimeShift(shift as u32));
                current_time = match cursor {
                    CursorMode::SourceTime => note.start,
                    CursorMode::GridTime => current_time + grid.dequantize(shift),
                };
            }
        }

        let pitch = layout.clamp_pitch(note.pitch);
        let duration = grid.quantize(note.duration()).max(1).min(max_duration);
        events.push(Event::Note {
            pitch,
            duration: duration as u32,
        });
    }

    events
}

/// Encode notes into a token body.
pub fn encode_notes(
    layout: &VocabLayout,
    notes: &[Note],
    ticks_per_beat: u16,
    cursor: CursorMode,
) -> Vec<Token> {
    flatten(layout, &encode_events(layout, notes, ticks_per_beat, cursor))
}

/// Encode a `NoteSequence` at its own resolution.
pub fn encode(layout: &VocabLayout, sequence: &NoteSequence, cursor: CursorMode) -> Vec<Token> {
    encode_notes(layout, &sequence.notes, sequence.ticks_per_beat, cursor)
}

/// Load a MIDI file and encode it.
///
/// Fails, producing no tokens, if the file cannot be read or parsed or has
/// no non-drum notes. Callers building a corpus skip the file on error.
pub fn encode_file(
    layout: &VocabLayout,
    path: &Path,
    cursor: CursorMode,
) -> Result<Vec<Token>, CodecError> {
    let sequence = read_midi(path)?;
    if sequence.is_empty() {
        return Err(CodecError::NoNotes);
    }
    let tokens = encode(layout, &sequence, cursor);
    debug!(
        "encoded {} notes from {} into {} tokens",
        sequence.notes.len(),
        path.display(),
        tokens.len()
    );
    Ok(tokens)
}
