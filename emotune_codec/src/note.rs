// Note and NoteSequence value types.
//
// Times are absolute MIDI ticks. A `NoteSequence` pairs a note list with the
// ticks-per-beat resolution its times are expressed in; the quantization
// grid is derived from that resolution on every encode/decode call.

use serde::{Deserialize, Serialize};

/// Velocity given to every decoded note.
pub const DEFAULT_VELOCITY: u8 = 100;

/// Resolution used when the caller does not supply one.
pub const DEFAULT_TICKS_PER_BEAT: u16 = 480;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Note {
    /// MIDI pitch number (0-127).
    pub pitch: u8,
    /// Onset tick.
    pub start: u64,
    /// Release tick.
    pub end: u64,
    pub velocity: u8,
}

impl Note {
    pub fn new(pitch: u8, start: u64, end: u64) -> Self {
        Note {
            pitch,
            start,
            end,
            velocity: DEFAULT_VELOCITY,
        }
    }

    /// Length in ticks. Zero when `end <= start`.
    pub fn duration(&self) -> u64 {
        self.end.saturating_sub(self.start)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteSequence {
    pub notes: Vec<Note>,
    pub ticks_per_beat: u16,
}

impl NoteSequence {
    pub fn new(notes: Vec<Note>, ticks_per_beat: u16) -> Self {
        NoteSequence {
            notes,
            ticks_per_beat,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }

    /// Tick at which the last note releases.
    pub fn end_tick(&self) -> u64 {
        self.notes.iter().map(|n| n.end).max().unwrap_or(0)
    }

    /// Sort notes by (start, pitch), the order the encoder emits them in.
    pub fn sort(&mut self) {
        self.notes.sort_by_key(|n| (n.start, n.pitch));
    }
}
