// Tagged view of a token body.
//
// On the wire, grouping is implicit in adjacency: a PITCH is optionally
// preceded by a TIME_SHIFT and followed by a DURATION. `parse_events` makes
// one forward pass that resolves those adjacencies into `Event` values, so
// the decoder never re-derives them. `flatten` is the inverse used by the
// encoder.
//
// Parsing never fails. Tokens that do not fit the grammar (specials,
// emotion tokens, orphan durations, out-of-vocabulary ids) become
// `Event::Skip`, because sequences sampled from a model routinely contain
// such orderings.

use crate::vocab::{Band, Token, VocabLayout};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    /// Advance the time cursor by this many grid bins.
    TimeShift(u32),
    /// A note at the current cursor, lasting `duration` grid bins.
    Note { pitch: u8, duration: u32 },
    /// A token with no place in the body grammar. `None` marks an id
    /// outside the vocabulary.
    Skip(Option<Band>),
}

/// Counts of structural repairs made while parsing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParseReport {
    /// Tokens dropped as `Event::Skip`.
    pub skipped: usize,
    /// PITCH tokens with no DURATION after them, or with a zero duration,
    /// given the one-bin default.
    pub defaulted_durations: usize,
}

/// Duration, in bins, given to a note whose DURATION token is missing.
pub const DEFAULT_DURATION_BINS: u32 = 1;

/// Resolve a flat token body into events in one forward pass.
pub fn parse_events(layout: &VocabLayout, tokens: &[Token]) -> (Vec<Event>, ParseReport) {
    let mut events = Vec::with_capacity(tokens.len() / 2);
    let mut report = ParseReport::default();
    let mut i = 0;

    while i < tokens.len() {
        match layout.lookup(tokens[i]) {
            Some((Band::TimeShift, steps)) => {
                events.push(Event::TimeShift(steps));
                i += 1;
            }
            Some((Band::Pitch, local)) => {
                let pitch = layout.pitch_of(local);
                let next = tokens.get(i + 1).and_then(|&t| layout.lookup(t));
                let duration = match next {
                    Some((Band::Duration, bins)) => {
                        i += 2;
                        bins
                    }
                    _ => {
                        i += 1;
                        0
                    }
                };
                let duration = if duration == 0 {
                    report.defaulted_durations += 1;
                    DEFAULT_DURATION_BINS
                } else {
                    duration
                };
                events.push(Event::Note { pitch, duration });
            }
            other => {
                events.push(Event::Skip(other.map(|(band, _)| band)));
                report.skipped += 1;
                i += 1;
            }
        }
    }

    (events, report)
}

/// Flatten events back into tokens. Skipped events produce nothing; values
/// are clamped into their bands.
pub fn flatten(layout: &VocabLayout, events: &[Event]) -> Vec<Token> {
    let mut tokens = Vec::with_capacity(events.len() * 2);
    for event in events {
        match *event {
            Event::TimeShift(steps) => tokens.push(layout.time_shift_token(steps)),
            Event::Note { pitch, duration } => {
                tokens.push(layout.pitch_token(pitch));
                tokens.push(layout.duration_token(duration));
            }
            Event::Skip(_) => {}
        }
    }
    tokens
}
