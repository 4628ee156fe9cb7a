// Error type for the codec crate.
//
// Only input-side failures are errors here: unreadable or unsupported MIDI
// files, files with no usable notes, bad configuration, unknown labels.
// Out-of-range values are clamped and malformed token sequences are skipped
// by the decoder, so neither produces a `CodecError`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("invalid vocabulary layout: {0}")]
    InvalidLayout(String),

    #[error("unknown emotion label '{0}' (expected Q1, Q2, Q3 or Q4)")]
    UnknownEmotion(String),

    #[error("MIDI parse error: {0}")]
    Midi(#[from] midly::Error),

    #[error("SMPTE timecode timing is not supported, only ticks per beat")]
    UnsupportedTiming,

    #[error("no encodable notes in source")]
    NoNotes,

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
