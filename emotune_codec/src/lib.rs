// Emotune event codec
//
// Lossy, quantizing, bidirectional transform between a timed note list and a
// flat token sequence for autoregressive modeling. Tokens are plain `u32`
// values whose meaning comes only from the vocabulary band they fall in.
//
// Architecture:
// - vocab.rs: Vocabulary layout (special/pitch/time-shift/duration/emotion
//   bands), band classification and per-band token constructors
// - quantize.rs: 16th-note grid, tick <-> bin conversion
// - note.rs: Note and NoteSequence value types
// - event.rs: Tagged view of a token body (time shift, note, skipped token)
// - encode.rs: Note list -> token body
// - decode.rs: Token body -> note list, tolerant of malformed sequences
// - emotion.rs: The four emotion-quadrant conditioning labels
// - frame.rs: BOS/emotion/EOS framing, truncation, PAD batching
// - midi.rs: Standard MIDI File reading and writing via `midly`
// - config.rs: JSON-loadable codec configuration
// - error.rs: Codec error type
//
// Everything here is synchronous and allocation-local: each call owns the
// vector it builds and nothing is shared between calls.

pub mod config;
pub mod decode;
pub mod emotion;
pub mod encode;
pub mod error;
pub mod event;
pub mod frame;
pub mod midi;
pub mod note;
pub mod quantize;
pub mod vocab;

pub use emotion::Emotion;
pub use error::CodecError;
pub use note::{Note, NoteSequence};
pub use vocab::{Band, Token, VocabLayout};
