// Emotune generation
//
// Emotion-conditioned autoregressive generation over the event-token
// vocabulary defined in `emotune_codec`. The model itself is behind the
// `SequenceScorer` trait; this crate owns everything around it.
//
// Architecture:
// - scorer.rs: The `SequenceScorer` seam plus fixed and table-driven scorers
// - bigram.rs: Add-k smoothed order-1 Markov scorer fitted from token corpora
// - nucleus.rs: Temperature scaling, top-p filtering, softmax
// - controller.rs: Per-sequence decoding state machine (Primed -> Extending -> Done)
// - batch.rs: Independent requests generated in parallel with rayon
// - config.rs: Sampling config and the combined JSON config file
// - error.rs: Generation and scorer error types
//
// The `emotune` binary (main.rs) wires these to MIDI files on disk.

pub mod batch;
pub mod bigram;
pub mod config;
pub mod controller;
pub mod error;
pub mod nucleus;
pub mod scorer;

pub use controller::{Generation, Generator, StopReason, generate};
pub use error::{GenerateError, ScorerError};
pub use scorer::SequenceScorer;
