// Error type for the generation crate.
//
// A decode step fails explicitly whenever the scorer fails or hands back a
// distribution that cannot be sampled (wrong length, NaN, nothing finite).
// Nothing is retried here; that belongs to whatever hosts the generator.

use emotune_codec::CodecError;
use thiserror::Error;

/// Failure reported by a `SequenceScorer`.
#[derive(Debug, Error)]
#[error("scorer failed: {message}")]
pub struct ScorerError {
    pub message: String,
}

impl ScorerError {
    pub fn new(message: impl Into<String>) -> Self {
        ScorerError {
            message: message.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum GenerateError {
    #[error("invalid generation config: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Scorer(#[from] ScorerError),

    #[error("scorer returned {got} scores, vocabulary has {expected}")]
    ScoreLength { expected: usize, got: usize },

    #[error("scorer returned a non-finite score {score} for token {token}")]
    NonFiniteScore { token: usize, score: f64 },

    #[error("no token has finite probability after filtering")]
    EmptyDistribution,

    #[error("model was built for layout {found}, expected {expected}")]
    LayoutMismatch { expected: String, found: String },

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
