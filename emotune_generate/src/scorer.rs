// The sequence scorer seam.
//
// The controller sees the model only through `SequenceScorer`: given the
// full prefix, return one unnormalized log-likelihood per vocabulary entry
// for the next position. Implementations must be causal (scores never
// depend on anything past the prefix) and must treat PAD in the prefix as
// carrying no information. The controller does not re-check either.
//
// `FixedScorer` and `TableScorer` are deterministic stand-ins used by tests
// and for exercising the sampling path without a model. The corpus-fitted
// `BigramScorer` lives in `bigram.rs`.

use crate::error::ScorerError;
use emotune_codec::Token;

pub trait SequenceScorer {
    /// Length of every score vector this scorer returns.
    fn vocab_size(&self) -> usize;

    /// Next-token scores for `prefix`.
    fn score(&mut self, prefix: &[Token]) -> Result<Vec<f64>, ScorerError>;
}

impl<S: SequenceScorer + ?Sized> SequenceScorer for &mut S {
    fn vocab_size(&self) -> usize {
        (**self).vocab_size()
    }

    fn score(&mut self, prefix: &[Token]) -> Result<Vec<f64>, ScorerError> {
        (**self).score(prefix)
    }
}

impl<S: SequenceScorer + ?Sized> SequenceScorer for Box<S> {
    fn vocab_size(&self) -> usize {
        (**self).vocab_size()
    }

    fn score(&mut self, prefix: &[Token]) -> Result<Vec<f64>, ScorerError> {
        (**self).score(prefix)
    }
}

/// Returns the same scores at every step.
#[derive(Debug, Clone)]
pub struct FixedScorer {
    scores: Vec<f64>,
}

impl FixedScorer {
    pub fn new(scores: Vec<f64>) -> Self {
        FixedScorer { scores }
    }

    /// All entries `-inf` except `token`, which scores 0.
    pub fn one_hot(vocab_size: usize, token: Token) -> Self {
        let mut scores = vec![f64::NEG_INFINITY; vocab_size];
        if let Some(s) = scores.get_mut(token as usize) {
            *s = 0.0;
        }
        FixedScorer { scores }
    }
}

impl SequenceScorer for FixedScorer {
    fn vocab_size(&self) -> usize {
        self.scores.len()
    }

    fn score(&mut self, _prefix: &[Token]) -> Result<Vec<f64>, ScorerError> {
        Ok(self.scores.clone())
    }
}

/// Replays a table of score vectors, one per call; the last row repeats
/// once the table runs out. Records every prefix it was shown.
#[derive(Debug, Clone)]
pub struct TableScorer {
    rows: Vec<Vec<f64>>,
    vocab_size: usize,
    calls: usize,
    pub seen_prefixes: Vec<Vec<Token>>,
}

impl TableScorer {
    pub fn new(vocab_size: usize, rows: Vec<Vec<f64>>) -> Self {
        TableScorer {
            rows,
            vocab_size,
            calls: 0,
            seen_prefixes: Vec::new(),
        }
    }

    /// A table whose row `i` forces `tokens[i]`.
    pub fn forcing(vocab_size: usize, tokens: &[Token]) -> Self {
        let rows = tokens
            .iter()
            .map(|&t| FixedScorer::one_hot(vocab_size, t).scores)
            .collect();
        Self::new(vocab_size, rows)
    }

    pub fn calls(&self) -> usize {
        self.calls
    }
}

impl SequenceScorer for TableScorer {
    fn vocab_size(&self) -> usize {
        self.vocab_size
    }

    fn score(&mut self, prefix: &[Token]) -> Result<Vec<f64>, ScorerError> {
        self.seen_prefixes.push(prefix.to_vec());
        let row = self
            .rows
            .get(self.calls)
            .or_else(|| self.rows.last())
            .cloned()
            .ok_or_else(|| ScorerError::new("score table is empty"))?;
        self.calls += 1;
        Ok(row)
    }
}
