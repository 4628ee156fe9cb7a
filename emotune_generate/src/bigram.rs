// Corpus-fitted order-1 Markov scorer.
//
// Counts token-to-token transitions over framed training sequences and
// scores the next token by add-k smoothed log-probability given the last
// non-PAD token of the prefix (BOS when there is none). PAD never enters the
// counts. Because every framed sequence opens with `[BOS, EMOTION]`, the
// emotion token conditions the first body token directly.
//
// The model is stored as JSON together with the vocabulary layout it was
// fitted against. Loading it against any other layout is refused: token ids
// mean different things once a band width changes.

use crate::error::{GenerateError, ScorerError};
use crate::scorer::SequenceScorer;
use emotune_codec::vocab::{BOS, LAYOUT_VERSION, PAD, VocabConfig};
use emotune_codec::{Token, VocabLayout};
use log::info;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

type TransitionCounts = BTreeMap<Token, u64>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BigramScorer {
    layout_version: u32,
    layout: VocabLayout,
    /// Pseudo-count added to every transition.
    smoothing: f64,
    /// Number of sequences passed to `fit`.
    sequences: u64,
    counts: BTreeMap<Token, TransitionCounts>,
}

impl BigramScorer {
    pub fn new(layout: VocabLayout, smoothing: f64) -> Result<Self, GenerateError> {
        check_smoothing(smoothing)?;
        Ok(BigramScorer {
            layout_version: LAYOUT_VERSION,
            layout,
            smoothing,
            sequences: 0,
            counts: BTreeMap::new(),
        })
    }

    pub fn layout(&self) -> &VocabLayout {
        &self.layout
    }

    pub fn sequences(&self) -> u64 {
        self.sequences
    }

    /// Number of times `next` followed `context` in the fitted corpus.
    pub fn count(&self, context: Token, next: Token) -> u64 {
        self.counts
            .get(&context)
            .and_then(|row| row.get(&next))
            .copied()
            .unwrap_or(0)
    }

    /// Add one sequence's transitions. PAD and out-of-vocabulary tokens are
    /// dropped before pairing.
    pub fn fit(&mut self, sequence: &[Token]) {
        let vocab_size = self.layout.vocab_size();
        let mut prev: Option<Token> = None;
        for &token in sequence {
            if token == PAD || token >= vocab_size {
                continue;
            }
            if let Some(context) = prev {
                *self
                    .counts
                    .entry(context)
                    .or_default()
                    .entry(token)
                    .or_insert(0) += 1;
            }
            prev = Some(token);
        }
        self.sequences += 1;
    }

    /// Load a model and check that it was fitted against `expected`.
    pub fn load(path: &Path, expected: &VocabLayout) -> Result<Self, GenerateError> {
        let data = std::fs::read_to_string(path)?;
        let model: BigramScorer = serde_json::from_str(&data)?;
        check_smoothing(model.smoothing)?;
        if model.layout_version != LAYOUT_VERSION || model.layout != *expected {
            return Err(GenerateError::LayoutMismatch {
                expected: describe(LAYOUT_VERSION, &expected.config()),
                found: describe(model.layout_version, &model.layout.config()),
            });
        }
        info!(
            "loaded bigram model from {} ({} sequences, {} contexts)",
            path.display(),
            model.sequences,
            model.counts.len()
        );
        Ok(model)
    }

    pub fn save(&self, path: &Path) -> Result<(), GenerateError> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        info!(
            "saved bigram model to {} ({} sequences)",
            path.display(),
            self.sequences
        );
        Ok(())
    }
}

impl SequenceScorer for BigramScorer {
    fn vocab_size(&self) -> usize {
        self.layout.vocab_size() as usize
    }

    fn score(&mut self, prefix: &[Token]) -> Result<Vec<f64>, ScorerError> {
        let context = prefix
            .iter()
            .rev()
            .copied()
            .find(|&t| t != PAD)
            .unwrap_or(BOS);
        let vocab_size = self.vocab_size();
        let row = self.counts.get(&context);
        let total = row.map_or(0, |r| r.values().sum::<u64>()) as f64;
        let denom = total + self.smoothing * vocab_size as f64;

        let scores = (0..vocab_size as Token)
            .map(|next| {
                let count = row.and_then(|r| r.get(&next)).copied().unwrap_or(0) as f64;
                ((count + self.smoothing) / denom).ln()
            })
            .collect();
        Ok(scores)
    }
}

fn check_smoothing(smoothing: f64) -> Result<(), GenerateError> {
    if smoothing.is_finite() && smoothing > 0.0 {
        Ok(())
    } else {
        Err(GenerateError::InvalidConfig(format!(
            "bigram smoothing must be positive and finite, got {smoothing}"
        )))
    }
}

fn describe(version: u32, config: &VocabConfig) -> String {
    format!(
        "v{version} (pitch {}..={}, {} shifts, {} durations, {} emotions)",
        config.min_pitch,
        config.max_pitch,
        config.num_time_shifts,
        config.num_durations,
        config.num_emotions
    )
}
