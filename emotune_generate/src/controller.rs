// The decoding controller: autoregressive extension of one token sequence.
//
// A `Generator` starts `Primed` with `[BOS, EMOTION]`, moves to `Extending`
// after its first step, and ends `Done` when the sampled token is EOS or the
// body reaches `max_new_tokens`. Each step:
//
//   1. scores = scorer.score(full sequence)
//   2. scores /= temperature
//   3. nucleus filter at top_p, everything outside masked to -inf
//   4. sample from the renormalized distribution
//   5. EOS ends the run (and is not kept); anything else is appended
//
// The sampled draw in step 4 is the only randomness. With one survivor the
// step is an argmax and draws nothing from the PRNG. Steps are inherently
// sequential; independent sequences run in parallel in `batch.rs`.

use crate::config::GenerationConfig;
use crate::error::GenerateError;
use crate::nucleus::{apply_temperature, argmax, check_scores, nucleus_filter, softmax};
use crate::scorer::SequenceScorer;
use emotune_codec::frame::prompt;
use emotune_codec::vocab::EOS;
use emotune_codec::{Emotion, Token, VocabLayout};
use emotune_prng::SampleRng;
use log::{debug, trace};

/// Why a run stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The model sampled EOS.
    Eos,
    /// The body reached `max_new_tokens`.
    MaxLength,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeState {
    Primed,
    Extending,
    Done(StopReason),
}

/// A finished run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Generation {
    pub emotion: Emotion,
    /// Generated body tokens, without the prompt and without EOS.
    pub tokens: Vec<Token>,
    pub stop: StopReason,
}

pub struct Generator<S: SequenceScorer> {
    layout: VocabLayout,
    config: GenerationConfig,
    scorer: S,
    rng: SampleRng,
    emotion: Emotion,
    sequence: Vec<Token>,
    prompt_len: usize,
    state: DecodeState,
}

impl<S: SequenceScorer> Generator<S> {
    pub fn new(
        layout: VocabLayout,
        config: GenerationConfig,
        scorer: S,
        emotion: Emotion,
        rng: SampleRng,
    ) -> Result<Self, GenerateError> {
        config.validate()?;
        let expected = layout.vocab_size() as usize;
        if scorer.vocab_size() != expected {
            return Err(GenerateError::ScoreLength {
                expected,
                got: scorer.vocab_size(),
            });
        }
        let sequence = prompt(&layout, emotion);
        let prompt_len = sequence.len();
        Ok(Generator {
            layout,
            config,
            scorer,
            rng,
            emotion,
            sequence,
            prompt_len,
            state: DecodeState::Primed,
        })
    }

    pub fn state(&self) -> DecodeState {
        self.state
    }

    /// Prompt plus everything generated so far.
    pub fn sequence(&self) -> &[Token] {
        &self.sequence
    }

    /// Generated tokens only.
    pub fn body(&self) -> &[Token] {
        &self.sequence[self.prompt_len..]
    }

    /// Run one decode step. A no-op once `Done`.
    pub fn step(&mut self) -> Result<DecodeState, GenerateError> {
        if let DecodeState::Done(_) = self.state {
            return Ok(self.state);
        }
        if self.body().len() >= self.config.max_new_tokens {
            self.state = DecodeState::Done(StopReason::MaxLength);
            return Ok(self.state);
        }

        let token = self.sample_next()?;
        if token == EOS {
            debug!("EOS after {} tokens", self.body().len());
            self.state = DecodeState::Done(StopReason::Eos);
            return Ok(self.state);
        }

        self.sequence.push(token);
        self.state = if self.body().len() >= self.config.max_new_tokens {
            debug!("length bound of {} tokens reached", self.config.max_new_tokens);
            DecodeState::Done(StopReason::MaxLength)
        } else {
            DecodeState::Extending
        };
        Ok(self.state)
    }

    /// Step until `Done` and return the body.
    pub fn run(mut self) -> Result<Generation, GenerateError> {
        loop {
            if let DecodeState::Done(stop) = self.step()? {
                let tokens = self.sequence.split_off(self.prompt_len);
                return Ok(Generation {
                    emotion: self.emotion,
                    tokens,
                    stop,
                });
            }
        }
    }

    fn sample_next(&mut self) -> Result<Token, GenerateError> {
        let mut scores = self.scorer.score(&self.sequence)?;
        let expected = self.layout.vocab_size() as usize;
        if scores.len() != expected {
            return Err(GenerateError::ScoreLength {
                expected,
                got: scores.len(),
            });
        }
        check_scores(&scores)?;

        apply_temperature(&mut scores, self.config.temperature);
        let kept = nucleus_filter(&mut scores, self.config.top_p)?;

        let index = if kept == 1 {
            argmax(&scores).ok_or(GenerateError::EmptyDistribution)?
        } else {
            let probs = softmax(&scores)?;
            self.rng
                .sample_weighted(&probs)
                .ok_or(GenerateError::EmptyDistribution)?
        };
        trace!(
            "step {}: {} candidates, sampled {}",
            self.body().len(),
            kept,
            index
        );
        Ok(index as Token)
    }
}

/// Generate one sequence for `emotion` with a fresh PRNG seeded by `seed`.
pub fn generate<S: SequenceScorer>(
    layout: &VocabLayout,
    config: &GenerationConfig,
    scorer: S,
    emotion: Emotion,
    seed: u64,
) -> Result<Generation, GenerateError> {
    Generator::new(*layout, config.clone(), scorer, emotion, SampleRng::new(seed))?.run()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ScorerError;
    use crate::scorer::{FixedScorer, TableScorer};
    use emotune_codec::vocab::{BOS, PAD};

    fn layout() -> VocabLayout {
        VocabLayout::default()
    }

    fn vocab() -> usize {
        layout().vocab_size() as usize
    }

    #[test]
    fn stops_on_eos_and_drops_it() {
        let v = layout();
        let forced = [v.pitch_token(60), v.duration_token(2), EOS, v.pitch_token(62)];
        let mut scorer = TableScorer::forcing(vocab(), &forced);
        let generation = generate(&v, &GenerationConfig::default(), &mut scorer, Emotion::Q2, 1).unwrap();
        assert_eq!(generation.stop, StopReason::Eos);
        assert_eq!(generation.tokens, vec![v.pitch_token(60), v.duration_token(2)]);
        assert_eq!(scorer.calls(), 3);
    }

    #[test]
    fn scorer_sees_growing_prefix() {
        let v = layout();
        let forced = [v.pitch_token(60), v.duration_token(2), EOS];
        let mut scorer = TableScorer::forcing(vocab(), &forced);
        generate(&v, &GenerationConfig::default(), &mut scorer, Emotion::Q1, 1).unwrap();
        let emo = v.emotion_token(Emotion::Q1);
        assert_eq!(
            scorer.seen_prefixes,
            vec![
                vec![BOS, emo],
                vec![BOS, emo, v.pitch_token(60)],
                vec![BOS, emo, v.pitch_token(60), v.duration_token(2)],
            ]
        );
    }

    #[test]
    fn hard_stop_at_max_new_tokens() {
        let v = layout();
        let config = GenerationConfig {
            max_new_tokens: 5,
            ..Default::default()
        };
        let scorer = FixedScorer::one_hot(vocab(), v.pitch_token(64));
        let generation = generate(&v, &config, scorer, Emotion::Q4, 9).unwrap();
        assert_eq!(generation.stop, StopReason::MaxLength);
        assert_eq!(generation.tokens.len(), 5);
    }

    #[test]
    fn zero_budget_finishes_without_scoring() {
        let config = GenerationConfig {
            max_new_tokens: 0,
            ..Default::default()
        };
        let mut scorer = TableScorer::new(vocab(), vec![]);
        let generation = generate(&layout(), &config, &mut scorer, Emotion::Q1, 0).unwrap();
        assert!(generation.tokens.is_empty());
        assert_eq!(generation.stop, StopReason::MaxLength);
        assert_eq!(scorer.calls(), 0);
    }

    #[test]
    fn never_exceeds_bound_under_uniform_scores() {
        let config = GenerationConfig {
            max_new_tokens: 64,
            top_p: 1.0,
            ..Default::default()
        };
        for seed in 0..20 {
            let scorer = FixedScorer::new(vec![0.0; vocab()]);
            let generation = generate(&layout(), &config, scorer, Emotion::Q3, seed).unwrap();
            assert!(generation.tokens.len() <= 64);
            assert!(!generation.tokens.contains(&EOS));
            if generation.stop == StopReason::Eos {
                assert!(generation.tokens.len() < 64);
            }
        }
    }

    #[test]
    fn same_seed_same_output() {
        let config = GenerationConfig {
            max_new_tokens: 40,
            ..Default::default()
        };
        let mut scores = vec![0.0; vocab()];
        scores[EOS as usize] = -4.0;
        let a = generate(&layout(), &config, FixedScorer::new(scores.clone()), Emotion::Q1, 77).unwrap();
        let b = generate(&layout(), &config, FixedScorer::new(scores.clone()), Emotion::Q1, 77).unwrap();
        let c = generate(&layout(), &config, FixedScorer::new(scores), Emotion::Q1, 78).unwrap();
        assert_eq!(a, b);
        assert_ne!(a.tokens, c.tokens);
    }

    #[test]
    fn samples_only_from_nucleus() {
        let v = layout();
        // Two tokens share 0.92 of the mass; with top_p 0.9 nothing else
        // may ever be sampled.
        let mut scores = vec![f64::NEG_INFINITY; vocab()];
        let a = v.pitch_token(60) as usize;
        let b = v.pitch_token(67) as usize;
        scores[a] = 0.5_f64.ln();
        scores[b] = 0.42_f64.ln();
        scores[PAD as usize] = 0.08_f64.ln();
        let config = GenerationConfig {
            max_new_tokens: 200,
            top_p: 0.9,
            temperature: 1.0,
        };
        let generation = generate(&v, &config, FixedScorer::new(scores), Emotion::Q2, 5).unwrap();
        assert!(generation.tokens.iter().all(|&t| t as usize == a || t as usize == b));
        assert!(generation.tokens.contains(&(a as Token)));
        assert!(generation.tokens.contains(&(b as Token)));
    }

    #[test]
    fn step_reports_state_transitions() {
        let v = layout();
        let forced = [v.pitch_token(60), EOS];
        let scorer = TableScorer::forcing(vocab(), &forced);
        let mut g = Generator::new(v, GenerationConfig::default(), scorer, Emotion::Q1, SampleRng::new(0)).unwrap();
        assert_eq!(g.state(), DecodeState::Primed);
        assert_eq!(g.step().unwrap(), DecodeState::Extending);
        assert_eq!(g.body(), &[v.pitch_token(60)]);
        assert_eq!(g.step().unwrap(), DecodeState::Done(StopReason::Eos));
        assert_eq!(g.step().unwrap(), DecodeState::Done(StopReason::Eos));
        assert_eq!(g.sequence().len(), 3);
    }

    #[test]
    fn malformed_scores_fail_the_step() {
        let v = layout();
        let short = FixedScorer::new(vec![0.0; 3]);
        assert!(matches!(
            generate(&v, &GenerationConfig::default(), short, Emotion::Q1, 0),
            Err(GenerateError::ScoreLength { .. })
        ));

        let masked = FixedScorer::new(vec![f64::NEG_INFINITY; vocab()]);
        assert!(matches!(
            generate(&v, &GenerationConfig::default(), masked, Emotion::Q1, 0),
            Err(GenerateError::EmptyDistribution)
        ));

        let mut nan = vec![0.0; vocab()];
        nan[10] = f64::NAN;
        assert!(matches!(
            generate(&v, &GenerationConfig::default(), FixedScorer::new(nan), Emotion::Q1, 0),
            Err(GenerateError::NonFiniteScore { token: 10, .. })
        ));
    }

    #[test]
    fn scorer_errors_propagate() {
        struct Failing;
        impl SequenceScorer for Failing {
            fn vocab_size(&self) -> usize {
                VocabLayout::default().vocab_size() as usize
            }
            fn score(&mut self, _prefix: &[Token]) -> Result<Vec<f64>, ScorerError> {
                Err(ScorerError::new("model offline"))
            }
        }
        let err = generate(&layout(), &GenerationConfig::default(), Failing, Emotion::Q1, 0).unwrap_err();
        assert!(matches!(err, GenerateError::Scorer(_)));
        assert!(err.to_string().contains("model offline"));
    }

    #[test]
    fn invalid_config_is_rejected_up_front() {
        let config = GenerationConfig {
            temperature: 0.0,
            ..Default::default()
        };
        let scorer = FixedScorer::new(vec![0.0; vocab()]);
        assert!(matches!(
            generate(&layout(), &config, scorer, Emotion::Q1, 0),
            Err(GenerateError::InvalidConfig(_))
        ));
    }
}
