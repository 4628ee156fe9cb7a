// Parallel batch generation.
//
// Each request runs its own `Generator` with its own PRNG and its own scorer
// instance built by `make_scorer`, so requests share nothing and a request's
// output depends only on its emotion and seed. Results come back in request
// order; one failing request does not affect the others.

use crate::config::GenerationConfig;
use crate::controller::{Generation, generate};
use crate::error::GenerateError;
use crate::scorer::SequenceScorer;
use emotune_codec::{Emotion, VocabLayout};
use emotune_prng::SampleRng;
use log::info;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub emotion: Emotion,
    pub seed: u64,
}

/// `count` requests for `emotion`, with seeds drawn from one base seed.
pub fn requests_for(emotion: Emotion, count: usize, base_seed: u64) -> Vec<GenerationRequest> {
    let mut rng = SampleRng::new(base_seed);
    (0..count)
        .map(|_| GenerationRequest {
            emotion,
            seed: rng.next_seed(),
        })
        .collect()
}

pub fn generate_batch<S, F>(
    layout: &VocabLayout,
    config: &GenerationConfig,
    requests: &[GenerationRequest],
    make_scorer: F,
) -> Vec<Result<Generation, GenerateError>>
where
    S: SequenceScorer,
    F: Fn() -> S + Sync,
{
    info!("generating {} sequences", requests.len());
    requests
        .par_iter()
        .map(|req| generate(layout, config, make_scorer(), req.emotion, req.seed))
        .collect()
}
