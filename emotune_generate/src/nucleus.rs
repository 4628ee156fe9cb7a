// Temperature scaling, nucleus (top-p) filtering and softmax.
//
// Scores are unnormalized log-likelihoods, with `-inf` meaning "impossible".
// The nucleus is the shortest run of entries, in descending score order,
// whose cumulative softmax mass exceeds `top_p`: an entry is kept when the
// mass strictly before it is at most `top_p`. The top entry is always kept.
// Ties in score are broken by lower token id so the order is total.

use crate::error::GenerateError;
use std::cmp::Ordering;

/// Divide every score by `temperature`. `temperature` must be positive.
pub fn apply_temperature(scores: &mut [f64], temperature: f64) {
    if temperature != 1.0 {
        for s in scores.iter_mut() {
            *s /= temperature;
        }
    }
}

/// Reject NaN and `+inf`; `-inf` is a legitimate mask value.
pub fn check_scores(scores: &[f64]) -> Result<(), GenerateError> {
    match scores
        .iter()
        .enumerate()
        .find(|(_, s)| s.is_nan() || **s == f64::INFINITY)
    {
        Some((token, &score)) => Err(GenerateError::NonFiniteScore { token, score }),
        None => Ok(()),
    }
}

/// Numerically stable softmax. Fails if every score is `-inf`.
pub fn softmax(scores: &[f64]) -> Result<Vec<f64>, GenerateError> {
    let max = scores.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if max == f64::NEG_INFINITY {
        return Err(GenerateError::EmptyDistribution);
    }
    let exps: Vec<f64> = scores.iter().map(|&s| (s - max).exp()).collect();
    let total: f64 = exps.iter().sum();
    Ok(exps.into_iter().map(|e| e / total).collect())
}

/// Token ids ordered by descending score, ties by ascending id.
pub fn ranked(scores: &[f64]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| {
        scores[b]
            .partial_cmp(&scores[a])
            .unwrap_or(Ordering::Equal)
            .then(a.cmp(&b))
    });
    order
}

/// Mask everything outside the nucleus to `-inf`. Returns how many entries
/// survive.
pub fn nucleus_filter(scores: &mut [f64], top_p: f64) -> Result<usize, GenerateError> {
    let probs = softmax(scores)?;
    let order = ranked(scores);

    let mut cumulative = 0.0;
    let mut keep = 0;
    for &token in &order {
        if keep > 0 && cumulative > top_p {
            break;
        }
        if probs[token] == 0.0 && keep > 0 {
            break;
        }
        cumulative += probs[token];
        keep += 1;
    }

    for &token in &order[keep..] {
        scores[token] = f64::NEG_INFINITY;
    }
    Ok(keep)
}

/// The index of the highest score, lowest id on ties.
pub fn argmax(scores: &[f64]) -> Option<usize> {
    ranked(scores).first().copied()
}
