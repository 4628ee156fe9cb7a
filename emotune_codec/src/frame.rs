// Sequence framing for training and generation.
//
// A framed sequence is `[BOS, EMOTION, body..., EOS]`. Bodies are truncated
// so the framed length never exceeds the model's context (`max_seq_len`).
// Batches are right-padded with PAD to the longest row. `split_frame` undoes
// framing on a generated or stored sequence before it reaches the decoder.

use crate::emotion::Emotion;
use crate::vocab::{BOS, EOS, PAD, Token, VocabLayout};

/// Framing overhead: BOS, emotion token, EOS.
pub const FRAME_OVERHEAD: usize = 3;

/// The generation prompt for `emotion`: `[BOS, EMOTION]`.
pub fn prompt(layout: &VocabLayout, emotion: Emotion) -> Vec<Token> {
    vec![BOS, layout.emotion_token(emotion)]
}

/// Frame `body` as a training sequence of at most `max_seq_len` tokens.
pub fn frame_sequence(
    layout: &VocabLayout,
    body: &[Token],
    emotion: Emotion,
    max_seq_len: usize,
) -> Vec<Token> {
    let keep = body.len().min(max_seq_len.saturating_sub(FRAME_OVERHEAD));
    let mut seq = Vec::with_capacity(keep + FRAME_OVERHEAD);
    seq.extend(prompt(layout, emotion));
    seq.extend_from_slice(&body[..keep]);
    seq.push(EOS);
    seq
}

/// Right-pad every row with PAD to the longest row's length.
pub fn pad_batch(sequences: &[Vec<Token>]) -> Vec<Vec<Token>> {
    let width = sequences.iter().map(Vec::len).max().unwrap_or(0);
    sequences
        .iter()
        .map(|seq| {
            let mut row = seq.clone();
            row.resize(width, PAD);
            row
        })
        .collect()
}

/// Split a possibly framed sequence into its emotion and body.
///
/// Drops a leading BOS and the emotion token that follows it, stops at the
/// first EOS, and removes PAD anywhere in the body. Unframed input comes
/// back unchanged (minus PAD).
pub fn split_frame(layout: &VocabLayout, tokens: &[Token]) -> (Option<Emotion>, Vec<Token>) {
    let mut rest = tokens;
    if let Some((&BOS, tail)) = rest.split_first() {
        rest = tail;
    }
    let emotion = rest.first().and_then(|&t| layout.emotion_of(t));
    if emotion.is_some() {
        rest = &rest[1..];
    }
    let body = rest
        .iter()
        .copied()
        .take_while(|&t| t != EOS)
        .filter(|&t| t != PAD)
        .collect();
    (emotion, body)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frames_with_bos_emotion_eos() {
        let v = VocabLayout::default();
        let body = [v.pitch_token(60), v.duration_token(2)];
        let seq = frame_sequence(&v, &body, Emotion::Q3, 512);
        assert_eq!(
            seq,
            vec![BOS, v.emotion_token(Emotion::Q3), body[0], body[1], EOS]
        );
    }

    #[test]
    fn truncates_body_to_context() {
        let v = VocabLayout::default();
        let body: Vec<Token> = (0..100).map(|i| v.pitch_token(21 + (i % 80) as u8)).collect();
        let seq = frame_sequence(&v, &body, Emotion::Q1, 10);
        assert_eq!(seq.len(), 10);
        assert_eq!(&seq[2..9], &body[..7]);
        assert_eq!(seq[9], EOS);

        let tiny = frame_sequence(&v, &body, Emotion::Q1, 2);
        assert_eq!(tiny.len(), FRAME_OVERHEAD);
    }

    #[test]
    fn pads_to_longest_row() {
        let rows = vec![vec![1, 5, 2], vec![1, 2], vec![]];
        let padded = pad_batch(&rows);
        assert_eq!(padded, vec![vec![1, 5, 2], vec![1, 2, PAD], vec![PAD, PAD, PAD]]);
        assert!(pad_batch(&[]).is_empty());
    }

    #[test]
    fn split_undoes_frame() {
        let v = VocabLayout::default();
        let body = vec![v.time_shift_token(3), v.pitch_token(65), v.duration_token(4)];
        let mut framed = frame_sequence(&v, &body, Emotion::Q4, 512);
        framed.extend([PAD, PAD]);
        assert_eq!(split_frame(&v, &framed), (Some(Emotion::Q4), body.clone()));
        assert_eq!(split_frame(&v, &body), (None, body));
    }

    #[test]
    fn split_stops_at_first_eos() {
        let v = VocabLayout::default();
        let tokens = vec![BOS, v.pitch_token(60), EOS, v.pitch_token(62)];
        assert_eq!(split_frame(&v, &tokens), (None, vec![v.pitch_token(60)]));
    }
}
