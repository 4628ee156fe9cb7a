// Emotion conditioning labels.
//
// Four quadrants of Russell's valence/arousal circumplex, labelled Q1..Q4
// as in the EMOPIA piano corpus. Each maps to one EMOTION-band token that
// sits right after BOS to steer generation.

use crate::error::CodecError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Emotion {
    /// High valence, high arousal.
    Q1 = 0,
    /// Low valence, high arousal.
    Q2 = 1,
    /// Low valence, low arousal.
    Q3 = 2,
    /// High valence, low arousal.
    Q4 = 3,
}

impl Emotion {
    pub const ALL: [Emotion; 4] = [Emotion::Q1, Emotion::Q2, Emotion::Q3, Emotion::Q4];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    /// Everyday name for the quadrant.
    pub fn mood(self) -> &'static str {
        match self {
            Emotion::Q1 => "joy",
            Emotion::Q2 => "tension",
            Emotion::Q3 => "sadness",
            Emotion::Q4 => "calm",
        }
    }
}

impl fmt::Display for Emotion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Q{}", self.index() + 1)
    }
}

/// Accepts `Q1`, `q1`, the bare quadrant number `1`, or the mood name.
impl FromStr for Emotion {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let lower = trimmed.to_ascii_lowercase();
        let digits = lower.strip_prefix('q').unwrap_or(&lower);
        let numbered = digits
            .parse::<usize>()
            .ok()
            .and_then(|n| n.checked_sub(1))
            .and_then(Emotion::from_index);
        if let Some(e) = numbered {
            return Ok(e);
        }
        Emotion::ALL
            .into_iter()
            .find(|e| e.mood() == lower)
            .ok_or_else(|| CodecError::UnknownEmotion(trimmed.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_labels() {
        assert_eq!("Q1".parse::<Emotion>().unwrap(), Emotion::Q1);
        assert_eq!("q3".parse::<Emotion>().unwrap(), Emotion::Q3);
        assert_eq!("4".parse::<Emotion>().unwrap(), Emotion::Q4);
        assert_eq!(" Q2 ".parse::<Emotion>().unwrap(), Emotion::Q2);
        assert_eq!("Calm".parse::<Emotion>().unwrap(), Emotion::Q4);
    }

    #[test]
    fn rejects_unknown_labels() {
        assert!("Q0".parse::<Emotion>().is_err());
        assert!("Q5".parse::<Emotion>().is_err());
        assert!("happy".parse::<Emotion>().is_err());
        assert!("".parse::<Emotion>().is_err());
    }

    #[test]
    fn display_matches_label() {
        for e in Emotion::ALL {
            assert_eq!(e.to_string().parse::<Emotion>().unwrap(), e);
        }
        assert_eq!(Emotion::Q2.to_string(), "Q2");
    }
}
