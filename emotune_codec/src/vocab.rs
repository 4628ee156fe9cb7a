// Vocabulary layout: the partition of the token space into bands.
//
// Order is fixed: 4 special tokens (PAD, BOS, EOS, UNK), then PITCH,
// TIME_SHIFT, DURATION and EMOTION bands. Only the widths are configurable.
// Every offset is derived from the previous band's offset plus its width, so
// a layout can never be internally inconsistent. `VocabLayout` deserializes
// through `VocabConfig` and re-derives the offsets on load.
//
// The widths are a versioned contract: token sequences and scorer models
// produced under one layout are meaningless under another. Bump
// `LAYOUT_VERSION` whenever the band order or special tokens change.

use crate::emotion::Emotion;
use crate::error::CodecError;
use serde::{Deserialize, Serialize};

/// A token id. Its category is determined by which band it falls in.
pub type Token = u32;

pub const PAD: Token = 0;
pub const BOS: Token = 1;
pub const EOS: Token = 2;
pub const UNK: Token = 3;

/// Number of special tokens preceding the pitch band.
pub const NUM_SPECIAL: u32 = 4;

/// Version of the band order and special-token assignment.
pub const LAYOUT_VERSION: u32 = 1;

/// Semantic category of a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Band {
    Pad,
    Bos,
    Eos,
    Unk,
    Pitch,
    TimeShift,
    Duration,
    Emotion,
}

impl Band {
    pub fn is_special(self) -> bool {
        matches!(self, Band::Pad | Band::Bos | Band::Eos | Band::Unk)
    }
}

/// The configurable band widths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VocabConfig {
    /// Lowest encodable MIDI pitch (A0 on a piano).
    pub min_pitch: u8,
    /// Highest encodable MIDI pitch (C8 on a piano).
    pub max_pitch: u8,
    /// Time-shift steps, including the unused zero step.
    pub num_time_shifts: u32,
    /// Duration bins, including the unused zero bin.
    pub num_durations: u32,
    /// Emotion conditioning classes.
    pub num_emotions: u32,
}

impl Default for VocabConfig {
    fn default() -> Self {
        VocabConfig {
            min_pitch: 21,
            max_pitch: 108,
            num_time_shifts: 100,
            num_durations: 64,
            num_emotions: 4,
        }
    }
}

/// Immutable band layout shared by the encoder, decoder and controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "VocabConfig", into = "VocabConfig")]
pub struct VocabLayout {
    min_pitch: u8,
    max_pitch: u8,
    num_pitches: u32,
    num_time_shifts: u32,
    num_durations: u32,
    num_emotions: u32,
    offset_pitch: u32,
    offset_time: u32,
    offset_duration: u32,
    offset_emotion: u32,
    vocab_size: u32,
}

impl VocabLayout {
    /// Validate the widths and derive the band offsets.
    pub fn new(config: VocabConfig) -> Result<Self, CodecError> {
        if config.min_pitch > config.max_pitch {
            return Err(CodecError::InvalidLayout(format!(
                "min_pitch {} exceeds max_pitch {}",
                config.min_pitch, config.max_pitch
            )));
        }
        if config.max_pitch > 127 {
            return Err(CodecError::InvalidLayout(format!(
                "max_pitch {} is outside the MIDI range",
                config.max_pitch
            )));
        }
        if config.num_time_shifts == 0 || config.num_durations == 0 {
            return Err(CodecError::InvalidLayout(
                "time-shift and duration bands must be non-empty".into(),
            ));
        }
        if (config.num_emotions as usize) < Emotion::ALL.len() {
            return Err(CodecError::InvalidLayout(format!(
                "num_emotions {} cannot hold {} emotion classes",
                config.num_emotions,
                Emotion::ALL.len()
            )));
        }
        let total = NUM_SPECIAL as u64
            + (config.max_pitch - config.min_pitch) as u64
            + 1
            + config.num_time_shifts as u64
            + config.num_durations as u64
            + config.num_emotions as u64;
        if total > u32::MAX as u64 {
            return Err(CodecError::InvalidLayout(format!(
                "vocabulary of {total} tokens does not fit in a u32"
            )));
        }
        Ok(Self::derive(config))
    }

    fn derive(config: VocabConfig) -> Self {
        let num_pitches = (config.max_pitch - config.min_pitch) as u32 + 1;
        let offset_pitch = NUM_SPECIAL;
        let offset_time = offset_pitch + num_pitches;
        let offset_duration = offset_time + config.num_time_shifts;
        let offset_emotion = offset_duration + config.num_durations;
        VocabLayout {
            min_pitch: config.min_pitch,
            max_pitch: config.max_pitch,
            num_pitches,
            num_time_shifts: config.num_time_shifts,
            num_durations: config.num_durations,
            num_emotions: config.num_emotions,
            offset_pitch,
            offset_time,
            offset_duration,
            offset_emotion,
            vocab_size: offset_emotion + config.num_emotions,
        }
    }

    pub fn config(&self) -> VocabConfig {
        VocabConfig {
            min_pitch: self.min_pitch,
            max_pitch: self.max_pitch,
            num_time_shifts: self.num_time_shifts,
            num_durations: self.num_durations,
            num_emotions: self.num_emotions,
        }
    }

    pub fn min_pitch(&self) -> u8 {
        self.min_pitch
    }

    pub fn max_pitch(&self) -> u8 {
        self.max_pitch
    }

    pub fn num_pitches(&self) -> u32 {
        self.num_pitches
    }

    pub fn num_time_shifts(&self) -> u32 {
        self.num_time_shifts
    }

    pub fn num_durations(&self) -> u32 {
        self.num_durations
    }

    pub fn num_emotions(&self) -> u32 {
        self.num_emotions
    }

    pub fn offset_pitch(&self) -> u32 {
        self.offset_pitch
    }

    pub fn offset_time(&self) -> u32 {
        self.offset_time
    }

    pub fn offset_duration(&self) -> u32 {
        self.offset_duration
    }

    pub fn offset_emotion(&self) -> u32 {
        self.offset_emotion
    }

    pub fn vocab_size(&self) -> u32 {
        self.vocab_size
    }

    /// Band and band-local index of `token`, or `None` if it lies outside
    /// the vocabulary.
    pub fn lookup(&self, token: Token) -> Option<(Band, u32)> {
        let entry = match token {
            PAD => (Band::Pad, 0),
            BOS => (Band::Bos, 0),
            EOS => (Band::Eos, 0),
            UNK => (Band::Unk, 0),
            t if t < self.offset_time => (Band::Pitch, t - self.offset_pitch),
            t if t < self.offset_duration => (Band::TimeShift, t - self.offset_time),
            t if t < self.offset_emotion => (Band::Duration, t - self.offset_duration),
            t if t < self.vocab_size => (Band::Emotion, t - self.offset_emotion),
            _ => return None,
        };
        Some(entry)
    }

    /// Band and band-local index of `token`.
    ///
    /// Panics if `token` is outside the vocabulary; callers holding
    /// untrusted tokens use `lookup`.
    pub fn split(&self, token: Token) -> (Band, u32) {
        match self.lookup(token) {
            Some(entry) => entry,
            None => panic!(
                "token {token} outside vocabulary of size {}",
                self.vocab_size
            ),
        }
    }

    /// Band of `token`. Same contract as `split`.
    pub fn classify(&self, token: Token) -> Band {
        self.split(token).0
    }

    /// Clamp a MIDI pitch into the encodable range.
    pub fn clamp_pitch(&self, pitch: u8) -> u8 {
        pitch.clamp(self.min_pitch, self.max_pitch)
    }

    /// PITCH token for `pitch`, clamped into range.
    pub fn pitch_token(&self, pitch: u8) -> Token {
        self.offset_pitch + (self.clamp_pitch(pitch) - self.min_pitch) as u32
    }

    /// MIDI pitch carried by a pitch-band local index.
    pub fn pitch_of(&self, local: u32) -> u8 {
        let local = local.min(self.num_pitches - 1);
        self.min_pitch + local as u8
    }

    /// TIME_SHIFT token for `steps` grid bins, clamped to the last step.
    pub fn time_shift_token(&self, steps: u32) -> Token {
        self.offset_time + steps.min(self.num_time_shifts - 1)
    }

    /// DURATION token for `bins` grid bins, clamped to the last bin.
    pub fn duration_token(&self, bins: u32) -> Token {
        self.offset_duration + bins.min(self.num_durations - 1)
    }

    pub fn emotion_token(&self, emotion: Emotion) -> Token {
        self.offset_emotion + emotion.index() as u32
    }

    /// Emotion carried by `token`, if it is an emotion-band token naming
    /// one of the known classes.
    pub fn emotion_of(&self, token: Token) -> Option<Emotion> {
        match self.lookup(token)? {
            (Band::Emotion, local) => Emotion::from_index(local as usize),
            _ => None,
        }
    }
}

impl Default for VocabLayout {
    fn default() -> Self {
        Self::derive(VocabConfig::default())
    }
}

impl TryFrom<VocabConfig> for VocabLayout {
    type Error = CodecError;

    fn try_from(config: VocabConfig) -> Result<Self, Self::Error> {
        VocabLayout::new(config)
    }
}

impl From<VocabLayout> for VocabConfig {
    fn from(layout: VocabLayout) -> Self {
        layout.config()
    }
}
