// Data-driven codec configuration.
//
// Loaded from JSON; every field has a default so a partial file (or none at
// all) is valid. The vocabulary widths here define the token contract, so
// every component that exchanges tokens must be built from the same
// `CodecConfig`.

use crate::encode::CursorMode;
use crate::error::CodecError;
use crate::note::DEFAULT_TICKS_PER_BEAT;
use crate::vocab::{VocabConfig, VocabLayout};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CodecConfig {
    /// Band widths of the vocabulary.
    pub vocab: VocabConfig,
    /// Resolution given to decoded note sequences.
    pub output_ticks_per_beat: u16,
    /// Model context length, including BOS, emotion and EOS.
    pub max_seq_len: usize,
    /// Encoder time-cursor policy.
    pub cursor: CursorMode,
}

impl Default for CodecConfig {
    fn default() -> Self {
        CodecConfig {
            vocab: VocabConfig::default(),
            output_ticks_per_beat: DEFAULT_TICKS_PER_BEAT,
            max_seq_len: 512,
            cursor: CursorMode::default(),
        }
    }
}

impl CodecConfig {
    /// Load from a JSON file.
    pub fn load(path: &Path) -> Result<Self, CodecError> {
        let data = std::fs::read_to_string(path)?;
        let config: CodecConfig = serde_json::from_str(&data)?;
        Ok(config)
    }

    /// Build the vocabulary layout these widths describe.
    pub fn layout(&self) -> Result<VocabLayout, CodecError> {
        VocabLayout::new(self.vocab)
    }
}
