// Generation configuration.
//
// `GenerationConfig` holds the sampling policy; `EmotuneConfig` bundles it
// with the codec config so one JSON file drives the whole CLI. Missing
// fields take their defaults. CLI flags override loaded values.

use crate::error::GenerateError;
use emotune_codec::config::CodecConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    /// Score divisor. Below 1 sharpens the distribution, above 1 flattens it.
    pub temperature: f64,
    /// Nucleus threshold in (0, 1].
    pub top_p: f64,
    /// Hard bound on generated body tokens (the prompt is not counted).
    pub max_new_tokens: usize,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        GenerationConfig {
            temperature: 1.0,
            top_p: 0.9,
            max_new_tokens: 512,
        }
    }
}

impl GenerationConfig {
    pub fn validate(&self) -> Result<(), GenerateError> {
        if !(self.temperature.is_finite() && self.temperature > 0.0) {
            return Err(GenerateError::InvalidConfig(format!(
                "temperature must be positive and finite, got {}",
                self.temperature
            )));
        }
        if !(self.top_p > 0.0 && self.top_p <= 1.0) {
            return Err(GenerateError::InvalidConfig(format!(
                "top_p must be in (0, 1], got {}",
                self.top_p
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmotuneConfig {
    pub codec: CodecConfig,
    pub generation: GenerationConfig,
}

impl EmotuneConfig {
    /// Load from a JSON file.
    pub fn load(path: &Path) -> Result<Self, GenerateError> {
        let data = std::fs::read_to_string(path)?;
        let config: EmotuneConfig = serde_json::from_str(&data)?;
        config.generation.validate()?;
        Ok(config)
    }
}
