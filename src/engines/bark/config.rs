use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;

use super::model::{BarkError, SAMPLE_RATE};

/// The subset of the model repository's `config.json` the engine reads.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BarkConfig {
    #[serde(default)]
    pub codec_config: CodecConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CodecConfig {
    #[serde(default = "default_sampling_rate")]
    pub sampling_rate: u32,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            sampling_rate: default_sampling_rate(),
        }
    }
}

fn default_sampling_rate() -> u32 {
    SAMPLE_RATE
}

/// Load `config.json`. Unknown fields are ignored.
pub fn load_config(config_path: &Path) -> Result<BarkConfig, BarkError> {
    let content = std::fs::read_to_string(config_path)?;
    serde_json::from_str(&content)
        .map_err(|e| BarkError::Config(format!("Failed to parse {}: {e}", config_path.display())))
}

/// Locations of the three prompt files making up one voice preset.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PromptPaths {
    pub semantic_prompt: String,
    pub coarse_prompt: String,
    pub fine_prompt: String,
}

impl PromptPaths {
    /// Hub layout used when no index lists the preset:
    /// `speaker_embeddings/<preset>_<kind>_prompt.npy`.
    pub fn conventional(preset: &str) -> Self {
        let path = |kind: &str| format!("speaker_embeddings/{preset}_{kind}_prompt.npy");
        Self {
            semantic_prompt: path("semantic"),
            coarse_prompt: path("coarse"),
            fine_prompt: path("fine"),
        }
    }
}

/// `speaker_embeddings_path.json`: preset name to prompt file locations.
///
/// The file also carries non-preset keys (e.g. `repo_or_path`), so entries
/// are decoded on lookup.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(transparent)]
pub struct SpeakerIndex(HashMap<String, serde_json::Value>);

impl SpeakerIndex {
    pub fn load(path: &Path) -> Result<Self, BarkError> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content)
            .map_err(|e| BarkError::Config(format!("Failed to parse {}: {e}", path.display())))
    }

    pub fn prompt_paths(&self, preset: &str) -> Option<PromptPaths> {
        let entry = self.0.get(preset)?;
        PromptPaths::deserialize(entry).ok()
    }

    /// Preset names listed in the index, sorted.
    pub fn presets(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .0
            .iter()
            .filter(|(_, entry)| PromptPaths::deserialize(*entry).is_ok())
            .map(|(name, _)| name.as_str())
            .collect();
        names.sort_unstable();
        names
    }
}
