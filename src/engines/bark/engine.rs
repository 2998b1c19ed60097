use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::{BoxError, ModelSource, SynthesisEngine, SynthesisResult, VoicePresets};

use super::config::{load_config, BarkConfig, PromptPaths, SpeakerIndex};
use super::model::{BarkError, BarkModel, Device, SAMPLE_RATE};
use super::processor::BarkProcessor;
use super::voices::VoicePreset;

/// Voice preset used when none is requested.
pub const DEFAULT_VOICE_PRESET: &str = "v2/en_speaker_6";

const TOKENIZER_FILE: &str = "tokenizer.json";
const CONFIG_FILE: &str = "config.json";
const SPEAKER_INDEX_FILE: &str = "speaker_embeddings_path.json";

/// Parameters for configuring Bark model loading.
#[derive(Debug, Clone)]
pub struct BarkModelParams {
    /// Compute device. `Auto` prefers CUDA when available.
    pub device: Device,
    /// Number of independent inference sessions. Each one holds a full copy
    /// of the graph; sentences beyond this count wait for a free session.
    pub instances: usize,
    /// Number of CPU threads per session.
    /// `None` uses the ORT default (typically all available cores).
    pub num_threads: Option<usize>,
    /// Path of the ONNX graph relative to the model source.
    pub onnx_file: String,
    /// Path for caching the Level3-optimized ONNX graph.
    ///
    /// Always write to a writable location; hub cache directories should be
    /// treated as read-only.
    pub optimized_model_cache_path: Option<PathBuf>,
}

impl Default for BarkModelParams {
    fn default() -> Self {
        Self {
            device: Device::Auto,
            instances: 1,
            num_threads: None,
            onnx_file: "model.onnx".to_string(),
            optimized_model_cache_path: None,
        }
    }
}

/// Parameters for configuring a Bark synthesis request.
#[derive(Debug, Clone, Default)]
pub struct BarkInferenceParams {
    /// Speaker prompts applied to every sentence. `None` lets the model pick
    /// a random speaker, which only works with graphs that take no prompts.
    pub voice: Option<Arc<VoicePreset>>,
}

/// Bark text-to-speech engine.
///
/// Runs an ONNX export of the full Bark generation graph (text tokens and
/// speaker prompts in, 24 kHz waveform out). The tokenizer, model config and
/// voice presets are read from the same [`ModelSource`].
///
/// # Quick Start
///
/// ```rust,no_run
/// use script_tts::{SynthesisEngine, engines::bark::BarkEngine};
///
/// let mut engine = BarkEngine::new();
/// engine.load_model(&"models/bark".parse()?)?;
/// let params = engine.voice_params("v2/en_speaker_6")?;
/// let result = engine.synthesize("Hello, world!", &params)?;
/// # Ok::<(), Box<dyn std::error::Error + Send + Sync>>(())
/// ```
pub struct BarkEngine {
    model: Option<BarkModel>,
    processor: Option<BarkProcessor>,
    source: Option<ModelSource>,
    sample_rate: u32,
}

impl Default for BarkEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl BarkEngine {
    pub fn new() -> Self {
        Self {
            model: None,
            processor: None,
            source: None,
            sample_rate: SAMPLE_RATE,
        }
    }

    /// Resolved compute device (requires model to be loaded).
    pub fn device(&self) -> Option<Device> {
        self.model.as_ref().map(BarkModel::device)
    }

    /// Preset names listed in the source's speaker index (requires model to be loaded).
    ///
    /// Empty when the source has no `speaker_embeddings_path.json`; presets
    /// can still be requested by name if their prompt files exist.
    pub fn list_voices(&self) -> Result<Vec<String>, BarkError> {
        let source = self.source.as_ref().ok_or(BarkError::ModelNotLoaded)?;
        let Some(path) = source.open()?.get_optional(SPEAKER_INDEX_FILE) else {
            return Ok(Vec::new());
        };
        let index = SpeakerIndex::load(&path)?;
        Ok(index.presets().into_iter().map(String::from).collect())
    }

    /// Build inference params for a voice preset.
    ///
    /// `preset` is either a local `.npz` file or a preset name such as
    /// `v2/en_speaker_6`, fetched from the loaded model source. Names are
    /// looked up in `speaker_embeddings_path.json` when the source has one,
    /// falling back to the `speaker_embeddings/<preset>_*_prompt.npy` layout.
    pub fn voice_params(&self, preset: &str) -> Result<BarkInferenceParams, BarkError> {
        let voice = if preset.to_lowercase().ends_with(".npz") && Path::new(preset).is_file() {
            VoicePreset::load_npz(Path::new(preset))?
        } else {
            let source = self.source.as_ref().ok_or(BarkError::ModelNotLoaded)?;
            let files = source.open()?;

            let paths = files
                .get_optional(SPEAKER_INDEX_FILE)
                .map(|path| SpeakerIndex::load(&path))
                .transpose()?
                .and_then(|index| index.prompt_paths(preset))
                .unwrap_or_else(|| PromptPaths::conventional(preset));

            let voice = VoicePreset::load_npy_files(
                &files.get(&paths.semantic_prompt)?,
                &files.get(&paths.coarse_prompt)?,
                &files.get(&paths.fine_prompt)?,
            )?;
            log::info!("Loaded voice preset '{preset}' from {source}");
            voice
        };

        if self.model.as_ref().is_some_and(|m| !m.accepts_voice()) {
            log::warn!("Model graph takes no speaker prompts; voice preset '{preset}' is ignored");
        }

        Ok(BarkInferenceParams {
            voice: Some(Arc::new(voice)),
        })
    }
}

impl Drop for BarkEngine {
    fn drop(&mut self) {
        self.unload_model();
    }
}

impl SynthesisEngine for BarkEngine {
    type SynthesisParams = BarkInferenceParams;
    type ModelParams = BarkModelParams;

    fn load_model_with_params(
        &mut self,
        source: &ModelSource,
        params: Self::ModelParams,
    ) -> Result<(), BoxError> {
        let files = source.open().map_err(BarkError::from)?;

        let onnx_path = files
            .get(&params.onnx_file)
            .map_err(|e| BarkError::MissingGraph {
                file: params.onnx_file.clone(),
                location: source.to_string(),
                source: e,
            })?;

        let config = match files.get_optional(CONFIG_FILE) {
            Some(path) => load_config(&path)?,
            None => {
                log::warn!("{CONFIG_FILE} not found in {source}, assuming {SAMPLE_RATE} Hz");
                BarkConfig::default()
            }
        };

        let tokenizer_path = files.get(TOKENIZER_FILE).map_err(BarkError::from)?;
        let processor = BarkProcessor::load(&tokenizer_path)?;

        let model = BarkModel::load(
            &onnx_path,
            params.device,
            params.instances,
            params.num_threads,
            params.optimized_model_cache_path.as_deref(),
        )?;

        self.sample_rate = config.codec_config.sampling_rate;
        self.model = Some(model);
        self.processor = Some(processor);
        self.source = Some(source.clone());
        Ok(())
    }

    fn unload_model(&mut self) {
        self.model = None;
        self.processor = None;
        self.source = None;
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn synthesize(
        &self,
        text: &str,
        params: &Self::SynthesisParams,
    ) -> Result<SynthesisResult, BoxError> {
        let (model, processor) = match (&self.model, &self.processor) {
            (Some(model), Some(processor)) => (model, processor),
            _ => return Err(BarkError::ModelNotLoaded.into()),
        };

        let inputs = processor.encode(text, params.voice.as_deref())?;
        let samples = model.generate(&inputs)?;

        Ok(SynthesisResult {
            samples,
            sample_rate: self.sample_rate,
        })
    }
}

impl VoicePresets for BarkEngine {
    fn preset_params(&self, preset: &str) -> Result<BarkInferenceParams, BoxError> {
        Ok(self.voice_params(preset)?)
    }
}
