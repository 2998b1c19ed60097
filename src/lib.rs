//! # script-tts
//!
//! A Rust library that narrates a text script into a single WAV file.
//!
//! ## Features
//!
//! - **Sentence pipeline**: scripts are split into sentences, synthesized in
//!   parallel on a bounded worker pool and stitched back together in order
//! - **Bark TTS**: ONNX export of the Bark model with hub-hosted voice presets
//! - **Flexible Model Loading**: local directories or `hf://` repositories
//!
//! ## Quick Start
//!
//! ```toml
//! [dependencies]
//! script-tts = { version = "2026.10", features = ["bark"] }
//! ```
//!
//! ```ignore
//! use script_tts::{engines::bark::BarkEngine, pipeline, ModelSource, SynthesisEngine};
//!
//! let mut engine = BarkEngine::new();
//! engine.load_model(&"models/bark".parse::<ModelSource>()?)?;
//! let params = engine.voice_params("v2/en_speaker_6")?;
//!
//! let config = pipeline::PipelineConfig::default();
//! let result = pipeline::synthesize_script(&engine, "Hello there. Goodbye!", &params, &config)?;
//! result.write_wav(std::path::Path::new("output.wav"))?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

#[cfg(feature = "bark")]
pub mod cli;
pub mod engines;
pub mod hub;
pub mod pipeline;
#[cfg(feature = "server")]
pub mod server;
pub mod splitter;

use std::io::{Cursor, Seek, Write};
use std::path::Path;

pub use hub::{ModelFiles, ModelSource, SourceError};

/// Boxed error type returned across the [`SynthesisEngine`] seam.
///
/// `Send + Sync` so failures can travel back from pool workers.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Log filter used when `RUST_LOG` is unset.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// `env_logger` builder honoring `RUST_LOG`, defaulting to [`DEFAULT_LOG_FILTER`].
pub fn log_builder() -> env_logger::Builder {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(DEFAULT_LOG_FILTER))
}

/// The result of a synthesis (text-to-speech) operation.
///
/// Contains raw f32 audio samples and the sample rate of the output audio.
#[derive(Debug, Clone, PartialEq)]
pub struct SynthesisResult {
    /// Raw audio samples as f32 values
    pub samples: Vec<f32>,
    /// Sample rate of the audio (24000 for Bark)
    pub sample_rate: u32,
}

impl SynthesisResult {
    /// Write the audio to a mono 32-bit float WAV file, replacing any existing file.
    pub fn write_wav(&self, path: &Path) -> Result<(), hound::Error> {
        let writer = hound::WavWriter::create(path, self.wav_spec())?;
        self.write_samples(writer)
    }

    /// Encode the audio as an in-memory mono 32-bit float WAV.
    pub fn to_wav_bytes(&self) -> Result<Vec<u8>, hound::Error> {
        let mut bytes = Vec::new();
        let writer = hound::WavWriter::new(Cursor::new(&mut bytes), self.wav_spec())?;
        self.write_samples(writer)?;
        Ok(bytes)
    }

    fn wav_spec(&self) -> hound::WavSpec {
        hound::WavSpec {
            channels: 1,
            sample_rate: self.sample_rate,
            bits_per_sample: 32,
            sample_format: hound::SampleFormat::Float,
        }
    }

    fn write_samples<W: Write + Seek>(
        &self,
        mut writer: hound::WavWriter<W>,
    ) -> Result<(), hound::Error> {
        for &sample in &self.samples {
            writer.write_sample(sample)?;
        }
        writer.finalize()
    }

    /// Duration of the audio in seconds.
    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / self.sample_rate as f64
    }
}

/// Common interface for text-to-speech synthesis engines.
///
/// Synthesis takes `&self`: a loaded engine is shared read-only by every
/// worker of the sentence pipeline, so implementations must be safe to call
/// concurrently.
pub trait SynthesisEngine {
    /// Parameters for configuring inference behavior (voice preset, etc.)
    type SynthesisParams;
    /// Parameters for configuring model loading (device, threads, etc.)
    type ModelParams: Default;

    /// Load a model from the given source using default parameters.
    fn load_model(&mut self, source: &ModelSource) -> Result<(), BoxError> {
        self.load_model_with_params(source, Self::ModelParams::default())
    }

    /// Load a model from the given source with custom parameters.
    fn load_model_with_params(
        &mut self,
        source: &ModelSource,
        params: Self::ModelParams,
    ) -> Result<(), BoxError>;

    /// Unload the currently loaded model and free associated resources.
    fn unload_model(&mut self);

    /// Native output sample rate of the loaded model.
    fn sample_rate(&self) -> u32;

    /// Synthesize speech from the given text.
    fn synthesize(
        &self,
        text: &str,
        params: &Self::SynthesisParams,
    ) -> Result<SynthesisResult, BoxError>;

    /// Synthesize speech from the given text and write to a WAV file.
    ///
    /// Default implementation calls `synthesize()` then `SynthesisResult::write_wav()`.
    fn synthesize_to_file(
        &self,
        text: &str,
        wav_path: &Path,
        params: &Self::SynthesisParams,
    ) -> Result<(), BoxError> {
        self.synthesize(text, params)?.write_wav(wav_path)?;
        Ok(())
    }
}

/// Engines whose synthesis parameters can be built from a named voice preset.
pub trait VoicePresets: SynthesisEngine {
    /// Resolve `preset` (e.g. `v2/en_speaker_6`) to synthesis parameters.
    fn preset_params(&self, preset: &str) -> Result<Self::SynthesisParams, BoxError>;
}
