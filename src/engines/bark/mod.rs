//! Bark text-to-speech engine implementation.
//!
//! This module runs an ONNX export of Suno's Bark model through ONNX Runtime.
//! The exported graph covers the whole generation chain (semantic, coarse and
//! fine stages plus the codec) and is treated as a single call: token ids and
//! speaker prompts in, waveform out.
//!
//! # Model Source Layout
//!
//! ```text
//! models/bark/                         (or hf://owner/name)
//! ├── model.onnx                       # exported generation graph
//! ├── tokenizer.json                   # text tokenizer
//! ├── config.json                      # optional, codec sampling rate
//! ├── speaker_embeddings_path.json     # optional, preset -> prompt files
//! └── speaker_embeddings/
//!     └── v2/en_speaker_6_{semantic,coarse,fine}_prompt.npy
//! ```
//!
//! # Graph Inputs
//!
//! | Name | Shape | Required |
//! |---|---|---|
//! | `input_ids` (or `tokens`) | `[1, 256]` int64 | yes |
//! | `attention_mask` | `[1, 256]` int64 | if declared |
//! | `semantic_prompt` | `[1, S]` int64 | if declared |
//! | `coarse_prompt` | `[1, 2, C]` int64 | if declared |
//! | `fine_prompt` | `[1, 8, F]` int64 | if declared |
//!
//! The first output is read as the float32 waveform.
//!
//! # Examples
//!
//! ```rust,no_run
//! use script_tts::{SynthesisEngine, engines::bark::{BarkEngine, BarkModelParams, Device}};
//! use std::path::PathBuf;
//!
//! let mut engine = BarkEngine::new();
//! engine.load_model_with_params(
//!     &"models/bark".parse()?,
//!     BarkModelParams {
//!         device: Device::Cpu,
//!         instances: 2,
//!         ..Default::default()
//!     },
//! )?;
//!
//! let params = engine.voice_params("v2/en_speaker_6")?;
//! engine.synthesize_to_file("Hello from Bark!", &PathBuf::from("out.wav"), &params)?;
//! # Ok::<(), Box<dyn std::error::Error + Send + Sync>>(())
//! ```

pub mod config;
pub mod engine;
pub mod model;
pub mod processor;
pub mod voices;

pub use engine::{BarkEngine, BarkInferenceParams, BarkModelParams, DEFAULT_VOICE_PRESET};
pub use model::{BarkError, Device};
pub use voices::VoicePreset;
